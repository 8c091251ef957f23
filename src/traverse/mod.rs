//! Concurrent tree traversal engine
//!
//! This module implements the recursive fan-out/fan-in aggregation at
//! the heart of the crate: resolve every node reachable from the seeds,
//! bound the concurrency, and terminate exactly when nothing is
//! outstanding.
//!
//! # Architecture
//!
//! ```text
//!                    ┌──────────────────────────┐
//!                    │   TraverseCoordinator    │
//!                    │  - seeds initial paths   │
//!                    │  - single consumer loop  │
//!                    └───────────┬──────────────┘
//!                                │ submit
//!                                ▼
//!                    ┌──────────────────────────┐
//!                    │       Dispatcher         │
//!                    │  semaphore (K permits)   │
//!                    └───────────┬──────────────┘
//!        ┌───────────────────────┼───────────────────────┐
//!        ▼                       ▼                       ▼
//!  ┌───────────┐           ┌───────────┐           ┌───────────┐
//!  │ resolve   │           │ resolve   │    ...    │ resolve   │
//!  │ task 1    │           │ task 2    │           │ task K    │
//!  └─────┬─────┘           └─────┬─────┘           └─────┬─────┘
//!        │                       │                       │
//!        └───────────────────────┼───────────────────────┘
//!                                ▼
//!                    ┌──────────────────────────┐
//!                    │     result channel       │
//!                    └───────────┬──────────────┘
//!                                ▼
//!                    ┌──────────────────────────┐
//!                    │       Aggregator         │
//!                    │  - outstanding set       │
//!                    │  - children → re-submit  │
//!                    │  - leaves → accumulate   │
//!                    │  - empty set → Done      │
//!                    └──────────────────────────┘
//! ```
//!
//! The aggregator is the single serialization point: all of its
//! transitions run on the coordinator task, so no lock is needed and a
//! partially applied transition can never be observed as completion.

pub mod aggregator;
pub mod coordinator;
pub mod dispatcher;

pub use aggregator::{Aggregator, Step, TraverseStats};
pub use coordinator::{
    TraverseCoordinator, TraverseOutcome, TraverseProgress, TraverseReport,
};
pub use dispatcher::{DispatchStats, Dispatcher};
