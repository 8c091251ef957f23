//! znode-harvester - Concurrent Tree Harvester for Hierarchical Key/Value Stores
//!
//! A traversal engine for remote hierarchical key/value stores (modeled
//! on Apache ZooKeeper): resolve every node reachable from a set of
//! seed paths, fan the remote calls out across a bounded worker pool,
//! and collect every leaf payload exactly once.
//!
//! # Features
//!
//! - **Bounded Concurrency**: At most K resolutions in flight at any
//!   instant; K = 1 is a fully sequential mode, not a degenerate case.
//!
//! - **Exact Termination**: An aggregator state machine tracks the
//!   outstanding path set and signals completion exactly when it drains.
//!   Accounting violations (a stray or duplicated resolution) are fatal
//!   errors, never silent.
//!
//! - **Failure Policies**: A failed resolution either prunes its branch
//!   (default) or aborts the whole traversal, per configuration.
//!
//! - **Cancellation**: A shutdown flag or an overall deadline stops new
//!   remote calls and returns the values collected so far.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                 Remote Tree Store (RemoteNodeClient)             │
//! └─────────────────────────────┬───────────────────────────────────┘
//!                               │ resolve(path)
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  Dispatcher ── semaphore-bounded worker pool (K concurrent)      │
//! │       │                                                          │
//! │       ▼                                                          │
//! │  result channel ──► Aggregator (single consumer)                 │
//! │                        ├── Children ──► re-submit                │
//! │                        ├── Leaf ──────► accumulate               │
//! │                        └── outstanding == 0 ──► Done             │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use znode_harvester::{NodePath, StaticTreeClient, TraverseConfig, TraverseCoordinator};
//!
//! # async fn example() -> znode_harvester::Result<()> {
//! let mut client = StaticTreeClient::new();
//! client.add_leaf("/config/db/host", "localhost");
//! client.add_leaf("/config/db/port", "5432");
//!
//! let coordinator = TraverseCoordinator::new(Arc::new(client), TraverseConfig::default());
//! let report = coordinator.run(vec![NodePath::root()]).await?;
//! assert_eq!(report.leaves_collected, 2);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod progress;
pub mod store;
pub mod traverse;

pub use config::{CliArgs, FailurePolicy, TraverseConfig};
pub use error::{ClientError, HarvestError, ProtocolViolation, Result};
pub use store::{
    NodePath, NodeResolution, NodeValue, RemoteNodeClient, ResolvedNode, StaticTreeClient,
};
pub use traverse::{TraverseCoordinator, TraverseOutcome, TraverseReport};
