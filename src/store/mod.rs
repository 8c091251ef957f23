//! Remote tree store abstraction
//!
//! The traversal engine never talks to a concrete store directly; it
//! drives a [`RemoteNodeClient`], which resolves a single path into
//! either a list of children or a leaf payload. Production deployments
//! plug in a networked client; tests and the CLI harness use the
//! in-memory [`StaticTreeClient`].

pub mod memory;
pub mod types;

pub use memory::StaticTreeClient;
pub use types::{NodePath, NodeResolution, NodeTask, NodeValue, ResolvedNode};

use crate::error::ClientResult;
use async_trait::async_trait;

/// Client for a remote hierarchical key/value store
///
/// Implementations must be safe for concurrent use by up to the
/// configured pool size of simultaneous callers (or pool connections
/// internally). Each call resolves exactly one path and may block on
/// network I/O; the dispatcher wraps every call in the per-call timeout,
/// so implementations do not need their own deadline handling.
#[async_trait]
pub trait RemoteNodeClient: Send + Sync {
    /// Resolve one path into children or a leaf payload
    async fn resolve(&self, path: &NodePath) -> ClientResult<NodeResolution>;
}
