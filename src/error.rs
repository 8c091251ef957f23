//! Error types for znode-harvester
//!
//! This module defines the error hierarchy for the traversal engine:
//! - Per-call remote store errors (network, timeout, malformed responses)
//! - Protocol invariant violations inside the aggregator
//! - Configuration and CLI errors
//! - Worker/channel errors
//!
//! Design philosophy:
//! - Use thiserror for structured error types in library code
//! - Per-call failures are recoverable and routed through the failure
//!   policy; protocol violations are fatal and never swallowed
//! - Preserve error chains for debugging

use crate::store::NodePath;
use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for the znode-harvester application
#[derive(Error, Debug)]
pub enum HarvestError {
    /// Remote store client errors
    #[error("Client error: {0}")]
    Client(#[from] ClientError),

    /// Traversal aborted by the abort failure policy
    #[error("Traversal aborted at '{path}': {source}")]
    Aborted {
        path: NodePath,
        source: ClientError,
    },

    /// Aggregator invariant violation
    #[error("Protocol violation: {0}")]
    Protocol(#[from] ProtocolViolation),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Worker/channel errors
    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),
}

/// Errors from a single remote store call
///
/// Every variant is a per-path, transient condition: the configured
/// failure policy decides whether it prunes the branch or aborts the
/// whole traversal.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// The remote call did not complete within the per-call timeout
    #[error("Timed out resolving '{path}'")]
    Timeout { path: NodePath },

    /// Connection-level failure talking to the store
    #[error("Connection failed resolving '{path}': {reason}")]
    Connection { path: NodePath, reason: String },

    /// The store returned a response the client could not interpret
    #[error("Malformed response for '{path}': {reason}")]
    Malformed { path: NodePath, reason: String },

    /// The node does not exist (deleted between listing and resolution)
    #[error("Node not found: '{path}'")]
    NotFound { path: NodePath },

    /// The call was abandoned because the traversal was cancelled
    #[error("Resolution of '{path}' cancelled")]
    Cancelled { path: NodePath },
}

impl ClientError {
    /// Check whether this failure was a per-call timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, ClientError::Timeout { .. })
    }

    /// The path whose resolution produced this error
    pub fn path(&self) -> &NodePath {
        match self {
            ClientError::Timeout { path }
            | ClientError::Connection { path, .. }
            | ClientError::Malformed { path, .. }
            | ClientError::NotFound { path }
            | ClientError::Cancelled { path } => path,
        }
    }
}

/// Aggregator invariant violations
///
/// These indicate a concurrency bug (or a cyclic tree) and are always
/// fatal: the traversal surfaces them immediately instead of risking a
/// hang or a duplicated result set.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolViolation {
    /// A resolution arrived for a path that is not outstanding
    #[error("Resolution received for '{path}' which is not outstanding")]
    UnexpectedResolution { path: NodePath },

    /// A path was registered for dispatch while already outstanding
    #[error("Duplicate dispatch of '{path}' (cyclic tree or duplicated child)")]
    DuplicateDispatch { path: NodePath },

    /// The Done transition fired more than once
    #[error("Traversal completion signaled twice")]
    DoubleCompletion,
}

/// Configuration and CLI errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Invalid worker pool size
    #[error("Invalid pool size {count}: must be between 1 and {max}")]
    InvalidPoolSize { count: usize, max: usize },

    /// Invalid result queue size
    #[error("Invalid queue size {size}: must be at least {min}")]
    InvalidQueueSize { size: usize, min: usize },

    /// Invalid timeout value
    #[error("Invalid {name} of {secs}s: must be at least 1s")]
    InvalidTimeout { name: &'static str, secs: u64 },

    /// Invalid exclude pattern
    #[error("Invalid exclude pattern '{pattern}': {reason}")]
    InvalidExcludePattern { pattern: String, reason: String },

    /// Fixture file missing or unreadable
    #[error("Invalid fixture '{path}': {reason}")]
    InvalidFixture { path: PathBuf, reason: String },

    /// Initial path is not absolute
    #[error("Invalid root path '{path}': must start with '/'")]
    InvalidRootPath { path: String },
}

/// Worker/channel errors
#[derive(Error, Debug)]
pub enum WorkerError {
    /// Result channel closed while resolutions were still outstanding
    #[error("Result channel closed unexpectedly")]
    ResultChannelClosed,
}

/// Result type alias for HarvestError
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for ClientError
pub type ClientResult<T> = std::result::Result<T, ClientError>;

/// Result type alias for ConfigError
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_error_timeout() {
        let timeout = ClientError::Timeout {
            path: NodePath::from("/a"),
        };
        assert!(timeout.is_timeout());
        assert_eq!(timeout.path().as_str(), "/a");

        let not_found = ClientError::NotFound {
            path: NodePath::from("/missing"),
        };
        assert!(!not_found.is_timeout());
    }

    #[test]
    fn test_error_conversion() {
        let client_err = ClientError::NotFound {
            path: NodePath::from("/missing"),
        };
        let harvest_err: HarvestError = client_err.into();
        assert!(matches!(harvest_err, HarvestError::Client(_)));

        let violation = ProtocolViolation::DoubleCompletion;
        let harvest_err: HarvestError = violation.into();
        assert!(matches!(harvest_err, HarvestError::Protocol(_)));
    }
}
