//! Core data types for the remote tree store
//!
//! A traversal moves three kinds of data around:
//! - `NodePath`: opaque identifier of a node in the remote tree
//! - `NodeResolution`: what the store said a node is (children or data)
//! - `ResolvedNode`: one completed resolution flowing back to the aggregator

use crate::error::ClientResult;
use std::fmt;
use std::time::Duration;

/// Path of a node in the remote tree
///
/// Stored in canonical form: absolute, no trailing slash (except the
/// root itself, which is `/`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodePath(String);

impl NodePath {
    /// The tree root, `/`
    pub fn root() -> Self {
        Self("/".to_string())
    }

    /// Create a path, normalizing trailing slashes
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        let trimmed = path.trim_end_matches('/');
        if trimmed.is_empty() {
            Self::root()
        } else {
            Self(trimmed.to_string())
        }
    }

    /// The path as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is the tree root
    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    /// Join a child name onto this path
    pub fn child(&self, name: &str) -> NodePath {
        if self.is_root() {
            NodePath(format!("/{}", name))
        } else {
            NodePath(format!("{}/{}", self.0, name))
        }
    }

    /// Parent path, or `None` for the root
    pub fn parent(&self) -> Option<NodePath> {
        if self.is_root() {
            return None;
        }
        match self.0.rfind('/') {
            Some(0) => Some(NodePath::root()),
            Some(idx) => Some(NodePath(self.0[..idx].to_string())),
            None => None,
        }
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodePath {
    fn from(s: &str) -> Self {
        NodePath::new(s)
    }
}

impl From<String> for NodePath {
    fn from(s: String) -> Self {
        NodePath::new(s)
    }
}

impl AsRef<str> for NodePath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Opaque leaf payload collected from a terminal node
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeValue(Vec<u8>);

impl NodeValue {
    /// Wrap raw bytes
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// The payload bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Payload length in bytes
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the payload is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Lossy UTF-8 rendering for display and export
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.0).into_owned()
    }
}

impl From<&str> for NodeValue {
    fn from(s: &str) -> Self {
        Self(s.as_bytes().to_vec())
    }
}

impl From<Vec<u8>> for NodeValue {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

/// What the store reported a node to be
///
/// A failed call is not a variant here: it travels as the `Err` arm of
/// the resolution outcome, so the type system keeps "the store answered"
/// and "the call failed" apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeResolution {
    /// Internal node: each child must itself be resolved
    Children(Vec<NodePath>),

    /// Terminal node with an associated payload
    Leaf(NodeValue),
}

/// A unit of traversal work: one path awaiting resolution
#[derive(Debug, Clone)]
pub struct NodeTask {
    /// Path to resolve
    pub path: NodePath,

    /// Depth from the seed (0 = initial path)
    pub depth: u32,
}

impl NodeTask {
    /// Create a task at an explicit depth
    pub fn new(path: NodePath, depth: u32) -> Self {
        Self { path, depth }
    }

    /// Create a seed task
    pub fn seed(path: NodePath) -> Self {
        Self { path, depth: 0 }
    }
}

/// One completed resolution, delivered from a worker to the aggregator
#[derive(Debug)]
pub struct ResolvedNode {
    /// The task that was resolved
    pub task: NodeTask,

    /// Store answer, or the per-call failure
    pub outcome: ClientResult<NodeResolution>,

    /// Wall-clock time the remote call took
    pub elapsed: Duration,
}

impl ResolvedNode {
    /// Bundle a task with its outcome
    pub fn new(task: NodeTask, outcome: ClientResult<NodeResolution>, elapsed: Duration) -> Self {
        Self {
            task,
            outcome,
            elapsed,
        }
    }
}
