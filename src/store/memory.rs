//! In-memory tree store
//!
//! [`StaticTreeClient`] serves a fixed tree from memory. It backs the
//! test suite and the CLI harness, and carries the instrumentation the
//! tests rely on: per-path call counts, a concurrent-call gauge, and
//! per-path latency and failure injection.
//!
//! Fixture trees load from JSON: objects are internal nodes, strings are
//! leaf payloads. Other scalars are stored as their JSON text.

use crate::error::{ClientError, ClientResult, ConfigError, ConfigResult};
use crate::store::{NodePath, NodeResolution, NodeValue, RemoteNodeClient};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// One node of the fixture tree
#[derive(Debug, Clone)]
enum TreeEntry {
    /// Internal node with ordered children
    Branch(Vec<NodePath>),

    /// Terminal node with a payload
    Leaf(NodeValue),
}

/// In-memory [`RemoteNodeClient`] with test instrumentation
pub struct StaticTreeClient {
    /// The fixture tree, fixed once the client is shared
    nodes: HashMap<NodePath, TreeEntry>,

    /// Latency applied to every call
    base_latency: Option<Duration>,

    /// Cap for deterministic per-path latency jitter
    hashed_latency_cap: Option<Duration>,

    /// Per-path latency overrides (e.g. to provoke the per-call timeout)
    path_latency: HashMap<NodePath, Duration>,

    /// Paths that fail instead of resolving
    failures: HashMap<NodePath, ClientError>,

    /// How often each path has been resolved
    calls: Mutex<HashMap<NodePath, u64>>,

    /// Concurrent calls right now
    in_flight: AtomicUsize,

    /// High-water mark of concurrent calls
    peak_in_flight: AtomicUsize,
}

impl StaticTreeClient {
    /// Create an empty client; populate it with [`add_leaf`](Self::add_leaf)
    /// and [`add_branch`](Self::add_branch) before sharing it
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            base_latency: None,
            hashed_latency_cap: None,
            path_latency: HashMap::new(),
            failures: HashMap::new(),
            calls: Mutex::new(HashMap::new()),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    /// Parse a fixture tree from a JSON string
    pub fn from_json_str(json: &str) -> serde_json::Result<Self> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        let mut client = Self::new();
        client.insert_json(NodePath::root(), &value);
        Ok(client)
    }

    /// Load a fixture tree from a JSON file
    pub fn from_json_file(path: &Path) -> ConfigResult<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| ConfigError::InvalidFixture {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_json_str(&json).map_err(|e| ConfigError::InvalidFixture {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Insert a leaf, creating and linking any missing ancestors
    pub fn add_leaf(&mut self, path: impl Into<NodePath>, value: impl Into<NodeValue>) {
        let path = path.into();
        self.link_to_parent(&path);
        self.nodes.insert(path, TreeEntry::Leaf(value.into()));
    }

    /// Insert an internal node (possibly childless), creating and linking
    /// any missing ancestors
    pub fn add_branch(&mut self, path: impl Into<NodePath>) {
        let path = path.into();
        self.link_to_parent(&path);
        self.nodes
            .entry(path)
            .or_insert_with(|| TreeEntry::Branch(Vec::new()));
    }

    /// Apply a fixed latency to every call
    pub fn set_base_latency(&mut self, latency: Duration) {
        self.base_latency = Some(latency);
    }

    /// Add deterministic per-path latency jitter in `[0, cap)`, derived
    /// from the path hash so runs are reproducible
    pub fn set_hashed_latency_cap(&mut self, cap: Duration) {
        self.hashed_latency_cap = Some(cap);
    }

    /// Override the latency of a single path
    pub fn set_path_latency(&mut self, path: impl Into<NodePath>, latency: Duration) {
        self.path_latency.insert(path.into(), latency);
    }

    /// Make a path fail with the given error instead of resolving
    pub fn fail_path(&mut self, path: impl Into<NodePath>, error: ClientError) {
        self.failures.insert(path.into(), error);
    }

    /// How often a path has been resolved
    pub fn call_count(&self, path: &NodePath) -> u64 {
        self.calls.lock().get(path).copied().unwrap_or(0)
    }

    /// Total resolutions served
    pub fn total_calls(&self) -> u64 {
        self.calls.lock().values().sum()
    }

    /// Paths that were resolved more than once
    pub fn duplicate_calls(&self) -> Vec<NodePath> {
        self.calls
            .lock()
            .iter()
            .filter(|(_, &count)| count > 1)
            .map(|(path, _)| path.clone())
            .collect()
    }

    /// High-water mark of concurrent `resolve` calls
    pub fn peak_concurrency(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    /// Number of nodes in the fixture tree
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn insert_json(&mut self, path: NodePath, value: &serde_json::Value) {
        match value {
            serde_json::Value::Object(map) => {
                self.add_branch(path.clone());
                for (name, child) in map {
                    self.insert_json(path.child(name), child);
                }
            }
            serde_json::Value::String(s) => self.add_leaf(path, s.as_str()),
            other => self.add_leaf(path, other.to_string().into_bytes()),
        }
    }

    /// Ensure every ancestor of `path` exists and lists it as a child
    fn link_to_parent(&mut self, path: &NodePath) {
        let Some(parent) = path.parent() else {
            return;
        };
        if !self.nodes.contains_key(&parent) {
            self.nodes
                .insert(parent.clone(), TreeEntry::Branch(Vec::new()));
            self.link_to_parent(&parent);
        }
        if let Some(TreeEntry::Branch(children)) = self.nodes.get_mut(&parent) {
            if !children.contains(path) {
                children.push(path.clone());
            }
        }
    }

    fn latency_for(&self, path: &NodePath) -> Option<Duration> {
        if let Some(latency) = self.path_latency.get(path) {
            return Some(*latency);
        }
        let base = self.base_latency.unwrap_or(Duration::ZERO);
        match self.hashed_latency_cap {
            Some(cap) => {
                let mut hasher = DefaultHasher::new();
                path.hash(&mut hasher);
                let cap_millis = (cap.as_millis() as u64).max(1);
                Some(base + Duration::from_millis(hasher.finish() % cap_millis))
            }
            None if base > Duration::ZERO => Some(base),
            None => None,
        }
    }
}

impl Default for StaticTreeClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteNodeClient for StaticTreeClient {
    async fn resolve(&self, path: &NodePath) -> ClientResult<NodeResolution> {
        let _gauge = FlightGauge::enter(&self.in_flight, &self.peak_in_flight);

        *self.calls.lock().entry(path.clone()).or_insert(0) += 1;

        if let Some(delay) = self.latency_for(path) {
            tokio::time::sleep(delay).await;
        }

        if let Some(error) = self.failures.get(path) {
            return Err(error.clone());
        }

        match self.nodes.get(path) {
            Some(TreeEntry::Branch(children)) => Ok(NodeResolution::Children(children.clone())),
            Some(TreeEntry::Leaf(value)) => Ok(NodeResolution::Leaf(value.clone())),
            None => Err(ClientError::NotFound { path: path.clone() }),
        }
    }
}

/// RAII gauge tracking concurrent calls and their high-water mark
struct FlightGauge<'a> {
    in_flight: &'a AtomicUsize,
}

impl<'a> FlightGauge<'a> {
    fn enter(in_flight: &'a AtomicUsize, peak: &AtomicUsize) -> Self {
        let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        peak.fetch_max(now, Ordering::SeqCst);
        Self { in_flight }
    }
}

impl Drop for FlightGauge<'_> {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}
