//! Traversal aggregator - the core state machine
//!
//! The aggregator consumes resolutions, feeds discovered children back
//! to the dispatcher, accumulates leaf values, and decides when the
//! traversal is complete. It is the only mutable shared state in the
//! system, so every transition must be serialized: the aggregator is
//! owned by the coordinator's single consumer loop and never touched
//! from worker tasks.
//!
//! Outstanding work is tracked as a set of paths rather than a bare
//! counter: the count can never go negative, and a duplicate dispatch
//! (cyclic tree, duplicated child) is detected instead of double-counted.
//!
//! Each transition is atomic with respect to completion: children are
//! registered and re-submitted before the zero-outstanding check runs,
//! so a partially applied transition can never be observed as `Done`.

use crate::config::{FailurePolicy, TraverseConfig};
use crate::error::{HarvestError, ProtocolViolation, Result};
use crate::store::{NodePath, NodeResolution, NodeTask, NodeValue, ResolvedNode};
use crate::traverse::dispatcher::Dispatcher;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Statistics collected during the traversal
#[derive(Debug, Default)]
pub struct TraverseStats {
    /// Resolutions applied
    pub nodes_resolved: AtomicU64,

    /// Leaf values collected
    pub leaves_collected: AtomicU64,

    /// Total bytes of collected leaf payloads
    pub bytes_collected: AtomicU64,

    /// Branches pruned after a failed resolution
    pub branches_pruned: AtomicU64,

    /// Children skipped by depth limit or exclude patterns
    pub skipped: AtomicU64,

    /// Paths currently outstanding
    pub outstanding: AtomicU64,
}

impl TraverseStats {
    pub fn record_resolved(&self) {
        self.nodes_resolved.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_leaf(&self, bytes: u64) {
        self.leaves_collected.fetch_add(1, Ordering::Relaxed);
        self.bytes_collected.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_prune(&self) {
        self.branches_pruned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skip(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_outstanding(&self, count: u64) {
        self.outstanding.store(count, Ordering::Relaxed);
    }
}

/// What the coordinator should do after a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// More resolutions are outstanding
    Continue,

    /// The traversal is complete
    Done,
}

/// Aggregates resolutions into the final result set
pub struct Aggregator {
    /// Paths dispatched but not yet resolved
    outstanding: HashSet<NodePath>,

    /// Collected leaf values
    values: Vec<NodeValue>,

    /// Set exactly once, when the outstanding set first drains
    done: bool,

    config: Arc<TraverseConfig>,
    stats: Arc<TraverseStats>,
}

impl Aggregator {
    /// Create an aggregator in the running state with nothing outstanding
    pub fn new(config: Arc<TraverseConfig>, stats: Arc<TraverseStats>) -> Self {
        Self {
            outstanding: HashSet::new(),
            values: Vec::new(),
            done: false,
            config,
            stats,
        }
    }

    /// Number of dispatched-but-unresolved paths
    pub fn outstanding(&self) -> usize {
        self.outstanding.len()
    }

    /// Whether the traversal has completed
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Seed the traversal with the initial path set
    ///
    /// Duplicate seeds are dropped, excluded seeds are skipped. Returns
    /// `Done` immediately when nothing survives (trivial empty traversal).
    pub fn seed(&mut self, roots: Vec<NodePath>, dispatcher: &Dispatcher) -> Result<Step> {
        let mut seen = HashSet::new();
        for root in roots {
            if !seen.insert(root.clone()) {
                debug!(path = %root, "Duplicate seed dropped");
                continue;
            }
            if self.config.is_excluded(root.as_str()) {
                self.stats.record_skip();
                continue;
            }
            self.track(root.clone())?;
            dispatcher.submit(NodeTask::seed(root));
        }

        self.stats.set_outstanding(self.outstanding.len() as u64);
        if self.outstanding.is_empty() {
            self.mark_done()?;
            return Ok(Step::Done);
        }
        Ok(Step::Continue)
    }

    /// Apply one resolution
    ///
    /// This is the five-step transition: retire the path, fan out
    /// children or accumulate the leaf or apply the failure policy, then
    /// check for completion. Runs only on the coordinator task.
    pub fn apply(&mut self, resolved: ResolvedNode, dispatcher: &Dispatcher) -> Result<Step> {
        let ResolvedNode {
            task,
            outcome,
            elapsed,
        } = resolved;

        if self.done {
            // A resolution after Done means the outstanding accounting
            // broke somewhere; surfacing it beats hiding a double count
            return Err(ProtocolViolation::UnexpectedResolution { path: task.path }.into());
        }
        if !self.outstanding.remove(&task.path) {
            return Err(ProtocolViolation::UnexpectedResolution { path: task.path }.into());
        }

        self.stats.record_resolved();
        trace!(path = %task.path, depth = task.depth, ?elapsed, "Resolution applied");

        match outcome {
            Ok(NodeResolution::Children(children)) => {
                let depth = task.depth + 1;
                for child in children {
                    if !self.admits(&child, depth) {
                        self.stats.record_skip();
                        continue;
                    }
                    self.track(child.clone())?;
                    dispatcher.submit(NodeTask::new(child, depth));
                }
            }
            Ok(NodeResolution::Leaf(value)) => {
                self.stats.record_leaf(value.len() as u64);
                self.values.push(value);
            }
            Err(cause) => match self.config.failure_policy {
                FailurePolicy::Prune => {
                    warn!(path = %task.path, error = %cause, "Branch pruned after failed resolution");
                    self.stats.record_prune();
                }
                FailurePolicy::Abort => {
                    return Err(HarvestError::Aborted {
                        path: task.path,
                        source: cause,
                    });
                }
            },
        }

        self.stats.set_outstanding(self.outstanding.len() as u64);
        if self.outstanding.is_empty() {
            self.mark_done()?;
            return Ok(Step::Done);
        }
        Ok(Step::Continue)
    }

    /// Take the accumulated values (complete set after `Done`, partial
    /// snapshot on cancellation)
    pub fn take_values(&mut self) -> Vec<NodeValue> {
        std::mem::take(&mut self.values)
    }

    /// Register a path as outstanding before it is submitted
    fn track(&mut self, path: NodePath) -> Result<()> {
        if !self.outstanding.insert(path.clone()) {
            return Err(ProtocolViolation::DuplicateDispatch { path }.into());
        }
        Ok(())
    }

    /// Whether a discovered child enters the traversal
    fn admits(&self, path: &NodePath, depth: u32) -> bool {
        if let Some(max_depth) = self.config.max_depth {
            if depth > max_depth {
                return false;
            }
        }
        !self.config.is_excluded(path.as_str())
    }

    fn mark_done(&mut self) -> Result<()> {
        if self.done {
            return Err(ProtocolViolation::DoubleCompletion.into());
        }
        self.done = true;
        Ok(())
    }
}
