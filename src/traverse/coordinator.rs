//! Traverse coordinator - drives a traversal from seed to completion
//!
//! The coordinator is responsible for:
//! - Setting up the result channel, dispatcher and aggregator
//! - Seeding the initial path set
//! - Running the single consumer loop that serializes every aggregator
//!   transition
//! - Cancellation and the overall deadline
//! - Progress reporting and the final report

use crate::config::TraverseConfig;
use crate::error::{ProtocolViolation, Result, WorkerError};
use crate::progress::ProgressReporter;
use crate::store::{NodePath, NodeValue, RemoteNodeClient};
use crate::traverse::aggregator::{Aggregator, Step, TraverseStats};
use crate::traverse::dispatcher::Dispatcher;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, info};

/// How often the consumer loop wakes to observe the shutdown flag and
/// the deadline when no resolutions are arriving
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Minimum time between progress display updates
const PROGRESS_INTERVAL: Duration = Duration::from_millis(100);

/// How a traversal ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraverseOutcome {
    /// Every reachable node was resolved
    Completed,

    /// The caller cancelled before completion
    Cancelled,

    /// The overall deadline expired before completion
    DeadlineExceeded,
}

/// Result of a finished traversal
///
/// `values` is the complete leaf set for a `Completed` outcome and a
/// partial snapshot otherwise.
#[derive(Debug)]
pub struct TraverseReport {
    /// Collected leaf values
    pub values: Vec<NodeValue>,

    /// Total resolutions applied
    pub nodes_resolved: u64,

    /// Leaf values collected
    pub leaves_collected: u64,

    /// Total bytes of collected leaf payloads
    pub bytes_collected: u64,

    /// Branches pruned after failed resolutions
    pub branches_pruned: u64,

    /// Children skipped by depth limit or exclude patterns
    pub skipped: u64,

    /// Time taken for the traversal
    pub duration: Duration,

    /// How the traversal ended
    pub outcome: TraverseOutcome,
}

impl TraverseReport {
    /// Whether the traversal ran to completion
    pub fn is_complete(&self) -> bool {
        self.outcome == TraverseOutcome::Completed
    }
}

/// Progress information for display
#[derive(Debug, Clone)]
pub struct TraverseProgress {
    /// Resolutions applied
    pub resolved: u64,

    /// Leaf values collected
    pub leaves: u64,

    /// Bytes of leaf payload collected
    pub bytes: u64,

    /// Branches pruned
    pub pruned: u64,

    /// Paths currently outstanding
    pub outstanding: u64,

    /// Worker pool size
    pub pool_size: usize,

    /// Elapsed time
    pub elapsed: Duration,
}

impl TraverseProgress {
    /// Resolutions per second
    pub fn nodes_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.resolved as f64 / secs
        } else {
            0.0
        }
    }

    /// Leaves per second
    pub fn leaves_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.leaves as f64 / secs
        } else {
            0.0
        }
    }
}

/// Coordinates one traversal run
pub struct TraverseCoordinator {
    client: Arc<dyn RemoteNodeClient>,
    config: Arc<TraverseConfig>,
    shutdown: Arc<AtomicBool>,
    stats: Arc<TraverseStats>,
    progress: Option<ProgressReporter>,
}

impl TraverseCoordinator {
    /// Create a coordinator for the given client and configuration
    pub fn new(client: Arc<dyn RemoteNodeClient>, config: TraverseConfig) -> Self {
        Self {
            client,
            config: Arc::new(config),
            shutdown: Arc::new(AtomicBool::new(false)),
            stats: Arc::new(TraverseStats::default()),
            progress: None,
        }
    }

    /// Attach a progress reporter, updated from the consumer loop
    pub fn with_progress(mut self, progress: ProgressReporter) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Get a clone of the shutdown flag (for signal handlers)
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Get traversal statistics
    pub fn stats(&self) -> Arc<TraverseStats> {
        Arc::clone(&self.stats)
    }

    /// Run the traversal from the given initial path set
    ///
    /// Blocks (asynchronously) until the tree is exhausted, the caller
    /// cancels, or the deadline expires. An empty initial set completes
    /// immediately with an empty result and no client calls.
    pub async fn run(self, roots: Vec<NodePath>) -> Result<TraverseReport> {
        let start_time = Instant::now();
        let started_at: DateTime<Utc> = Utc::now();
        let deadline = self.config.overall_timeout.map(|t| start_time + t);

        info!(
            workers = self.config.pool_size,
            roots = roots.len(),
            "Starting traversal"
        );
        debug!(start_time = %started_at.to_rfc3339(), "Traversal started");

        let (result_tx, mut result_rx) = mpsc::channel(self.config.queue_size);
        let dispatcher = Dispatcher::new(
            Arc::clone(&self.client),
            Arc::clone(&self.config),
            result_tx,
            Arc::clone(&self.shutdown),
        );
        let mut aggregator = Aggregator::new(Arc::clone(&self.config), Arc::clone(&self.stats));

        let mut step = aggregator.seed(roots, &dispatcher)?;
        let mut last_progress = Instant::now();
        let mut outcome = TraverseOutcome::Completed;

        while step == Step::Continue {
            if self.shutdown.load(Ordering::Relaxed) {
                outcome = TraverseOutcome::Cancelled;
                break;
            }
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    // Deadline behaves like cancellation: stop remote
                    // calls, keep what was collected
                    self.shutdown.store(true, Ordering::SeqCst);
                    outcome = TraverseOutcome::DeadlineExceeded;
                    break;
                }
            }

            match tokio::time::timeout(POLL_INTERVAL, result_rx.recv()).await {
                Ok(Some(resolved)) => match aggregator.apply(resolved, &dispatcher) {
                    Ok(next) => step = next,
                    Err(e) => {
                        // Fatal: stop issuing remote calls before
                        // surfacing the error
                        self.shutdown.store(true, Ordering::SeqCst);
                        return Err(e);
                    }
                },
                Ok(None) => return Err(WorkerError::ResultChannelClosed.into()),
                Err(_) => {
                    // Idle tick: loop around to re-check shutdown and
                    // deadline
                }
            }

            self.maybe_update_progress(&mut last_progress, start_time);
        }

        if outcome == TraverseOutcome::Completed {
            // Done means every dispatched path was consumed, so the
            // channel must be empty; anything still queued is a stray
            // delivery and a protocol violation
            if let Ok(stray) = result_rx.try_recv() {
                return Err(ProtocolViolation::UnexpectedResolution {
                    path: stray.task.path,
                }
                .into());
            }
        }

        if let Some(progress) = &self.progress {
            match outcome {
                TraverseOutcome::Completed => progress.finish("Traversal complete"),
                TraverseOutcome::Cancelled => progress.finish("Traversal cancelled"),
                TraverseOutcome::DeadlineExceeded => progress.finish("Deadline exceeded"),
            }
        }

        let duration = start_time.elapsed();
        let report = TraverseReport {
            values: aggregator.take_values(),
            nodes_resolved: self.stats.nodes_resolved.load(Ordering::Relaxed),
            leaves_collected: self.stats.leaves_collected.load(Ordering::Relaxed),
            bytes_collected: self.stats.bytes_collected.load(Ordering::Relaxed),
            branches_pruned: self.stats.branches_pruned.load(Ordering::Relaxed),
            skipped: self.stats.skipped.load(Ordering::Relaxed),
            duration,
            outcome,
        };

        match outcome {
            TraverseOutcome::Completed => info!(
                nodes = report.nodes_resolved,
                leaves = report.leaves_collected,
                bytes = report.bytes_collected,
                pruned = report.branches_pruned,
                duration_ms = duration.as_millis() as u64,
                "Traversal completed"
            ),
            TraverseOutcome::Cancelled => info!(
                nodes = report.nodes_resolved,
                leaves = report.leaves_collected,
                "Traversal cancelled"
            ),
            TraverseOutcome::DeadlineExceeded => info!(
                nodes = report.nodes_resolved,
                leaves = report.leaves_collected,
                "Traversal deadline exceeded"
            ),
        }

        Ok(report)
    }

    fn maybe_update_progress(&self, last_update: &mut Instant, start_time: Instant) {
        let Some(progress) = &self.progress else {
            return;
        };
        if last_update.elapsed() < PROGRESS_INTERVAL {
            return;
        }
        *last_update = Instant::now();

        progress.update(&TraverseProgress {
            resolved: self.stats.nodes_resolved.load(Ordering::Relaxed),
            leaves: self.stats.leaves_collected.load(Ordering::Relaxed),
            bytes: self.stats.bytes_collected.load(Ordering::Relaxed),
            pruned: self.stats.branches_pruned.load(Ordering::Relaxed),
            outstanding: self.stats.outstanding.load(Ordering::Relaxed),
            pool_size: self.config.pool_size,
            elapsed: start_time.elapsed(),
        });
    }
}
