//! Resolution dispatcher
//!
//! The dispatcher turns submitted tasks into remote calls on a bounded
//! worker pool. `submit` never blocks: each task is spawned immediately
//! and parks on a semaphore permit, so at most `pool_size` resolutions
//! are in flight while excess submissions queue behind the permits.
//!
//! Every submitted task produces exactly one `ResolvedNode` on the
//! result channel: a timeout or client error is delivered as an `Err`
//! outcome, never dropped. A dropped outcome would leave its path
//! outstanding forever and hang the traversal.

use crate::config::TraverseConfig;
use crate::error::ClientError;
use crate::store::{NodeTask, RemoteNodeClient, ResolvedNode};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Semaphore};
use tracing::trace;

/// Counters for dispatched work
#[derive(Debug, Default)]
pub struct DispatchStats {
    /// Tasks submitted
    pub submitted: AtomicU64,

    /// Resolutions delivered (successful or failed)
    pub delivered: AtomicU64,

    /// Resolutions that failed at the client
    pub failures: AtomicU64,

    /// Resolutions that hit the per-call timeout
    pub timeouts: AtomicU64,
}

impl DispatchStats {
    /// Submitted tasks not yet delivered
    pub fn pending(&self) -> u64 {
        self.submitted
            .load(Ordering::Relaxed)
            .saturating_sub(self.delivered.load(Ordering::Relaxed))
    }
}

/// Submits resolution tasks onto the bounded worker pool
pub struct Dispatcher {
    client: Arc<dyn RemoteNodeClient>,
    permits: Arc<Semaphore>,
    results: mpsc::Sender<ResolvedNode>,
    config: Arc<TraverseConfig>,
    shutdown: Arc<AtomicBool>,
    stats: Arc<DispatchStats>,
}

impl Dispatcher {
    /// Create a dispatcher feeding `results` with at most
    /// `config.pool_size` concurrent resolutions
    pub fn new(
        client: Arc<dyn RemoteNodeClient>,
        config: Arc<TraverseConfig>,
        results: mpsc::Sender<ResolvedNode>,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        Self {
            client,
            permits: Arc::new(Semaphore::new(config.pool_size)),
            results,
            config,
            shutdown,
            stats: Arc::new(DispatchStats::default()),
        }
    }

    /// Get dispatch statistics
    pub fn stats(&self) -> Arc<DispatchStats> {
        Arc::clone(&self.stats)
    }

    /// Submit a task for resolution; returns immediately
    pub fn submit(&self, task: NodeTask) {
        self.stats.submitted.fetch_add(1, Ordering::Relaxed);

        let client = Arc::clone(&self.client);
        let permits = Arc::clone(&self.permits);
        let results = self.results.clone();
        let config = Arc::clone(&self.config);
        let shutdown = Arc::clone(&self.shutdown);
        let stats = Arc::clone(&self.stats);

        tokio::spawn(async move {
            resolve_task(client, permits, results, config, shutdown, stats, task).await;
        });
    }
}

/// Resolve one task and deliver its outcome
async fn resolve_task(
    client: Arc<dyn RemoteNodeClient>,
    permits: Arc<Semaphore>,
    results: mpsc::Sender<ResolvedNode>,
    config: Arc<TraverseConfig>,
    shutdown: Arc<AtomicBool>,
    stats: Arc<DispatchStats>,
    task: NodeTask,
) {
    let started = Instant::now();

    // Permit acquisition is the concurrency bound; the semaphore is only
    // closed during teardown, which counts as cancellation
    let permit = permits.acquire_owned().await;

    let outcome = if permit.is_err() || shutdown.load(Ordering::Relaxed) {
        Err(ClientError::Cancelled {
            path: task.path.clone(),
        })
    } else {
        match tokio::time::timeout(config.per_call_timeout, client.resolve(&task.path)).await {
            Ok(Ok(resolution)) => Ok(resolution),
            Ok(Err(error)) => Err(error),
            Err(_) => Err(ClientError::Timeout {
                path: task.path.clone(),
            }),
        }
    };

    stats.delivered.fetch_add(1, Ordering::Relaxed);
    if let Err(error) = &outcome {
        stats.failures.fetch_add(1, Ordering::Relaxed);
        if error.is_timeout() {
            stats.timeouts.fetch_add(1, Ordering::Relaxed);
        }
    }

    let resolved = ResolvedNode::new(task, outcome, started.elapsed());
    if results.send(resolved).await.is_err() {
        // Receiver gone: the traversal was cancelled or aborted and the
        // coordinator no longer consumes outcomes
        trace!("Result channel closed, outcome discarded");
    }
}
