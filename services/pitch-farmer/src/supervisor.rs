//! One task per account; failures stay inside their task
//!
//! The supervisor owns the `JoinSet` of account tasks. A task that returns an
//! error or panics is logged with its account label and counted; the others
//! keep running.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::task::{AbortHandle, JoinError, JoinSet};
use tracing::{error, info};

use crate::metrics;

/// How the account tasks ended.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub stopped: usize,
    pub failed: usize,
    pub panicked: usize,
}

type Outcome = (String, Result<pitch_farm::Result<()>, JoinError>);

/// Aborts every account task spawned so far.
#[derive(Clone, Default)]
pub struct AbortAll(Arc<Mutex<Vec<AbortHandle>>>);

impl AbortAll {
    pub fn abort(&self) {
        let handles = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        for handle in handles.iter() {
            handle.abort();
        }
    }

    fn push(&self, handle: AbortHandle) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handle);
    }
}

#[derive(Default)]
pub struct Supervisor {
    tasks: JoinSet<Outcome>,
    running: Arc<AtomicUsize>,
    aborts: AbortAll,
}

impl Supervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared count of tasks still running, for the health endpoint.
    pub fn running(&self) -> Arc<AtomicUsize> {
        self.running.clone()
    }

    /// Handle that aborts the account tasks themselves, not just their watchers.
    pub fn abort_handle(&self) -> AbortAll {
        self.aborts.clone()
    }

    pub fn spawn<F>(&mut self, account: String, task: F)
    where
        F: Future<Output = pitch_farm::Result<()>> + Send + 'static,
    {
        // inner task so a panic surfaces as a JoinError labelled with its account
        let inner = tokio::spawn(task);
        self.aborts.push(inner.abort_handle());
        self.tasks.spawn(async move { (account, inner.await) });
        let running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        metrics::set_accounts_running(running);
    }

    /// Wait for every account task to end.
    pub async fn wait_all(mut self) -> Summary {
        let mut summary = Summary::default();
        while let Some(joined) = self.tasks.join_next().await {
            let running = self.running.fetch_sub(1, Ordering::SeqCst) - 1;
            metrics::set_accounts_running(running);
            let Ok((account, outcome)) = joined else {
                summary.stopped += 1;
                continue;
            };

            match outcome {
                Ok(Ok(())) => {
                    summary.stopped += 1;
                    info!(account = %account, "account task finished");
                }
                Ok(Err(e)) => {
                    summary.failed += 1;
                    error!(account = %account, error = %e, kind = e.kind(), "account task failed");
                }
                Err(e) if e.is_panic() => {
                    summary.panicked += 1;
                    error!(account = %account, "account task panicked");
                }
                Err(e) => {
                    summary.stopped += 1;
                    info!(account = %account, error = %e, "account task cancelled");
                }
            }
        }
        summary
    }
}
