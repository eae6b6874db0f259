//! services/reader/src/flow/background.rs
//!
//! Owns the fire-and-forget calls the flow starts (reading history). The
//! tasks outlive the view that spawned them and are drained before the
//! process exits.

use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, warn};

#[derive(Clone, Default)]
pub struct BackgroundTasks {
    set: Arc<Mutex<JoinSet<()>>>,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut set = self.set.lock();
        // Reap finished tasks so a long session does not accumulate handles.
        while set.try_join_next().is_some() {}
        set.spawn(task);
    }

    pub fn pending(&self) -> usize {
        self.set.lock().len()
    }

    /// Waits up to `limit` for every pending task, then aborts the rest.
    /// Returns how many tasks were aborted.
    pub async fn drain(&self, limit: Duration) -> usize {
        let mut set = std::mem::replace(&mut *self.set.lock(), JoinSet::new());
        if set.is_empty() {
            return 0;
        }
        debug!(pending = set.len(), "Draining background tasks");
        let finished = tokio::time::timeout(limit, async {
            while set.join_next().await.is_some() {}
        })
        .await;
        if finished.is_ok() {
            return 0;
        }
        let aborted = set.len();
        warn!("Aborting {} background task(s) still running after {:?}", aborted, limit);
        set.shutdown().await;
        aborted
    }
}
