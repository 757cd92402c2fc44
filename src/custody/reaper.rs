//! Periodic eviction of transactions nobody signed.

use super::{
    clock::{self, MAX_TIMER},
    store::PendingStore,
};
use std::{
    panic::{self, AssertUnwindSafe},
    sync::Arc,
    time::Duration,
};
use tokio::{
    sync::oneshot,
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};

/// Reaper timing.
#[derive(Clone, Copy, Debug)]
pub struct ReaperConfig {
    /// How often the store is swept.
    pub sweep_interval: Duration,
    /// Age after which an unclaimed transaction is evicted.
    pub max_age: Duration,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(60),
            max_age: Duration::from_secs(600),
        }
    }
}

/// Handle to a running reaper task.
pub struct Reaper {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl Reaper {
    /// Spawns the reaper on the current Tokio runtime.
    pub fn spawn(store: Arc<PendingStore>, config: ReaperConfig) -> Self {
        let (shutdown, mut stopped) = oneshot::channel();
        let task = tokio::spawn(async move {
            let period = config
                .sweep_interval
                .clamp(Duration::from_millis(1), MAX_TIMER);
            let mut interval = time::interval_at(clock::deadline(period), period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = &mut stopped => break,
                    _ = interval.tick() => {
                        sweep(&store, config.max_age);
                    }
                }
            }
            tracing::debug!("reaper stopped");
        });

        Self { shutdown, task }
    }

    /// Stops the reaper and waits for the task to exit.
    pub async fn stop(self) {
        let _ = self.shutdown.send(());
        if let Err(err) = self.task.await {
            tracing::warn!(?err, "reaper task failed");
        }
    }
}

/// Runs one sweep, returning the number of evicted entries.
///
/// A panicking sweep is logged and reported as `None`; it never takes the
/// periodic task down with it.
pub fn sweep(store: &PendingStore, max_age: Duration) -> Option<usize> {
    match panic::catch_unwind(AssertUnwindSafe(|| store.evict_older_than(max_age))) {
        Ok(evicted) => {
            if evicted > 0 {
                tracing::info!(evicted, pending = store.len(), "evicted expired transactions");
            }
            Some(evicted)
        }
        Err(_) => {
            tracing::warn!("transaction sweep panicked");
            None
        }
    }
}
