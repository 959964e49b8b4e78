//! Janitor Task
//!
//! Background task that periodically sweeps the expiry index and removes
//! expired cache entries, independent of read traffic.

use std::sync::PoisonError;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::cache::{current_timestamp_ms, SharedState};
use crate::config::normalize_clean_interval;
use crate::error::{CacheError, Result};

/// Handle to a running janitor.
///
/// Dropping the handle without calling [`Janitor::shutdown`] also stops the task
/// at its next wake-up, but nothing waits for it.
#[derive(Debug)]
pub struct Janitor {
    stop: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl Janitor {
    /// Signals the task to stop and waits until it has exited.
    pub async fn shutdown(self) -> Result<()> {
        // The task may already be gone; the join below still reports how it ended
        let _ = self.stop.send(());
        self.handle
            .await
            .map_err(|e| CacheError::Internal(format!("janitor task failed: {e}")))
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Spawns the janitor on the current tokio runtime.
///
/// The first sweep runs one `interval` after spawning; a zero `interval` uses the
/// default. Each sweep takes the table's write lock only for the duration of the
/// removal.
///
/// # Panics
/// Panics if called outside a tokio runtime.
pub fn spawn_janitor(state: SharedState, interval: Duration) -> Janitor {
    let interval = normalize_clean_interval(interval);
    let (stop, mut stop_rx) = oneshot::channel();

    let handle = tokio::spawn(async move {
        info!(interval_ms = interval.as_millis() as u64, "Starting janitor");

        let mut ticker = interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = sweep(&state);
                    if removed > 0 {
                        info!("Janitor sweep: removed {} expired entries", removed);
                    } else {
                        debug!("Janitor sweep: no expired entries found");
                    }
                }
                // Fires on an explicit stop or when the handle is dropped
                _ = &mut stop_rx => break,
            }
        }

        info!("Janitor stopped");
    });

    Janitor { stop, handle }
}

fn sweep(state: &SharedState) -> usize {
    let mut guard = state.write().unwrap_or_else(PoisonError::into_inner);
    guard
        .as_mut()
        .map_or(0, |live| live.table.sweep_expired(current_timestamp_ms()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheTable, Live};
    use crate::codec::Encoding;
    use std::sync::{Arc, RwLock};

    fn shared_with(key: &str, ttl: Duration) -> SharedState {
        let mut table = CacheTable::new();
        table
            .insert(key, b"value", Encoding::Text, ttl, current_timestamp_ms())
            .unwrap();
        Arc::new(RwLock::new(Some(Live::new(table, None))))
    }

    fn table_len(state: &SharedState) -> usize {
        state.read().unwrap().as_ref().unwrap().table.len()
    }

    #[tokio::test]
    async fn test_janitor_removes_expired_entries() {
        let state = shared_with("expire_soon", Duration::from_millis(50));
        let janitor = spawn_janitor(state.clone(), Duration::from_millis(20));

        tokio::time::sleep(Duration::from_millis(250)).await;

        // No reads happened; only the sweep could have removed it
        assert_eq!(table_len(&state), 0, "Expired entry should have been swept");
        assert_eq!(state.read().unwrap().as_ref().unwrap().table.stats().swept, 1);

        janitor.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_janitor_preserves_valid_entries() {
        let state = shared_with("long_lived", Duration::from_secs(3600));
        let janitor = spawn_janitor(state.clone(), Duration::from_millis(20));

        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(table_len(&state), 1, "Valid entry should not be removed");
        janitor.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_janitor_zero_interval_uses_default() {
        let state = shared_with("expire_soon", Duration::from_millis(20));
        let janitor = spawn_janitor(state.clone(), Duration::ZERO);

        tokio::time::sleep(Duration::from_millis(1_300)).await;

        assert!(!janitor.is_finished(), "Janitor must survive a zero interval");
        assert_eq!(table_len(&state), 0);
        janitor.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_janitor_shutdown_waits_for_exit() {
        let state: SharedState = Arc::new(RwLock::new(None));
        let janitor = spawn_janitor(state, Duration::from_secs(60));

        assert!(!janitor.is_finished());
        janitor.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_janitor_tolerates_torn_down_state() {
        let state: SharedState = Arc::new(RwLock::new(None));
        let janitor = spawn_janitor(state.clone(), Duration::from_millis(10));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!janitor.is_finished());
        janitor.shutdown().await.unwrap();
    }
}
