//! Cancellable timer tasks: the single-shot watchdog and the periodic
//! reconnect tick.
//!
//! Both are plain spawned tasks that sleep in short slices and re-check a
//! shared cancel flag, so a disarm takes effect within one slice instead
//! of lingering for the full period. Cancellation alone is not enough: a
//! fire may already be sitting in the engine's mailbox when the handle is
//! cancelled, which is why watchdog fires carry a generation number the
//! engine compares against its current one.

use crate::constants::TIMER_POLL_MS;
use crate::messages::EngineMessage;
use futures_channel::mpsc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Handle to cancel a timer task. Dropping the handle cancels it.
#[derive(Clone)]
pub struct TimeoutHandle {
    cancelled: Arc<AtomicBool>,
}

impl TimeoutHandle {
    fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Cancel the timer, preventing it from firing.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Drop for TimeoutHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Sleep for `total` in cancellation-checked slices. Returns false if the
/// flag was set while sleeping.
async fn sleep_unless_cancelled(handle: &TimeoutHandle, total: Duration) -> bool {
    let mut remaining = total;
    let slice = Duration::from_millis(TIMER_POLL_MS);
    while !remaining.is_zero() {
        if handle.is_cancelled() {
            return false;
        }
        let step = remaining.min(slice);
        tokio::time::sleep(step).await;
        remaining -= step;
    }
    !handle.is_cancelled()
}

/// Spawn the single-shot watchdog. After `period` it sends
/// `WatchdogElapsed` carrying `generation`, unless cancelled first.
pub fn spawn_watchdog(
    tx: mpsc::Sender<EngineMessage>,
    generation: u64,
    period: Duration,
) -> TimeoutHandle {
    let handle = TimeoutHandle::new();
    let task_handle = handle.clone();

    tokio::spawn(async move {
        if !sleep_unless_cancelled(&task_handle, period).await {
            return;
        }
        if tx
            .clone()
            .try_send(EngineMessage::WatchdogElapsed { generation })
            .is_err()
        {
            warn!("watchdog fire dropped: engine mailbox unavailable");
        }
    });

    handle
}

/// Spawn the periodic reconnect timer: one `ReconnectTick` per interval
/// until cancelled.
pub fn spawn_reconnect(tx: mpsc::Sender<EngineMessage>, interval: Duration) -> TimeoutHandle {
    let handle = TimeoutHandle::new();
    let task_handle = handle.clone();

    tokio::spawn(async move {
        loop {
            if !sleep_unless_cancelled(&task_handle, interval).await {
                return;
            }
            if tx.clone().try_send(EngineMessage::ReconnectTick).is_err() {
                return;
            }
        }
    });

    handle
}
