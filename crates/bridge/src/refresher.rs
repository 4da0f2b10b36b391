use std::time::Duration;

use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tracing::{debug, error};

use crate::Bridge;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Background poller keeping the cue cache fresh. Aborted on drop.
pub struct RefresherHandle {
    task: JoinHandle<()>,
}

impl RefresherHandle {
    pub fn shutdown(self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for RefresherHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Polls the connected workspace every `interval`.
///
/// An overrunning sample delays the next tick instead of queueing catch-up
/// ticks. A panicking sample is logged and the loop carries on.
pub fn spawn_refresher(bridge: Bridge, interval: Duration) -> RefresherHandle {
    let interval = interval.max(MIN_POLL_INTERVAL);
    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        debug!(interval_ms = interval.as_millis() as u64, "cue refresher started");
        loop {
            ticker.tick().await;
            if !bridge.is_connected() {
                continue;
            }
            let sampler = bridge.clone();
            if let Err(err) = tokio::spawn(async move { sampler.refresh_now().await }).await {
                error!(error = %err, "cue refresh iteration failed");
            }
        }
    });
    RefresherHandle { task }
}
