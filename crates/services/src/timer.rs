use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Background task that emits one tick per period.
///
/// The first tick arrives one full period after `spawn`. Cancelling or
/// dropping the driver stops the task and discards ticks that were already
/// queued, so a finished session never sees a late tick.
#[derive(Debug)]
pub struct TimerDriver {
    ticks: mpsc::Receiver<()>,
    task: JoinHandle<()>,
}

impl TimerDriver {
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn spawn(period: Duration) -> Self {
        let (tx, ticks) = mpsc::channel(4);
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if tx.send(()).await.is_err() {
                    break;
                }
            }
        });
        Self { ticks, task }
    }

    /// Wait for the next tick. Returns `None` once the driver is cancelled.
    pub async fn next_tick(&mut self) -> Option<()> {
        self.ticks.recv().await
    }

    pub fn cancel(&mut self) {
        self.task.abort();
        self.ticks.close();
        while self.ticks.try_recv().is_ok() {}
    }

    #[cfg(test)]
    fn is_cancelled(&self) -> bool {
        self.task.is_finished() || self.ticks.is_closed()
    }
}

impl Drop for TimerDriver {
    fn drop(&mut self) {
        self.task.abort();
    }
}
