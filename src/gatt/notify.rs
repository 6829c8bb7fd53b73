use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Notification schedule parameters.
#[derive(Clone, Copy, Debug)]
pub struct NotifyConfig {
    /// Delay before the first tick.
    pub initial_delay: Duration,
    /// Fixed period between tick starts. A tick that overruns delays the
    /// next one rather than stacking up.
    pub period: Duration,
}

impl Default for NotifyConfig {
    #[inline]
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            period: Duration::from_secs(30),
        }
    }
}

#[derive(Debug)]
struct Task {
    ct: CancellationToken,
    handle: JoinHandle<()>,
}

/// Periodic tick driver for value notifications. All ticks run on a
/// single task, so two ticks never overlap, and [`Notifier::stop`] does
/// not return until any in-flight tick has finished.
#[derive(Debug)]
pub struct Notifier {
    cfg: NotifyConfig,
    task: Mutex<Option<Task>>,
}

impl Notifier {
    /// Creates a stopped notifier.
    #[inline]
    #[must_use]
    pub fn new(cfg: NotifyConfig) -> Self {
        Self {
            cfg,
            task: Mutex::new(None),
        }
    }

    /// Starts the schedule, invoking `tick` after the initial delay and
    /// once per period thereafter. A no-op if already running.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn start(&self, mut tick: impl FnMut() + Send + 'static) {
        let mut task = self.task.lock();
        if task.is_some() {
            return;
        }
        debug!("Starting notifications ({:?} period)", self.cfg.period);
        let ct = CancellationToken::new();
        let cancel = ct.clone();
        let (initial, period) = (self.cfg.initial_delay, self.cfg.period);
        let handle = tokio::spawn(async move {
            let mut timer = time::interval_at(time::Instant::now() + initial, period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = timer.tick() => tick(),
                }
            }
        });
        *task = Some(Task { ct, handle });
    }

    /// Returns whether the schedule is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.task.lock().is_some()
    }

    /// Cancels the schedule without waiting, returning the task handle so
    /// the caller can await completion of an in-flight tick. A no-op
    /// returning [`None`] if not running.
    pub fn halt(&self) -> Option<JoinHandle<()>> {
        let Task { ct, handle } = self.task.lock().take()?;
        debug!("Stopping notifications");
        ct.cancel();
        Some(handle)
    }

    /// Stops the schedule. When this returns, no new tick will start and
    /// no tick is in flight.
    pub async fn stop(&self) {
        if let Some(handle) = self.halt() {
            let _ = handle.await;
        }
    }
}

impl Drop for Notifier {
    fn drop(&mut self) {
        if let Some(t) = self.task.get_mut().take() {
            t.ct.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn schedule() {
        let n = Notifier::new(NotifyConfig::default());
        let count = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&count);
        n.start(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        assert!(n.is_running());
        // First tick after the initial delay, then one per period.
        time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        time::sleep(Duration::from_secs(30)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
        time::sleep(Duration::from_secs(60)).await;
        assert_eq!(count.load(Ordering::SeqCst), 4);
        n.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn stop_is_final() {
        let n = Notifier::new(NotifyConfig::default());
        let count = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&count);
        n.start(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        time::sleep(Duration::from_secs(2)).await;
        n.stop().await;
        assert!(!n.is_running());
        let stopped_at = count.load(Ordering::SeqCst);
        time::sleep(Duration::from_secs(120)).await;
        assert_eq!(count.load(Ordering::SeqCst), stopped_at);
    }

    #[tokio::test(start_paused = true)]
    async fn start_twice() {
        let n = Notifier::new(NotifyConfig::default());
        let count = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&count);
        n.start(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        n.start(|| panic!("second schedule must not start"));
        time::sleep(Duration::from_secs(2)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        n.stop().await;
    }
}
