//! Recurring poll task
//!
//! One background task runs the tick closure at a fixed interval. A tick is
//! awaited inline, so the next one cannot begin until it returns; ticks that
//! overrun the interval delay the schedule instead of bursting to catch up.

use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

pub struct Scheduler {
    interval: Duration,
    handle: Option<JoinHandle<()>>,
    shutdown_tx: Option<mpsc::Sender<()>>,
}

impl Scheduler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            handle: None,
            shutdown_tx: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Start ticking. The first tick fires one interval from now. Returns
    /// false if already running.
    pub fn start<F, Fut>(&mut self, mut tick: F) -> bool
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if self.is_running() {
            return false;
        }

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        self.shutdown_tx = Some(shutdown_tx);

        let period = self.interval;
        self.handle = Some(tokio::spawn(async move {
            tracing::info!("Scheduler started with interval {:?}", period);

            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        tick().await;
                    }
                    _ = shutdown_rx.recv() => {
                        break;
                    }
                }
            }

            tracing::info!("Scheduler stopped");
        }));
        true
    }

    /// Cancel future ticks and wait for an in-flight tick to finish
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(()).await;
        }
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Scheduler task failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_ticks_until_stopped() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut scheduler = Scheduler::new(Duration::from_millis(10));

        let counter = Arc::clone(&count);
        assert!(scheduler.start(move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        }));
        assert!(scheduler.is_running());

        tokio::time::sleep(Duration::from_millis(100)).await;
        scheduler.stop().await;
        assert!(!scheduler.is_running());

        let ticks = count.load(Ordering::SeqCst);
        assert!(ticks >= 2, "expected several ticks, got {}", ticks);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(count.load(Ordering::SeqCst), ticks);
    }

    #[tokio::test]
    async fn test_start_and_stop_are_idempotent() {
        let mut scheduler = Scheduler::new(Duration::from_millis(10));
        assert!(scheduler.start(|| async {}));
        assert!(!scheduler.start(|| async {}));

        scheduler.stop().await;
        scheduler.stop().await;
        assert!(!scheduler.is_running());

        // Restart after a stop
        assert!(scheduler.start(|| async {}));
        scheduler.stop().await;
    }

    #[tokio::test]
    async fn test_stop_waits_for_in_flight_tick() {
        let started = Arc::new(AtomicBool::new(false));
        let finished = Arc::new(AtomicBool::new(false));
        let mut scheduler = Scheduler::new(Duration::from_millis(5));

        let (s, f) = (Arc::clone(&started), Arc::clone(&finished));
        scheduler.start(move || {
            let (s, f) = (Arc::clone(&s), Arc::clone(&f));
            async move {
                s.store(true, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(80)).await;
                f.store(true, Ordering::SeqCst);
            }
        });

        while !started.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        scheduler.stop().await;
        assert!(finished.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_overrunning_ticks_never_overlap() {
        let active = Arc::new(AtomicUsize::new(0));
        let overlapped = Arc::new(AtomicBool::new(false));
        let ticks = Arc::new(AtomicUsize::new(0));
        let mut scheduler = Scheduler::new(Duration::from_millis(5));

        let (a, o, t) = (Arc::clone(&active), Arc::clone(&overlapped), Arc::clone(&ticks));
        scheduler.start(move || {
            let (a, o, t) = (Arc::clone(&a), Arc::clone(&o), Arc::clone(&t));
            async move {
                if a.fetch_add(1, Ordering::SeqCst) > 0 {
                    o.store(true, Ordering::SeqCst);
                }
                // Each tick takes four intervals
                tokio::time::sleep(Duration::from_millis(20)).await;
                t.fetch_add(1, Ordering::SeqCst);
                a.fetch_sub(1, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(Duration::from_millis(120)).await;
        scheduler.stop().await;

        assert!(!overlapped.load(Ordering::SeqCst));
        assert!(ticks.load(Ordering::SeqCst) >= 2);
    }
}
