//! A single arm/reset/cancel timer primitive, backed by `tokio::time`.
//!
//! Used for the producer-channel auto-close timer and the Syncer response
//! timer (§4.6, §4.7). Modeled as "stop the old timer, arm a new one"
//! rather than two independent timers, matching the original
//! `GetProducerTrxMgr`'s `Stop()`+`Reset()` on one timer handle. A
//! generation counter stands in for `Stop()`: resetting bumps it, so a
//! stale sleep that wakes after a reset finds its generation superseded
//! and fires nothing.
//!
//! Tests drive this with `tokio::time::pause()` + `tokio::time::advance()`
//! rather than real sleeps.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
struct TaskState {
    generation: u64,
}

/// A cancellable, resettable one-shot timer.
#[derive(Clone, Default)]
pub struct ScheduledTask {
    state: Arc<Mutex<TaskState>>,
}

impl ScheduledTask {
    /// Create a disarmed timer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm (or re-arm) the timer: `callback` fires after `duration` unless
    /// `reset` or `cancel` is called again first.
    pub fn reset<F>(&self, duration: Duration, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let state = self.state.clone();
        let generation = {
            let mut guard = state.lock();
            guard.generation += 1;
            guard.generation
        };

        tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            let should_fire = state.lock().generation == generation;
            if should_fire {
                callback();
            }
        });
    }

    /// Cancel any pending fire without arming a new one.
    pub fn cancel(&self) {
        self.state.lock().generation += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn fires_after_duration() {
        let task = ScheduledTask::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = fired.clone();

        task.reset(Duration::from_secs(30), move || {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::advance(Duration::from_secs(29)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_reschedules_from_new_baseline() {
        let task = ScheduledTask::new();
        let fired = Arc::new(AtomicUsize::new(0));

        let f1 = fired.clone();
        task.reset(Duration::from_secs(30), move || {
            f1.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::advance(Duration::from_secs(25)).await;

        let f2 = fired.clone();
        task.reset(Duration::from_secs(30), move || {
            f2.fetch_add(1, Ordering::SeqCst);
        });

        // Original 30s deadline (5s away) passes without firing: reset
        // superseded it.
        tokio::time::advance(Duration::from_secs(6)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::advance(Duration::from_secs(25)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_suppresses_fire() {
        let task = ScheduledTask::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = fired.clone();

        task.reset(Duration::from_secs(30), move || {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        });
        task.cancel();

        tokio::time::advance(Duration::from_secs(60)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
