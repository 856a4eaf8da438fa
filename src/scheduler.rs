// file: src/scheduler.rs
// description: injectable timer service used for heartbeats and reconnection backoff

use crate::error::MonitorError;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::time::{Instant, MissedTickBehavior, interval_at, sleep};

pub type OnceTask = Box<dyn FnOnce() + Send + 'static>;
pub type RepeatingTask = Box<dyn FnMut() + Send + 'static>;

/// Timer source for the connection manager.
///
/// Production code uses [`TokioScheduler`]; tests inject a virtual clock so
/// backoff and heartbeat behaviour can be stepped deterministically.
pub trait Scheduler: Send + Sync {
    /// Run `task` once after `delay`.
    fn schedule_once(&self, delay: Duration, task: OnceTask) -> TimerHandle;

    /// Run `task` every `period`, first firing one period from now.
    fn schedule_repeating(&self, period: Duration, task: RepeatingTask) -> TimerHandle;
}

/// Cancels its timer when cancelled or dropped.
pub struct TimerHandle {
    cancel: Option<Box<dyn FnOnce() + Send + 'static>>,
}

impl TimerHandle {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn cancel(mut self) {
        self.fire_cancel();
    }

    fn fire_cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.fire_cancel();
    }
}

impl std::fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerHandle")
            .field("armed", &self.cancel.is_some())
            .finish()
    }
}

/// Timers backed by spawned tokio tasks.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    runtime: Handle,
}

impl TokioScheduler {
    pub fn new(runtime: Handle) -> Self {
        Self { runtime }
    }

    /// Bind to the runtime the caller is running on.
    pub fn current() -> Result<Self, MonitorError> {
        Handle::try_current()
            .map(Self::new)
            .map_err(|e| MonitorError::NoRuntime(e.to_string()))
    }
}

impl Scheduler for TokioScheduler {
    fn schedule_once(&self, delay: Duration, task: OnceTask) -> TimerHandle {
        let join = self.runtime.spawn(async move {
            sleep(delay).await;
            task();
        });
        TimerHandle::new(move || join.abort())
    }

    fn schedule_repeating(&self, period: Duration, mut task: RepeatingTask) -> TimerHandle {
        let join = self.runtime.spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                task();
            }
        });
        TimerHandle::new(move || join.abort())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn once_timer_fires() {
        let scheduler = TokioScheduler::current().unwrap();
        let fired = Arc::new(AtomicU32::new(0));
        let counter = fired.clone();

        let _handle = scheduler.schedule_once(
            Duration::from_millis(5),
            Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        sleep(Duration::from_millis(100)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancelled_timer_never_fires() {
        let scheduler = TokioScheduler::current().unwrap();
        let fired = Arc::new(AtomicU32::new(0));
        let counter = fired.clone();

        let handle = scheduler.schedule_once(
            Duration::from_millis(20),
            Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        handle.cancel();

        sleep(Duration::from_millis(80)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn repeating_timer_stops_on_drop() {
        let scheduler = TokioScheduler::current().unwrap();
        let fired = Arc::new(AtomicU32::new(0));
        let counter = fired.clone();

        let handle = scheduler.schedule_repeating(
            Duration::from_millis(10),
            Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        sleep(Duration::from_millis(55)).await;
        drop(handle);
        let seen = fired.load(Ordering::SeqCst);
        assert!(seen >= 2, "expected several ticks, saw {seen}");

        sleep(Duration::from_millis(50)).await;
        assert_eq!(fired.load(Ordering::SeqCst), seen);
    }

    #[test]
    fn current_fails_outside_runtime() {
        assert!(matches!(
            TokioScheduler::current(),
            Err(MonitorError::NoRuntime(_))
        ));
    }
}
