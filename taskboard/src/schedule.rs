//! Timer scheduling and disposable subscriptions.
//!
//! The board never owns a bare task handle; everything it starts in the
//! background comes back as a [`Subscription`] whose [`dispose`] stops it.
//!
//! [`dispose`]: Subscription::dispose

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Shortest period [`TokioScheduler`] will tick at.
pub const MIN_TICK: Duration = Duration::from_millis(1);

/// Handle to background work; disposing (or dropping) it stops the work.
#[derive(Debug)]
pub struct Subscription {
    handle: Option<JoinHandle<()>>,
}

impl Subscription {
    /// Wraps a spawned task.
    #[must_use]
    pub const fn from_handle(handle: JoinHandle<()>) -> Self {
        Self {
            handle: Some(handle),
        }
    }

    /// Stops the work. Calling it again does nothing.
    pub fn dispose(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    /// Returns `true` until disposed or until the work finished on its own.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.handle.as_ref().is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Runs a callback at a fixed interval.
pub trait Scheduler {
    /// Calls `callback` every `interval`, first one interval from now.
    /// Intervals shorter than [`MIN_TICK`] run at [`MIN_TICK`].
    ///
    /// A callback that overruns its slot delays the next call rather than
    /// causing a burst of catch-up calls.
    fn start<F, Fut>(&self, interval: Duration, callback: F) -> Subscription
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static;
}

/// [`Scheduler`] backed by `tokio::time::interval`.
///
/// Must be used from within a tokio runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioScheduler;

impl Scheduler for TokioScheduler {
    fn start<F, Fut>(&self, interval: Duration, mut callback: F) -> Subscription
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let period = interval.max(MIN_TICK);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                callback().await;
            }
        });
        Subscription::from_handle(handle)
    }
}
