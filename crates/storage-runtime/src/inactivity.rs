//! In-flight-request accounting and idle shutdown (`spec.md` §4.5).
//!
//! Grounded on `examples/original_source/src/internal/InactivityTimer.cpp`:
//! a monotonic request counter gates a single-shot timer — the timer is
//! stopped while any request is in flight and (re)started the instant the
//! count returns to zero. A `None` timeout (the `0` = never case from
//! `spec.md` §6) disables the timer outright.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;

/// Fires once `timeout` has elapsed with zero requests in flight, unless a
/// new request starts first. Always used behind an `Arc`: the idle-timer
/// task needs to outlive the caller that armed it.
pub struct InactivityTimer {
    timeout: Option<Duration>,
    num_requests: AtomicI64,
    /// Bumped every time the request count leaves zero, so a timer task
    /// scheduled by an earlier idle period can tell it's stale.
    generation: AtomicI64,
    fired: Notify,
}

impl InactivityTimer {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self {
            timeout,
            num_requests: AtomicI64::new(0),
            generation: AtomicI64::new(0),
            fired: Notify::new(),
        }
    }

    /// Call when a request begins.
    pub fn request_started(&self) {
        let previous = self.num_requests.fetch_add(1, Ordering::SeqCst);
        debug_assert!(previous >= 0);
        if previous == 0 {
            self.generation.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Call when a request ends. Arms the idle timer if this was the last
    /// one in flight.
    pub fn request_finished(self: &Arc<Self>) {
        let previous = self.num_requests.fetch_sub(1, Ordering::SeqCst);
        debug_assert!(previous > 0);
        if previous == 1 {
            self.arm();
        }
    }

    /// Arms the idle timer for the current generation. A no-op if the
    /// timeout is disabled.
    fn arm(self: &Arc<Self>) {
        let Some(timeout) = self.timeout else { return };
        let generation = self.generation.load(Ordering::SeqCst);
        let this = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if this.num_requests.load(Ordering::SeqCst) == 0
                && this.generation.load(Ordering::SeqCst) == generation
            {
                this.fired.notify_waiters();
            }
        });
    }

    /// Starts the clock on an otherwise-idle server (call once at
    /// startup, after construction, so a daemon that never sees a single
    /// request still shuts down on schedule).
    pub fn start(self: &Arc<Self>) {
        self.arm();
    }

    /// Resolves once the idle timeout has fired.
    pub async fn wait_for_timeout(&self) {
        self.fired.notified().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fires_after_timeout_with_no_requests() {
        let timer = Arc::new(InactivityTimer::new(Some(Duration::from_millis(20))));
        timer.start();
        tokio::time::timeout(Duration::from_millis(200), timer.wait_for_timeout())
            .await
            .expect("timer should have fired");
    }

    #[tokio::test]
    async fn starting_a_request_prevents_a_stale_timer_from_firing() {
        let timer = Arc::new(InactivityTimer::new(Some(Duration::from_millis(20))));
        timer.start();
        tokio::time::sleep(Duration::from_millis(5)).await;
        timer.request_started();

        let result =
            tokio::time::timeout(Duration::from_millis(60), timer.wait_for_timeout()).await;
        assert!(
            result.is_err(),
            "timer should not have fired while a request is in flight"
        );
    }

    #[tokio::test]
    async fn rearms_after_the_request_completes() {
        let timer = Arc::new(InactivityTimer::new(Some(Duration::from_millis(20))));
        timer.request_started();
        timer.request_finished();
        tokio::time::timeout(Duration::from_millis(200), timer.wait_for_timeout())
            .await
            .expect("timer should have fired once the request finished");
    }

    #[tokio::test]
    async fn never_timeout_does_not_arm() {
        let timer = Arc::new(InactivityTimer::new(None));
        timer.start();
        let result =
            tokio::time::timeout(Duration::from_millis(50), timer.wait_for_timeout()).await;
        assert!(result.is_err());
    }
}
