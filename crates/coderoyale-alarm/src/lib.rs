//! Single-instant wakeup scheduler for CodeRoyale room actors.
//!
//! A Room never runs per-player timers. Instead it recomputes, after
//! every mutation, the single earliest instant at which *something*
//! needs to happen — the next problem arrival, the warmup→main
//! transition, the match end — and arms one alarm for that instant.
//! [`AlarmScheduler::wait`] resolves exactly once, at that instant; the
//! Room then recomputes the next one from scratch.
//!
//! # Event-driven mode
//!
//! When nothing is armed, [`AlarmScheduler::wait`] pends forever. This
//! is the correct behavior for a Room sitting in the lobby — there is
//! nothing to wake up for.
//!
//! # Integration
//!
//! The scheduler is designed to sit inside a room actor's `tokio::select!` loop:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(cmd) = cmd_rx.recv() => { /* handle command, then re-arm */ }
//!         fired = alarm.wait() => { /* recompute earliest wakeup, re-arm */ }
//!     }
//! }
//! ```

use std::time::{Duration, Instant};

use tokio::time::{self, Instant as TokioInstant};
use tracing::{debug, trace};

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

/// Runtime metrics for an [`AlarmScheduler`].
#[derive(Debug, Clone, Default)]
pub struct AlarmMetrics {
    /// Total number of times the alarm has fired.
    pub total_fires: u64,
    /// Total number of times the armed instant was moved earlier or
    /// later before it fired (a re-arm that replaced a pending one).
    pub total_rearms: u64,
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// A floor under the next wakeup so a string of mutations each due
/// "immediately" can't spin the actor loop.
pub const MIN_ARM_AHEAD: Duration = Duration::from_secs(1);

/// One absolute-instant alarm per Room.
///
/// Armed with [`arm_at`](Self::arm_at), disarmed with
/// [`disarm`](Self::disarm), waited on with [`wait`](Self::wait).
/// Re-arming while already armed simply replaces the pending instant —
/// there is never more than one pending wakeup.
pub struct AlarmScheduler {
    armed: Option<TokioInstant>,
    metrics: AlarmMetrics,
}

impl Default for AlarmScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl AlarmScheduler {
    /// Creates a disarmed scheduler.
    pub fn new() -> Self {
        Self {
            armed: None,
            metrics: AlarmMetrics::default(),
        }
    }

    /// Arms the alarm for the given absolute instant, replacing any
    /// instant currently armed. Instants in the past fire immediately
    /// on the next `wait`, except that the scheduler floors the delay
    /// to [`MIN_ARM_AHEAD`] to avoid a busy loop when a run of handlers
    /// each computes a wakeup that is already due.
    pub fn arm_at(&mut self, instant: Instant) {
        let now = Instant::now();
        let floor = now + MIN_ARM_AHEAD;
        let effective = if instant < floor { floor } else { instant };

        let delta = effective.saturating_duration_since(now);
        let tokio_instant = TokioInstant::now() + delta;

        if self.armed.is_some() {
            self.metrics.total_rearms += 1;
        }
        trace!(delay_ms = delta.as_millis() as u64, "alarm armed");
        self.armed = Some(tokio_instant);
    }

    /// Cancels any pending wakeup. `wait` will pend forever until the
    /// next `arm_at`.
    pub fn disarm(&mut self) {
        if self.armed.take().is_some() {
            debug!("alarm disarmed");
        }
    }

    /// Whether an instant is currently armed.
    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    /// Waits until the armed instant, if any.
    ///
    /// Pends forever when disarmed — safe to call unconditionally from
    /// inside `tokio::select!`. Firing is idempotent: the caller is
    /// expected to recompute and re-arm the next wakeup from current
    /// state rather than trust any counter carried by this scheduler,
    /// since two alarms close together should both be handled correctly
    /// against absolute instants.
    pub async fn wait(&mut self) {
        let Some(at) = self.armed else {
            std::future::pending::<()>().await;
            unreachable!()
        };

        time::sleep_until(at).await;
        self.armed = None;
        self.metrics.total_fires += 1;
        trace!("alarm fired");
    }

    /// Snapshot of current metrics.
    pub fn metrics(&self) -> &AlarmMetrics {
        &self.metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_disarmed_pends_forever() {
        let mut s = AlarmScheduler::new();
        let result = time::timeout(Duration::from_secs(5), s.wait()).await;
        assert!(result.is_err(), "disarmed scheduler should never fire");
    }

    #[tokio::test(start_paused = true)]
    async fn test_armed_fires_at_instant() {
        let mut s = AlarmScheduler::new();
        s.arm_at(Instant::now() + Duration::from_secs(5));
        assert!(s.is_armed());

        let result = time::timeout(Duration::from_secs(10), s.wait()).await;
        assert!(result.is_ok());
        assert!(!s.is_armed());
        assert_eq!(s.metrics().total_fires, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_replaces_pending_instant() {
        let mut s = AlarmScheduler::new();
        s.arm_at(Instant::now() + Duration::from_secs(30));
        s.arm_at(Instant::now() + Duration::from_secs(2));

        let result = time::timeout(Duration::from_secs(3), s.wait()).await;
        assert!(result.is_ok(), "later arm_at should win with the earlier instant");
        assert_eq!(s.metrics().total_rearms, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disarm_cancels_pending_wakeup() {
        let mut s = AlarmScheduler::new();
        s.arm_at(Instant::now() + Duration::from_secs(2));
        s.disarm();
        assert!(!s.is_armed());

        let result = time::timeout(Duration::from_secs(5), s.wait()).await;
        assert!(result.is_err(), "disarmed alarm should not fire");
    }

    #[tokio::test(start_paused = true)]
    async fn test_past_instant_floors_to_min_arm_ahead() {
        let mut s = AlarmScheduler::new();
        // An instant already in the past should still respect the floor
        // rather than firing on the very next poll.
        s.arm_at(Instant::now() - Duration::from_secs(60));

        let immediate = time::timeout(Duration::from_millis(100), s.wait()).await;
        assert!(immediate.is_err(), "should not fire before the floor");

        let result = time::timeout(Duration::from_secs(2), s.wait()).await;
        assert!(result.is_ok(), "should fire once the floor elapses");
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_can_be_called_again_after_firing() {
        let mut s = AlarmScheduler::new();
        s.arm_at(Instant::now() + Duration::from_secs(1));
        s.wait().await;

        s.arm_at(Instant::now() + Duration::from_secs(1));
        s.wait().await;

        assert_eq!(s.metrics().total_fires, 2);
    }
}
