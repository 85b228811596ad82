use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::error::{Result, TrackingError};

// ─── FixedWindowRateLimiter ──────────────────────────────────────

/// Lock-free fixed-window counter used for advisory telemetry.
///
/// `hit()` never blocks and never rejects anything; it only reports whether
/// the current one-second window has gone over `max_per_second`.  The window
/// id and the counter are two separate atomics, so a request racing a window
/// rollover may land in either window, but only one thread ever resets the
/// counter for a given second.
pub struct FixedWindowRateLimiter {
    max_per_second: u64,
    window_second: AtomicI64,
    count: AtomicU64,
    clock: Arc<dyn Clock>,
}

impl FixedWindowRateLimiter {
    /// Limiter backed by the system clock.
    pub fn new(max_per_second: u64) -> Result<Self> {
        Self::with_clock(max_per_second, Arc::new(SystemClock))
    }

    pub fn with_clock(max_per_second: u64, clock: Arc<dyn Clock>) -> Result<Self> {
        if max_per_second == 0 {
            return Err(TrackingError::InvalidThreshold(max_per_second));
        }

        let window_second = AtomicI64::new(clock.now().timestamp());
        Ok(Self {
            max_per_second,
            window_second,
            count: AtomicU64::new(0),
            clock,
        })
    }

    pub fn max_per_second(&self) -> u64 {
        self.max_per_second
    }

    /// Register one request and report whether it pushed the current
    /// window strictly over the threshold.
    pub fn hit(&self) -> bool {
        let now = self.clock.now().timestamp();
        self.roll_window(now);
        let count = self.count.fetch_add(1, Ordering::AcqRel) + 1;
        count > self.max_per_second
    }

    /// Switch the window to `now`, resetting the counter exactly once.
    ///
    /// Any mismatch triggers a transition, including a clock that stepped
    /// backwards.  Only the CAS winner resets; a loser found the window
    /// already moved by a peer and counts against whatever is current.
    fn roll_window(&self, now: i64) {
        let window = self.window_second.load(Ordering::Acquire);
        if window == now {
            return;
        }
        if self
            .window_second
            .compare_exchange(window, now, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            self.count.store(0, Ordering::Release);
        }
    }
}

impl std::fmt::Debug for FixedWindowRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FixedWindowRateLimiter")
            .field("max_per_second", &self.max_per_second)
            .field("window_second", &self.window_second.load(Ordering::Relaxed))
            .field("count", &self.count.load(Ordering::Relaxed))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::thread;

    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new("2024-01-01T00:00:00Z".parse().unwrap()))
    }

    #[test]
    fn limit_not_exceeded_until_threshold() {
        let limiter = FixedWindowRateLimiter::with_clock(3, clock()).unwrap();
        for _ in 0..3 {
            assert!(!limiter.hit());
        }
        assert!(limiter.hit());
        assert!(limiter.hit());
    }

    #[test]
    fn limit_resets_on_new_window() {
        let clock = clock();
        let limiter = FixedWindowRateLimiter::with_clock(2, clock.clone()).unwrap();
        assert!(!limiter.hit());
        assert!(!limiter.hit());
        assert!(limiter.hit());

        clock.advance_seconds(1);
        assert!(!limiter.hit());
        assert!(!limiter.hit());
        assert!(limiter.hit());
    }

    #[test]
    fn sub_second_movement_stays_in_window() {
        let clock = clock();
        let limiter = FixedWindowRateLimiter::with_clock(1, clock.clone()).unwrap();
        assert!(!limiter.hit());
        clock.advance_millis(999);
        assert!(limiter.hit());
    }

    #[test]
    fn clock_stepping_back_starts_a_new_window() {
        let clock = clock();
        clock.advance_seconds(10);
        let limiter = FixedWindowRateLimiter::with_clock(1, clock.clone()).unwrap();
        assert!(!limiter.hit());
        assert!(limiter.hit());

        clock.set("2024-01-01T00:00:05Z".parse().unwrap());
        assert!(!limiter.hit());
        assert!(limiter.hit());
    }

    #[test]
    fn repeated_roll_to_current_second_keeps_count() {
        let clock = clock();
        let limiter = FixedWindowRateLimiter::with_clock(1, clock.clone()).unwrap();
        clock.advance_seconds(1);
        assert!(!limiter.hit());

        // The window already matches; nothing is reset.
        limiter.roll_window(clock.now().timestamp());
        assert!(limiter.hit());
    }

    #[test]
    fn zero_threshold_is_rejected() {
        let err = FixedWindowRateLimiter::with_clock(0, clock()).unwrap_err();
        assert!(matches!(err, TrackingError::InvalidThreshold(0)));
    }

    #[test]
    fn concurrent_hits_are_never_lost() {
        const THREADS: usize = 16;
        const PER_THREAD: usize = 250;
        const LIMIT: u64 = 1_000;

        let limiter =
            Arc::new(FixedWindowRateLimiter::with_clock(LIMIT, clock()).unwrap());

        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let limiter = limiter.clone();
                thread::spawn(move || {
                    (0..PER_THREAD).filter(|_| limiter.hit()).count()
                })
            })
            .collect();

        let exceeded: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        let total = THREADS * PER_THREAD;
        assert_eq!(exceeded, total - LIMIT as usize);

        // The very next call is past the threshold as well.
        assert!(limiter.hit());
    }
}
