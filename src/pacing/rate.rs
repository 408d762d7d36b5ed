/*!
 * Rate-Limited Invocation
 * Call a function every loop iteration, run it at most at a target rate
 */

use crate::core::clock::{Clock, MonotonicClock};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Non-suspending rate limiter
///
/// Wraps a closure so a hot loop can call it every iteration while the
/// work runs at most `rate_hz` times per second; between invocations the
/// most recent result is returned. Unlike `Scheduler::schedule` this never
/// suspends the caller, so it fits plain driver loops that cannot yield.
pub struct RateLimited<F, T> {
    work: F,
    interval: Duration,
    clock: Arc<dyn Clock>,
    last_invocation: Option<Instant>,
    latest: Option<T>,
}

impl<F, T> RateLimited<F, T>
where
    F: FnMut() -> T,
{
    /// Limit `work` to at most `rate_hz` invocations per second
    ///
    /// # Panics
    /// When `rate_hz` is not a positive, finite number.
    pub fn new(rate_hz: f64, work: F) -> Self {
        Self::with_clock(Arc::new(MonotonicClock), rate_hz, work)
    }

    /// Rate limiter with an injected time source
    pub fn with_clock(clock: Arc<dyn Clock>, rate_hz: f64, work: F) -> Self {
        assert!(
            rate_hz.is_finite() && rate_hz > 0.0,
            "rate limiting requires a positive rate"
        );
        Self {
            work,
            interval: Duration::from_secs_f64(1.0 / rate_hz),
            clock,
            last_invocation: None,
            latest: None,
        }
    }

    /// Invoke the work if it is due, otherwise return the cached result
    ///
    /// The first call always invokes. While invocations keep up they are
    /// scheduled at the fixed rate; once the caller falls behind by more
    /// than a full interval, pacing falls back to fixed delay so the work
    /// is not burst-invoked to catch up.
    pub fn call(&mut self) -> &T {
        let now = self.clock.now();
        let due = match self.last_invocation {
            None => true,
            Some(last) => now.saturating_duration_since(last) > self.interval,
        };
        if due {
            self.last_invocation = Some(match self.last_invocation {
                Some(last) if last + self.interval * 2 >= now => last + self.interval,
                _ => now,
            });
            self.latest = None;
        }
        self.latest.get_or_insert_with(|| (self.work)())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::ManualClock;
    use std::cell::Cell;
    use std::rc::Rc;

    fn counting(clock: Arc<ManualClock>, rate_hz: f64) -> (RateLimited<impl FnMut() -> u32, u32>, Rc<Cell<u32>>) {
        let calls = Rc::new(Cell::new(0u32));
        let counter = Rc::clone(&calls);
        let limited = RateLimited::with_clock(clock, rate_hz, move || {
            counter.set(counter.get() + 1);
            counter.get()
        });
        (limited, calls)
    }

    #[test]
    fn test_first_call_invokes() {
        let clock = Arc::new(ManualClock::new());
        let (mut limited, calls) = counting(clock, 10.0);

        assert_eq!(*limited.call(), 1);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_calls_within_interval_return_cached_value() {
        let clock = Arc::new(ManualClock::new());
        let (mut limited, calls) = counting(clock.clone(), 10.0);

        limited.call();
        clock.advance(Duration::from_millis(50));
        assert_eq!(*limited.call(), 1);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_invokes_again_after_interval() {
        let clock = Arc::new(ManualClock::new());
        let (mut limited, calls) = counting(clock.clone(), 10.0);

        limited.call();
        clock.advance(Duration::from_millis(101));
        assert_eq!(*limited.call(), 2);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_fixed_rate_pacing_when_keeping_up() {
        let clock = Arc::new(ManualClock::new());
        let (mut limited, calls) = counting(clock.clone(), 10.0);

        limited.call();
        // 150ms in: due (next slot was at 100ms), and pacing stays on the
        // fixed-rate grid, so the following slot is only 50ms away.
        clock.advance(Duration::from_millis(150));
        limited.call();
        assert_eq!(calls.get(), 2);
        clock.advance(Duration::from_millis(51));
        limited.call();
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_fixed_delay_fallback_when_behind() {
        let clock = Arc::new(ManualClock::new());
        let (mut limited, calls) = counting(clock.clone(), 10.0);

        limited.call();
        // Far behind: more than two intervals since the last invocation.
        // Pacing restarts from now, so 50ms later nothing is due yet.
        clock.advance(Duration::from_millis(250));
        limited.call();
        assert_eq!(calls.get(), 2);
        clock.advance(Duration::from_millis(50));
        limited.call();
        assert_eq!(calls.get(), 2);
        clock.advance(Duration::from_millis(51));
        limited.call();
        assert_eq!(calls.get(), 3);
    }

    #[test]
    #[should_panic(expected = "positive rate")]
    fn test_zero_rate_panics() {
        let _ = RateLimited::new(0.0, || ());
    }
}
