/*!
 * Periodic Task Helper
 * Wraps a repeating unit of work so it runs at a target frequency
 */

use super::suspend::sleep;
use crate::core::clock::Clock;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Build the looping task registered by `Scheduler::schedule`
///
/// Each cycle records its start, runs the work to completion, then sleeps
/// for whatever is left of the period. Drift correction is only what
/// falls out of measuring from the cycle start.
///
/// # Panics
/// When `rate_hz` is not a positive, finite number.
pub(crate) fn at_rate<F, Fut>(
    clock: Arc<dyn Clock>,
    rate_hz: f64,
    mut work: F,
) -> impl Future<Output = anyhow::Result<()>> + 'static
where
    F: FnMut() -> Fut + 'static,
    Fut: Future<Output = anyhow::Result<()>> + 'static,
{
    assert!(
        rate_hz.is_finite() && rate_hz > 0.0,
        "schedule() requires a positive rate"
    );
    let period = Duration::from_secs_f64(1.0 / rate_hz);
    async move {
        loop {
            let start = clock.now();
            work().await?;
            let elapsed = clock.now().saturating_duration_since(start);
            // An overrun saturates to a zero-length sleep: the task is
            // readmitted on the next step, with no catch-up for missed
            // periods.
            sleep(period.saturating_sub(elapsed)).await;
        }
    }
}
