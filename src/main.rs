/*!
 * coopd - Demo Host
 *
 * Drives the cooperative scheduler the way an embedded control loop
 * would: a periodic heartbeat, a finite sleeping worker, and a
 * host-owned driver loop (driven mode).
 */

use coop_kernel::{sleep, MetricsConfig, MetricsRegistry, RateLimited, Scheduler};
use log::info;
use std::error::Error;
use std::sync::Arc;
use std::time::{Duration, Instant};

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    info!("coopd starting...");

    let metrics = Arc::new(MetricsRegistry::new(MetricsConfig { enabled: true }));
    let mut scheduler = Scheduler::new();

    // Heartbeat at 4 Hz, timed through the metrics registry
    let heartbeat_metrics = Arc::clone(&metrics);
    scheduler.schedule(4.0, move || {
        let metrics = Arc::clone(&heartbeat_metrics);
        async move {
            let _timer = metrics.time("heartbeat");
            info!("heartbeat");
            Ok(())
        }
    });

    // A finite worker mixing computation with sleeps
    scheduler.register(async {
        for cycle in 0..5u32 {
            info!("worker cycle {}", cycle);
            sleep(Duration::from_millis(150)).await;
        }
        info!("worker done");
        Ok(())
    });

    // Driven mode: the host owns the outer loop and the tick cadence.
    let mut status = RateLimited::new(1.0, || info!("driver alive"));
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        scheduler.step()?;
        status.call();
        std::thread::sleep(Duration::from_millis(5));
    }

    let stats = scheduler.stats();
    info!("scheduler stats: {}", serde_json::to_string_pretty(&stats)?);
    metrics.log_report(Duration::ZERO);

    info!("coopd exiting");
    Ok(())
}
