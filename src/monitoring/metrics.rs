/*!
 * Metrics Collection
 * Explicit-config timing instrumentation
 */

use ahash::RandomState;
use dashmap::DashMap;
use log::info;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Instrumentation configuration
///
/// Handed explicitly to every component that wants measurement; there is
/// no process-wide toggle. A disabled registry costs one branch per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct MetricsConfig {
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: false }
    }
}

/// Aggregate of one named series
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct StatSummary {
    pub avg: f64,
    pub min: f64,
    pub max: f64,
    pub count: u64,
}

/// Running min/max/sum/count aggregate
#[derive(Debug, Clone, Copy)]
struct StatisticSet {
    min: f64,
    max: f64,
    sum: f64,
    count: u64,
}

impl StatisticSet {
    fn new() -> Self {
        Self {
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            sum: 0.0,
            count: 0,
        }
    }

    fn observe(&mut self, value: f64) {
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        self.sum += value;
        self.count += 1;
    }

    fn summary(&self) -> StatSummary {
        StatSummary {
            avg: self.sum / self.count.max(1) as f64,
            min: self.min,
            max: self.max,
            count: self.count,
        }
    }
}

/// Serializable view of everything observed since the last reset
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct MetricsSnapshot {
    pub timings: Vec<(String, StatSummary)>,
    pub measurements: Vec<(String, StatSummary)>,
}

/// Timing and measurement registry
///
/// Timings are recorded in milliseconds via [`MetricsRegistry::time`]
/// scope guards; arbitrary numeric observations go through
/// [`MetricsRegistry::observe`].
pub struct MetricsRegistry {
    enabled: bool,
    timings: DashMap<String, StatisticSet, RandomState>,
    measurements: DashMap<String, StatisticSet, RandomState>,
    last_report: Mutex<Instant>,
}

impl MetricsRegistry {
    pub fn new(config: MetricsConfig) -> Self {
        Self {
            enabled: config.enabled,
            timings: DashMap::with_hasher(RandomState::new()),
            measurements: DashMap::with_hasher(RandomState::new()),
            last_report: Mutex::new(Instant::now()),
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Time a scope; the elapsed time is recorded when the guard drops
    ///
    /// Returns `None` when the registry is disabled.
    pub fn time(&self, name: &str) -> Option<TimerGuard<'_>> {
        if !self.enabled {
            return None;
        }
        Some(TimerGuard {
            registry: self,
            name: name.to_string(),
            start: Instant::now(),
        })
    }

    /// Record one timed invocation
    pub fn record_duration(&self, name: &str, duration: Duration) {
        if !self.enabled {
            return;
        }
        self.timings
            .entry(name.to_string())
            .or_insert_with(StatisticSet::new)
            .observe(duration.as_secs_f64() * 1000.0);
    }

    /// Record a numeric observation
    pub fn observe(&self, name: &str, value: f64) {
        if !self.enabled {
            return;
        }
        self.measurements
            .entry(name.to_string())
            .or_insert_with(StatisticSet::new)
            .observe(value);
    }

    /// Aggregates observed so far, sorted by name
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            timings: collect(&self.timings),
            measurements: collect(&self.measurements),
        }
    }

    /// Log a report at most once per `min_interval`, then reset
    ///
    /// Call periodically from the driver loop; passing `Duration::ZERO`
    /// forces a report.
    pub fn log_report(&self, min_interval: Duration) {
        if !self.enabled {
            return;
        }
        {
            let mut last = self.last_report.lock();
            if last.elapsed() < min_interval {
                return;
            }
            *last = Instant::now();
        }
        let report = self.snapshot();
        for (name, stats) in &report.timings {
            info!(
                "timing {}: avg={:.3}ms min={:.3}ms max={:.3}ms count={}",
                name, stats.avg, stats.min, stats.max, stats.count
            );
        }
        for (name, stats) in &report.measurements {
            info!(
                "measure {}: avg={:.3} min={:.3} max={:.3} count={}",
                name, stats.avg, stats.min, stats.max, stats.count
            );
        }
        self.timings.clear();
        self.measurements.clear();
    }
}

fn collect(map: &DashMap<String, StatisticSet, RandomState>) -> Vec<(String, StatSummary)> {
    let mut rows: Vec<_> = map
        .iter()
        .map(|entry| (entry.key().clone(), entry.value().summary()))
        .collect();
    rows.sort_by(|a, b| a.0.cmp(&b.0));
    rows
}

/// Scope timer returned by [`MetricsRegistry::time`]
pub struct TimerGuard<'a> {
    registry: &'a MetricsRegistry,
    name: String,
    start: Instant,
}

impl Drop for TimerGuard<'_> {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        self.registry.record_duration(&self.name, elapsed);
    }
}
