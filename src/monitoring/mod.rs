/*!
 * Monitoring Module
 * Opt-in instrumentation, kept out of the scheduler core
 */

pub mod metrics;

// Re-export public API
pub use metrics::{MetricsConfig, MetricsRegistry, MetricsSnapshot, StatSummary, TimerGuard};
