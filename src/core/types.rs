/*!
 * Core Types
 * Common types used across the crate
 */

/// Task identifier
///
/// Allocated from a process-wide counter; never reused, not meaningful
/// after the task completes.
pub type TaskId = u64;

/// Common result type for scheduler operations
pub type SchedResult<T> = Result<T, super::errors::SchedulerError>;
