/*!
 * Error Types
 * Centralized error handling with thiserror and miette
 */

use crate::core::types::TaskId;
use miette::Diagnostic;
use thiserror::Error;

/// Scheduler-related errors
///
/// Programmer-error faults (sleeping outside a task, re-entering the step
/// driver mid-resume) are panics, not variants: they are bugs in the host
/// application and fail fast.
#[derive(Error, Debug, Diagnostic)]
pub enum SchedulerError {
    /// A task's resume surfaced an error other than the completion signal.
    /// The failing task has been dropped; both queues retain the remaining
    /// tasks. The wrapped error is the task's own, unmodified.
    #[error("task {task} failed: {error}")]
    #[diagnostic(
        code(sched::task_failed),
        help("The scheduler performs no per-task isolation; the run was aborted. Inspect the task's error and decide whether to log, reboot, or halt.")
    )]
    TaskFailed { task: TaskId, error: anyhow::Error },
}

impl SchedulerError {
    /// Id of the task that caused the failure
    pub fn task(&self) -> TaskId {
        match self {
            SchedulerError::TaskFailed { task, .. } => *task,
        }
    }
}
