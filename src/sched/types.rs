/*!
 * Scheduling Types
 * Common types for task scheduling
 */

use serde::{Deserialize, Serialize};

/// Task state
///
/// A task is in exactly one state at any instant; at most one task is
/// `Running` scheduler-wide. `Completed` is terminal: the task is dropped
/// and its id is never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Eligible to run on this or a future step
    Ready,
    /// Currently executing
    Running,
    /// Suspended until a deadline has passed
    Sleeping,
    /// Finished; removed from all bookkeeping
    Completed,
}

/// Scheduler statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Stats {
    pub steps: u64,
    pub resumes: u64,
    pub completed: u64,
    pub sleeps: u64,
    pub ready_tasks: usize,
    pub sleeping_tasks: usize,
}
