/*!
 * Cooperative Scheduler
 * Single-threaded run-to-completion task scheduling with a sleep queue
 */

use super::periodic;
use super::suspend::{self, ResumeScope};
use super::task::Task;
use super::types::{Stats, TaskState};
use crate::core::clock::{Clock, MonotonicClock};
use crate::core::errors::SchedulerError;
use crate::core::types::{SchedResult, TaskId};
use log::{debug, info, trace};
use std::collections::{BinaryHeap, VecDeque};
use std::future::Future;
use std::sync::Arc;
use std::task::Poll;
use std::time::Instant;

/// Sleep queue entry
struct SleepEntry {
    deadline: Instant,
    seq: u64,
    task: Task,
}

impl PartialEq for SleepEntry {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}

impl Eq for SleepEntry {}

impl Ord for SleepEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // BinaryHeap is a max-heap; reverse so the earliest deadline sits
        // at the front, with the insertion counter keeping ties stable.
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for SleepEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Cooperative scheduler
///
/// Owns the Ready FIFO and the Sleep Queue. A task keeps the processor
/// until it completes or hits its single suspension point; nothing
/// preempts it. `step` is the driven mode, `run` the run-to-exhaustion
/// mode; both share the same step algorithm.
pub struct Scheduler {
    clock: Arc<dyn Clock>,

    // Ready FIFO
    ready: VecDeque<Task>,

    // Sleep queue (min-heap by deadline, insertion order on ties)
    sleeping: BinaryHeap<SleepEntry>,
    sleep_seq: u64,

    // Statistics
    steps: u64,
    resumes: u64,
    completed: u64,
    sleeps: u64,
}

impl Scheduler {
    /// Create a scheduler reading the system monotonic clock
    pub fn new() -> Self {
        Self::with_clock(Arc::new(MonotonicClock))
    }

    /// Create a scheduler with a custom time source
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        info!("Scheduler initialized");
        Self {
            clock,
            ready: VecDeque::new(),
            sleeping: BinaryHeap::new(),
            sleep_seq: 0,
            steps: 0,
            resumes: 0,
            completed: 0,
            sleeps: 0,
        }
    }

    /// Add a task to the back of the Ready FIFO
    ///
    /// Returns immediately; the task first runs on a later `step`. The
    /// handle may be discarded.
    pub fn register<F>(&mut self, task: F) -> TaskId
    where
        F: Future<Output = anyhow::Result<()>> + 'static,
    {
        let task = Task::new(task);
        let id = task.id();
        debug!("Task {} registered", id);
        self.ready.push_back(task);
        id
    }

    /// Register a task that invokes `work` at a target frequency
    ///
    /// The task loops forever, self-adjusting for execution overrun: a
    /// cycle that overruns its period is readmitted on the next step, with
    /// no catch-up for missed periods. The invoked work may itself sleep.
    /// Arguments travel by closure capture. Fire-and-forget.
    ///
    /// # Panics
    /// When `rate_hz` is not a positive, finite number.
    pub fn schedule<F, Fut>(&mut self, rate_hz: f64, work: F)
    where
        F: FnMut() -> Fut + 'static,
        Fut: Future<Output = anyhow::Result<()>> + 'static,
    {
        let task = periodic::at_rate(self.clock.clone(), rate_hz, work);
        let id = self.register(task);
        info!("Task {} scheduled at {} Hz", id, rate_hz);
    }

    /// Advance the scheduler by one step (driven mode)
    ///
    /// Resumes every task that was ready when the step began exactly once,
    /// then wakes sleeping tasks whose deadline has passed. Tasks made
    /// ready during the step first run on the next one. A task failure
    /// aborts the step; both queues retain the remaining tasks.
    ///
    /// # Panics
    /// When called while a resume is already in flight.
    pub fn step(&mut self) -> SchedResult<()> {
        assert!(
            !suspend::scope_active(),
            "the scheduler can only be advanced one stack frame at a time"
        );
        self.steps += 1;

        // Ready phase: bound the work to the queue length captured up
        // front so a task that re-registers itself cannot starve the step.
        let n = self.ready.len();
        for _ in 0..n {
            let Some(task) = self.ready.pop_front() else {
                break;
            };
            self.resume(task)?;
        }

        // Sleep phase: consider each sleeping task at most once (avoids
        // zero-length sleep livelock). Entries are ordered by deadline, so
        // the first not-yet-due front entry ends the phase.
        let m = self.sleeping.len();
        for _ in 0..m {
            let due = matches!(
                self.sleeping.peek(),
                Some(entry) if self.clock.now() >= entry.deadline
            );
            if !due {
                break;
            }
            let Some(entry) = self.sleeping.pop() else {
                break;
            };
            trace!("Task {} woke", entry.task.id());
            self.resume(entry.task)?;
        }
        Ok(())
    }

    /// Run until both queues are empty (run-to-exhaustion mode)
    ///
    /// Registers `main_task`, then loops `step`. Returns normally once no
    /// task remains, or on the first task failure with the error
    /// propagated unmodified.
    pub fn run<F>(&mut self, main_task: F) -> SchedResult<()>
    where
        F: Future<Output = anyhow::Result<()>> + 'static,
    {
        self.register(main_task);
        while !self.is_empty() {
            self.step()?;
        }
        info!("Run complete; all tasks drained");
        Ok(())
    }

    /// Resume one task and reinsert it according to how it suspended
    fn resume(&mut self, mut task: Task) -> SchedResult<()> {
        let id = task.id();
        task.set_state(TaskState::Running);
        let guard = suspend::enter(self.clock.clone(), id);
        let poll = task.poll_once();
        // The resume scope is the "current task" marker: taken back here
        // on every exit path, including unwinds via the guard's Drop.
        let ResumeScope { sleep, spawned, .. } = suspend::exit(guard);
        self.resumes += 1;

        // Tasks spawned during the resume join the Ready FIFO behind the
        // captured phase bound; they first run on the next step.
        self.ready.extend(spawned);

        match poll {
            Poll::Ready(Ok(())) => {
                task.set_state(TaskState::Completed);
                self.completed += 1;
                trace!("Task {} completed", id);
            }
            Poll::Ready(Err(error)) => {
                return Err(SchedulerError::TaskFailed { task: id, error });
            }
            Poll::Pending => match sleep {
                Some(pending) => {
                    // The task parked itself; ownership moves to the
                    // sleep queue.
                    task.set_state(TaskState::Sleeping);
                    self.sleep_seq += 1;
                    self.sleeps += 1;
                    self.sleeping.push(SleepEntry {
                        deadline: pending.registered_at + pending.duration,
                        seq: self.sleep_seq,
                        task,
                    });
                }
                None => {
                    task.set_state(TaskState::Ready);
                    self.ready.push_back(task);
                }
            },
        }
        Ok(())
    }

    /// Number of tasks under scheduler management
    pub fn len(&self) -> usize {
        self.ready.len() + self.sleeping.len()
    }

    /// True when both the Ready FIFO and the Sleep Queue are empty
    pub fn is_empty(&self) -> bool {
        self.ready.is_empty() && self.sleeping.is_empty()
    }

    /// Snapshot of scheduler counters and queue depths
    pub fn stats(&self) -> Stats {
        Stats {
            steps: self.steps,
            resumes: self.resumes,
            completed: self.completed,
            sleeps: self.sleeps,
            ready_tasks: self.ready.len(),
            sleeping_tasks: self.sleeping.len(),
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}
