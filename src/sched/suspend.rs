/*!
 * Suspension Primitive
 * The single well-defined point where a running task cedes control
 *
 * Tasks are futures: a suspension is a future that returns `Pending` once
 * and is only ever re-polled by the scheduler. User code cannot advance a
 * task by hand, so an un-awaited `sleep` never half-suspends anything; it
 * is inert and the compiler flags the unused future.
 */

use super::task::Task;
use crate::core::clock::Clock;
use crate::core::types::TaskId;
use log::trace;
use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

/// Sleep recorded by the current resume, waiting to enter the sleep queue
pub(crate) struct PendingSleep {
    pub registered_at: Instant,
    pub duration: Duration,
}

/// State of the one resume currently in flight
///
/// This is the "current task" slot: it exists only for the duration of a
/// single resume call and is cleared unconditionally afterwards.
pub(crate) struct ResumeScope {
    pub clock: Arc<dyn Clock>,
    pub task: TaskId,
    /// Set when the task parked itself; ownership moves to the sleep queue
    pub sleep: Option<PendingSleep>,
    /// Tasks registered from inside the resume, handed over when it ends
    pub spawned: Vec<Task>,
}

thread_local! {
    static SCOPE: RefCell<Option<ResumeScope>> = const { RefCell::new(None) };
}

/// Clears the resume scope even when the resume unwinds
pub(crate) struct ScopeGuard(());

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        SCOPE.with(|slot| slot.borrow_mut().take());
    }
}

/// Open a resume scope for `task`
pub(crate) fn enter(clock: Arc<dyn Clock>, task: TaskId) -> ScopeGuard {
    SCOPE.with(|slot| {
        let mut slot = slot.borrow_mut();
        assert!(slot.is_none(), "a task resume is already in flight");
        *slot = Some(ResumeScope {
            clock,
            task,
            sleep: None,
            spawned: Vec::new(),
        });
    });
    ScopeGuard(())
}

/// Close the scope normally and hand its contents back to the scheduler
pub(crate) fn exit(guard: ScopeGuard) -> ResumeScope {
    std::mem::forget(guard);
    SCOPE
        .with(|slot| slot.borrow_mut().take())
        .expect("resume scope missing at exit")
}

/// True while a resume is in flight on this thread
pub(crate) fn scope_active() -> bool {
    SCOPE.with(|slot| slot.borrow().is_some())
}

fn with_scope<R>(what: &str, f: impl FnOnce(&mut ResumeScope) -> R) -> R {
    SCOPE.with(|slot| {
        let mut slot = slot.borrow_mut();
        let Some(scope) = slot.as_mut() else {
            panic!("{} is only valid inside a running task", what)
        };
        f(scope)
    })
}

/// Suspend the calling task for at least `duration`
///
/// The task resumes on the first step after the deadline passes. The
/// guarantee is "at least this long", never "at most": there is no
/// deadline-miss notification.
///
/// # Panics
/// When polled outside a running task, or when the task already holds a
/// pending sleep.
#[must_use = "sleeping does nothing unless awaited"]
pub fn sleep(duration: Duration) -> Sleep {
    Sleep {
        duration,
        parked: false,
    }
}

/// Float-seconds variant of [`sleep`]
///
/// Zero and negative inputs become zero-length sleeps: the task wakes on
/// the very next evaluation of the sleep queue.
#[must_use = "sleeping does nothing unless awaited"]
pub fn sleep_secs(seconds: f64) -> Sleep {
    let duration = if seconds > 0.0 {
        Duration::from_secs_f64(seconds)
    } else {
        Duration::ZERO
    };
    sleep(duration)
}

/// Future returned by [`sleep`] and [`sleep_secs`]
pub struct Sleep {
    duration: Duration,
    parked: bool,
}

impl Future for Sleep {
    type Output = ();

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<()> {
        let this = self.get_mut();
        if this.parked {
            // Re-polled by the scheduler, which only does so once the
            // deadline has passed.
            return Poll::Ready(());
        }
        with_scope("sleep()", |scope| {
            assert!(
                scope.sleep.is_none(),
                "a task can only hold one pending sleep at a time"
            );
            trace!("Task {} sleeping for {:?}", scope.task, this.duration);
            scope.sleep = Some(PendingSleep {
                registered_at: scope.clock.now(),
                duration: this.duration,
            });
        });
        this.parked = true;
        Poll::Pending
    }
}

/// Yield the processor once
///
/// The task stays ready: it is re-appended to the FIFO and resumes on the
/// next step.
///
/// # Panics
/// When polled outside a running task.
#[must_use = "yielding does nothing unless awaited"]
pub fn yield_now() -> YieldNow {
    YieldNow { yielded: false }
}

/// Future returned by [`yield_now`]
pub struct YieldNow {
    yielded: bool,
}

impl Future for YieldNow {
    type Output = ();

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<()> {
        let this = self.get_mut();
        if this.yielded {
            return Poll::Ready(());
        }
        // Fail fast outside a resume: readiness here is queue-managed, and
        // a bare Pending under a foreign executor would never be re-polled.
        with_scope("yield_now()", |_| {});
        this.yielded = true;
        Poll::Pending
    }
}

/// Register a task from inside a running task
///
/// The new task joins the back of the Ready FIFO when the current resume
/// ends; it first runs on the next step. The handle may be discarded.
///
/// # Panics
/// When called outside a running task; use `Scheduler::register` there.
pub fn spawn<F>(task: F) -> TaskId
where
    F: Future<Output = anyhow::Result<()>> + 'static,
{
    with_scope("spawn()", |scope| {
        let task = Task::new(task);
        let id = task.id();
        trace!("Task {} spawned by task {}", id, scope.task);
        scope.spawned.push(task);
        id
    })
}
