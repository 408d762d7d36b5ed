/*!
 * Task Model
 * A resumable unit of computation owned by the scheduler
 */

use super::types::TaskState;
use crate::core::types::TaskId;
use futures::task::noop_waker_ref;
use log::trace;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};

/// Boxed task continuation; `Ok(())` is the completion signal
pub(crate) type TaskFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>>>>;

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

/// A registered task
///
/// The scheduler holds the only handle capable of advancing the
/// continuation; user code never polls a task directly.
pub(crate) struct Task {
    id: TaskId,
    state: TaskState,
    future: TaskFuture,
}

impl Task {
    pub(crate) fn new<F>(future: F) -> Self
    where
        F: Future<Output = anyhow::Result<()>> + 'static,
    {
        Self {
            id: NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed),
            state: TaskState::Ready,
            future: Box::pin(future),
        }
    }

    pub(crate) fn id(&self) -> TaskId {
        self.id
    }

    pub(crate) fn set_state(&mut self, state: TaskState) {
        trace!("Task {} {:?} -> {:?}", self.id, self.state, state);
        self.state = state;
    }

    /// Advance the continuation by one resume
    ///
    /// Readiness is managed by the scheduler's queues, so the waker is
    /// inert.
    pub(crate) fn poll_once(&mut self) -> Poll<anyhow::Result<()>> {
        let mut cx = Context::from_waker(noop_waker_ref());
        self.future.as_mut().poll(&mut cx)
    }
}
