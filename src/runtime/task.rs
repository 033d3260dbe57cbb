//! Task definitions
//!
//! A task is a boxed future stepped by the scheduler. Stepping runs it until
//! it either suspends (after registering itself with a waiter map or the
//! timer queue) or completes.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Wake, Waker};

/// Identifier of a task, unique for the lifetime of a scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub(crate) u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// A suspended unit of work
pub(crate) struct Task {
    future: Pin<Box<dyn Future<Output = ()>>>,
}

impl Task {
    pub(crate) fn new(future: impl Future<Output = ()> + 'static) -> Self {
        Self {
            future: Box::pin(future),
        }
    }

    /// Advance to the next suspension point
    ///
    /// Returns `true` once the task has completed.
    pub(crate) fn step(&mut self, waker: &Waker) -> bool {
        let mut cx = Context::from_waker(waker);
        matches!(self.future.as_mut().poll(&mut cx), Poll::Ready(()))
    }
}

/// Resumption is driven by the scheduler's waiter maps and timer queue,
/// never by wake calls, so the waker handed to futures does nothing.
struct NoopWake;

impl Wake for NoopWake {
    fn wake(self: Arc<Self>) {}
}

pub(crate) fn noop_waker() -> Waker {
    Waker::from(Arc::new(NoopWake))
}
