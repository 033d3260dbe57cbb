//! Timer queue and the sleep suspension point
//!
//! Timers are kept in a min-heap ordered by `(deadline, sequence)`. The
//! sequence number is assigned at registration, so timers sharing a deadline
//! fire in the order they were registered.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use crate::error::Result;

use super::scheduler::Handle;
use super::task::TaskId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct TimerEntry {
    deadline: Instant,
    sequence: u64,
    task: TaskId,
}

/// Deadline-ordered queue of sleeping tasks
#[derive(Debug, Default)]
pub struct TimerQueue {
    heap: BinaryHeap<Reverse<TimerEntry>>,
    next_sequence: u64,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `task` to be resumed at or after `deadline`
    pub fn push(&mut self, deadline: Instant, task: TaskId) {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.heap.push(Reverse(TimerEntry {
            deadline,
            sequence,
            task,
        }));
    }

    /// Earliest pending deadline
    pub fn next_deadline(&self) -> Option<Instant> {
        self.heap.peek().map(|Reverse(entry)| entry.deadline)
    }

    /// Remove every timer whose deadline is `<= now`, in firing order
    pub fn pop_expired(&mut self, now: Instant) -> Vec<TaskId> {
        let mut expired = Vec::new();
        while let Some(Reverse(entry)) = self.heap.peek() {
            if entry.deadline > now {
                break;
            }
            expired.push(entry.task);
            self.heap.pop();
        }
        expired
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

/// Future returned by [`Handle::sleep`]
///
/// The deadline is fixed on first poll. Completes on the step after the
/// scheduler moves the task out of the timer queue; a zero duration still
/// takes one full loop iteration.
pub struct Sleep {
    handle: Handle,
    duration: Duration,
    registered: bool,
}

impl Sleep {
    pub(crate) fn new(handle: Handle, duration: Duration) -> Self {
        Self {
            handle,
            duration,
            registered: false,
        }
    }
}

impl Future for Sleep {
    type Output = Result<()>;

    fn poll(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        if self.registered {
            return Poll::Ready(Ok(()));
        }

        let deadline = Instant::now() + self.duration;
        if let Err(e) = self.handle.core().borrow_mut().add_timer(deadline) {
            return Poll::Ready(Err(e));
        }
        self.registered = true;
        Poll::Pending
    }
}
