//! Readiness suspension points
//!
//! A task waiting on a handle is recorded as the single waiter for that
//! handle and direction, then suspends. It is resumed exactly once, when the
//! multiplexer reports the handle ready.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use mio::Token;

use crate::error::Result;

use super::scheduler::Handle;

/// Which readiness a task is waiting for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Read,
    Write,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Read => "read",
            Direction::Write => "write",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Future returned by [`Handle::readable`] and [`Handle::writable`]
///
/// Resolves to an error instead of suspending if another task already
/// waits on the same handle and direction.
pub struct Readiness {
    handle: Handle,
    token: Token,
    direction: Direction,
    registered: bool,
}

impl Readiness {
    pub(crate) fn new(handle: Handle, token: Token, direction: Direction) -> Self {
        Self {
            handle,
            token,
            direction,
            registered: false,
        }
    }
}

impl Future for Readiness {
    type Output = Result<()>;

    fn poll(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        if self.registered {
            return Poll::Ready(Ok(()));
        }

        let (token, direction) = (self.token, self.direction);
        if let Err(e) = self.handle.core().borrow_mut().add_waiter(direction, token) {
            return Poll::Ready(Err(e));
        }
        self.registered = true;
        Poll::Pending
    }
}
