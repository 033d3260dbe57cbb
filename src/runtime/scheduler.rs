//! Scheduler
//!
//! Single-threaded event loop that multiplexes socket readiness and timers
//! and steps suspended tasks to completion.
//!
//! ## Loop Iteration
//! 1. If nothing is ready, block on the multiplexer until the nearest timer
//!    deadline (or indefinitely without timers); otherwise poll without
//!    blocking
//! 2. Move woken readiness waiters and expired timers to the ready queue
//! 3. Step a snapshot of the ready queue; tasks made ready while stepping
//!    run on the next iteration
//!
//! The loop ends when the ready queue, the timer queue and both waiter maps
//! are all empty. A task waiting on a handle that never becomes ready keeps
//! its waiter entry, and therefore the loop, alive indefinitely.

use std::cell::{Cell, RefCell};
use std::collections::hash_map::Entry;
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::io;
use std::rc::Rc;
use std::task::Waker;
use std::time::{Duration, Instant};

use mio::event::Source;
use mio::{Events, Interest, Poll, Registry, Token};

use crate::error::{Result, VaultError};

use super::io::{Direction, Readiness};
use super::task::{noop_waker, Task, TaskId};
use super::timer::{Sleep, TimerQueue};

/// Capacity of the readiness event buffer per poll
const EVENTS_CAPACITY: usize = 1024;

// =============================================================================
// Core State
// =============================================================================

/// Scheduler state shared with tasks through [`Handle`]
pub(crate) struct Core {
    /// Suspended tasks, keyed by id
    tasks: HashMap<TaskId, Task>,

    /// Runnable tasks in FIFO order
    ready: VecDeque<TaskId>,

    /// Sleeping tasks
    timers: TimerQueue,

    /// Single read waiter per handle
    read_waiters: HashMap<Token, TaskId>,

    /// Single write waiter per handle
    write_waiters: HashMap<Token, TaskId>,

    /// Task being stepped right now
    current: Option<TaskId>,

    next_task_id: u64,
}

impl Core {
    fn new() -> Self {
        Self {
            tasks: HashMap::new(),
            ready: VecDeque::new(),
            timers: TimerQueue::new(),
            read_waiters: HashMap::new(),
            write_waiters: HashMap::new(),
            current: None,
            next_task_id: 1,
        }
    }

    fn submit(&mut self, task: Task) -> TaskId {
        let id = TaskId(self.next_task_id);
        self.next_task_id += 1;
        self.tasks.insert(id, task);
        self.ready.push_back(id);
        id
    }

    fn current_task(&self, operation: &str) -> Result<TaskId> {
        self.current.ok_or_else(|| {
            VaultError::Scheduler(format!("{operation} awaited outside of a scheduler task"))
        })
    }

    /// Record the current task as the sole waiter for `token` in `direction`
    pub(crate) fn add_waiter(&mut self, direction: Direction, token: Token) -> Result<()> {
        let task = self.current_task("readiness wait")?;
        let waiters = match direction {
            Direction::Read => &mut self.read_waiters,
            Direction::Write => &mut self.write_waiters,
        };

        match waiters.entry(token) {
            Entry::Occupied(_) => Err(VaultError::WaiterConflict {
                token: token.0,
                direction: direction.as_str(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(task);
                Ok(())
            }
        }
    }

    /// Put the current task to sleep until `deadline`
    pub(crate) fn add_timer(&mut self, deadline: Instant) -> Result<()> {
        let task = self.current_task("sleep")?;
        self.timers.push(deadline, task);
        Ok(())
    }

    fn wake_io(&mut self, token: Token, readable: bool, writable: bool) {
        if readable {
            if let Some(task) = self.read_waiters.remove(&token) {
                self.ready.push_back(task);
            }
        }
        if writable {
            if let Some(task) = self.write_waiters.remove(&token) {
                self.ready.push_back(task);
            }
        }
    }

    fn wake_timers(&mut self, now: Instant) {
        let expired = self.timers.pop_expired(now);
        self.ready.extend(expired);
    }

    fn is_idle(&self) -> bool {
        self.ready.is_empty()
            && self.timers.is_empty()
            && self.read_waiters.is_empty()
            && self.write_waiters.is_empty()
    }
}

/// Multiplexer registration, kept outside the core so sockets can
/// deregister on drop regardless of what the core is doing.
struct IoRegistry {
    registry: Registry,
    next_token: Cell<usize>,
}

// =============================================================================
// Handle
// =============================================================================

/// Cloneable access to a scheduler from inside its tasks
///
/// Handles are passed explicitly to everything that spawns work or
/// suspends; there is no ambient global scheduler.
#[derive(Clone)]
pub struct Handle {
    core: Rc<RefCell<Core>>,
    io: Rc<IoRegistry>,
}

impl Handle {
    /// Submit a task; it first runs on the next loop iteration
    pub fn spawn<F>(&self, future: F) -> TaskId
    where
        F: Future<Output = ()> + 'static,
    {
        let id = self.core.borrow_mut().submit(Task::new(future));
        tracing::trace!(task = %id, "task submitted");
        id
    }

    /// Suspend the current task for at least `duration`
    pub fn sleep(&self, duration: Duration) -> Sleep {
        Sleep::new(self.clone(), duration)
    }

    /// Suspend the current task until `token` is readable
    pub fn readable(&self, token: Token) -> Readiness {
        Readiness::new(self.clone(), token, Direction::Read)
    }

    /// Suspend the current task until `token` is writable
    pub fn writable(&self, token: Token) -> Readiness {
        Readiness::new(self.clone(), token, Direction::Write)
    }

    /// Number of tasks not yet completed
    pub fn task_count(&self) -> usize {
        self.core.borrow().tasks.len()
    }

    /// Number of tasks waiting on a handle, in either direction
    pub fn waiter_count(&self) -> usize {
        let core = self.core.borrow();
        core.read_waiters.len() + core.write_waiters.len()
    }

    pub(crate) fn core(&self) -> &RefCell<Core> {
        &self.core
    }

    /// Register a socket for both directions under a fresh token
    pub(crate) fn register<S: Source + ?Sized>(&self, source: &mut S) -> Result<Token> {
        let token = Token(self.io.next_token.get());
        self.io.next_token.set(token.0 + 1);
        self.io
            .registry
            .register(source, token, Interest::READABLE | Interest::WRITABLE)?;
        Ok(token)
    }

    pub(crate) fn deregister<S: Source + ?Sized>(&self, source: &mut S) {
        if let Err(e) = self.io.registry.deregister(source) {
            tracing::debug!("Failed to deregister socket: {}", e);
        }
    }
}

// =============================================================================
// Scheduler
// =============================================================================

/// Owner of the event loop
pub struct Scheduler {
    poll: Poll,
    events: Events,
    handle: Handle,
    waker: Waker,
}

impl Scheduler {
    /// Create a scheduler with its own readiness multiplexer
    pub fn new() -> Result<Self> {
        let poll = Poll::new()?;
        let registry = poll.registry().try_clone()?;

        Ok(Self {
            poll,
            events: Events::with_capacity(EVENTS_CAPACITY),
            handle: Handle {
                core: Rc::new(RefCell::new(Core::new())),
                io: Rc::new(IoRegistry {
                    registry,
                    next_token: Cell::new(0),
                }),
            },
            waker: noop_waker(),
        })
    }

    pub fn handle(&self) -> Handle {
        self.handle.clone()
    }

    /// Submit a task (see [`Handle::spawn`])
    pub fn spawn<F>(&self, future: F) -> TaskId
    where
        F: Future<Output = ()> + 'static,
    {
        self.handle.spawn(future)
    }

    /// Run until every task has completed and nothing is waiting
    pub fn run(&mut self) -> Result<()> {
        while self.turn()? {}
        Ok(())
    }

    /// Spawn `future`, run the loop to completion and return its output
    ///
    /// Never returns if `future` spawns tasks that never finish.
    pub fn block_on<F>(&mut self, future: F) -> Result<F::Output>
    where
        F: Future + 'static,
        F::Output: 'static,
    {
        let slot = Rc::new(RefCell::new(None));
        let output = Rc::clone(&slot);
        self.spawn(async move {
            let value = future.await;
            *output.borrow_mut() = Some(value);
        });

        self.run()?;

        let value = slot.borrow_mut().take();
        value.ok_or_else(|| VaultError::Scheduler("block_on future did not complete".to_string()))
    }

    /// Perform one loop iteration
    ///
    /// Returns whether any work remains.
    pub fn turn(&mut self) -> Result<bool> {
        // Step 1: Decide how long the multiplexer may block
        let timeout = {
            let core = self.handle.core.borrow();
            if core.is_idle() {
                return Ok(false);
            }
            if core.ready.is_empty() {
                core.timers
                    .next_deadline()
                    .map(|deadline| deadline.saturating_duration_since(Instant::now()))
            } else {
                Some(Duration::ZERO)
            }
        };

        if let Err(e) = self.poll.poll(&mut self.events, timeout) {
            if e.kind() != io::ErrorKind::Interrupted {
                return Err(e.into());
            }
        }

        // Step 2: Move ready handles and expired timers to the ready queue
        {
            let mut core = self.handle.core.borrow_mut();
            for event in self.events.iter() {
                let failed = event.is_error();
                core.wake_io(
                    event.token(),
                    event.is_readable() || event.is_read_closed() || failed,
                    event.is_writable() || event.is_write_closed() || failed,
                );
            }
            core.wake_timers(Instant::now());
        }

        // Step 3: Step a snapshot of the ready queue
        let batch: Vec<TaskId> = self.handle.core.borrow_mut().ready.drain(..).collect();
        for id in batch {
            self.step(id);
        }

        Ok(!self.handle.core.borrow().is_idle())
    }

    fn step(&mut self, id: TaskId) {
        let task = self.handle.core.borrow_mut().tasks.remove(&id);
        let Some(mut task) = task else {
            tracing::trace!(task = %id, "stale ready entry skipped");
            return;
        };

        self.handle.core.borrow_mut().current = Some(id);
        let finished = task.step(&self.waker);

        let mut core = self.handle.core.borrow_mut();
        core.current = None;
        if finished {
            // Dropping the task may close sockets, which needs the core free
            drop(core);
            drop(task);
            tracing::trace!(task = %id, "task completed");
        } else {
            core.tasks.insert(id, task);
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        // Tasks hold handles back to the core; break the cycle.
        let tasks = std::mem::take(&mut self.handle.core.borrow_mut().tasks);
        drop(tasks);
    }
}
