//! Runtime Module
//!
//! Single-threaded cooperative scheduler: every accept, socket read, socket
//! write and timed sleep is a suspension point, and nothing else yields.
//!
//! ## Architecture
//! ```text
//!                ┌──────────────────────────┐
//!   spawn ──────►│       ready queue        │◄──────────┐
//!                └────────────┬─────────────┘           │
//!                             │ step (snapshot)         │
//!                             ▼                         │
//!                ┌──────────────────────────┐           │
//!                │           task           │           │
//!                └──────┬─────────────┬─────┘           │
//!         sleep(d)      │             │  readable/      │
//!                       ▼             ▼  writable(tok)  │
//!              ┌──────────────┐ ┌─────────────────┐     │
//!              │ timer heap   │ │ waiter maps     │     │
//!              │ (deadline,   │ │ token -> task   │     │
//!              │  sequence)   │ │ (read / write)  │     │
//!              └──────┬───────┘ └────────┬────────┘     │
//!                     │  expired         │  mio events  │
//!                     └──────────────────┴──────────────┘
//! ```
//!
//! Shared state (collector, storage executor) lives in `Rc<RefCell<_>>`.
//! Tasks only run between suspension points, so no lock is needed as long
//! as no borrow is held across an `.await`.

mod io;
mod net;
mod scheduler;
mod task;
mod timer;

pub use io::{Direction, Readiness};
pub use net::{TcpListener, TcpStream};
pub use scheduler::{Handle, Scheduler};
pub use task::TaskId;
pub use timer::{Sleep, TimerQueue};
