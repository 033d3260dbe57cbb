//! # PostVault
//!
//! A small REST service over scraped post records with:
//! - A single-threaded cooperative scheduler (readiness multiplexing + timers)
//! - Hand-rolled HTTP/1.1 framing with fixed input limits
//! - A bounded, deduplicating collector of pending records
//! - Three interchangeable storage backends behind one contract
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Scheduler (one thread)                       │
//! │        ready queue · timer heap · read/write waiters         │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ steps
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │              Accept loop → Connection tasks                  │
//! │          (HTTP head, Host check, body on demand)             │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                 Router / RequestHandler                      │
//! └──────────┬──────────────────────────────────┬───────────────┘
//!            │                                  │
//!            ▼                                  ▼
//!   ┌─────────────────┐          ┌──────────────────────────────┐
//!   │    Collector    │          │      StorageExecutor         │
//!   │ (pending lines) │          │  text  │  sql  │  document   │
//!   └─────────────────┘          └──────────────────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod record;
pub mod collector;
pub mod runtime;
pub mod http;
pub mod router;
pub mod storage;
pub mod network;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{Result, VaultError};
pub use config::{Backend, Config};
pub use collector::Collector;
pub use record::Record;
pub use network::Server;
pub use runtime::{Handle, Scheduler};
pub use storage::{open_executor, StorageExecutor};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of PostVault
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
