//! Network Module
//!
//! HTTP server on top of the cooperative runtime.
//!
//! ## Architecture
//! - One scheduler thread drives everything
//! - Accept loop task spawns one task per connection
//! - One request per connection, routed through the RequestHandler

mod connection;
mod server;

pub use connection::{Connection, ConnectionSettings};
pub use server::Server;
