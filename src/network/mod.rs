//! Network Module
//!
//! TCP connection to a drive.
//!
//! ## Architecture
//! - Any number of threads send; the writer lock serializes them
//! - One reader thread per connection receives and dispatches
//! - Outstanding requests wait in a pending table keyed by sequence

mod connection;
mod pending;
pub mod reader;

pub use connection::{Connection, ConnectionState, Received};
pub use pending::PendingTable;
