//! Background reader
//!
//! One thread per connection owns every receive. Each response is matched
//! to its pending request by `ack_sequence` and dispatched; when the
//! connection ends, all outstanding requests are failed.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::error::{KineticError, Result};
use crate::handler::Dispatched;
use crate::protocol::{AuthType, Command};
use crate::status::{Status, StatusCode};

use super::connection::{Connection, ConnectionState, Received};
use super::pending::PendingTable;

/// Start the reader thread for `conn`
pub fn spawn(conn: Arc<Connection>, pending: Arc<PendingTable>) -> Result<JoinHandle<()>> {
    let span = conn.span().clone();
    thread::Builder::new()
        .name(format!("kinetic-reader-{}", conn.connection_id()))
        .spawn(move || {
            let _enter = span.enter();
            run(&conn, &pending);
        })
        .map_err(KineticError::Io)
}

/// Receive and dispatch until the connection fails or is closed
pub fn run(conn: &Connection, pending: &PendingTable) {
    tracing::debug!("Reader started");

    let error = loop {
        match conn.receive() {
            Ok(received) => dispatch(pending, received),
            // Idle at a frame boundary
            Err(e) if e.is_timeout() => continue,
            Err(e) => break e,
        }
    };

    // A local close can interrupt a read mid-frame
    let status = match error {
        KineticError::ConnectionClosed => closed_status(),
        _ if conn.state() == ConnectionState::Closed => closed_status(),
        e => Status::from_error(&e),
    };

    let failed = pending.fail_all(&status);
    tracing::debug!(failed, "Reader stopped: {}", status);
}

fn closed_status() -> Status {
    Status::new(StatusCode::ClientConnectionClosed, "connection closed")
}

fn dispatch(pending: &PendingTable, received: Received) {
    let Received {
        message,
        command,
        value,
    } = received;

    // Untagged unsolicited envelopes never complete a request
    let sequence = match command.header.ack_sequence {
        Some(sequence) if message.auth_type != AuthType::UnsolicitedStatus => sequence,
        _ => {
            unsolicited(&command);
            return;
        }
    };

    let mut handler = match pending.take(sequence) {
        Some(handler) => handler,
        None => {
            tracing::warn!(sequence, "No pending request for response, dropping it");
            return;
        }
    };

    match handler.handle(command, value) {
        Ok(Dispatched::Unclassified) => {
            // Not a completion; keep waiting for the real response
            if let Some(mut rejected) = pending.insert(sequence, handler) {
                if let Err(e) = rejected.error(closed_status()) {
                    tracing::warn!(sequence, "Could not fail pending request: {}", e);
                }
            }
        }
        Ok(_) => {}
        Err(e) => tracing::warn!(sequence, "Response not dispatched: {}", e),
    }
}

fn unsolicited(command: &Command) {
    match Status::from_command(command) {
        Some(status) if !status.is_ok() => {
            tracing::warn!("Unsolicited status from drive: {}", status)
        }
        _ => tracing::info!(
            message_type = ?command.message_type(),
            "Unsolicited message from drive"
        ),
    }
}
