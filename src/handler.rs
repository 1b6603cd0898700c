//! Response dispatch
//!
//! A [`MessageHandler`] classifies a decoded response by its status and
//! invokes exactly one outcome on the bound [`Callback`]: `success` for a
//! `SUCCESS` code, `failure` for any other code. Status-free messages are
//! informational and complete nothing.

use bytes::Bytes;

use crate::error::{KineticError, Result};
use crate::protocol::Command;
use crate::status::Status;

/// Completion capability supplied by the caller of a request
pub trait Callback: Send {
    /// The drive answered with `SUCCESS`
    fn success(&mut self, command: Command, value: Option<Bytes>);

    /// The drive answered with an error, or the transport failed
    fn failure(&mut self, status: Status);
}

/// Which outcome `handle` resolved to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatched {
    Success,
    Failure,
    /// No classifiable status; no callback was invoked
    Unclassified,
}

/// Routes responses to a single bound callback
#[derive(Default)]
pub struct MessageHandler {
    callback: Option<Box<dyn Callback>>,
}

impl MessageHandler {
    /// Create a handler bound to `callback`
    pub fn new<C: Callback + 'static>(callback: C) -> Self {
        Self {
            callback: Some(Box::new(callback)),
        }
    }

    /// Bind a callback, replacing any previous one
    pub fn bind<C: Callback + 'static>(&mut self, callback: C) {
        self.callback = Some(Box::new(callback));
    }

    /// Whether a callback is bound
    pub fn is_bound(&self) -> bool {
        self.callback.is_some()
    }

    /// Classify a response and complete the callback
    pub fn handle(&mut self, command: Command, value: Option<Bytes>) -> Result<Dispatched> {
        let callback = self.callback.as_mut().ok_or(KineticError::NoCallback)?;

        match Status::from_command(&command) {
            Some(status) if status.is_ok() => {
                callback.success(command, value);
                Ok(Dispatched::Success)
            }
            Some(status) => {
                callback.failure(status);
                Ok(Dispatched::Failure)
            }
            None => {
                tracing::info!(
                    message_type = ?command.message_type(),
                    ack_sequence = ?command.header.ack_sequence,
                    "Unclassified message received"
                );
                tracing::debug!(?command, "Unclassified message body");
                Ok(Dispatched::Unclassified)
            }
        }
    }

    /// Fail the callback with a transport status
    pub fn error(&mut self, status: Status) -> Result<()> {
        let callback = self.callback.as_mut().ok_or(KineticError::NoCallback)?;
        callback.failure(status);
        Ok(())
    }
}
