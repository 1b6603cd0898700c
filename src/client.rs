//! Client
//!
//! Ties a [`Connection`] to its reader thread and pending table. Requests
//! are submitted with a [`Callback`]; the reader completes it when the
//! matching response arrives or the connection ends.
//!
//! Callbacks run on the reader thread. A callback must not block on another
//! request through the same client.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use bytes::Bytes;
use crossbeam::channel::{self, RecvTimeoutError, Sender};
use parking_lot::Mutex;

use crate::config::ClientOptions;
use crate::error::{KineticError, Result};
use crate::handler::{Callback, MessageHandler};
use crate::network::{reader, Connection, PendingTable};
use crate::protocol::Command;
use crate::status::Status;

/// Poll interval while the reader holds a timed-out request's handler
const WITHDRAW_RETRY: Duration = Duration::from_millis(5);

/// A successful response
#[derive(Debug, Clone)]
pub struct Response {
    pub command: Command,
    pub value: Option<Bytes>,
}

/// Callback that forwards the outcome over a channel
struct ChannelCallback {
    tx: Sender<std::result::Result<Response, Status>>,
}

impl Callback for ChannelCallback {
    fn success(&mut self, command: Command, value: Option<Bytes>) {
        let _ = self.tx.send(Ok(Response { command, value }));
    }

    fn failure(&mut self, status: Status) {
        let _ = self.tx.send(Err(status));
    }
}

/// Connected client
pub struct Client {
    conn: Arc<Connection>,
    pending: Arc<PendingTable>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl Client {
    /// Open a connection and start its reader thread
    pub fn connect(options: ClientOptions) -> Result<Self> {
        let conn = Arc::new(Connection::open(options)?);
        let pending = Arc::new(PendingTable::new());

        let handle = match reader::spawn(Arc::clone(&conn), Arc::clone(&pending)) {
            Ok(handle) => handle,
            Err(e) => {
                conn.close();
                return Err(e);
            }
        };

        Ok(Self {
            conn,
            pending,
            reader: Mutex::new(Some(handle)),
        })
    }

    /// Send `command` and complete `callback` when its response arrives
    ///
    /// Returns the sequence number assigned to the request. The callback
    /// receives exactly one outcome, also when this returns an error.
    pub fn submit<C: Callback + 'static>(
        &self,
        mut command: Command,
        value: &[u8],
        callback: C,
    ) -> Result<i64> {
        let mut slot = Some(MessageHandler::new(callback));
        let mut registered = None;

        let result = self.conn.send_with(&mut command, value, |sequence| {
            if let Some(handler) = slot.take() {
                if let Some(rejected) = self.pending.insert(sequence, handler) {
                    slot = Some(rejected);
                    return Err(KineticError::ConnectionClosed);
                }
                registered = Some(sequence);
            }
            Ok(())
        });

        if let Err(e) = &result {
            // Unless the reader already failed it
            let handler = slot
                .take()
                .or_else(|| registered.and_then(|sequence| self.pending.take(sequence)));
            if let Some(mut handler) = handler {
                if let Err(err) = handler.error(Status::from_error(e)) {
                    tracing::warn!("Could not fail rejected request: {}", err);
                }
            }
        }
        result
    }

    /// Send `command` and block until its response arrives
    pub fn request(&self, command: Command, value: &[u8]) -> Result<Response> {
        let (tx, rx) = channel::bounded(1);
        self.submit(command, value, ChannelCallback { tx })?;

        match rx.recv() {
            Ok(outcome) => outcome.map_err(KineticError::Remote),
            Err(_) => Err(KineticError::ConnectionClosed),
        }
    }

    /// Like [`request`](Self::request), giving up after `timeout`
    ///
    /// On timeout the request is withdrawn; a late response is dropped.
    pub fn request_timeout(
        &self,
        command: Command,
        value: &[u8],
        timeout: Duration,
    ) -> Result<Response> {
        let (tx, rx) = channel::bounded(1);
        let sequence = self.submit(command, value, ChannelCallback { tx })?;

        let mut wait = timeout;
        loop {
            match rx.recv_timeout(wait) {
                Ok(outcome) => return outcome.map_err(KineticError::Remote),
                Err(RecvTimeoutError::Disconnected) => return Err(KineticError::ConnectionClosed),
                Err(RecvTimeoutError::Timeout) => {}
            }

            if self.pending.take(sequence).is_some() {
                tracing::debug!(sequence, "Request timed out after {:?}", timeout);
                return Err(KineticError::ResponseTimeout(sequence));
            }
            // The reader holds the handler: it either completes it or puts it
            // back for an interim response, so look again shortly
            wait = WITHDRAW_RETRY;
        }
    }

    /// Close the connection and wait for the reader to finish
    ///
    /// Every outstanding request is failed with a connection-closed status.
    pub fn close(&self) {
        self.conn.close();

        let handle = self.reader.lock().take();
        if let Some(handle) = handle {
            // Closing from inside a callback: the reader exits on its own
            if handle.thread().id() == thread::current().id() {
                return;
            }
            if handle.join().is_err() {
                tracing::error!("Reader thread panicked");
            }
        }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Connection id assigned by the drive
    pub fn connection_id(&self) -> i64 {
        self.conn.connection_id()
    }

    /// Number of requests still waiting for a response
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.close();
    }
}
