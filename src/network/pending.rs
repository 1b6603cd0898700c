//! Pending request table
//!
//! Maps the sequence number of each outstanding request to the handler
//! waiting for its response.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::handler::MessageHandler;
use crate::status::Status;

struct Inner {
    entries: HashMap<i64, MessageHandler>,
    /// Set once the connection is gone; no new entries are accepted
    closed: bool,
}

/// Outstanding requests keyed by sequence number
pub struct PendingTable {
    inner: Mutex<Inner>,
}

impl PendingTable {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                closed: false,
            }),
        }
    }

    /// Register a handler for `sequence`
    ///
    /// Hands the handler back if the table has already been failed.
    pub fn insert(&self, sequence: i64, handler: MessageHandler) -> Option<MessageHandler> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Some(handler);
        }
        if inner.entries.insert(sequence, handler).is_some() {
            tracing::warn!(sequence, "Replaced pending request with duplicate sequence");
        }
        None
    }

    /// Remove and return the handler for `sequence`
    pub fn take(&self, sequence: i64) -> Option<MessageHandler> {
        self.inner.lock().entries.remove(&sequence)
    }

    /// Fail every outstanding request and refuse new ones
    ///
    /// Callbacks run after the lock is released. Returns how many requests
    /// were failed.
    pub fn fail_all(&self, status: &Status) -> usize {
        let drained: Vec<(i64, MessageHandler)> = {
            let mut inner = self.inner.lock();
            inner.closed = true;
            inner.entries.drain().collect()
        };

        let count = drained.len();
        for (sequence, mut handler) in drained {
            if let Err(e) = handler.error(status.clone()) {
                tracing::warn!(sequence, "Could not fail pending request: {}", e);
            }
        }
        count
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }
}

impl Default for PendingTable {
    fn default() -> Self {
        Self::new()
    }
}
