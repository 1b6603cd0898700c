//! Connection
//!
//! Owns the TCP stream to a drive: dial, handshake, serialized sends,
//! blocking receives and teardown.

use std::io::{BufReader, BufWriter};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicI64, AtomicU8, Ordering};

use bytes::Bytes;
use parking_lot::Mutex;
use tracing::Span;

use crate::auth;
use crate::config::ClientOptions;
use crate::error::{KineticError, Result};
use crate::protocol::{read_frame, write_frame, AuthType, Command, Message};

const STATE_OPEN: u8 = 0;
const STATE_BROKEN: u8 = 1;
const STATE_CLOSED: u8 = 2;

/// Lifecycle state of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Open,
    /// A fatal transport error occurred; the stream cannot be trusted
    Broken,
    Closed,
}

/// One decoded, authenticated response
#[derive(Debug, Clone)]
pub struct Received {
    pub message: Message,
    pub command: Command,
    pub value: Option<Bytes>,
}

/// Send half; the sequence counter lives under the same lock
struct Writer {
    stream: BufWriter<TcpStream>,
    sequence: i64,
}

/// A live connection to a drive
///
/// ## Concurrency:
/// - Sends are serialized by the writer lock
/// - Receives are serialized by the reader lock (in practice held by the
///   single reader thread)
/// - `close` never takes either lock, so it can unblock a pending read
pub struct Connection {
    options: ClientOptions,

    /// Handle kept for shutdown
    stream: TcpStream,

    writer: Mutex<Writer>,
    reader: Mutex<BufReader<TcpStream>>,

    /// Server-assigned id, 0 until the handshake completes
    connection_id: AtomicI64,

    state: AtomicU8,

    peer_addr: String,

    /// Logging context for everything done on this connection
    span: Span,
}

impl Connection {
    /// Dial the drive and perform the handshake
    ///
    /// The connection's span is created as a child of the caller's current
    /// span, so callers inject logging context by opening inside it.
    pub fn open(options: ClientOptions) -> Result<Self> {
        options.validate()?;

        let addr = options.address();
        let span = tracing::info_span!(
            "kinetic",
            host = %options.host,
            port = options.port,
            connection_id = tracing::field::Empty
        );

        let stream = {
            let _enter = span.enter();
            tracing::debug!("Dialing {}", addr);
            dial(&options).map_err(|source| KineticError::Dial {
                addr: addr.clone(),
                source,
            })?
        };

        let conn = Self::from_stream(stream, options, span)?;
        let _enter = conn.span.enter();

        match conn.receive() {
            Ok(handshake) => match handshake.command.header.connection_id {
                Some(id) => {
                    conn.span.record("connection_id", id);
                    tracing::debug!("Handshake complete, connection id {}", id);
                }
                None => tracing::warn!("Handshake carried no connection id"),
            },
            Err(e) => {
                tracing::error!("Can't establish connection to {}: {}", addr, e);
                conn.close();
                return Err(KineticError::Handshake(Box::new(e)));
            }
        }

        drop(_enter);
        Ok(conn)
    }

    fn from_stream(stream: TcpStream, options: ClientOptions, span: Span) -> Result<Self> {
        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        // Disable Nagle's algorithm; frames are written whole and flushed
        stream.set_nodelay(true)?;
        stream.set_read_timeout(options.read_timeout)?;
        stream.set_write_timeout(options.write_timeout)?;

        let read_stream = stream.try_clone()?;
        let write_stream = stream.try_clone()?;

        Ok(Self {
            options,
            stream,
            writer: Mutex::new(Writer {
                stream: BufWriter::new(write_stream),
                sequence: 1,
            }),
            reader: Mutex::new(BufReader::new(read_stream)),
            connection_id: AtomicI64::new(0),
            state: AtomicU8::new(STATE_OPEN),
            peer_addr,
            span,
        })
    }

    // =========================================================================
    // Sending
    // =========================================================================

    /// Tag, frame and write already-serialized command bytes
    ///
    /// The bytes are sent as-is; no sequence number is assigned.
    pub fn send_raw(&self, command_bytes: Vec<u8>, value: &[u8]) -> Result<()> {
        self.ensure_usable()?;
        let mut writer = self.writer.lock();
        self.ensure_usable()?;
        self.write_envelope(&mut writer, command_bytes, value)
    }

    /// Stamp the next sequence number into `command` and send it
    ///
    /// Returns the assigned sequence number.
    pub fn send(&self, command: &mut Command, value: &[u8]) -> Result<i64> {
        self.send_with(command, value, |_| Ok(()))
    }

    /// Like [`send`](Self::send), calling `register` with the assigned
    /// sequence number before any byte is written
    ///
    /// Replies therefore cannot arrive before the caller has recorded the
    /// request. If `register` fails nothing is written and the sequence
    /// number is not consumed.
    pub fn send_with<F>(&self, command: &mut Command, value: &[u8], register: F) -> Result<i64>
    where
        F: FnOnce(i64) -> Result<()>,
    {
        self.ensure_usable()?;
        let mut writer = self.writer.lock();
        self.ensure_usable()?;

        let sequence = writer.sequence;
        command.header.sequence = Some(sequence);
        command.header.connection_id = Some(self.connection_id());
        command.header.cluster_version = self.options.cluster_version;
        let command_bytes = command.to_bytes()?;

        register(sequence)?;
        writer.sequence += 1;

        tracing::trace!(
            parent: &self.span,
            sequence,
            message_type = ?command.message_type(),
            "Sending command"
        );
        self.write_envelope(&mut writer, command_bytes, value)?;
        Ok(sequence)
    }

    /// Called with the writer lock held
    fn write_envelope(
        &self,
        writer: &mut Writer,
        command_bytes: Vec<u8>,
        value: &[u8],
    ) -> Result<()> {
        let hmac = auth::compute_hmac(&command_bytes, &self.options.hmac_key)?;
        let message = Message::hmac(self.options.identity, hmac, command_bytes);
        let envelope = message.to_bytes()?;

        // Any failure once bytes may have hit the wire leaves the peer
        // mid-frame
        if let Err(e) = write_frame(&mut writer.stream, &envelope, value) {
            tracing::error!(parent: &self.span, "Write to {} failed: {}", self.peer_addr, e);
            self.mark_broken();
            return Err(e);
        }
        Ok(())
    }

    // =========================================================================
    // Receiving
    // =========================================================================

    /// Block until one complete, authenticated response is read
    ///
    /// A clean end of stream at a frame boundary returns `ConnectionClosed`.
    pub fn receive(&self) -> Result<Received> {
        self.ensure_usable()?;
        let mut reader = self.reader.lock();
        self.ensure_usable()?;

        let result = self.receive_locked(&mut reader);
        if let Err(e) = &result {
            self.on_receive_error(e);
        }
        result
    }

    fn receive_locked(&self, reader: &mut BufReader<TcpStream>) -> Result<Received> {
        let frame = read_frame(reader, self.options.max_segment_len)?
            .ok_or(KineticError::ConnectionClosed)?;

        let message = Message::from_bytes(&frame.command)?;
        auth::authenticate(&message, &self.options.hmac_key)?;
        let command = Command::from_bytes(&message.command_bytes)?;
        if message.auth_type == AuthType::UnsolicitedStatus {
            auth::check_unsolicited(&command)?;
        }

        if let Some(id) = command.header.connection_id {
            self.connection_id.store(id, Ordering::SeqCst);
        }

        tracing::trace!(
            parent: &self.span,
            ack_sequence = ?command.header.ack_sequence,
            message_type = ?command.message_type(),
            "Received command"
        );

        Ok(Received {
            message,
            command,
            value: frame.value,
        })
    }

    fn on_receive_error(&self, error: &KineticError) {
        match error {
            KineticError::ConnectionClosed => {
                if self.transition(STATE_OPEN, STATE_CLOSED) {
                    tracing::debug!(
                        parent: &self.span,
                        "Drive {} closed the connection",
                        self.peer_addr
                    );
                }
            }
            e if e.is_fatal() => {
                tracing::error!(
                    parent: &self.span,
                    "Receive from {} failed: {}",
                    self.peer_addr,
                    e
                );
                self.mark_broken();
            }
            _ => {}
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Close the connection
    ///
    /// Shuts the socket down in both directions so a read blocked in another
    /// thread fails promptly. Safe to call more than once.
    pub fn close(&self) {
        let previous = self.state.swap(STATE_CLOSED, Ordering::SeqCst);
        if previous == STATE_CLOSED {
            return;
        }
        if let Err(e) = self.stream.shutdown(Shutdown::Both) {
            tracing::debug!(parent: &self.span, "Socket shutdown: {}", e);
        }
        tracing::info!(parent: &self.span, "Connection to {} closed", self.options.host);
    }

    fn mark_broken(&self) {
        if self.transition(STATE_OPEN, STATE_BROKEN) {
            let _ = self.stream.shutdown(Shutdown::Both);
        }
    }

    fn transition(&self, from: u8, to: u8) -> bool {
        self.state
            .compare_exchange(from, to, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    fn ensure_usable(&self) -> Result<()> {
        match self.state() {
            ConnectionState::Open => Ok(()),
            ConnectionState::Broken => Err(KineticError::ConnectionUnusable),
            ConnectionState::Closed => Err(KineticError::ConnectionClosed),
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn state(&self) -> ConnectionState {
        match self.state.load(Ordering::SeqCst) {
            STATE_OPEN => ConnectionState::Open,
            STATE_BROKEN => ConnectionState::Broken,
            _ => ConnectionState::Closed,
        }
    }

    pub fn is_usable(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Connection id learned from the drive (0 before the handshake)
    pub fn connection_id(&self) -> i64 {
        self.connection_id.load(Ordering::SeqCst)
    }

    /// Sequence number the next `send` will use
    pub fn next_sequence(&self) -> i64 {
        self.writer.lock().sequence
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }

    pub fn span(&self) -> &Span {
        &self.span
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}

/// Connect to the first reachable address for `host:port`
fn dial(options: &ClientOptions) -> std::io::Result<TcpStream> {
    let mut last_error = None;

    for addr in (options.host.as_str(), options.port).to_socket_addrs()? {
        let attempt = match options.connect_timeout {
            Some(timeout) => TcpStream::connect_timeout(&addr, timeout),
            None => TcpStream::connect(addr),
        };
        match attempt {
            Ok(stream) => return Ok(stream),
            Err(e) => last_error = Some(e),
        }
    }

    Err(last_error.unwrap_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::AddrNotAvailable,
            "host resolved to no addresses",
        )
    }))
}
