//! Error types for the Kinetic transport
//!
//! Provides a unified error type for all transport operations.

use thiserror::Error;

use crate::status::Status;

/// Result type alias using KineticError
pub type Result<T> = std::result::Result<T, KineticError>;

/// Unified error type for Kinetic transport operations
#[derive(Debug, Error)]
pub enum KineticError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Short write: wrote {written} of {expected} bytes")]
    ShortWrite { written: usize, expected: usize },

    // -------------------------------------------------------------------------
    // Connection Lifecycle Errors
    // -------------------------------------------------------------------------
    #[error("Failed to connect to {addr}: {source}")]
    Dial {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Handshake failed: {0}")]
    Handshake(Box<KineticError>),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Connection is unusable after a previous fatal error")]
    ConnectionUnusable,

    // -------------------------------------------------------------------------
    // Framing Errors
    // -------------------------------------------------------------------------
    #[error("Invalid magic byte: 0x{0:02x}")]
    InvalidMagic(u8),

    #[error("Truncated frame: {0}")]
    TruncatedFrame(String),

    #[error("Frame segment too large: {len} bytes (max {max})")]
    FrameTooLarge { len: usize, max: usize },

    // -------------------------------------------------------------------------
    // Decoding / Integrity Errors
    // -------------------------------------------------------------------------
    #[error("Unmarshal error: {0}")]
    Unmarshal(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Integrity failure: {0}")]
    IntegrityFailure(String),

    // -------------------------------------------------------------------------
    // Request Errors
    // -------------------------------------------------------------------------
    #[error("No callback bound to message handler")]
    NoCallback,

    #[error("Request failed: {0}")]
    Remote(Status),

    #[error("Timed out waiting for response to sequence {0}")]
    ResponseTimeout(i64),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl KineticError {
    /// Whether this error leaves the connection permanently unusable
    ///
    /// Framing, decoding and integrity failures mean the stream can no
    /// longer be trusted; there is no resync. A read deadline expiring at a
    /// frame boundary is not fatal.
    pub fn is_fatal(&self) -> bool {
        if let KineticError::Io(_) = self {
            return !self.is_timeout();
        }
        matches!(
            self,
            KineticError::ShortWrite { .. }
                | KineticError::InvalidMagic(_)
                | KineticError::TruncatedFrame(_)
                | KineticError::FrameTooLarge { .. }
                | KineticError::Unmarshal(_)
                | KineticError::IntegrityFailure(_)
        )
    }

    /// Whether this is a read/write deadline expiring
    pub fn is_timeout(&self) -> bool {
        match self {
            KineticError::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
            ),
            _ => false,
        }
    }
}
