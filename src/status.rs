//! Request status
//!
//! The structured status delivered to callbacks on failure. Remote codes
//! are translated from a drive's response; client codes describe transport
//! failures that happened before any response could be decoded.

use std::fmt;

use crate::error::KineticError;
use crate::protocol::{self, Command};

/// Status codes seen by callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    Ok,

    // -------------------------------------------------------------------------
    // Reported by the drive
    // -------------------------------------------------------------------------
    RemoteNotAttempted,
    RemoteHmacError,
    RemoteNotAuthorized,
    RemoteClusterVersionMismatch,
    RemoteInternalError,
    RemoteHeaderRequired,
    RemoteNotFound,
    RemoteVersionMismatch,
    RemoteServiceBusy,
    RemoteExpired,
    RemoteDataError,
    RemotePermDataError,
    RemoteConnectionError,
    RemoteNoSpace,
    RemoteNoSuchHmacAlgorithm,
    RemoteInvalidRequest,
    RemoteNestedOperationErrors,
    RemoteDeviceLocked,
    RemoteDeviceAlreadyUnlocked,
    RemoteConnectionTerminated,
    RemoteInvalidBatch,
    RemoteOtherError,

    // -------------------------------------------------------------------------
    // Raised locally
    // -------------------------------------------------------------------------
    ClientIoError,
    ClientConnectionClosed,
    ClientProtocolError,
    ClientIntegrityError,
    ClientInternalError,
}

impl From<protocol::StatusCode> for StatusCode {
    fn from(code: protocol::StatusCode) -> Self {
        use protocol::StatusCode as Wire;

        match code {
            Wire::Success => StatusCode::Ok,
            Wire::NotAttempted => StatusCode::RemoteNotAttempted,
            Wire::HmacFailure => StatusCode::RemoteHmacError,
            Wire::NotAuthorized => StatusCode::RemoteNotAuthorized,
            Wire::VersionFailure => StatusCode::RemoteClusterVersionMismatch,
            Wire::InternalError => StatusCode::RemoteInternalError,
            Wire::HeaderRequired => StatusCode::RemoteHeaderRequired,
            Wire::NotFound => StatusCode::RemoteNotFound,
            Wire::VersionMismatch => StatusCode::RemoteVersionMismatch,
            Wire::ServiceBusy => StatusCode::RemoteServiceBusy,
            Wire::Expired => StatusCode::RemoteExpired,
            Wire::DataError => StatusCode::RemoteDataError,
            Wire::PermDataError => StatusCode::RemotePermDataError,
            Wire::RemoteConnectionError => StatusCode::RemoteConnectionError,
            Wire::NoSpace => StatusCode::RemoteNoSpace,
            Wire::NoSuchHmacAlgorithm => StatusCode::RemoteNoSuchHmacAlgorithm,
            Wire::InvalidRequest => StatusCode::RemoteInvalidRequest,
            Wire::NestedOperationErrors => StatusCode::RemoteNestedOperationErrors,
            Wire::DeviceLocked => StatusCode::RemoteDeviceLocked,
            Wire::DeviceAlreadyUnlocked => StatusCode::RemoteDeviceAlreadyUnlocked,
            Wire::ConnectionTerminated => StatusCode::RemoteConnectionTerminated,
            Wire::InvalidBatch => StatusCode::RemoteInvalidBatch,
            Wire::InvalidStatusCode => StatusCode::RemoteOtherError,
        }
    }
}

/// Outcome of a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub code: StatusCode,
    pub message: String,
    /// Drive-supplied detail, empty for client errors
    pub detail: Vec<u8>,
}

impl Status {
    pub fn new(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            detail: Vec::new(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.code == StatusCode::Ok
    }

    /// Translate a command's status, if it carries a classifiable one
    pub fn from_command(command: &Command) -> Option<Self> {
        let status = command.status.as_ref()?;
        let code = status.code?;
        Some(Self {
            code: code.into(),
            message: status.status_message.clone(),
            detail: status.detailed_message.clone(),
        })
    }

    /// Status delivered to pending callers when the transport fails
    pub fn from_error(error: &KineticError) -> Self {
        let code = match error {
            KineticError::ConnectionClosed | KineticError::ConnectionUnusable => {
                StatusCode::ClientConnectionClosed
            }
            KineticError::Io(_) | KineticError::Dial { .. } | KineticError::ShortWrite { .. } => {
                StatusCode::ClientIoError
            }
            KineticError::IntegrityFailure(_) => StatusCode::ClientIntegrityError,
            KineticError::Handshake(inner) => return Self::from_error(inner),
            KineticError::Remote(status) => return status.clone(),
            KineticError::ResponseTimeout(_) => StatusCode::ClientIoError,
            KineticError::InvalidMagic(_)
            | KineticError::TruncatedFrame(_)
            | KineticError::FrameTooLarge { .. }
            | KineticError::Unmarshal(_) => StatusCode::ClientProtocolError,
            KineticError::Serialization(_)
            | KineticError::NoCallback
            | KineticError::Config(_) => StatusCode::ClientInternalError,
        };
        Self::new(code, error.to_string())
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{:?}", self.code)
        } else {
            write!(f, "{:?}: {}", self.code, self.message)
        }
    }
}
