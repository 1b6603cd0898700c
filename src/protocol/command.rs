//! Command definitions
//!
//! The structured request/response unit carried inside an envelope's
//! command bytes. Only the header and status are interpreted by the
//! transport; the body is passed through to higher layers.

use serde::{Deserialize, Serialize};

use crate::error::{KineticError, Result};
use super::log::LogType;

/// Message types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageType {
    InvalidMessageType,
    Get,
    GetResponse,
    Put,
    PutResponse,
    Delete,
    DeleteResponse,
    GetNext,
    GetNextResponse,
    GetPrevious,
    GetPreviousResponse,
    GetKeyRange,
    GetKeyRangeResponse,
    GetVersion,
    GetVersionResponse,
    Setup,
    SetupResponse,
    GetLog,
    GetLogResponse,
    Security,
    SecurityResponse,
    Noop,
    NoopResponse,
    FlushAllData,
    FlushAllDataResponse,
    PinOp,
    PinOpResponse,
    MediaScan,
    MediaScanResponse,
    MediaOptimize,
    MediaOptimizeResponse,
}

/// Status codes as sent by the drive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusCode {
    InvalidStatusCode,
    NotAttempted,
    Success,
    HmacFailure,
    NotAuthorized,
    VersionFailure,
    InternalError,
    HeaderRequired,
    NotFound,
    VersionMismatch,
    ServiceBusy,
    Expired,
    DataError,
    PermDataError,
    RemoteConnectionError,
    NoSpace,
    NoSuchHmacAlgorithm,
    InvalidRequest,
    NestedOperationErrors,
    DeviceLocked,
    DeviceAlreadyUnlocked,
    ConnectionTerminated,
    InvalidBatch,
}

/// Command header
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    /// Cluster version the sender believes in
    pub cluster_version: i64,

    /// Server-assigned connection id (learned at handshake)
    pub connection_id: Option<i64>,

    /// Client-assigned request sequence number
    pub sequence: Option<i64>,

    /// Sequence number of the request a response answers
    pub ack_sequence: Option<i64>,

    /// Message type
    pub message_type: Option<MessageType>,

    /// Server-side timeout in milliseconds
    pub timeout: Option<u64>,
}

/// Key/value operation fields
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValue {
    pub key: Vec<u8>,
    pub new_version: Option<Vec<u8>>,
    pub db_version: Option<Vec<u8>>,
    pub tag: Option<Vec<u8>>,
    pub force: bool,
}

/// Log request/response fields
///
/// The drive fills the log payloads; converting them to domain
/// structures is left to the caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GetLog {
    pub types: Vec<LogType>,
    pub messages: Option<Vec<u8>>,
    pub device_name: Option<Vec<u8>>,
}

/// Operation-specific fields
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Body {
    pub key_value: Option<KeyValue>,
    pub get_log: Option<GetLog>,
}

/// Status carried by a response
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandStatus {
    /// `None` marks a malformed status that cannot be classified
    pub code: Option<StatusCode>,
    pub status_message: String,
    pub detailed_message: Vec<u8>,
}

/// A request or response command
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub header: Header,
    pub body: Body,
    pub status: Option<CommandStatus>,
}

impl Command {
    /// Create a request of the given type with an empty body
    pub fn new(message_type: MessageType) -> Self {
        Self {
            header: Header {
                message_type: Some(message_type),
                ..Header::default()
            },
            ..Self::default()
        }
    }

    /// Attach a status (used by drives and test servers)
    pub fn with_status(mut self, code: StatusCode, message: impl Into<String>) -> Self {
        self.status = Some(CommandStatus {
            code: Some(code),
            status_message: message.into(),
            detailed_message: Vec::new(),
        });
        self
    }

    /// Message type, if set
    pub fn message_type(&self) -> Option<MessageType> {
        self.header.message_type
    }

    /// Status code, if the command carries a well-formed status
    pub fn status_code(&self) -> Option<StatusCode> {
        self.status.as_ref().and_then(|s| s.code)
    }

    /// Serialize to command bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| KineticError::Serialization(e.to_string()))
    }

    /// Deserialize from command bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes)
            .map_err(|e| KineticError::Unmarshal(format!("command: {}", e)))
    }
}
