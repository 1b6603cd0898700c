//! Envelope definitions
//!
//! The authenticated wrapper carried in a frame's command segment.

use serde::{Deserialize, Serialize};

use crate::error::{KineticError, Result};

/// How the envelope is authenticated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthType {
    InvalidAuthType,
    /// Command bytes are tagged with an HMAC of the identity's key
    HmacAuth,
    /// Command bytes are authorized with a PIN (not supported by this client)
    PinAuth,
    /// Unsolicited status from the drive (handshake, forced disconnect)
    UnsolicitedStatus,
}

/// HMAC credentials attached to an envelope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HmacAuth {
    pub identity: i64,
    pub hmac: Vec<u8>,
}

/// The envelope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub auth_type: AuthType,
    pub hmac_auth: Option<HmacAuth>,
    /// Opaque serialized command
    pub command_bytes: Vec<u8>,
}

impl Message {
    /// Build an HMAC-authenticated envelope
    pub fn hmac(identity: i64, hmac: Vec<u8>, command_bytes: Vec<u8>) -> Self {
        Self {
            auth_type: AuthType::HmacAuth,
            hmac_auth: Some(HmacAuth { identity, hmac }),
            command_bytes,
        }
    }

    /// Build an unauthenticated unsolicited-status envelope
    pub fn unsolicited(command_bytes: Vec<u8>) -> Self {
        Self {
            auth_type: AuthType::UnsolicitedStatus,
            hmac_auth: None,
            command_bytes,
        }
    }

    /// Serialize to the frame's command segment
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| KineticError::Serialization(e.to_string()))
    }

    /// Deserialize from a frame's command segment
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes)
            .map_err(|e| KineticError::Unmarshal(format!("envelope: {}", e)))
    }
}
