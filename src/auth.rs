//! Message integrity
//!
//! HMAC-SHA1 tagging and verification of command bytes. The tag covers the
//! big-endian `u32` length of the command bytes followed by the bytes
//! themselves.

use hmac::{Hmac, Mac};
use sha1::Sha1;

use crate::error::{KineticError, Result};
use crate::protocol::{AuthType, Command, Message};

type HmacSha1 = Hmac<Sha1>;

fn keyed_mac(command_bytes: &[u8], key: &[u8]) -> Result<HmacSha1> {
    let mut mac = <HmacSha1 as Mac>::new_from_slice(key)
        .map_err(|e| KineticError::Config(format!("invalid HMAC key: {}", e)))?;
    mac.update(&(command_bytes.len() as u32).to_be_bytes());
    mac.update(command_bytes);
    Ok(mac)
}

/// Compute the integrity tag for `command_bytes`
pub fn compute_hmac(command_bytes: &[u8], key: &[u8]) -> Result<Vec<u8>> {
    Ok(keyed_mac(command_bytes, key)?.finalize().into_bytes().to_vec())
}

/// Verify an envelope's tag in constant time
///
/// Returns `false` for envelopes without HMAC credentials.
pub fn validate_hmac(message: &Message, key: &[u8]) -> bool {
    match &message.hmac_auth {
        Some(auth) => keyed_mac(&message.command_bytes, key)
            .map(|mac| mac.verify_slice(&auth.hmac).is_ok())
            .unwrap_or(false),
        None => false,
    }
}

/// Check that a received envelope may be trusted
///
/// HMAC envelopes must carry a valid tag. Unsolicited status envelopes are
/// sent by the drive before any identity is known and carry no tag; their
/// command must still pass [`check_unsolicited`] once decoded.
pub fn authenticate(message: &Message, key: &[u8]) -> Result<()> {
    match message.auth_type {
        AuthType::HmacAuth => {
            if validate_hmac(message, key) {
                Ok(())
            } else {
                Err(KineticError::IntegrityFailure(
                    "HMAC does not match command bytes".to_string(),
                ))
            }
        }
        AuthType::UnsolicitedStatus => Ok(()),
        other => Err(KineticError::IntegrityFailure(format!(
            "unsupported auth type {:?}",
            other
        ))),
    }
}

/// Check the decoded command of an untagged unsolicited envelope
///
/// Such a command is status only. One that acknowledges a request would
/// complete it without any tag having been verified.
pub fn check_unsolicited(command: &Command) -> Result<()> {
    match command.header.ack_sequence {
        Some(sequence) => Err(KineticError::IntegrityFailure(format!(
            "untagged unsolicited status acknowledges sequence {}",
            sequence
        ))),
        None => Ok(()),
    }
}
