//! Frame codec
//!
//! Encoding and decoding of the length-prefixed wire envelope.
//!
//! ## Wire Format
//! ```text
//! ┌───────────┬─────────────┬─────────────┬──────────────────┬─────────────────┐
//! │ Magic (1) │ CmdLen (4)  │ ValLen (4)  │ Command (CmdLen) │ Value (ValLen)  │
//! └───────────┴─────────────┴─────────────┴──────────────────┴─────────────────┘
//! ```
//!
//! Both lengths are big-endian `u32`. The value segment is only present
//! when its length is non-zero.

use std::io::{ErrorKind, Read, Write};

use bytes::Bytes;

use crate::error::{KineticError, Result};

/// Magic byte opening every frame
pub const MAGIC: u8 = b'F';

/// Header size: 1 byte magic + 4 bytes command length + 4 bytes value length
pub const HEADER_SIZE: usize = 9;

/// A decoded frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Command segment (the serialized envelope)
    pub command: Vec<u8>,

    /// Value segment, `None` when the declared length is zero
    pub value: Option<Bytes>,
}

// =============================================================================
// Encoding
// =============================================================================

/// Build the 9-byte frame header
pub fn encode_header(command_len: usize, value_len: usize) -> Result<[u8; HEADER_SIZE]> {
    let command_len = segment_len_u32(command_len)?;
    let value_len = segment_len_u32(value_len)?;

    let mut header = [0u8; HEADER_SIZE];
    header[0] = MAGIC;
    header[1..5].copy_from_slice(&command_len.to_be_bytes());
    header[5..9].copy_from_slice(&value_len.to_be_bytes());
    Ok(header)
}

/// Encode a complete frame to bytes
pub fn encode_frame(command: &[u8], value: &[u8]) -> Result<Vec<u8>> {
    let header = encode_header(command.len(), value.len())?;

    let mut frame = Vec::with_capacity(HEADER_SIZE + command.len() + value.len());
    frame.extend_from_slice(&header);
    frame.extend_from_slice(command);
    frame.extend_from_slice(value);
    Ok(frame)
}

fn segment_len_u32(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| KineticError::FrameTooLarge {
        len,
        max: u32::MAX as usize,
    })
}

// =============================================================================
// Decoding
// =============================================================================

/// Validate a header and return `(command_len, value_len)`
pub fn parse_header(header: &[u8; HEADER_SIZE], max_segment_len: usize) -> Result<(usize, usize)> {
    if header[0] != MAGIC {
        return Err(KineticError::InvalidMagic(header[0]));
    }

    let command_len = u32::from_be_bytes([header[1], header[2], header[3], header[4]]) as usize;
    let value_len = u32::from_be_bytes([header[5], header[6], header[7], header[8]]) as usize;

    for len in [command_len, value_len] {
        if len > max_segment_len {
            return Err(KineticError::FrameTooLarge {
                len,
                max: max_segment_len,
            });
        }
    }

    Ok((command_len, value_len))
}

/// Decode a frame held entirely in memory
pub fn decode_frame(mut bytes: &[u8], max_segment_len: usize) -> Result<Frame> {
    read_frame(&mut bytes, max_segment_len)?
        .ok_or_else(|| KineticError::TruncatedFrame("empty buffer".to_string()))
}

// =============================================================================
// Stream-based I/O helpers
// =============================================================================

/// Read one frame from a stream
///
/// Returns `Ok(None)` when the stream ends cleanly before the first header
/// byte. End of stream anywhere later is a truncated frame.
pub fn read_frame<R: Read>(reader: &mut R, max_segment_len: usize) -> Result<Option<Frame>> {
    let mut header = [0u8; HEADER_SIZE];

    // First byte alone: EOF here is a clean close, and a bad magic byte is
    // reported without waiting for the rest of a desynchronized header.
    loop {
        match reader.read(&mut header[..1]) {
            Ok(0) => return Ok(None),
            Ok(_) => break,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    if header[0] != MAGIC {
        return Err(KineticError::InvalidMagic(header[0]));
    }

    read_segment(reader, &mut header[1..], "header")?;
    let (command_len, value_len) = parse_header(&header, max_segment_len)?;

    let mut command = vec![0u8; command_len];
    read_segment(reader, &mut command, "command segment")?;

    let value = if value_len > 0 {
        let mut value = vec![0u8; value_len];
        read_segment(reader, &mut value, "value segment")?;
        Some(Bytes::from(value))
    } else {
        None
    };

    tracing::trace!(command_len, value_len, "Read frame");

    Ok(Some(Frame { command, value }))
}

/// Write one frame to a stream and flush it
pub fn write_frame<W: Write>(writer: &mut W, command: &[u8], value: &[u8]) -> Result<()> {
    let header = encode_header(command.len(), value.len())?;

    write_fully(writer, &header)?;
    write_fully(writer, command)?;
    if !value.is_empty() {
        write_fully(writer, value)?;
    }
    writer.flush()?;

    tracing::trace!(command_len = command.len(), value_len = value.len(), "Wrote frame");
    Ok(())
}

fn read_segment<R: Read>(reader: &mut R, buf: &mut [u8], what: &str) -> Result<()> {
    let expected = buf.len();
    reader.read_exact(buf).map_err(|e| match e.kind() {
        ErrorKind::UnexpectedEof => KineticError::TruncatedFrame(format!(
            "stream ended inside {} ({} bytes expected)",
            what, expected
        )),
        // Part of the frame may already be consumed, so the stream is lost
        ErrorKind::WouldBlock | ErrorKind::TimedOut => {
            KineticError::TruncatedFrame(format!("timed out inside {}", what))
        }
        _ => KineticError::Io(e),
    })
}

/// Write the whole buffer; a writer that stops accepting bytes is a short write
fn write_fully<W: Write>(writer: &mut W, buf: &[u8]) -> Result<()> {
    let mut written = 0;
    while written < buf.len() {
        match writer.write(&buf[written..]) {
            Ok(0) => {
                return Err(KineticError::ShortWrite {
                    written,
                    expected: buf.len(),
                })
            }
            Ok(n) => written += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}
