//! Protocol Module
//!
//! Defines the wire protocol between client and drive.
//!
//! ## Frame Format
//! ```text
//! ┌───────────┬─────────────┬─────────────┬──────────────────┬─────────────────┐
//! │ 'F' (1)   │ CmdLen (4)  │ ValLen (4)  │ Envelope         │ Value           │
//! └───────────┴─────────────┴─────────────┴──────────────────┴─────────────────┘
//! ```
//!
//! ### Layers
//! - Frame: magic + two big-endian lengths + two segments
//! - Envelope (`Message`): auth type + HMAC + opaque command bytes
//! - `Command`: header (connection id, sequence, ack sequence), body, status

mod codec;
mod command;
mod log;
mod message;

pub use codec::{
    decode_frame, encode_frame, encode_header, parse_header, read_frame, write_frame, Frame,
    HEADER_SIZE, MAGIC,
};
pub use command::{
    Body, Command, CommandStatus, GetLog, Header, KeyValue, MessageType, StatusCode,
};
pub use log::LogType;
pub use message::{AuthType, HmacAuth, Message};
