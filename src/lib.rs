//! # Kinetic
//!
//! Blocking transport for the Kinetic key/value protocol:
//! - Length-prefixed framing with a magic byte
//! - HMAC-SHA1 integrity over every command
//! - Handshake that learns the drive-assigned connection id
//! - Background reader that matches responses to requests by sequence
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Callers (any thread)                      │
//! └──────────────┬──────────────────────────────▲───────────────┘
//!                │ submit(command, callback)    │ success / failure
//! ┌──────────────▼──────────────┐   ┌───────────┴───────────────┐
//! │  Connection::send           │   │  MessageHandler::handle   │
//! │  (writer lock, sequence)    │   │  (classify by status)     │
//! └──────────────┬──────────────┘   └───────────▲───────────────┘
//!                │                              │
//!                │  pending table (seq → handler)
//!                │                              │
//! ┌──────────────▼──────────────┐   ┌───────────┴───────────────┐
//! │  HMAC tag → envelope        │   │  Reader thread            │
//! │  → frame                    │   │  frame → HMAC → command   │
//! └──────────────┬──────────────┘   └───────────▲───────────────┘
//!                │              TCP             │
//!                └──────────────────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod protocol;
pub mod auth;
pub mod status;
pub mod handler;
pub mod network;
pub mod client;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{KineticError, Result};
pub use config::ClientOptions;
pub use client::{Client, Response};
pub use handler::{Callback, Dispatched, MessageHandler};
pub use network::Connection;
pub use status::{Status, StatusCode};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of the crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
