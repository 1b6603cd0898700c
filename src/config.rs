//! Configuration for a Kinetic connection
//!
//! Centralized client options with sensible defaults.

use std::time::Duration;

use crate::error::{KineticError, Result};

/// Default Kinetic TCP port
pub const DEFAULT_PORT: u16 = 8123;

/// Default identity for the factory demo user
pub const DEFAULT_IDENTITY: i64 = 1;

/// Default HMAC key for the factory demo user
pub const DEFAULT_HMAC_KEY: &[u8] = b"asdfasdf";

/// Default maximum length of a single frame segment (16 MB)
pub const DEFAULT_MAX_SEGMENT_LEN: usize = 16 * 1024 * 1024;

/// Options used to open a connection
#[derive(Debug, Clone)]
pub struct ClientOptions {
    // -------------------------------------------------------------------------
    // Endpoint
    // -------------------------------------------------------------------------
    /// Host name or IP address of the drive
    pub host: String,

    /// TCP port of the drive
    pub port: u16,

    // -------------------------------------------------------------------------
    // Authentication
    // -------------------------------------------------------------------------
    /// Identity the HMAC key belongs to
    pub identity: i64,

    /// Shared secret used to tag and verify command bytes
    pub hmac_key: Vec<u8>,

    /// Cluster version stamped into every outgoing header
    pub cluster_version: i64,

    // -------------------------------------------------------------------------
    // Deadlines and limits
    // -------------------------------------------------------------------------
    /// Dial timeout (None blocks until the OS gives up)
    pub connect_timeout: Option<Duration>,

    /// Socket read timeout (None blocks forever)
    pub read_timeout: Option<Duration>,

    /// Socket write timeout (None blocks forever)
    pub write_timeout: Option<Duration>,

    /// Largest command or value segment accepted from the wire
    pub max_segment_len: usize,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            identity: DEFAULT_IDENTITY,
            hmac_key: DEFAULT_HMAC_KEY.to_vec(),
            cluster_version: 0,
            connect_timeout: Some(Duration::from_secs(5)),
            read_timeout: None,
            write_timeout: Some(Duration::from_secs(5)),
            max_segment_len: DEFAULT_MAX_SEGMENT_LEN,
        }
    }
}

impl ClientOptions {
    /// Create a new options builder
    pub fn builder() -> ClientOptionsBuilder {
        ClientOptionsBuilder::default()
    }

    /// `host:port` string used for dialing and logging
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check the options before dialing
    pub fn validate(&self) -> Result<()> {
        if self.host.is_empty() {
            return Err(KineticError::Config("host must not be empty".to_string()));
        }
        if self.port == 0 {
            return Err(KineticError::Config("port must not be 0".to_string()));
        }
        if self.hmac_key.is_empty() {
            return Err(KineticError::Config("HMAC key must not be empty".to_string()));
        }
        if self.max_segment_len == 0 || self.max_segment_len > u32::MAX as usize {
            return Err(KineticError::Config(format!(
                "max segment length must be between 1 and {}",
                u32::MAX
            )));
        }
        for (name, timeout) in [
            ("connect", self.connect_timeout),
            ("read", self.read_timeout),
            ("write", self.write_timeout),
        ] {
            if timeout == Some(Duration::ZERO) {
                return Err(KineticError::Config(format!(
                    "{} timeout must be non-zero (use None to disable)",
                    name
                )));
            }
        }
        Ok(())
    }
}

/// Builder for ClientOptions
#[derive(Default)]
pub struct ClientOptionsBuilder {
    options: ClientOptions,
}

impl ClientOptionsBuilder {
    /// Set the drive host
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.options.host = host.into();
        self
    }

    /// Set the drive port
    pub fn port(mut self, port: u16) -> Self {
        self.options.port = port;
        self
    }

    /// Set the identity the key belongs to
    pub fn identity(mut self, identity: i64) -> Self {
        self.options.identity = identity;
        self
    }

    /// Set the HMAC key
    pub fn hmac_key(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.options.hmac_key = key.into();
        self
    }

    /// Set the cluster version
    pub fn cluster_version(mut self, version: i64) -> Self {
        self.options.cluster_version = version;
        self
    }

    /// Set the dial timeout
    pub fn connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.options.connect_timeout = timeout;
        self
    }

    /// Set the socket read timeout
    pub fn read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.options.read_timeout = timeout;
        self
    }

    /// Set the socket write timeout
    pub fn write_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.options.write_timeout = timeout;
        self
    }

    /// Set the maximum accepted segment length
    pub fn max_segment_len(mut self, len: usize) -> Self {
        self.options.max_segment_len = len;
        self
    }

    pub fn build(self) -> ClientOptions {
        self.options
    }
}
