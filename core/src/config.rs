//! Construction-time configuration for transports, the protocol engine, and
//! the client façade.
//!
//! # Design
//! Every knob is chosen once when a client is built; nothing here is global.
//! All structs deserialize with `#[serde(default)]`, so a JSON document only
//! needs the fields it wants to change. The defaults reproduce the base
//! behavior exactly: a 2048-byte buffer, owning responses, copy writes, and
//! no timeouts.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::buffer::DEFAULT_CAPACITY;
use crate::error::{HttpClientError, Result};

/// How response fields relate to the engine's internal buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseMode {
    /// Fields borrow the internal buffer; valid until the next request.
    ZeroCopy,
    /// Fields are deep-copied into independently owned storage.
    #[default]
    Owning,
}

/// How a request with a body goes onto the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// Copy the body behind the header block and issue one `write`.
    #[default]
    Copy,
    /// Send header block and body as two segments of one `write_vectored`.
    Vectored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    #[default]
    Tcp,
    Unix,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    pub initial_buffer_capacity: usize,
    pub response_mode: ResponseMode,
    pub write_mode: WriteMode,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            initial_buffer_capacity: DEFAULT_CAPACITY,
            response_mode: ResponseMode::default(),
            write_mode: WriteMode::default(),
        }
    }
}

impl ProtocolConfig {
    pub fn zero_copy() -> Self {
        Self {
            response_mode: ResponseMode::ZeroCopy,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.initial_buffer_capacity == 0 {
            warn!("initial_buffer_capacity must be non-zero");
            return Err(HttpClientError::InitFailure.into());
        }
        Ok(())
    }
}

/// Optional blocking-I/O timeouts. `None` blocks indefinitely.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub connect_timeout_ms: Option<u64>,
    pub read_timeout_ms: Option<u64>,
    pub write_timeout_ms: Option<u64>,
}

impl TransportConfig {
    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_ms.map(Duration::from_millis)
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout_ms.map(Duration::from_millis)
    }

    pub fn write_timeout(&self) -> Option<Duration> {
        self.write_timeout_ms.map(Duration::from_millis)
    }

    /// Zero timeouts are rejected by the socket APIs, so reject them here.
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("connect_timeout_ms", self.connect_timeout_ms),
            ("read_timeout_ms", self.read_timeout_ms),
            ("write_timeout_ms", self.write_timeout_ms),
        ];
        for (name, value) in fields {
            if value == Some(0) {
                warn!(field = name, "timeout must be non-zero");
                return Err(HttpClientError::InitFailure.into());
            }
        }
        Ok(())
    }
}

/// Everything needed to build an `HttpClient` at runtime.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub transport: TransportKind,
    pub protocol: ProtocolConfig,
    pub transport_options: TransportConfig,
}

impl ClientConfig {
    /// Parse and validate a JSON document. Missing fields take defaults.
    pub fn from_json(raw: &str) -> Result<Self> {
        let config: ClientConfig = serde_json::from_str(raw).map_err(|e| {
            warn!(error = %e, "invalid client config");
            HttpClientError::InitFailure
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.protocol.validate()?;
        self.transport_options.validate()
    }
}
