//! Request configuration loaded from JSON and transport-level options.
//!
//! # Design
//! `RequestConfig` is the persisted shape a caller keeps around (host,
//! proxy, agent, timeouts); `Request::from_config` turns it into a live
//! request. Timeouts are plain milliseconds so the JSON stays readable.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::HttpError;

/// Default User-Agent value.
pub const DEFAULT_AGENT: &str = "VerySimpleHttpRequester";

/// Default destination port.
pub const DEFAULT_PORT: u16 = 80;

/// Default cap on the size of one response header block.
pub const DEFAULT_MAX_HEAD_BYTES: usize = 64 * 1024;

/// HTTP proxy the request is routed through instead of connecting directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proxy {
    pub host: String,
    pub port: u16,
}

impl Proxy {
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            host: host.to_string(),
            port,
        }
    }
}

/// Limits applied by the transport for the duration of one call.
///
/// `None` timeouts block for as long as the operating system allows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportOptions {
    pub connect_timeout: Option<Duration>,
    pub io_timeout: Option<Duration>,
    pub max_head_bytes: usize,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            connect_timeout: None,
            io_timeout: None,
            max_head_bytes: DEFAULT_MAX_HEAD_BYTES,
        }
    }
}

/// Serializable request settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestConfig {
    pub host: String,
    #[serde(default = "default_path")]
    pub path: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    #[serde(default)]
    pub use_ssl: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<Proxy>,
    #[serde(default)]
    pub headers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connect_timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub io_timeout_ms: Option<u64>,
}

fn default_path() -> String {
    "/".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl RequestConfig {
    pub fn from_json(json: &str) -> Result<Self, HttpError> {
        serde_json::from_str(json).map_err(|e| HttpError::Configuration(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String, HttpError> {
        serde_json::to_string(self).map_err(|e| HttpError::Configuration(e.to_string()))
    }

    pub fn options(&self) -> TransportOptions {
        TransportOptions {
            connect_timeout: self.connect_timeout_ms.map(Duration::from_millis),
            io_timeout: self.io_timeout_ms.map(Duration::from_millis),
            ..TransportOptions::default()
        }
    }
}
