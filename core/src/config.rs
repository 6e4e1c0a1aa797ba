//! Client and transport settings.
//!
//! Both structs deserialize with every field optional, so they can be embedded
//! in an application's own configuration file.

use std::time::Duration;

use serde::Deserialize;

/// Diagnostic switches for `ApiClient`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Log every encoded JSON request body at debug level.
    pub log_request_bodies: bool,
    /// Log every response body at debug level before decoding.
    pub log_response_bodies: bool,
}

/// Settings for the HTTP backend.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Default whole-request timeout in seconds.
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            connect_timeout_secs: 10,
            user_agent: concat!("apiclient/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl TransportConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}
