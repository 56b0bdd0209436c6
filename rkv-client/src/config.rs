//! # Transport Configuration
//!
//! Socket-level options applied when a `Connection` opens its stream. The
//! client itself never times out a command; these only set deadlines on the
//! underlying TCP socket.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Transport options for a single connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Optional TCP connect timeout in milliseconds. Zero means none, as for
    /// the read and write timeouts.
    pub connect_timeout_ms: Option<u64>,
    /// Optional TCP read timeout in milliseconds.
    pub read_timeout_ms: Option<u64>,
    /// Optional TCP write timeout in milliseconds.
    pub write_timeout_ms: Option<u64>,
    /// Disable Nagle on the socket.
    pub nodelay: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            connect_timeout_ms: None,
            read_timeout_ms: None,
            write_timeout_ms: None,
            nodelay: true,
        }
    }
}

impl ClientConfig {
    /// Parses a config from JSON. Missing fields keep their defaults.
    pub fn from_json(input: &str) -> serde_json::Result<Self> {
        serde_json::from_str(input)
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        millis(self.connect_timeout_ms)
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        millis(self.read_timeout_ms)
    }

    pub fn write_timeout(&self) -> Option<Duration> {
        millis(self.write_timeout_ms)
    }
}

// The socket APIs reject a zero duration.
fn millis(value: Option<u64>) -> Option<Duration> {
    value.filter(|ms| *ms > 0).map(Duration::from_millis)
}
