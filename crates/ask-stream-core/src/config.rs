//! Client configuration.
//!
//! This module defines where queries are sent and how long the transport
//! waits for the endpoint.

use std::time::Duration;

use serde::Deserialize;

/// Configuration for the answer endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the site serving the endpoint (e.g., "http://localhost:3000").
    #[serde(default = "ClientConfig::default_base_url")]
    pub base_url: String,

    /// Path of the streaming answer endpoint.
    #[serde(default = "ClientConfig::default_endpoint")]
    pub endpoint: String,

    /// Optional bearer token sent with every query.
    #[serde(default)]
    pub api_token: Option<String>,

    /// Connection timeout in seconds.
    #[serde(default = "ClientConfig::default_connect_timeout")]
    pub connect_timeout_seconds: u64,

    /// Whole-request timeout in seconds. Unset means answers may stream
    /// for as long as the endpoint keeps the connection open.
    #[serde(default)]
    pub request_timeout_seconds: Option<u64>,
}

impl ClientConfig {
    fn default_base_url() -> String {
        "http://localhost:3000".to_string()
    }

    fn default_endpoint() -> String {
        "/api/ai".to_string()
    }

    const fn default_connect_timeout() -> u64 {
        10
    }

    /// Full URL the query is posted to.
    #[must_use]
    pub fn endpoint_url(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        if self.endpoint.starts_with('/') {
            format!("{base}{}", self.endpoint)
        } else {
            format!("{base}/{}", self.endpoint)
        }
    }

    /// Get the connect timeout as a `Duration`.
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }

    /// Get the request timeout as a `Duration`, if one is configured.
    #[must_use]
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_seconds.map(Duration::from_secs)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: Self::default_base_url(),
            endpoint: Self::default_endpoint(),
            api_token: None,
            connect_timeout_seconds: Self::default_connect_timeout(),
            request_timeout_seconds: None,
        }
    }
}
