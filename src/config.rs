//! Client configuration types.
//!
//! This module defines [`ClientConfig`] and its builder, used to configure
//! the transport and retry behavior for a client instance.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::defaults;

/// Client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the API
    pub api_base: String,
    /// Timeout for establishing a connection
    #[serde(with = "duration_secs_serde")]
    pub open_timeout: Duration,
    /// Timeout for reading a response
    #[serde(with = "duration_secs_serde")]
    pub read_timeout: Duration,
    /// Maximum number of retry attempts for transient failures
    pub max_retries: u32,
    /// Whether to verify the server's TLS certificate.
    ///
    /// Disabled by default to match the platform's historical client
    /// behavior. This default is unsafe: with verification off the transport
    /// accepts any certificate, and the first connection built this way logs
    /// a process-wide warning. Production deployments should opt in with
    /// [`ClientConfigBuilder::verify_ssl_certs`].
    pub verify_ssl_certs: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base: defaults::http::API_BASE.to_string(),
            open_timeout: defaults::http::OPEN_TIMEOUT,
            read_timeout: defaults::http::READ_TIMEOUT,
            max_retries: defaults::retry::MAX_RETRIES,
            verify_ssl_certs: false,
        }
    }
}

impl ClientConfig {
    /// Returns a builder for constructing `ClientConfig`
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::new()
    }
}

/// Builder for `ClientConfig` to construct configuration in a unified and
/// safe way
#[derive(Debug, Clone, Default)]
pub struct ClientConfigBuilder {
    api_base: Option<String>,
    open_timeout: Option<Duration>,
    read_timeout: Option<Duration>,
    max_retries: Option<u32>,
    verify_ssl_certs: Option<bool>,
}

impl ClientConfigBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self::default()
    }

    pub fn api_base<S: Into<String>>(mut self, api_base: S) -> Self {
        self.api_base = Some(api_base.into());
        self
    }

    pub fn open_timeout(mut self, open_timeout: Duration) -> Self {
        self.open_timeout = Some(open_timeout);
        self
    }

    pub fn read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = Some(read_timeout);
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    pub fn verify_ssl_certs(mut self, verify: bool) -> Self {
        self.verify_ssl_certs = Some(verify);
        self
    }

    /// Build the configuration
    pub fn build(self) -> ClientConfig {
        let base = ClientConfig::default();
        ClientConfig {
            api_base: self.api_base.unwrap_or(base.api_base),
            open_timeout: self.open_timeout.unwrap_or(base.open_timeout),
            read_timeout: self.read_timeout.unwrap_or(base.read_timeout),
            max_retries: self.max_retries.unwrap_or(base.max_retries),
            verify_ssl_certs: self.verify_ssl_certs.unwrap_or(base.verify_ssl_certs),
        }
    }
}

// Helper module for Duration serialization
mod duration_secs_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
