//! Default Configuration Values
//!
//! This module centralizes all default values used throughout the binding.
//! Having defaults in one place makes them easier to maintain, document, and
//! adjust.

use std::time::Duration;

/// HTTP transport default configurations
pub mod http {
    use super::*;

    /// Default base URL for the Keystone ERP API
    pub const API_BASE: &str = "https://api.keystone-erp.com";

    /// Default timeout for establishing a connection
    ///
    /// Set to 30 seconds which is generous for most network conditions;
    /// Keystone deployments are frequently reached through corporate proxies
    /// that add noticeable connect latency.
    pub const OPEN_TIMEOUT: Duration = Duration::from_secs(30);

    /// Default timeout for reading a response
    ///
    /// Set to 80 seconds to accommodate report-style endpoints that can take
    /// well over a minute to materialize a result.
    pub const READ_TIMEOUT: Duration = Duration::from_secs(80);
}

/// Retry and backoff defaults
pub mod retry {
    use super::*;

    /// Default maximum number of retry attempts
    pub const MAX_RETRIES: u32 = 3;

    /// Base delay for exponential backoff
    pub const INITIAL_BACKOFF: Duration = Duration::from_millis(500);

    /// Upper bound for any computed backoff delay
    pub const MAX_BACKOFF: Duration = Duration::from_secs(8);

    /// Default backoff multiplier (for exponential backoff)
    pub const BACKOFF_MULTIPLIER: f64 = 2.0;

    /// Default jitter factor for retry delays (0.0 to 1.0)
    pub const JITTER_FACTOR: f64 = 0.25;
}
