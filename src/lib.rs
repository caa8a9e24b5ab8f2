//! keystone-erp
//!
//! Synchronous Rust client binding for the Keystone ERP platform API. Turns
//! method calls into authenticated HTTP requests, absorbs transient network
//! failure with bounded retries, classifies terminal failures into a typed
//! taxonomy, and parses responses into a structured result.
//!
//! ```rust,no_run
//! use keystone_erp::{ClientConfig, ErpClient, RequestOptions};
//! use serde_json::json;
//!
//! # fn main() -> Result<(), keystone_erp::ErpError> {
//! let client = ErpClient::new(
//!     ClientConfig::builder()
//!         .api_base("https://api.keystone-erp.com")
//!         .max_retries(3)
//!         .build(),
//! );
//! let response = client.get(
//!     "/v1/invoices",
//!     RequestOptions::new()
//!         .with_header("Authorization", "Bearer sk_live_…")
//!         .with_params(json!({"limit": 10})),
//! )?;
//! println!("{}", response.payload());
//! # Ok(())
//! # }
//! ```
#![deny(unsafe_code)]

pub mod client;
pub mod config;
pub mod connection;
pub mod context;
pub mod defaults;
pub mod error;
pub mod params;
pub mod response;
pub mod retry;
pub mod user_agent;

pub use client::{ErpClient, RequestOptions};
pub use config::ClientConfig;
pub use context::RequestContext;
pub use error::ErpError;
pub use response::ErpResponse;
pub use retry::RetryPolicy;

// Re-exported so callers can name methods without importing reqwest.
pub use reqwest::Method;
