//! Error Handling Module
//!
//! This module provides the failure taxonomy for the binding. Failures come
//! from two distinct surfaces and are kept apart deliberately:
//!
//! - Network-layer failures: no HTTP response was obtained (connection
//!   refused, TLS handshake failure, timeout, or anything unrecognized).
//!   These map to one fixed human-readable message per category, with the
//!   retry count and the low-level diagnostic appended.
//! - Application-layer failures: an HTTP response was obtained but signals an
//!   error. The response payload drives the construction of a specific error
//!   variant, and the originating [`ErpResponse`] is attached for inspection.

use crate::response::ErpResponse;
use thiserror::Error;

/// Error type for all Keystone ERP API operations
#[derive(Error, Debug, Clone)]
pub enum ErpError {
    /// No connection to the API host could be established.
    #[error("{0}")]
    ConnectionError(String),

    /// The request timed out while connecting or while reading the response.
    #[error("{0}")]
    TimeoutError(String),

    /// TLS handshake or certificate verification failed.
    #[error("{0}")]
    TlsError(String),

    /// Network-layer failure that fits no more specific category.
    #[error("{0}")]
    NetworkError(String),

    /// The API returned a structured error payload.
    #[error("{message} (status {status})")]
    ApiError {
        status: u16,
        message: String,
        request_id: Option<String>,
        response: Option<ErpResponse>,
    },

    /// The API rejected the request with a string-form error payload, which
    /// the platform uses for authentication-style failures.
    #[error("{message}")]
    AuthenticationError {
        message: String,
        request_id: Option<String>,
        response: Option<ErpResponse>,
    },

    /// The response body could not be interpreted as an API response.
    #[error("Invalid response object from API: {body} (HTTP response code was {status})")]
    MalformedResponse {
        status: u16,
        body: String,
        request_id: Option<String>,
    },

    /// Locally-detected invalid configuration or request input. Produced
    /// before any attempt is made; never retried.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

impl ErpError {
    /// Whether the retry loop may attempt this request again.
    ///
    /// Every variant is mapped explicitly so that a new failure category
    /// cannot be added without deciding its retry behavior.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::TimeoutError(_) => true,
            Self::ConnectionError(_) => true,
            Self::ApiError { status, .. } => *status == 409,
            Self::TlsError(_)
            | Self::NetworkError(_)
            | Self::AuthenticationError { .. }
            | Self::MalformedResponse { .. }
            | Self::ConfigurationError(_) => false,
        }
    }

    /// HTTP status associated with this error, when one was observed.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::ApiError { status, .. } | Self::MalformedResponse { status, .. } => Some(*status),
            Self::AuthenticationError { response, .. } => response.as_ref().map(|r| r.status()),
            _ => None,
        }
    }

    /// Request id assigned to the failing call, for log correlation.
    pub fn request_id(&self) -> Option<&str> {
        match self {
            Self::ApiError { request_id, .. }
            | Self::AuthenticationError { request_id, .. }
            | Self::MalformedResponse { request_id, .. } => request_id.as_deref(),
            _ => None,
        }
    }

    /// The originating response, when the failure carries one.
    pub fn response(&self) -> Option<&ErpResponse> {
        match self {
            Self::ApiError { response, .. } | Self::AuthenticationError { response, .. } => {
                response.as_ref()
            }
            _ => None,
        }
    }

    /// Fill in the request id on variants that carry one, if not already set.
    pub(crate) fn with_request_id(mut self, id: &str) -> Self {
        match &mut self {
            Self::ApiError { request_id, .. }
            | Self::AuthenticationError { request_id, .. }
            | Self::MalformedResponse { request_id, .. } => {
                if request_id.is_none() {
                    *request_id = Some(id.to_string());
                }
            }
            _ => {}
        }
        self
    }
}

const CONNECTION_MESSAGE: &str = "Could not connect to the Keystone ERP API. \
     Please check your internet connection and try again.";
const TLS_MESSAGE: &str = "Could not verify the Keystone ERP API server's TLS certificate. \
     Please make sure that your network is not intercepting certificates.";
const TIMEOUT_MESSAGE: &str = "Timed out waiting for a response from the Keystone ERP API. \
     Please check your internet connection and try again.";
const GENERIC_MESSAGE: &str = "Unexpected error communicating with the Keystone ERP API.";

/// Network failure categories, as observed on the transport before any HTTP
/// response exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NetworkKind {
    Connection,
    Timeout,
    Tls,
    Other,
}

impl NetworkKind {
    /// Classify a transport error into a network failure category.
    ///
    /// TLS problems surface through `reqwest` as connect errors, so the error
    /// chain text is inspected before the connect check.
    pub(crate) fn classify(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            return Self::Timeout;
        }
        let text = chain_text(err).to_lowercase();
        if text.contains("certificate") || text.contains("tls") || text.contains("handshake") {
            return Self::Tls;
        }
        if err.is_connect() {
            return Self::Connection;
        }
        Self::Other
    }

    fn message(self) -> &'static str {
        match self {
            Self::Connection => CONNECTION_MESSAGE,
            Self::Timeout => TIMEOUT_MESSAGE,
            Self::Tls => TLS_MESSAGE,
            Self::Other => GENERIC_MESSAGE,
        }
    }
}

/// Build the terminal error for a network-layer failure.
///
/// The message combines the category-specific explanation, the number of
/// retries performed (when any), and the low-level diagnostic text, so an
/// operator can distinguish "transient, try later" from "fundamentally
/// broken".
pub(crate) fn network_error(kind: NetworkKind, detail: &str, retries: u32) -> ErpError {
    let mut message = kind.message().to_string();
    if retries > 0 {
        message.push_str(&format!(" Request was retried {retries} times."));
    }
    message.push_str(&format!("\n\n(Network error: {detail})"));
    match kind {
        NetworkKind::Connection => ErpError::ConnectionError(message),
        NetworkKind::Timeout => ErpError::TimeoutError(message),
        NetworkKind::Tls => ErpError::TlsError(message),
        NetworkKind::Other => ErpError::NetworkError(message),
    }
}

/// Join an error with its source chain into one diagnostic string.
pub(crate) fn chain_text(err: &(dyn std::error::Error + 'static)) -> String {
    let mut parts = vec![err.to_string()];
    let mut source = err.source();
    while let Some(inner) = source {
        parts.push(inner.to_string());
        source = inner.source();
    }
    parts.join(": ")
}
