//! Request Log Context
//!
//! An immutable-after-build record of one API call, used to correlate the
//! request and response sides of the structured logs. The executor creates
//! one context per call, folds response metadata into it when a response
//! arrives, and discards it when the call returns.

use reqwest::Method;
use uuid::Uuid;

use crate::response::ErpResponse;

/// Response header naming the account that served the request.
pub(crate) const ACCOUNT_HEADER: &str = "keystone-account";
/// Response header naming the API version that served the request.
pub(crate) const VERSION_HEADER: &str = "keystone-version";

/// Metadata for one API call.
#[derive(Debug, Clone)]
pub struct RequestContext {
    request_id: String,
    method: Method,
    path: String,
    user_id: Option<String>,
    body: Option<String>,
    query: Option<String>,
    account: Option<String>,
    api_version: Option<String>,
}

impl RequestContext {
    pub(crate) fn new(
        method: Method,
        path: &str,
        user_id: Option<String>,
        body: Option<String>,
        query: Option<String>,
    ) -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            method,
            path: path.to_string(),
            user_id,
            body,
            query,
            account: None,
            api_version: None,
        }
    }

    /// Fold response metadata into the context once a response arrives.
    pub(crate) fn absorb_response(&mut self, response: &ErpResponse) {
        if let Some(account) = response.header(ACCOUNT_HEADER) {
            self.account = Some(account.to_string());
        }
        if let Some(version) = response.header(VERSION_HEADER) {
            self.api_version = Some(version.to_string());
        }
    }

    /// Unique id assigned to this call, present in every log line.
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// Account reported by the response, when one has arrived.
    pub fn account(&self) -> Option<&str> {
        self.account.as_deref()
    }

    /// API version reported by the response, when one has arrived.
    pub fn api_version(&self) -> Option<&str> {
        self.api_version.as_deref()
    }
}
