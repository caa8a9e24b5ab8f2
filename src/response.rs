//! Response Model
//!
//! Wraps a raw HTTP response (status, headers, body) and the structured JSON
//! payload decoded from it. Parsing is attempted at construction time so that
//! a malformed body is distinguishable from a successful-but-empty payload:
//! an empty body decodes to an empty object, while invalid JSON fails
//! construction with [`ErpError::MalformedResponse`].

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::error::ErpError;

/// A parsed response from the Keystone ERP API.
///
/// Immutable once constructed; owned exclusively by the caller after return.
#[derive(Debug, Clone)]
pub struct ErpResponse {
    status: u16,
    headers: HashMap<String, String>,
    body: String,
    payload: Value,
}

impl ErpResponse {
    /// Construct a response from a raw status/headers/body triple.
    ///
    /// Header keys are expected lowercased (see
    /// [`params::headermap_to_hashmap`](crate::params::headermap_to_hashmap)).
    pub fn from_raw(
        status: u16,
        headers: HashMap<String, String>,
        body: String,
    ) -> Result<Self, ErpError> {
        let payload = if body.trim().is_empty() {
            Value::Object(Map::new())
        } else {
            serde_json::from_str(&body).map_err(|_| ErpError::MalformedResponse {
                status,
                body: body.clone(),
                request_id: None,
            })?
        };
        Ok(Self {
            status,
            headers,
            body,
            payload,
        })
    }

    /// HTTP status code.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Response headers with lowercased keys.
    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Look up a single header by name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(String::as_str)
    }

    /// Raw body text as received from the wire.
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Decoded structured payload.
    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// The embedded error descriptor, when the payload carries one.
    ///
    /// The platform reports application errors under a top-level `"error"`
    /// key, either as an object with a `"message"` field or as a bare string.
    pub fn error(&self) -> Option<&Value> {
        self.payload.get("error")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn parses_structured_payload() {
        let response = ErpResponse::from_raw(
            200,
            headers(&[("content-type", "application/json")]),
            r#"{"object":"invoice","id":"inv_42"}"#.to_string(),
        )
        .unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(response.payload()["id"], "inv_42");
        assert!(response.error().is_none());
    }

    #[test]
    fn empty_body_is_an_empty_payload_not_an_error() {
        let response = ErpResponse::from_raw(200, HashMap::new(), "  ".to_string()).unwrap();
        assert_eq!(response.payload(), &Value::Object(Map::new()));
    }

    #[test]
    fn invalid_body_fails_construction_with_original_text() {
        let err = ErpResponse::from_raw(200, HashMap::new(), "<html>oops</html>".to_string())
            .unwrap_err();
        match err {
            ErpError::MalformedResponse { status, body, .. } => {
                assert_eq!(status, 200);
                assert_eq!(body, "<html>oops</html>");
            }
            other => panic!("unexpected error variant: {other:?}"),
        }
    }

    #[test]
    fn extracts_embedded_error_descriptor() {
        let response = ErpResponse::from_raw(
            422,
            HashMap::new(),
            r#"{"error":{"message":"invalid field"}}"#.to_string(),
        )
        .unwrap();
        assert_eq!(response.error().unwrap()["message"], "invalid field");
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let response =
            ErpResponse::from_raw(200, headers(&[("keystone-account", "acct_9")]), String::new())
                .unwrap();
        assert_eq!(response.header("Keystone-Account"), Some("acct_9"));
    }
}
