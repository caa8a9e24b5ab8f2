//! Request Executor
//!
//! The execution pipeline for one API call:
//!
//! 1. Resolve the effective API base (per-request override > configured).
//! 2. Partition parameters into query string or encoded/multipart body by
//!    method semantics.
//! 3. Merge default headers with caller headers (caller wins on conflict).
//! 4. Build a [`RequestContext`] for log correlation.
//! 5. Drive the retry loop against the thread's cached transport.
//! 6. Parse the raw response into an [`ErpResponse`].
//! 7. Record the parsed response as the client's last response and return it.
//!
//! Exactly one of `Ok(ErpResponse)` / `Err(ErpError)` results from every
//! call.

use std::collections::HashMap;
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

use reqwest::blocking::multipart::Form;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use reqwest::{Method, Url};
use serde_json::Value;

use crate::config::ClientConfig;
use crate::connection;
use crate::context::RequestContext;
use crate::error::{self, ErpError, NetworkKind};
use crate::params;
use crate::response::ErpResponse;
use crate::retry::{RetryPolicy, RetryState};
use crate::user_agent;

/// Header carrying the JSON identity mapping.
const CLIENT_USER_AGENT_HEADER: &str = "x-keystone-client-user-agent";
/// Default content type for encoded bodies.
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Per-request options for [`ErpClient::execute`].
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Extra headers; these win over the client defaults on conflict.
    pub headers: HashMap<String, String>,
    /// Nested parameter structure, sent as query or body by method semantics.
    pub params: Value,
    /// Per-request API base override.
    pub api_base: Option<String>,
    /// Acting user, recorded in the request context for observability.
    pub user_id: Option<String>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_params(mut self, params: Value) -> Self {
        self.params = params;
        self
    }

    pub fn with_header<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn with_api_base<S: Into<String>>(mut self, api_base: S) -> Self {
        self.api_base = Some(api_base.into());
        self
    }

    pub fn with_user_id<S: Into<String>>(mut self, user_id: S) -> Self {
        self.user_id = Some(user_id.into());
        self
    }
}

/// Request body, as partitioned from the caller's parameters.
#[derive(Debug, Clone)]
enum RequestBody {
    None,
    Form(String),
    Multipart(Vec<(String, String)>),
}

/// Raw transport response before parsing.
struct RawResponse {
    status: u16,
    headers: HashMap<String, String>,
    body: String,
}

/// Synchronous client for the Keystone ERP API.
///
/// One client instance holds the configuration, the retry policy, and the
/// identity mapping computed once at construction. The transport connection
/// itself is cached per calling thread and reused across sequential calls.
pub struct ErpClient {
    config: ClientConfig,
    retry_policy: RetryPolicy,
    user_agent: String,
    client_user_agent: String,
    last_response: Mutex<Option<ErpResponse>>,
}

impl ErpClient {
    /// Create a client from a configuration.
    pub fn new(config: ClientConfig) -> Self {
        let identity = user_agent::identity();
        Self {
            retry_policy: RetryPolicy::from_config(&config),
            user_agent: user_agent::user_agent_string(),
            client_user_agent: serde_json::to_string(&identity)
                .unwrap_or_else(|_| String::from("{}")),
            config,
            last_response: Mutex::new(None),
        }
    }

    /// Replace the retry policy derived from the configuration.
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The most recent parsed response seen by this client, for caller
    /// introspection after a call returns.
    pub fn last_response(&self) -> Option<ErpResponse> {
        self.last_response.lock().map(|guard| guard.clone()).unwrap_or(None)
    }

    pub fn get(&self, path: &str, options: RequestOptions) -> Result<ErpResponse, ErpError> {
        self.execute(Method::GET, path, options)
    }

    pub fn post(&self, path: &str, options: RequestOptions) -> Result<ErpResponse, ErpError> {
        self.execute(Method::POST, path, options)
    }

    pub fn put(&self, path: &str, options: RequestOptions) -> Result<ErpResponse, ErpError> {
        self.execute(Method::PUT, path, options)
    }

    pub fn delete(&self, path: &str, options: RequestOptions) -> Result<ErpResponse, ErpError> {
        self.execute(Method::DELETE, path, options)
    }

    /// Execute one API call.
    pub fn execute(
        &self,
        method: Method,
        path: &str,
        options: RequestOptions,
    ) -> Result<ErpResponse, ErpError> {
        // 1. Resolve the effective API base
        let api_base = options.api_base.as_deref().unwrap_or(&self.config.api_base);

        // 2. Partition parameters by method semantics
        let multipart = wants_multipart(&options.headers);
        let (query, body) = partition_params(&method, &options.params, multipart);

        let url = build_url(api_base, path, query.as_deref())?;

        // 3. Merge default headers with caller headers
        let headers = self.build_headers(&options.headers, multipart)?;

        // 4. Build the request context
        let mut context = RequestContext::new(
            method.clone(),
            path,
            options.user_id.clone(),
            describe_body(&body),
            query.clone(),
        );

        // 5. Retry loop
        let raw = self.execute_with_retries(&url, &method, &headers, &body, &mut context)?;

        // 6. Parse the raw response
        let response = ErpResponse::from_raw(raw.status, raw.headers, raw.body)
            .map_err(|e| e.with_request_id(context.request_id()))?;
        context.absorb_response(&response);

        // 7. Record the last response, then return it
        if let Ok(mut guard) = self.last_response.lock() {
            *guard = Some(response.clone());
        }
        Ok(response)
    }

    /// Drive attempts until a 2xx response is obtained or a terminal error is
    /// classified. State machine: Attempting -> Done on success, Attempting
    /// -> Attempting on a retryable failure, Attempting -> Failed otherwise.
    fn execute_with_retries(
        &self,
        url: &Url,
        method: &Method,
        headers: &HeaderMap,
        body: &RequestBody,
        context: &mut RequestContext,
    ) -> Result<RawResponse, ErpError> {
        let transport = connection::for_current_thread(&self.config)?;
        let mut state = RetryState::new();

        loop {
            self.log_request(context, &state);
            let started = Instant::now();

            let failure = match attempt(&transport, url, method, headers, body) {
                Ok(raw) => {
                    self.log_response(context, &raw, started.elapsed(), &state);
                    if (200..300).contains(&raw.status) {
                        return Ok(raw);
                    }
                    self.application_error(raw, context)
                }
                Err(transport_error) => {
                    let kind = NetworkKind::classify(&transport_error);
                    let detail = error::chain_text(&transport_error);
                    let failure = error::network_error(kind, &detail, state.retries);
                    self.log_network_failure(context, &failure, started.elapsed());
                    failure
                }
            };

            if self.retry_policy.should_retry(&failure, state.retries) {
                let delay = self.retry_policy.backoff(state.retries);
                state.record_retry();
                tracing::debug!(
                    target: "keystone_erp::client",
                    request_id = %context.request_id(),
                    retries = state.retries,
                    delay_ms = delay.as_millis() as u64,
                    total_elapsed_ms = state.elapsed().as_millis() as u64,
                    "retrying after backoff"
                );
                thread::sleep(delay);
                continue;
            }

            return Err(failure);
        }
    }

    /// Classify a non-2xx response into an application-layer error.
    ///
    /// A structured `"error"` object drives an [`ErpError::ApiError`]; a
    /// string-form error is the platform's authentication-style failure; an
    /// unparseable body or a missing error payload falls back to
    /// [`ErpError::MalformedResponse`] with the literal status and body.
    fn application_error(&self, raw: RawResponse, context: &mut RequestContext) -> ErpError {
        let request_id = Some(context.request_id().to_string());
        match ErpResponse::from_raw(raw.status, raw.headers, raw.body) {
            Ok(response) => {
                context.absorb_response(&response);
                match response.error().cloned() {
                    Some(Value::String(message)) => ErpError::AuthenticationError {
                        message,
                        request_id,
                        response: Some(response),
                    },
                    Some(descriptor) => {
                        let message = descriptor
                            .get("message")
                            .and_then(Value::as_str)
                            .map(str::to_owned)
                            .unwrap_or_else(|| descriptor.to_string());
                        ErpError::ApiError {
                            status: response.status(),
                            message,
                            request_id,
                            response: Some(response),
                        }
                    }
                    None => ErpError::MalformedResponse {
                        status: response.status(),
                        body: response.body().to_string(),
                        request_id,
                    },
                }
            }
            Err(err) => err.with_request_id(context.request_id()),
        }
    }

    /// Default headers merged with caller headers; caller values win.
    fn build_headers(
        &self,
        extra: &HashMap<String, String>,
        multipart: bool,
    ) -> Result<HeaderMap, ErpError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&self.user_agent).map_err(|e| {
                ErpError::ConfigurationError(format!("invalid user agent: {e}"))
            })?,
        );
        headers.insert(
            HeaderName::from_static(CLIENT_USER_AGENT_HEADER),
            HeaderValue::from_str(&self.client_user_agent).map_err(|e| {
                ErpError::ConfigurationError(format!("invalid client identity header: {e}"))
            })?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(FORM_CONTENT_TYPE));

        for (key, value) in extra {
            let name = HeaderName::from_bytes(key.as_bytes()).map_err(|e| {
                ErpError::ConfigurationError(format!("invalid header name '{key}': {e}"))
            })?;
            let value = HeaderValue::from_str(value).map_err(|e| {
                ErpError::ConfigurationError(format!("invalid header value for '{key}': {e}"))
            })?;
            headers.insert(name, value);
        }

        // The transport sets the multipart content type itself, including the
        // part boundary; a caller-supplied value would be missing it.
        if multipart {
            headers.remove(CONTENT_TYPE);
        }
        Ok(headers)
    }

    fn log_request(&self, context: &RequestContext, state: &RetryState) {
        tracing::info!(
            target: "keystone_erp::client",
            request_id = %context.request_id(),
            method = %context.method(),
            path = %context.path(),
            retries = state.retries,
            "sending request"
        );
        tracing::debug!(
            target: "keystone_erp::client",
            request_id = %context.request_id(),
            user_id = context.user_id().unwrap_or(""),
            query = context.query().unwrap_or(""),
            body = context.body().unwrap_or(""),
            "request payload"
        );
    }

    fn log_response(
        &self,
        context: &RequestContext,
        raw: &RawResponse,
        elapsed: Duration,
        state: &RetryState,
    ) {
        tracing::info!(
            target: "keystone_erp::client",
            request_id = %context.request_id(),
            status = raw.status,
            elapsed_ms = elapsed.as_millis() as u64,
            retries = state.retries,
            "response received"
        );
        tracing::debug!(
            target: "keystone_erp::client",
            request_id = %context.request_id(),
            status = raw.status,
            body = %raw.body,
            "response payload"
        );
    }

    fn log_network_failure(&self, context: &RequestContext, error: &ErpError, elapsed: Duration) {
        tracing::error!(
            target: "keystone_erp::client",
            request_id = %context.request_id(),
            elapsed_ms = elapsed.as_millis() as u64,
            err = %error,
            "request failed without a response"
        );
    }
}

/// Send one request and read the full response. Any error here means no
/// usable HTTP response was obtained.
fn attempt(
    transport: &reqwest::blocking::Client,
    url: &Url,
    method: &Method,
    headers: &HeaderMap,
    body: &RequestBody,
) -> Result<RawResponse, reqwest::Error> {
    let mut request = transport.request(method.clone(), url.clone()).headers(headers.clone());
    match body {
        RequestBody::None => {}
        RequestBody::Form(encoded) => {
            request = request.body(encoded.clone());
        }
        RequestBody::Multipart(pairs) => {
            let mut form = Form::new();
            for (key, value) in pairs {
                form = form.text(key.clone(), value.clone());
            }
            request = request.multipart(form);
        }
    }

    let response = request.send()?;
    let status = response.status().as_u16();
    let headers = params::headermap_to_hashmap(response.headers());
    let body = response.text()?;
    Ok(RawResponse {
        status,
        headers,
        body,
    })
}

/// Whether the caller asked for a multipart body.
fn wants_multipart(headers: &HashMap<String, String>) -> bool {
    headers.iter().any(|(key, value)| {
        key.eq_ignore_ascii_case("content-type") && value.contains("multipart/form-data")
    })
}

/// Split parameters into a query string or a body by method semantics:
/// read-style verbs carry no body, everything else encodes the parameters,
/// and a multipart request passes the flattened pairs through unencoded.
fn partition_params(
    method: &Method,
    params: &Value,
    multipart: bool,
) -> (Option<String>, RequestBody) {
    if params.is_null() {
        return (None, RequestBody::None);
    }
    if is_bodyless(method) {
        let query = params::encode(params);
        let query = if query.is_empty() { None } else { Some(query) };
        (query, RequestBody::None)
    } else if multipart {
        (None, RequestBody::Multipart(params::flatten(params)))
    } else {
        (None, RequestBody::Form(params::encode(params)))
    }
}

fn is_bodyless(method: &Method) -> bool {
    matches!(method.as_str(), "GET" | "HEAD" | "DELETE")
}

fn build_url(api_base: &str, path: &str, query: Option<&str>) -> Result<Url, ErpError> {
    let mut url = format!(
        "{}/{}",
        api_base.trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    if let Some(query) = query {
        url.push('?');
        url.push_str(query);
    }
    Url::parse(&url)
        .map_err(|e| ErpError::ConfigurationError(format!("invalid request URL '{url}': {e}")))
}

fn describe_body(body: &RequestBody) -> Option<String> {
    match body {
        RequestBody::None => None,
        RequestBody::Form(encoded) => Some(encoded.clone()),
        RequestBody::Multipart(pairs) => Some(format!("multipart form ({} parts)", pairs.len())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn read_style_verbs_send_params_as_query() {
        let (query, body) = partition_params(&Method::GET, &json!({"limit": 3}), false);
        assert_eq!(query.as_deref(), Some("limit=3"));
        assert!(matches!(body, RequestBody::None));

        let (query, body) = partition_params(&Method::DELETE, &json!({"force": true}), false);
        assert_eq!(query.as_deref(), Some("force=true"));
        assert!(matches!(body, RequestBody::None));
    }

    #[test]
    fn write_style_verbs_encode_params_into_the_body() {
        let (query, body) =
            partition_params(&Method::POST, &json!({"amount": 10, "currency": "usd"}), false);
        assert!(query.is_none());
        match body {
            RequestBody::Form(encoded) => assert_eq!(encoded, "amount=10&currency=usd"),
            other => panic!("unexpected body: {other:?}"),
        }
    }

    #[test]
    fn multipart_passes_flattened_pairs_through_unencoded() {
        let (query, body) = partition_params(&Method::POST, &json!({"file name": "a b"}), true);
        assert!(query.is_none());
        match body {
            RequestBody::Multipart(pairs) => {
                assert_eq!(pairs, vec![("file name".to_string(), "a b".to_string())]);
            }
            other => panic!("unexpected body: {other:?}"),
        }
    }

    #[test]
    fn null_params_produce_neither_query_nor_body() {
        let (query, body) = partition_params(&Method::GET, &Value::Null, false);
        assert!(query.is_none());
        assert!(matches!(body, RequestBody::None));
    }

    #[test]
    fn caller_headers_win_over_defaults() {
        let client = ErpClient::new(ClientConfig::default());
        let mut extra = HashMap::new();
        extra.insert("Content-Type".to_string(), "application/json".to_string());
        extra.insert("Authorization".to_string(), "Bearer sk_test".to_string());

        let headers = client.build_headers(&extra, false).unwrap();
        assert_eq!(headers.get(CONTENT_TYPE).unwrap(), "application/json");
        assert_eq!(headers.get("authorization").unwrap(), "Bearer sk_test");
        assert!(headers.get(USER_AGENT).unwrap().to_str().unwrap().contains("keystone-erp-rust"));
        assert!(headers.get(CLIENT_USER_AGENT_HEADER).is_some());
    }

    #[test]
    fn invalid_header_names_are_rejected_before_any_attempt() {
        let client = ErpClient::new(ClientConfig::default());
        let mut extra = HashMap::new();
        extra.insert("bad header".to_string(), "x".to_string());
        let err = client.build_headers(&extra, false).unwrap_err();
        assert!(matches!(err, ErpError::ConfigurationError(_)));
    }

    #[test]
    fn multipart_content_type_is_left_to_the_transport() {
        let client = ErpClient::new(ClientConfig::default());
        let mut extra = HashMap::new();
        extra.insert(
            "Content-Type".to_string(),
            "multipart/form-data".to_string(),
        );
        let headers = client.build_headers(&extra, true).unwrap();
        assert!(headers.get(CONTENT_TYPE).is_none());
    }

    #[test]
    fn url_joining_normalizes_slashes() {
        let url = build_url("https://erp.test/", "/v1/items", Some("limit=2")).unwrap();
        assert_eq!(url.as_str(), "https://erp.test/v1/items?limit=2");
        let url = build_url("https://erp.test", "v1/items", None).unwrap();
        assert_eq!(url.as_str(), "https://erp.test/v1/items");
    }

    #[test]
    fn invalid_base_url_is_a_configuration_error() {
        let err = build_url("not a url", "/v1/items", None).unwrap_err();
        assert!(matches!(err, ErpError::ConfigurationError(_)));
    }

    #[test]
    fn multipart_detection_is_case_insensitive() {
        let mut headers = HashMap::new();
        headers.insert(
            "CONTENT-TYPE".to_string(),
            "multipart/form-data; boundary=x".to_string(),
        );
        assert!(wants_multipart(&headers));
        assert!(!wants_multipart(&HashMap::new()));
    }
}
