//! HTTP client adapter for the dashboard backend.
//!
//! Steps talk to the backend only through [`HttpAdapter`]. A response with any
//! status code is an `Ok`; only failing to get a response at all is a
//! [`TransportError`]. That split lets steps word "network error" and
//! "rejected by server" differently while both still count as failures.

use async_trait::async_trait;
use http::Method;
use serde::Serialize;
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use url::Url;

use crate::config::TesterConfig;
use crate::error::TransportError;

/// An outbound call, relative to the backend base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    /// HTTP method.
    pub method: Method,
    /// Path below the base URL, starting with `/`.
    pub path: String,
    /// Headers sent in addition to the auth and content-type headers.
    pub headers: Vec<(String, String)>,
    /// Query pairs, URL-encoded in order.
    pub query: Vec<(String, String)>,
    /// JSON body, if any.
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: Vec::new(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn options(path: impl Into<String>) -> Self {
        Self::new(Method::OPTIONS, path)
    }

    /// Serialize `body` as the JSON request body.
    pub fn json(mut self, body: &impl Serialize) -> serde_json::Result<Self> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Body of a received response.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    /// Body that parsed as JSON.
    Json(Value),
    /// Body that did not parse as JSON, kept verbatim.
    Raw(String),
    /// No body, or only whitespace.
    Empty,
}

/// A received response, whatever its status.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    /// HTTP status code.
    pub status: u16,
    /// Decoded body.
    pub body: ResponseBody,
}

impl ApiResponse {
    /// Build a response from a status and raw body text.
    pub fn from_text(status: u16, text: &str) -> Self {
        let body = if text.trim().is_empty() {
            ResponseBody::Empty
        } else {
            match serde_json::from_str(text) {
                Ok(value) => ResponseBody::Json(value),
                Err(_) => ResponseBody::Raw(text.to_string()),
            }
        };
        Self { status, body }
    }

    pub fn json(status: u16, value: Value) -> Self {
        Self {
            status,
            body: ResponseBody::Json(value),
        }
    }

    /// The parsed JSON body, if there is one.
    pub fn json_body(&self) -> Option<&Value> {
        match &self.body {
            ResponseBody::Json(value) => Some(value),
            _ => None,
        }
    }

    /// Body as text for messages, truncated to a readable length.
    pub fn text_preview(&self) -> String {
        const LIMIT: usize = 200;
        let text = match &self.body {
            ResponseBody::Json(value) => value.to_string(),
            ResponseBody::Raw(text) => text.clone(),
            ResponseBody::Empty => return "<empty body>".to_string(),
        };
        if text.chars().count() > LIMIT {
            let truncated: String = text.chars().take(LIMIT).collect();
            format!("{truncated}...")
        } else {
            text
        }
    }
}

/// Sends requests to the backend.
#[async_trait]
pub trait HttpAdapter: Send + Sync {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError>;
}

/// [`HttpAdapter`] backed by `reqwest`.
///
/// Every call carries the JSON content type and the access key both as an
/// `apikey` header and as a bearer token.
pub struct ReqwestAdapter {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    timeout: Duration,
}

impl ReqwestAdapter {
    pub fn new(
        base_url: &str,
        api_key: &str,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Request {
                message: format!("Failed to create HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            timeout,
        })
    }

    pub fn from_config(config: &TesterConfig) -> Result<Self, TransportError> {
        Self::new(&config.base_url, &config.api_key, config.timeout())
    }

    fn url_for(&self, request: &ApiRequest) -> Result<Url, TransportError> {
        let mut url = Url::parse(&format!("{}{}", self.base_url, request.path)).map_err(|e| {
            TransportError::Request {
                message: format!("Invalid URL for {}: {e}", request.path),
            }
        })?;
        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(request.query.iter());
        }
        Ok(url)
    }
}

#[async_trait]
impl HttpAdapter for ReqwestAdapter {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        let url = self.url_for(&request)?;
        let start = Instant::now();

        let mut builder = self
            .client
            .request(request.method.clone(), url)
            .header("Content-Type", "application/json")
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key));
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let timeout_secs = self.timeout.as_secs();
        let response = builder.send().await.map_err(|e| {
            let err = TransportError::classify_reqwest(&e, timeout_secs);
            warn!(
                target: "esp32.tester",
                method = %request.method,
                path = %request.path,
                category = err.category(),
                "Request failed: {}",
                err
            );
            err
        })?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| TransportError::classify_reqwest(&e, timeout_secs))?;

        debug!(
            target: "esp32.tester",
            method = %request.method,
            path = %request.path,
            status,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Response received"
        );

        Ok(ApiResponse::from_text(status, &text))
    }
}
