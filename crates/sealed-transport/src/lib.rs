//! Transport abstraction for the sealed client
//!
//! Defines the `Transport` trait the client facade dispatches through, the
//! request/response values exchanged with it, and the three-way outcome
//! taxonomy (response, response error, no response). `ReqwestTransport`
//! is the production implementation; tests substitute scripted transports.
//!
//! Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility (`Arc<dyn Transport>`).

pub mod http;
pub mod retry;

pub use http::ReqwestTransport;
pub use retry::RetryPolicy;

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use reqwest::Method;
use reqwest::header::HeaderMap;

/// Boxed future returned by transports.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A fully prepared request, after all interceptors have run.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: Method,
    /// Path relative to the transport's base URL, or an absolute URL
    pub path: String,
    pub headers: HeaderMap,
    /// JSON body; `None` sends no body
    pub body: Option<serde_json::Value>,
    pub timeout: Option<Duration>,
}

impl TransportRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            body: None,
            timeout: None,
        }
    }
}

/// A response as received from the server, before response interceptors run.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub status_text: String,
    pub headers: HeaderMap,
    /// Parsed JSON body. Non-JSON bodies arrive as `Value::String`, empty ones as `Null`.
    pub body: serde_json::Value,
}

impl TransportResponse {
    pub fn new(status: u16, body: serde_json::Value) -> Self {
        let status_text = reqwest::StatusCode::from_u16(status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or("")
            .to_string();
        Self {
            status,
            status_text,
            headers: HeaderMap::new(),
            body,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Failure outcomes of one transport send.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// A response arrived with a non-success status
    #[error("server responded with {}", .0.status)]
    Response(Box<TransportResponse>),

    /// The request was sent but no response arrived
    #[error("no response received: {0}")]
    Network(String),

    /// The caller cancelled the call before a response arrived
    #[error("request cancelled")]
    Cancelled,

    /// The request could not be built or dispatched at all
    #[error("request could not be dispatched: {0}")]
    Dispatch(String),
}

/// Result alias for transport sends.
pub type Result<T> = std::result::Result<T, TransportError>;

/// Issues HTTP requests on behalf of the client facade.
///
/// Implementations apply the connection-level `RetryPolicy` themselves and
/// report exactly one outcome per call.
pub trait Transport: Send + Sync {
    /// Identifier for logging (e.g. "reqwest", "scripted")
    fn id(&self) -> &str;

    fn send<'a>(
        &'a self,
        request: TransportRequest,
        policy: &'a RetryPolicy,
    ) -> BoxFuture<'a, Result<TransportResponse>>;
}
