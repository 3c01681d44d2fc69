//! Normalized errors surfaced to callers
//!
//! Every terminal failure becomes one `NormalizedError` with the uniform
//! `{statusCode, message, errorCode}` shape:
//!
//! - Server: a response arrived; fields come from the body, falling back to
//!   the HTTP status and reason phrase
//! - Network: request sent, no response (`statusCode = -1`)
//! - Cancelled: the caller cancelled before a response (`statusCode = -1`)
//! - KeyExchangeExhausted: the server kept reporting a missing key past the
//!   retry bound; fields come from the last server response
//! - Unknown: neither request nor response, e.g. an interceptor failed (`statusCode = -2`)

use sealed_transport::{TransportError, TransportResponse};
use serde::Serialize;

use crate::constants::{
    CANCELLED_ERROR_CODE, NETWORK_ERROR_CODE, NO_RESPONSE_STATUS, UNKNOWN_ERROR_CODE,
    UNKNOWN_STATUS,
};

/// Classification of a terminal failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Server,
    Network,
    Cancelled,
    KeyExchangeExhausted,
    Unknown,
}

impl ErrorKind {
    /// Label for metrics and logs.
    pub fn label(&self) -> &'static str {
        match self {
            ErrorKind::Server => "server",
            ErrorKind::Network => "network",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::KeyExchangeExhausted => "key_exchange_exhausted",
            ErrorKind::Unknown => "unknown",
        }
    }
}

/// Uniform error record returned for every failed call.
#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
#[serde(rename_all = "camelCase")]
#[error("[{status_code}] {message}")]
pub struct NormalizedError {
    pub kind: ErrorKind,
    /// HTTP status, or a negative sentinel when no response exists
    pub status_code: i32,
    pub message: String,
    pub error_code: Option<String>,
    /// Raw response body, kept for diagnostics
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<serde_json::Value>,
}

impl NormalizedError {
    /// Normalize a response-carrying failure.
    pub fn server(response: &TransportResponse) -> Self {
        let body = &response.body;
        let status_code = body
            .get("statusCode")
            .and_then(|v| v.as_i64())
            .and_then(|v| i32::try_from(v).ok())
            .unwrap_or(i32::from(response.status));
        let message = body
            .get("message")
            .and_then(|v| v.as_str())
            .filter(|m| !m.is_empty())
            .unwrap_or(response.status_text.as_str())
            .to_string();
        let error_code = body
            .get("errorCode")
            .and_then(|v| v.as_str())
            .map(str::to_string);
        Self {
            kind: ErrorKind::Server,
            status_code,
            message,
            error_code,
            raw: Some(body.clone()),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Network,
            status_code: NO_RESPONSE_STATUS,
            message: message.into(),
            error_code: Some(NETWORK_ERROR_CODE.to_string()),
            raw: None,
        }
    }

    pub fn cancelled() -> Self {
        Self {
            kind: ErrorKind::Cancelled,
            status_code: NO_RESPONSE_STATUS,
            message: "request cancelled".to_string(),
            error_code: Some(CANCELLED_ERROR_CODE.to_string()),
            raw: None,
        }
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Unknown,
            status_code: UNKNOWN_STATUS,
            message: message.into(),
            error_code: Some(UNKNOWN_ERROR_CODE.to_string()),
            raw: None,
        }
    }

    /// The last key-missing response, after `attempts` refreshes failed to help.
    pub fn key_exchange_exhausted(last: &TransportResponse, attempts: u32) -> Self {
        let server = Self::server(last);
        Self {
            kind: ErrorKind::KeyExchangeExhausted,
            message: format!(
                "{} (key exchange gave up after {attempts} refresh attempts)",
                server.message
            ),
            ..server
        }
    }

    /// Normalize any transport failure.
    pub fn from_transport(error: TransportError) -> Self {
        match error {
            TransportError::Response(response) => Self::server(&response),
            TransportError::Network(message) => Self::network(message),
            TransportError::Cancelled => Self::cancelled(),
            TransportError::Dispatch(message) => Self::unknown(message),
        }
    }

    pub fn is_server(&self) -> bool {
        matches!(self.kind, ErrorKind::Server | ErrorKind::KeyExchangeExhausted)
    }
}

impl From<TransportError> for NormalizedError {
    fn from(error: TransportError) -> Self {
        Self::from_transport(error)
    }
}
