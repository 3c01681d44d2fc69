//! reqwest-backed transport
//!
//! Joins request paths onto a base URL, applies the per-request timeout, and
//! retries sends that produced no response (connect failures, timeouts)
//! according to the `RetryPolicy`. Any response, success or not, ends the
//! retry loop: interpreting non-2xx bodies is the facade's job.

use reqwest::header::HeaderMap;
use tracing::{debug, warn};

use crate::retry::RetryPolicy;
use crate::{BoxFuture, Result, Transport, TransportError, TransportRequest, TransportResponse};

/// Production transport over a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    base_url: String,
}

impl ReqwestTransport {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Resolve a request path against the base URL.
    ///
    /// Absolute `http(s)://` paths are used verbatim.
    pub fn url_for(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        let base = self.base_url.trim_end_matches('/');
        if path.is_empty() {
            base.to_string()
        } else if path.starts_with('/') {
            format!("{base}{path}")
        } else {
            format!("{base}/{path}")
        }
    }

    async fn send_with_retry(
        &self,
        request: TransportRequest,
        policy: &RetryPolicy,
    ) -> Result<TransportResponse> {
        let url = self.url_for(&request.path);
        let max_attempts = policy.attempts();

        for attempt in 0..max_attempts {
            if attempt > 0 {
                let delay = policy.delay_for(attempt);
                warn!(attempt, delay_ms = delay.as_millis() as u64, url = %url, "retrying after transport failure");
                tokio::time::sleep(delay).await;
            }

            let mut builder = self
                .client
                .request(request.method.clone(), &url)
                .headers(request.headers.clone());
            if let Some(timeout) = request.timeout {
                builder = builder.timeout(timeout);
            }
            if let Some(body) = &request.body {
                builder = builder.json(body);
            }

            match builder.send().await {
                Ok(response) => return read_response(response).await,
                Err(e) if e.is_builder() => {
                    return Err(TransportError::Dispatch(e.to_string()));
                }
                Err(e) if is_retryable(&e) && attempt + 1 < max_attempts => {
                    debug!(attempt, error = %e, "transport attempt failed without response");
                    continue;
                }
                Err(e) => {
                    warn!(error = %e, attempts = attempt + 1, url = %url, "transport gave up without a response");
                    return Err(TransportError::Network(e.to_string()));
                }
            }
        }

        Err(TransportError::Dispatch(
            "retry loop exited without an outcome".into(),
        ))
    }
}

impl Transport for ReqwestTransport {
    fn id(&self) -> &str {
        "reqwest"
    }

    fn send<'a>(
        &'a self,
        request: TransportRequest,
        policy: &'a RetryPolicy,
    ) -> BoxFuture<'a, Result<TransportResponse>> {
        Box::pin(self.send_with_retry(request, policy))
    }
}

/// Connect failures and timeouts are worth another attempt.
fn is_retryable(error: &reqwest::Error) -> bool {
    error.is_connect() || error.is_timeout()
}

async fn read_response(response: reqwest::Response) -> Result<TransportResponse> {
    let status = response.status();
    let headers: HeaderMap = response.headers().clone();
    let bytes = response
        .bytes()
        .await
        .map_err(|e| TransportError::Network(format!("failed to read response body: {e}")))?;

    let transport_response = TransportResponse {
        status: status.as_u16(),
        status_text: status.canonical_reason().unwrap_or("").to_string(),
        headers,
        body: parse_body(&bytes),
    };

    if transport_response.is_success() {
        Ok(transport_response)
    } else {
        Err(TransportError::Response(Box::new(transport_response)))
    }
}

/// JSON if it parses, text otherwise, `Null` when empty.
pub fn parse_body(bytes: &[u8]) -> serde_json::Value {
    if bytes.is_empty() {
        return serde_json::Value::Null;
    }
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| serde_json::Value::String(String::from_utf8_lossy(bytes).into_owned()))
}
