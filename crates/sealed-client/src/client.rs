//! Client facade
//!
//! `SecureClient` owns the session context, the interceptor pipeline and the
//! transport. Each logical call runs a small state machine:
//!
//! ```text
//! SENDING ──2xx──────────────────────────────▶ SUCCESS
//!    │ ──response, key missing + new key ──▶ KEY_REFRESH ──▶ SENDING
//!    │ ──any other failure ─────────────────▶ TERMINAL_ERROR
//! ```
//!
//! KEY_REFRESH re-sends the same request descriptor after publishing the
//! server's new key, at most `max_key_refresh_attempts` times per call.

use std::sync::Arc;
use std::time::Instant;

use reqwest::Method;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use sealed_crypto::{BoxCipher, PayloadCipher};
use sealed_transport::{
    ReqwestTransport, Transport, TransportError, TransportRequest, TransportResponse,
};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::{CallOptions, ClientConfig, EffectiveConfig};
use crate::constants::REQUEST_ID_HEADER;
use crate::context::{Context, ContextKey};
use crate::error::NormalizedError;
use crate::metrics;
use crate::pipeline::{CryptoStage, HeaderStage, Pipeline, StageContext, StageError};
use crate::refresh::{self, KeyExchangeSignal};

/// One logical call as the caller describes it.
///
/// The descriptor is reused unchanged for every key-exchange retry; all
/// per-attempt changes happen on a fresh `TransportRequest`.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    pub body: Option<serde_json::Value>,
    pub options: CallOptions,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            body: None,
            options: CallOptions::default(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Extra caller headers. Headers the pipeline manages are overwritten.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_options(mut self, options: CallOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.options.cancel = Some(token);
        self
    }

    fn to_transport(&self, effective: &EffectiveConfig) -> TransportRequest {
        let mut request = TransportRequest::new(self.method.clone(), self.path.clone());
        request.headers = self.headers.clone();
        request.body = self.body.clone();
        request.timeout = Some(effective.timeout);
        request
    }
}

/// A successful response after the response pipeline ran.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: serde_json::Value,
}

impl ApiResponse {
    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_value(self.body.clone())
    }

    pub fn into_body(self) -> serde_json::Value {
        self.body
    }
}

impl From<TransportResponse> for ApiResponse {
    fn from(response: TransportResponse) -> Self {
        Self {
            status: response.status,
            headers: response.headers,
            body: response.body,
        }
    }
}

pub struct SecureClient {
    config: ClientConfig,
    context: Arc<Context>,
    pipeline: Pipeline,
    transport: Arc<dyn Transport>,
    cipher: Arc<dyn PayloadCipher>,
}

impl SecureClient {
    /// Build a client over reqwest with a fresh NaCl keypair.
    pub fn new(config: ClientConfig) -> common::Result<Self> {
        let transport = ReqwestTransport::new(config.base_url.clone());
        Self::with_parts(config, Arc::new(transport), Arc::new(BoxCipher::new()))
    }

    /// Build a client over caller-supplied collaborators.
    pub fn with_parts(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        cipher: Arc<dyn PayloadCipher>,
    ) -> common::Result<Self> {
        config.validate()?;

        let context = Context::new(&config.client_id, config.auth_header.header_name());
        if let Some(api_key) = config.api_key.as_ref().filter(|k| !k.is_empty()) {
            context.set(ContextKey::ApiKey, api_key.expose().as_str())?;
        }

        // Both stages are always registered; the effective config of each
        // call decides which run.
        let pipeline = Pipeline::new()
            .with_stage(Arc::new(HeaderStage::new()))
            .with_stage(Arc::new(CryptoStage::new(cipher.clone())));

        info!(
            session_id = %context.session_id(),
            transport = transport.id(),
            cipher = cipher.id(),
            base_url = %config.base_url,
            "sealed client ready"
        );

        Ok(Self {
            config,
            context: Arc::new(context),
            pipeline,
            transport,
            cipher,
        })
    }

    pub fn context(&self) -> &Arc<Context> {
        &self.context
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub async fn get(&self, path: &str) -> Result<ApiResponse, NormalizedError> {
        self.request(ApiRequest::get(path)).await
    }

    pub async fn delete(&self, path: &str) -> Result<ApiResponse, NormalizedError> {
        self.request(ApiRequest::new(Method::DELETE, path)).await
    }

    pub async fn post(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<ApiResponse, NormalizedError> {
        self.request(ApiRequest::post(path).with_body(body)).await
    }

    pub async fn put(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<ApiResponse, NormalizedError> {
        self.request(ApiRequest::new(Method::PUT, path).with_body(body))
            .await
    }

    pub async fn patch(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<ApiResponse, NormalizedError> {
        self.request(ApiRequest::new(Method::PATCH, path).with_body(body))
            .await
    }

    /// Issue one logical call. Exactly one outcome is returned; key-exchange
    /// retries happen inside and are never visible to the caller.
    #[instrument(skip_all, fields(session_id = %self.context.session_id(), method = %request.method, path = %request.path))]
    pub async fn request(&self, request: ApiRequest) -> Result<ApiResponse, NormalizedError> {
        let started = Instant::now();
        let effective = self.config.merge(&request.options);

        let result = self.execute(&request, &effective).await;

        let outcome = match &result {
            Ok(_) => "success",
            Err(e) => {
                metrics::record_error(e.kind.label());
                warn!(
                    kind = e.kind.label(),
                    status_code = e.status_code,
                    error_code = e.error_code.as_deref().unwrap_or(""),
                    error = %e.message,
                    "request failed"
                );
                e.kind.label()
            }
        };
        metrics::record_request(
            request.method.as_str(),
            outcome,
            started.elapsed().as_secs_f64(),
        );
        result
    }

    async fn execute(
        &self,
        request: &ApiRequest,
        effective: &EffectiveConfig,
    ) -> Result<ApiResponse, NormalizedError> {
        let mut refreshes: u32 = 0;

        loop {
            if effective.is_cancelled() {
                return Err(NormalizedError::cancelled());
            }

            let snapshot = self.context.snapshot();
            let cx = StageContext {
                context: &self.context,
                snapshot: &snapshot,
            };

            let mut outgoing = request.to_transport(effective);
            self.pipeline
                .run_request(&mut outgoing, &cx, effective)
                .map_err(stage_failure)?;

            let request_id = outgoing
                .headers
                .get(REQUEST_ID_HEADER)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("")
                .to_string();
            debug!(
                attempt = refreshes + 1,
                request_id = %request_id,
                key_generation = snapshot.key_generation(),
                "dispatching request"
            );

            let mut response = match self.dispatch(outgoing, effective).await {
                Ok(mut response) => {
                    self.pipeline
                        .run_response(&mut response, &cx, effective)
                        .map_err(stage_failure)?;
                    return Ok(ApiResponse::from(response));
                }
                Err(TransportError::Response(response)) => *response,
                Err(other) => return Err(NormalizedError::from_transport(other)),
            };

            // A response arrived, so its status is kept even if the body
            // cannot be processed
            if let Err(error) = self.pipeline.run_response(&mut response, &cx, effective) {
                warn!(
                    request_id = %request_id,
                    status = response.status,
                    error = %error,
                    "error response could not be processed, using raw body"
                );
                return Err(NormalizedError::server(&response));
            }
            let failure = NormalizedError::server(&response);

            match refresh::detect(&failure) {
                Some(KeyExchangeSignal::Refresh { public_key }) => {
                    if !self.cipher.accepts_key(&public_key) {
                        refresh::record_rejected(&self.context, &public_key);
                        return Err(failure);
                    }
                    if refreshes >= effective.max_key_refresh_attempts {
                        refresh::record_exhausted(&self.context, refreshes);
                        return Err(NormalizedError::key_exchange_exhausted(
                            &response, refreshes,
                        ));
                    }
                    if effective.is_cancelled() {
                        return Err(NormalizedError::cancelled());
                    }
                    refreshes += 1;
                    refresh::publish(&self.context, snapshot.key_generation(), &public_key);
                }
                Some(KeyExchangeSignal::MissingReplacement) => {
                    warn!(request_id = %request_id, "server lost the session key but sent no replacement");
                    return Err(failure);
                }
                None => return Err(failure),
            }
        }
    }

    /// Send through the transport, racing the call's cancellation token.
    async fn dispatch(
        &self,
        request: TransportRequest,
        effective: &EffectiveConfig,
    ) -> sealed_transport::Result<TransportResponse> {
        let send = self.transport.send(request, &effective.retry);
        match &effective.cancel {
            Some(token) => {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => Err(TransportError::Cancelled),
                    result = send => result,
                }
            }
            None => send.await,
        }
    }
}

impl std::fmt::Debug for SecureClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecureClient")
            .field("base_url", &self.config.base_url)
            .field("transport", &self.transport.id())
            .field("stages", &self.pipeline.stage_names())
            .field("context", &self.context)
            .finish()
    }
}

fn stage_failure(error: StageError) -> NormalizedError {
    warn!(error = %error, "interceptor failed");
    NormalizedError::unknown(error.to_string())
}
