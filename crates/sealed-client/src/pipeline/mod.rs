//! Ordered interceptor pipeline
//!
//! A pipeline holds named stages in a fixed order. Request hooks run in
//! stage order (header, then crypto) so headers are assembled before the
//! body is sealed. Response hooks run in reverse (crypto, then header) so the
//! body is opened before tokens are extracted. The order comes from
//! `StageKind`, not from registration order.
//!
//! Each attempt hands the stages a `StageContext`: the shared `Context` for
//! writes plus the snapshot taken when the attempt started, so a request and
//! its response are processed against the same key material even if another
//! call rotates the key in between.

pub mod crypto;
pub mod header;

pub use crypto::CryptoStage;
pub use header::HeaderStage;

use std::sync::Arc;

use sealed_transport::{TransportRequest, TransportResponse};
use tracing::debug;

use crate::config::EffectiveConfig;
use crate::context::{Context, ContextSnapshot};

/// Named pipeline positions, in request order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum StageKind {
    Header,
    Crypto,
}

impl StageKind {
    pub fn name(&self) -> &'static str {
        match self {
            StageKind::Header => "header",
            StageKind::Crypto => "crypto",
        }
    }

    /// Whether the call's effective config leaves this stage switched on.
    pub fn is_enabled(&self, config: &EffectiveConfig) -> bool {
        match self {
            StageKind::Header => !config.disable_header_injection,
            StageKind::Crypto => !config.disable_crypto,
        }
    }
}

/// Errors raised inside a stage. These surface as `Unknown` failures.
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error("invalid header {name}: {reason}")]
    InvalidHeader { name: String, reason: String },

    #[error("payload crypto failed: {0}")]
    Crypto(#[from] sealed_crypto::Error),

    #[error("context update failed: {0}")]
    Context(#[from] common::Error),

    #[error("body serialization failed: {0}")]
    Body(String),

    #[error("sealed response received but no key has been negotiated")]
    NoKeyNegotiated,
}

/// What a stage sees for one attempt.
pub struct StageContext<'a> {
    pub context: &'a Context,
    pub snapshot: &'a ContextSnapshot,
}

/// A request/response transformation stage.
pub trait Stage: Send + Sync {
    fn kind(&self) -> StageKind;

    /// Transform the outgoing request. Must not write to the context.
    fn on_request(
        &self,
        request: &mut TransportRequest,
        cx: &StageContext<'_>,
    ) -> Result<(), StageError>;

    /// Transform an incoming response, success or not.
    fn on_response(
        &self,
        response: &mut TransportResponse,
        cx: &StageContext<'_>,
    ) -> Result<(), StageError>;
}

/// Ordered set of stages, at most one per kind.
#[derive(Clone, Default)]
pub struct Pipeline {
    stages: Vec<Arc<dyn Stage>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a stage at the position its kind dictates, replacing any
    /// stage of the same kind.
    pub fn with_stage(mut self, stage: Arc<dyn Stage>) -> Self {
        self.stages.retain(|s| s.kind() != stage.kind());
        self.stages.push(stage);
        self.stages.sort_by_key(|s| s.kind());
        self
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.kind().name()).collect()
    }

    pub fn contains(&self, kind: StageKind) -> bool {
        self.stages.iter().any(|s| s.kind() == kind)
    }

    /// Run request hooks in stage order, skipping stages disabled for this call.
    pub fn run_request(
        &self,
        request: &mut TransportRequest,
        cx: &StageContext<'_>,
        config: &EffectiveConfig,
    ) -> Result<(), StageError> {
        for stage in self.stages.iter().filter(|s| s.kind().is_enabled(config)) {
            stage.on_request(request, cx)?;
            debug!(stage = stage.kind().name(), "request stage applied");
        }
        Ok(())
    }

    /// Run response hooks in reverse stage order.
    pub fn run_response(
        &self,
        response: &mut TransportResponse,
        cx: &StageContext<'_>,
        config: &EffectiveConfig,
    ) -> Result<(), StageError> {
        for stage in self
            .stages
            .iter()
            .rev()
            .filter(|s| s.kind().is_enabled(config))
        {
            stage.on_response(response, cx)?;
            debug!(stage = stage.kind().name(), "response stage applied");
        }
        Ok(())
    }
}
