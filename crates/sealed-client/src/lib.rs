//! Resilient HTTP client with sealed payloads
//!
//! `SecureClient` wraps a transport with a session context, an ordered
//! interceptor pipeline (header injection, then payload sealing) and a
//! uniform error shape. When the server reports that it lost the private key
//! for this session, the client adopts the replacement key the server sends
//! and re-issues the request without surfacing the failure.
//!
//! ```no_run
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! use sealed_client::{ClientConfig, SecureClient};
//!
//! let client = SecureClient::new(ClientConfig::new("https://api.example.com"))?;
//! let created = client
//!     .post("/payments", serde_json::json!({"amount": 42}))
//!     .await?;
//! println!("{}", created.body);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod constants;
pub mod context;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod refresh;

pub use client::{ApiRequest, ApiResponse, SecureClient};
pub use config::{AuthHeader, CallOptions, ClientConfig, EffectiveConfig};
pub use context::{Context, ContextKey, ContextSnapshot, Rotation};
pub use error::{ErrorKind, NormalizedError};
pub use pipeline::{Pipeline, Stage, StageKind};
pub use sealed_transport::RetryPolicy;
pub use tokio_util::sync::CancellationToken;
