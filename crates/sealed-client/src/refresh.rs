//! Key-exchange detection and single-flight rotation
//!
//! The server signals that it lost the private key matching our session by
//! failing a request with `errorCode = ApiCrypto::PRIVATE_KEY_NOT_FOUND` and a
//! replacement key in `error.publicKey`. That is a negotiation step rather
//! than a failure: the facade publishes the new key and re-sends.
//!
//! Publishing goes through `Context::rotate_public_key` with the generation
//! the failed attempt was sealed under. When several in-flight calls hit the
//! same stale key, the first to arrive rotates and the rest join its result.

use sealed_crypto::key_fingerprint;
use tracing::{info, warn};

use crate::constants::KEY_MISSING_ERROR_CODE;
use crate::context::{Context, Rotation};
use crate::error::NormalizedError;
use crate::metrics;

/// What a failed response says about key exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyExchangeSignal {
    /// The server lost our key and published a replacement
    Refresh { public_key: String },
    /// The server lost our key but sent nothing to replace it with
    MissingReplacement,
}

/// Inspect a normalized server failure for the key-missing signal.
pub fn detect(error: &NormalizedError) -> Option<KeyExchangeSignal> {
    if !error.is_server() || error.error_code.as_deref() != Some(KEY_MISSING_ERROR_CODE) {
        return None;
    }
    let public_key = error
        .raw
        .as_ref()
        .and_then(|body| body.get("error"))
        .and_then(|payload| payload.get("publicKey"))
        .and_then(|key| key.as_str())
        .map(str::trim)
        .filter(|key| !key.is_empty());

    Some(match public_key {
        Some(key) => KeyExchangeSignal::Refresh {
            public_key: key.to_string(),
        },
        None => KeyExchangeSignal::MissingReplacement,
    })
}

/// Publish `public_key` unless another call already rotated past
/// `observed_generation`.
pub fn publish(context: &Context, observed_generation: u64, public_key: &str) -> Rotation {
    let rotation = context.rotate_public_key(observed_generation, public_key);
    match rotation {
        Rotation::Rotated { generation } => {
            info!(
                session_id = %context.session_id(),
                generation,
                key_fingerprint = %key_fingerprint(public_key),
                "server public key rotated"
            );
            metrics::record_key_exchange("rotated");
        }
        Rotation::Joined { generation } => {
            info!(
                session_id = %context.session_id(),
                observed_generation,
                generation,
                "key already rotated by a concurrent call"
            );
            metrics::record_key_exchange("joined");
        }
    }
    rotation
}

/// Note that the server offered a key the cipher cannot use. The context is
/// left as it was so later calls can still reach the server.
pub fn record_rejected(context: &Context, public_key: &str) {
    warn!(
        session_id = %context.session_id(),
        key_fingerprint = %key_fingerprint(public_key),
        "server offered an unusable public key"
    );
    metrics::record_key_exchange("rejected");
}

/// Note that a call gave up on key exchange.
pub fn record_exhausted(context: &Context, attempts: u32) {
    warn!(
        session_id = %context.session_id(),
        attempts,
        "key exchange retries exhausted"
    );
    metrics::record_key_exchange("exhausted");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextKey;
    use sealed_transport::TransportResponse;
    use serde_json::json;

    fn server_error(body: serde_json::Value) -> NormalizedError {
        NormalizedError::server(&TransportResponse::new(400, body))
    }

    #[test]
    fn detects_key_missing_with_replacement() {
        let err = server_error(json!({
            "statusCode": 400,
            "errorCode": KEY_MISSING_ERROR_CODE,
            "error": {"publicKey": "PK1"}
        }));
        assert_eq!(
            detect(&err),
            Some(KeyExchangeSignal::Refresh {
                public_key: "PK1".into()
            })
        );
    }

    #[test]
    fn key_missing_without_replacement() {
        let err = server_error(json!({"errorCode": KEY_MISSING_ERROR_CODE}));
        assert_eq!(detect(&err), Some(KeyExchangeSignal::MissingReplacement));

        let blank = server_error(json!({
            "errorCode": KEY_MISSING_ERROR_CODE,
            "error": {"publicKey": "  "}
        }));
        assert_eq!(detect(&blank), Some(KeyExchangeSignal::MissingReplacement));
    }

    #[test]
    fn other_errors_are_not_signals() {
        let err = server_error(json!({
            "errorCode": "Payments::INVALID_AMOUNT",
            "error": {"publicKey": "PK1"}
        }));
        assert_eq!(detect(&err), None);
        assert_eq!(detect(&NormalizedError::network("refused")), None);
    }

    #[test]
    fn publish_rotates_then_joins() {
        let context = Context::default();
        assert_eq!(
            publish(&context, 0, "PK1"),
            Rotation::Rotated { generation: 1 }
        );
        assert_eq!(
            publish(&context, 0, "PK1-dup"),
            Rotation::Joined { generation: 1 }
        );
        assert_eq!(context.get(ContextKey::PublicKey), "PK1");
    }
}
