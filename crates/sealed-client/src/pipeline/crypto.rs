//! Body sealing and opening
//!
//! Runs only once a server key has been negotiated. Until then requests go
//! out in the clear and plain responses pass through untouched; the
//! key-exchange round trip is what supplies the first key.

use std::sync::Arc;

use sealed_crypto::{PayloadCipher, SealedPayload, key_fingerprint};
use sealed_transport::http::parse_body;
use sealed_transport::{TransportRequest, TransportResponse};
use tracing::debug;

use super::{Stage, StageContext, StageError, StageKind};
use crate::constants::ENCRYPTION_KEY_HEADER;

pub struct CryptoStage {
    cipher: Arc<dyn PayloadCipher>,
}

impl CryptoStage {
    pub fn new(cipher: Arc<dyn PayloadCipher>) -> Self {
        Self { cipher }
    }

    pub fn cipher_id(&self) -> &str {
        self.cipher.id()
    }
}

impl Stage for CryptoStage {
    fn kind(&self) -> StageKind {
        StageKind::Crypto
    }

    fn on_request(
        &self,
        request: &mut TransportRequest,
        cx: &StageContext<'_>,
    ) -> Result<(), StageError> {
        let Some(server_key) = cx.snapshot.public_key() else {
            return Ok(());
        };

        let value = reqwest::header::HeaderValue::from_str(server_key).map_err(|e| {
            StageError::InvalidHeader {
                name: ENCRYPTION_KEY_HEADER.to_string(),
                reason: e.to_string(),
            }
        })?;
        request.headers.insert(ENCRYPTION_KEY_HEADER, value);

        if let Some(body) = request.body.take() {
            let plaintext =
                serde_json::to_vec(&body).map_err(|e| StageError::Body(e.to_string()))?;
            let sealed = self.cipher.seal(&plaintext, server_key)?;
            request.body = Some(sealed.to_value());
            debug!(
                cipher = self.cipher.id(),
                key_fingerprint = %key_fingerprint(server_key),
                "request body sealed"
            );
        }
        Ok(())
    }

    fn on_response(
        &self,
        response: &mut TransportResponse,
        cx: &StageContext<'_>,
    ) -> Result<(), StageError> {
        let Some(sealed) = SealedPayload::from_value(&response.body)? else {
            return Ok(());
        };
        // Open with the key the request was sealed for, not whatever is current
        let server_key = cx.snapshot.public_key().ok_or(StageError::NoKeyNegotiated)?;
        let plaintext = self.cipher.open(&sealed, server_key)?;
        response.body = parse_body(&plaintext);
        debug!(
            cipher = self.cipher.id(),
            key_fingerprint = %key_fingerprint(server_key),
            "response body opened"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Context, ContextKey};
    use reqwest::Method;
    use sealed_crypto::BoxCipher;
    use serde_json::json;

    fn request_with_body() -> TransportRequest {
        let mut request = TransportRequest::new(Method::POST, "/payments");
        request.body = Some(json!({"amount": 42}));
        request
    }

    #[test]
    fn no_key_leaves_request_untouched() {
        let stage = CryptoStage::new(Arc::new(BoxCipher::new()));
        let context = Context::default();
        let snapshot = context.snapshot();
        let cx = StageContext {
            context: &context,
            snapshot: &snapshot,
        };

        let mut request = request_with_body();
        stage.on_request(&mut request, &cx).unwrap();
        assert_eq!(request.body, Some(json!({"amount": 42})));
        assert!(request.headers.get(ENCRYPTION_KEY_HEADER).is_none());
    }

    #[test]
    fn plain_response_passes_through() {
        let stage = CryptoStage::new(Arc::new(BoxCipher::new()));
        let context = Context::default();
        let snapshot = context.snapshot();
        let cx = StageContext {
            context: &context,
            snapshot: &snapshot,
        };

        let body = json!({"errorCode": "ApiCrypto::PRIVATE_KEY_NOT_FOUND"});
        let mut response = TransportResponse::new(400, body.clone());
        stage.on_response(&mut response, &cx).unwrap();
        assert_eq!(response.body, body);
    }

    #[test]
    fn seals_request_and_opens_server_reply() {
        let client = Arc::new(BoxCipher::new());
        let server = BoxCipher::new();
        let stage = CryptoStage::new(client.clone());
        assert_eq!(stage.cipher_id(), "nacl-box");

        let context = Context::default();
        context
            .set(ContextKey::PublicKey, server.public_key())
            .unwrap();
        let snapshot = context.snapshot();
        let cx = StageContext {
            context: &context,
            snapshot: &snapshot,
        };

        let mut request = request_with_body();
        stage.on_request(&mut request, &cx).unwrap();
        assert_eq!(
            request.headers.get(ENCRYPTION_KEY_HEADER).unwrap(),
            server.public_key().as_str()
        );
        let body = request.body.as_ref().unwrap();
        assert!(SealedPayload::is_envelope(body));

        // Server side: open the request, seal a reply for the client
        let sealed = SealedPayload::from_value(body).unwrap().unwrap();
        let sender = sealed.public_key.clone().unwrap();
        let opened = server.open(&sealed, &sender).unwrap();
        assert_eq!(
            serde_json::from_slice::<serde_json::Value>(&opened).unwrap(),
            json!({"amount": 42})
        );
        let reply = server.seal(br#"{"id":"pay_1"}"#, &sender).unwrap();

        let mut response = TransportResponse::new(200, reply.to_value());
        stage.on_response(&mut response, &cx).unwrap();
        assert_eq!(response.body, json!({"id": "pay_1"}));
    }

    #[test]
    fn bodyless_request_still_announces_key() {
        let server = BoxCipher::new();
        let stage = CryptoStage::new(Arc::new(BoxCipher::new()));
        let context = Context::default();
        context
            .set(ContextKey::PublicKey, server.public_key())
            .unwrap();
        let snapshot = context.snapshot();
        let cx = StageContext {
            context: &context,
            snapshot: &snapshot,
        };

        let mut request = TransportRequest::new(Method::GET, "/payments");
        stage.on_request(&mut request, &cx).unwrap();
        assert!(request.body.is_none());
        assert!(request.headers.get(ENCRYPTION_KEY_HEADER).is_some());
    }

    #[test]
    fn sealed_response_without_key_is_an_error() {
        let client = BoxCipher::new();
        let server = BoxCipher::new();
        let reply = server.seal(b"{}", &client.public_key()).unwrap();

        let stage = CryptoStage::new(Arc::new(client));
        let context = Context::default();
        let snapshot = context.snapshot();
        let cx = StageContext {
            context: &context,
            snapshot: &snapshot,
        };
        let mut response = TransportResponse::new(200, reply.to_value());
        let err = stage.on_response(&mut response, &cx).unwrap_err();
        assert!(matches!(err, StageError::NoKeyNegotiated), "got: {err}");
    }
}
