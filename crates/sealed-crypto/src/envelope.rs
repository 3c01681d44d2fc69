//! Sealed payload envelope
//!
//! Wire format (JSON):
//! `{"alg": "x25519-xsalsa20poly1305", "data": base64(nonce || ciphertext), "publicKey": base64(sender pk)}`
//!
//! The `alg` marker is what distinguishes an envelope from an ordinary JSON
//! body. Plain bodies (such as key-exchange error responses) never carry it.

use serde::{Deserialize, Serialize};

use crate::constants::{ENVELOPE_DATA_FIELD, ENVELOPE_KEY_FIELD};
use crate::error::{Error, Result};

/// Algorithm marker written into every envelope.
pub const ENVELOPE_ALG: &str = "x25519-xsalsa20poly1305";

/// An encrypted body as it travels over the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedPayload {
    pub alg: String,
    /// `base64(nonce || ciphertext)`
    pub data: String,
    /// Sender public key; the server may omit it on responses
    #[serde(
        rename = "publicKey",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub public_key: Option<String>,
}

impl SealedPayload {
    pub fn new(data: String, public_key: Option<String>) -> Self {
        Self {
            alg: ENVELOPE_ALG.to_string(),
            data,
            public_key,
        }
    }

    /// Whether a JSON body looks like a sealed envelope.
    pub fn is_envelope(body: &serde_json::Value) -> bool {
        body.get("alg").and_then(|a| a.as_str()) == Some(ENVELOPE_ALG)
            && body
                .get(ENVELOPE_DATA_FIELD)
                .is_some_and(|d| d.is_string())
    }

    /// Parse an envelope out of a JSON body.
    ///
    /// Returns `Ok(None)` for bodies that are not envelopes at all, and an
    /// error for bodies that claim to be envelopes but are malformed.
    pub fn from_value(body: &serde_json::Value) -> Result<Option<Self>> {
        if body.get("alg").and_then(|a| a.as_str()) != Some(ENVELOPE_ALG) {
            return Ok(None);
        }
        serde_json::from_value(body.clone())
            .map(Some)
            .map_err(|e| Error::Envelope(format!("{e}")))
    }

    pub fn to_value(&self) -> serde_json::Value {
        let mut body = serde_json::Map::new();
        body.insert("alg".into(), self.alg.clone().into());
        body.insert(ENVELOPE_DATA_FIELD.into(), self.data.clone().into());
        if let Some(key) = &self.public_key {
            body.insert(ENVELOPE_KEY_FIELD.into(), key.clone().into());
        }
        serde_json::Value::Object(body)
    }
}
