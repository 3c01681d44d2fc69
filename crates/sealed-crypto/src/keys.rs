//! Curve25519 key material for payload sealing
//!
//! Keys travel as standard base64 strings: the server hands its public key to
//! the client inside the key-exchange error payload, and the client announces
//! its own public key inside every sealed envelope. Only fingerprints of keys
//! are ever logged.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use common::Secret;
use rand::RngExt;
use sha2::{Digest, Sha256};

use crate::constants::{FINGERPRINT_BYTES, KEY_LENGTH};
use crate::error::{Error, Result};

/// X25519 keypair owned by one client instance.
///
/// The secret half is wrapped in `Secret` so it is redacted from Debug output
/// and zeroized when the keypair is dropped.
#[derive(Debug, Clone)]
pub struct KeyPair {
    public_key: [u8; KEY_LENGTH],
    secret_key: Secret<[u8; KEY_LENGTH]>,
}

impl KeyPair {
    pub fn public_key(&self) -> &[u8; KEY_LENGTH] {
        &self.public_key
    }

    pub(crate) fn secret_key(&self) -> &[u8; KEY_LENGTH] {
        self.secret_key.expose()
    }

    /// Public key encoded for the wire.
    pub fn public_key_base64(&self) -> String {
        encode_key(&self.public_key)
    }
}

/// Generate a fresh random keypair from the thread-local CSPRNG.
pub fn generate_keypair() -> KeyPair {
    let mut bytes = [0u8; KEY_LENGTH];
    rand::rng().fill(&mut bytes);
    let secret = crypto_box::SecretKey::from(bytes);
    let public_key = *secret.public_key().as_bytes();
    KeyPair {
        public_key,
        secret_key: Secret::new(bytes),
    }
}

/// Encode raw key bytes as standard base64.
pub fn encode_key(key: &[u8; KEY_LENGTH]) -> String {
    STANDARD.encode(key)
}

/// Decode a base64 public key received from the server.
pub fn decode_public_key(encoded: &str) -> Result<[u8; KEY_LENGTH]> {
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| Error::InvalidKey(format!("not base64: {e}")))?;
    bytes.as_slice().try_into().map_err(|_| {
        Error::InvalidKey(format!(
            "expected {KEY_LENGTH} bytes, got {}",
            bytes.len()
        ))
    })
}

/// Short hex fingerprint of a key string, safe for logs.
///
/// `fingerprint = hex(SHA256(key)[..8])`. Works on any string so that
/// malformed keys supplied by a server can still be identified in logs.
pub fn key_fingerprint(key: &str) -> String {
    let hash = Sha256::digest(key.as_bytes());
    hash[..FINGERPRINT_BYTES]
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keypairs_are_unique() {
        let a = generate_keypair();
        let b = generate_keypair();
        assert_ne!(a.public_key(), b.public_key(), "two keypairs must not collide");
    }

    #[test]
    fn public_key_matches_secret() {
        let pair = generate_keypair();
        let derived = crypto_box::SecretKey::from(*pair.secret_key()).public_key();
        assert_eq!(derived.as_bytes(), pair.public_key());
    }

    #[test]
    fn encoded_key_decodes_back() {
        let pair = generate_keypair();
        let encoded = pair.public_key_base64();
        assert_eq!(encoded.len(), 44);
        assert_eq!(&decode_public_key(&encoded).unwrap(), pair.public_key());
    }

    #[test]
    fn decode_rejects_wrong_length() {
        let err = decode_public_key(&STANDARD.encode([1u8; 16])).unwrap_err();
        assert!(err.to_string().contains("expected 32 bytes"), "got: {err}");
    }

    #[test]
    fn decode_rejects_non_base64() {
        assert!(matches!(
            decode_public_key("PK1!"),
            Err(Error::InvalidKey(_))
        ));
    }

    #[test]
    fn debug_redacts_secret_half() {
        let pair = generate_keypair();
        let debug = format!("{pair:?}");
        assert!(debug.contains("[REDACTED]"), "got: {debug}");
    }

    #[test]
    fn fingerprint_is_deterministic_hex() {
        let a = key_fingerprint("PK1");
        assert_eq!(a, key_fingerprint("PK1"));
        assert_ne!(a, key_fingerprint("PK2"));
        assert_eq!(a.len(), FINGERPRINT_BYTES * 2);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn fingerprint_matches_known_value() {
        // SHA256("hello") = 2cf24dba5fb0a30e...
        assert_eq!(key_fingerprint("hello"), "2cf24dba5fb0a30e");
    }
}
