//! Payload cipher seam and the NaCl box implementation
//!
//! The client seals outgoing bodies for the server's public key with its own
//! secret key, and opens incoming bodies sealed by the server for the
//! client's public key. Both directions derive the same shared key, so one
//! keypair per client instance is enough.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use crypto_box::aead::Aead;
use crypto_box::{Nonce, PublicKey, SalsaBox, SecretKey};
use rand::RngExt;
use tracing::debug;

use crate::constants::NONCE_LENGTH;
use crate::envelope::SealedPayload;
use crate::error::{Error, Result};
use crate::keys::{KeyPair, decode_public_key, generate_keypair, key_fingerprint};

/// Encryption seam used by the crypto interceptor.
///
/// `remote_public_key` is the base64 key the server published during key
/// exchange. Implementations must be deterministic in the sense that
/// `open(seal(p, k), k') == p` whenever `k'` is the counterpart of `k`.
pub trait PayloadCipher: Send + Sync {
    /// Identifier for logging (e.g. "nacl-box")
    fn id(&self) -> &str;

    /// Seal a plaintext body for the given server key.
    fn seal(&self, plaintext: &[u8], remote_public_key: &str) -> Result<SealedPayload>;

    /// Open a body the server sealed for this client.
    fn open(&self, sealed: &SealedPayload, remote_public_key: &str) -> Result<Vec<u8>>;

    /// Whether `remote_public_key` is usable for `seal`/`open`. Checked before
    /// a server-supplied key is adopted.
    fn accepts_key(&self, _remote_public_key: &str) -> bool {
        true
    }
}

/// X25519 + XSalsa20-Poly1305 cipher holding one client keypair.
#[derive(Debug)]
pub struct BoxCipher {
    keypair: KeyPair,
}

impl BoxCipher {
    /// Create a cipher with a freshly generated keypair.
    pub fn new() -> Self {
        Self::from_keypair(generate_keypair())
    }

    pub fn from_keypair(keypair: KeyPair) -> Self {
        Self { keypair }
    }

    /// The client public key announced in every envelope.
    pub fn public_key(&self) -> String {
        self.keypair.public_key_base64()
    }

    fn salsa_box(&self, remote_public_key: &str) -> Result<SalsaBox> {
        let remote = PublicKey::from(decode_public_key(remote_public_key)?);
        let secret = SecretKey::from(*self.keypair.secret_key());
        Ok(SalsaBox::new(&remote, &secret))
    }
}

impl Default for BoxCipher {
    fn default() -> Self {
        Self::new()
    }
}

impl PayloadCipher for BoxCipher {
    fn id(&self) -> &str {
        "nacl-box"
    }

    fn seal(&self, plaintext: &[u8], remote_public_key: &str) -> Result<SealedPayload> {
        let salsa_box = self.salsa_box(remote_public_key)?;

        let mut nonce_bytes = [0u8; NONCE_LENGTH];
        rand::rng().fill(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = salsa_box
            .encrypt(nonce, plaintext)
            .map_err(|_| Error::Encryption("box seal failed".into()))?;

        let mut combined = Vec::with_capacity(NONCE_LENGTH + ciphertext.len());
        combined.extend_from_slice(&nonce_bytes);
        combined.extend_from_slice(&ciphertext);

        debug!(
            key_fingerprint = %key_fingerprint(remote_public_key),
            bytes = plaintext.len(),
            "sealed payload"
        );
        Ok(SealedPayload::new(
            STANDARD.encode(combined),
            Some(self.public_key()),
        ))
    }

    fn open(&self, sealed: &SealedPayload, remote_public_key: &str) -> Result<Vec<u8>> {
        let data = STANDARD
            .decode(&sealed.data)
            .map_err(|e| Error::Envelope(format!("data is not base64: {e}")))?;
        if data.len() < NONCE_LENGTH {
            return Err(Error::Envelope("sealed payload too short".into()));
        }

        let nonce = Nonce::from_slice(&data[..NONCE_LENGTH]);
        let salsa_box = self.salsa_box(remote_public_key)?;
        salsa_box
            .decrypt(nonce, &data[NONCE_LENGTH..])
            .map_err(|_| Error::Decryption("box open failed (wrong key or tampered)".into()))
    }

    fn accepts_key(&self, remote_public_key: &str) -> bool {
        decode_public_key(remote_public_key).is_ok()
    }
}
