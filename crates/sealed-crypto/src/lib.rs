//! Payload sealing for the sealed client
//!
//! Provides the `PayloadCipher` seam consumed by the crypto interceptor, the
//! JSON envelope encrypted bodies travel in, and a NaCl box implementation
//! backed by the `crypto_box` crate. No primitive is implemented here.
//!
//! Key flow:
//! 1. Each client instance generates one keypair (`BoxCipher::new()`)
//! 2. The server publishes its public key during key exchange
//! 3. Outgoing bodies: `seal(body, server_pk)` → envelope with client pk
//! 4. Incoming envelopes: `open(envelope, server_pk)` → plaintext body

pub mod cipher;
pub mod constants;
pub mod envelope;
pub mod error;
pub mod keys;

pub use cipher::{BoxCipher, PayloadCipher};
pub use envelope::{ENVELOPE_ALG, SealedPayload};
pub use error::{Error, Result};
pub use keys::{KeyPair, decode_public_key, encode_key, generate_keypair, key_fingerprint};
