//! Sizes and wire names for sealed payloads

/// Curve25519 key length in bytes
pub const KEY_LENGTH: usize = 32;

/// XSalsa20-Poly1305 nonce length in bytes
pub const NONCE_LENGTH: usize = 24;

/// Envelope field carrying `base64(nonce || ciphertext)`
pub const ENVELOPE_DATA_FIELD: &str = "data";

/// Envelope field carrying the sender's base64 public key
pub const ENVELOPE_KEY_FIELD: &str = "publicKey";

/// Number of SHA-256 bytes kept in a key fingerprint
pub const FINGERPRINT_BYTES: usize = 8;
