//! Error types for payload sealing operations

/// Errors from key handling and payload sealing.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid public key: {0}")]
    InvalidKey(String),

    #[error("encryption failed: {0}")]
    Encryption(String),

    #[error("decryption failed: {0}")]
    Decryption(String),

    #[error("malformed envelope: {0}")]
    Envelope(String),
}

/// Result alias for crypto operations.
pub type Result<T> = std::result::Result<T, Error>;
