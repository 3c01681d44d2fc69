//! Shared building blocks for the sealed client workspace
//!
//! Holds the redacting `Secret` wrapper used for credentials and key material,
//! and the configuration error type shared by the client crates.

mod secret;
mod error;

pub use secret::Secret;
pub use error::{Error, Result};
