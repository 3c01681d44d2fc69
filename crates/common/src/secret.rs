//! Redacting holder for the client api key and private key bytes
//!
//! Neither value may reach a log line: `Debug` and `Display` both print a
//! fixed marker, and the bytes are wiped when the holder is dropped. Config
//! files deserialize straight into `Secret<String>`.

use std::fmt;
use zeroize::Zeroize;

const REDACTED: &str = "[REDACTED]";

/// Credential or key material, wiped on drop
pub struct Secret<T: Zeroize>(T);

impl<T: Zeroize> Secret<T> {
    pub fn new(value: T) -> Self {
        Self(value)
    }

    /// Borrow the raw value. Callers must not log it.
    pub fn expose(&self) -> &T {
        &self.0
    }
}

impl Secret<String> {
    /// An api key configured as `""` counts as absent
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<T: Zeroize + Default> Default for Secret<T> {
    fn default() -> Self {
        Self(T::default())
    }
}

impl<T: Zeroize + Clone> Clone for Secret<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T: Zeroize> Drop for Secret<T> {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl<T: Zeroize> fmt::Debug for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

impl<T: Zeroize> fmt::Display for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

impl<'de> serde::Deserialize<'de> for Secret<String> {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Secret::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_key_never_formats() {
        let api_key = Secret::new(String::from("ak_live_123"));
        assert_eq!(format!("{api_key:?}"), REDACTED);
        assert_eq!(format!("{api_key}"), REDACTED);
        assert_eq!(api_key.expose(), "ak_live_123");
    }

    #[test]
    fn private_key_bytes_are_held_redacted() {
        let key = Secret::new([7u8; 32]);
        assert_eq!(key.expose()[31], 7);
        assert_eq!(format!("{:?}", key.clone()), REDACTED);
    }

    #[test]
    fn api_key_loads_from_toml() {
        #[derive(serde::Deserialize)]
        struct ClientFile {
            api_key: Secret<String>,
        }
        let file: ClientFile = toml::from_str(r#"api_key = "ak_file""#).unwrap();
        assert_eq!(file.api_key.expose(), "ak_file");
        assert!(!file.api_key.is_empty());
    }

    #[test]
    fn blank_api_key_counts_as_empty() {
        assert!(Secret::<String>::default().is_empty());
        assert!(Secret::new(String::new()).is_empty());
    }
}
