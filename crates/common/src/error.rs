//! Common error types

use thiserror::Error;

/// Errors raised while loading or validating client configuration
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Context error: {0}")]
    Context(String),
}

/// Result alias using common Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_includes_context() {
        let config_err = Error::Config("max_key_refresh_attempts must be 1..=5".into());
        assert_eq!(
            config_err.to_string(),
            "Configuration error: max_key_refresh_attempts must be 1..=5"
        );

        let io_err = Error::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "file not found",
        ));
        assert!(
            io_err.to_string().starts_with("I/O error:"),
            "got: {}",
            io_err
        );
    }

    #[test]
    fn toml_errors_convert() {
        let parse: std::result::Result<toml::Table, _> = toml::from_str("not = valid = toml");
        let err: Error = parse.unwrap_err().into();
        assert!(err.to_string().starts_with("TOML parse error:"), "got: {err}");
    }

    #[test]
    fn context_error_names_variant_in_debug() {
        let err = Error::Context("session id is immutable".into());
        let debug = format!("{:?}", err);
        assert!(
            debug.contains("Context"),
            "Debug should include variant name, got: {debug}"
        );
    }
}
