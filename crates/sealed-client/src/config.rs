//! Client configuration and per-call overrides
//!
//! Two layers: `ClientConfig` is fixed at construction, `CallOptions` is
//! merged on top for a single call. Merging produces an `EffectiveConfig`
//! and never mutates the instance config.
//!
//! The api key may come from the TOML file or from the `SEALED_CLIENT_API_KEY`
//! env var; the env var wins.

use std::path::Path;
use std::time::Duration;

use common::Secret;
use sealed_transport::RetryPolicy;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::constants::{ACCESS_TOKEN_HEADER, AUTH_TOKEN_HEADER, DEFAULT_CLIENT_ID};

/// Env var overriding the configured api key
pub const API_KEY_ENV: &str = "SEALED_CLIENT_API_KEY";

/// Upper bound accepted for `max_key_refresh_attempts`
pub const MAX_KEY_REFRESH_LIMIT: u32 = 5;

/// Which request header carries the bearer credential.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthHeader {
    #[default]
    AccessToken,
    AuthToken,
}

impl AuthHeader {
    pub fn header_name(&self) -> &'static str {
        match self {
            AuthHeader::AccessToken => ACCESS_TOKEN_HEADER,
            AuthHeader::AuthToken => AUTH_TOKEN_HEADER,
        }
    }
}

/// Instance-level configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<Secret<String>>,
    #[serde(default = "default_client_id")]
    pub client_id: String,
    #[serde(default)]
    pub auth_header: AuthHeader,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Key-exchange retries allowed per logical call
    #[serde(default = "default_max_key_refresh_attempts")]
    pub max_key_refresh_attempts: u32,
    #[serde(default)]
    pub disable_crypto: bool,
    #[serde(default)]
    pub disable_header_injection: bool,
    /// Passed through to the transport unmodified
    #[serde(default)]
    pub retry: RetryPolicy,
}

fn default_client_id() -> String {
    DEFAULT_CLIENT_ID.to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_max_key_refresh_attempts() -> u32 {
    2
}

impl ClientConfig {
    /// Defaults for everything but the base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: None,
            client_id: default_client_id(),
            auth_header: AuthHeader::default(),
            timeout_secs: default_timeout(),
            max_key_refresh_attempts: default_max_key_refresh_attempts(),
            disable_crypto: false,
            disable_header_injection: false,
            retry: RetryPolicy::default(),
        }
    }

    /// Load from a TOML file, then overlay the api key env var.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> common::Result<Self> {
        let mut config: ClientConfig = toml::from_str(contents)?;
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            let key = key.trim().to_owned();
            if !key.is_empty() {
                config.api_key = Some(Secret::new(key));
            }
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> common::Result<()> {
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(common::Error::Config(format!(
                "base_url must start with http:// or https://, got: {}",
                self.base_url
            )));
        }
        if self.timeout_secs == 0 {
            return Err(common::Error::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }
        if self.max_key_refresh_attempts == 0
            || self.max_key_refresh_attempts > MAX_KEY_REFRESH_LIMIT
        {
            return Err(common::Error::Config(format!(
                "max_key_refresh_attempts must be between 1 and {MAX_KEY_REFRESH_LIMIT}, got: {}",
                self.max_key_refresh_attempts
            )));
        }
        if self.client_id.trim().is_empty() {
            return Err(common::Error::Config("client_id must not be empty".into()));
        }
        Ok(())
    }

    /// Overlay per-call options on a copy of the instance settings.
    pub fn merge(&self, options: &CallOptions) -> EffectiveConfig {
        EffectiveConfig {
            retry: options.retry.clone().unwrap_or_else(|| self.retry.clone()),
            disable_crypto: options.disable_crypto.unwrap_or(self.disable_crypto),
            disable_header_injection: options
                .disable_header_injection
                .unwrap_or(self.disable_header_injection),
            timeout: options
                .timeout
                .unwrap_or(Duration::from_secs(self.timeout_secs)),
            max_key_refresh_attempts: options
                .max_key_refresh_attempts
                .unwrap_or(self.max_key_refresh_attempts)
                .clamp(1, MAX_KEY_REFRESH_LIMIT),
            cancel: options.cancel.clone(),
        }
    }
}

/// Per-call overrides. `None` keeps the instance value.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    pub retry: Option<RetryPolicy>,
    pub disable_crypto: Option<bool>,
    pub disable_header_injection: Option<bool>,
    pub timeout: Option<Duration>,
    /// Clamped to `1..=5`; key recovery cannot be switched off per call
    pub max_key_refresh_attempts: Option<u32>,
    /// Cancelling this token ends the call with a `Cancelled` error
    pub cancel: Option<CancellationToken>,
}

/// Settings in force for one call.
#[derive(Debug, Clone)]
pub struct EffectiveConfig {
    pub retry: RetryPolicy,
    pub disable_crypto: bool,
    pub disable_header_injection: bool,
    pub timeout: Duration,
    pub max_key_refresh_attempts: u32,
    pub cancel: Option<CancellationToken>,
}

impl EffectiveConfig {
    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|t| t.is_cancelled())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Serializes tests that touch the api key env var.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// SAFETY: Callers must hold ENV_MUTEX to prevent concurrent env mutation.
    unsafe fn set_env(key: &str, val: &str) {
        unsafe { std::env::set_var(key, val) };
    }

    unsafe fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) };
    }

    fn valid_toml() -> &'static str {
        r#"
base_url = "https://api.example.com"
api_key = "ak_file"
client_id = "dashboard"
auth_header = "auth-token"
max_key_refresh_attempts = 3

[retry]
max_attempts = 4
backoff_ms = 250
"#
    }

    #[test]
    fn test_load_valid_config() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env(API_KEY_ENV) };
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.toml");
        std::fs::write(&path, valid_toml()).unwrap();

        let config = ClientConfig::load(&path).unwrap();
        assert_eq!(config.base_url, "https://api.example.com");
        assert_eq!(config.api_key.as_ref().unwrap().expose(), "ak_file");
        assert_eq!(config.client_id, "dashboard");
        assert_eq!(config.auth_header, AuthHeader::AuthToken);
        assert_eq!(config.max_key_refresh_attempts, 3);
        assert_eq!(config.retry.max_attempts, 4);
        assert_eq!(config.retry.backoff_ms, 250);
        assert_eq!(config.timeout_secs, 30);
        assert!(!config.disable_crypto);
        assert!(!config.disable_header_injection);
    }

    #[test]
    fn test_defaults_from_minimal_toml() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env(API_KEY_ENV) };
        let config = ClientConfig::from_toml_str(r#"base_url = "http://localhost:8080""#).unwrap();
        assert!(config.api_key.is_none());
        assert_eq!(config.client_id, DEFAULT_CLIENT_ID);
        assert_eq!(config.auth_header, AuthHeader::AccessToken);
        assert_eq!(config.max_key_refresh_attempts, 2);
        assert_eq!(config.retry, RetryPolicy::default());
    }

    #[test]
    fn test_api_key_env_overrides_file() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { set_env(API_KEY_ENV, "ak_env") };
        let config = ClientConfig::from_toml_str(valid_toml()).unwrap();
        assert_eq!(config.api_key.as_ref().unwrap().expose(), "ak_env");
        unsafe { remove_env(API_KEY_ENV) };
    }

    #[test]
    fn test_load_missing_file() {
        let result = ClientConfig::load(Path::new("/nonexistent/path/client.toml"));
        assert!(matches!(result, Err(common::Error::Io(_))));
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let err = ClientConfig::from_toml_str(r#"base_url = "api.example.com""#).unwrap_err();
        assert!(
            err.to_string().contains("base_url must start with http"),
            "got: {err}"
        );
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut config = ClientConfig::new("https://api.example.com");
        config.timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_key_refresh_bound_enforced() {
        let mut config = ClientConfig::new("https://api.example.com");
        config.max_key_refresh_attempts = 0;
        assert!(config.validate().is_err());
        config.max_key_refresh_attempts = MAX_KEY_REFRESH_LIMIT + 1;
        assert!(config.validate().is_err());
        config.max_key_refresh_attempts = 1;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_merge_without_overrides_copies_instance() {
        let config = ClientConfig::new("https://api.example.com");
        let effective = config.merge(&CallOptions::default());
        assert_eq!(effective.retry, config.retry);
        assert_eq!(effective.timeout, Duration::from_secs(30));
        assert_eq!(effective.max_key_refresh_attempts, 2);
        assert!(!effective.disable_crypto);
        assert!(!effective.is_cancelled());
    }

    #[test]
    fn test_merge_applies_overrides_without_mutating_instance() {
        let config = ClientConfig::new("https://api.example.com");
        let options = CallOptions {
            retry: Some(RetryPolicy::none()),
            disable_crypto: Some(true),
            timeout: Some(Duration::from_millis(500)),
            max_key_refresh_attempts: Some(99),
            ..CallOptions::default()
        };
        let effective = config.merge(&options);
        assert_eq!(effective.retry.max_attempts, 1);
        assert!(effective.disable_crypto);
        assert!(!effective.disable_header_injection);
        assert_eq!(effective.timeout, Duration::from_millis(500));
        assert_eq!(effective.max_key_refresh_attempts, MAX_KEY_REFRESH_LIMIT);

        assert!(!config.disable_crypto);
        assert_eq!(config.retry, RetryPolicy::default());
    }

    #[test]
    fn test_zero_refresh_override_keeps_recovery_on() {
        let config = ClientConfig::new("https://api.example.com");
        let effective = config.merge(&CallOptions {
            max_key_refresh_attempts: Some(0),
            ..CallOptions::default()
        });
        assert_eq!(effective.max_key_refresh_attempts, 1);
    }

    #[test]
    fn test_cancel_token_flows_into_effective_config() {
        let config = ClientConfig::new("https://api.example.com");
        let token = CancellationToken::new();
        let effective = config.merge(&CallOptions {
            cancel: Some(token.clone()),
            ..CallOptions::default()
        });
        assert!(!effective.is_cancelled());
        token.cancel();
        assert!(effective.is_cancelled());
    }

    #[test]
    fn test_auth_header_names() {
        assert_eq!(AuthHeader::AccessToken.header_name(), ACCESS_TOKEN_HEADER);
        assert_eq!(AuthHeader::AuthToken.header_name(), AUTH_TOKEN_HEADER);
    }
}
