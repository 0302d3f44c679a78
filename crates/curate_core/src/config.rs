//! Configuration loading from environment variables.

use crate::constants::{
    DEFAULT_MAX_BODY_SIZE, DEFAULT_PORT, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_SERVER_URL,
};
use serde::Deserialize;
use std::env;
use std::time::Duration;

/// Runtime configuration shared by the server, the CLI and HTTP clients.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub port: u16,
    pub max_body_size: usize,
    pub server_url: String,
    pub request_timeout_secs: u64,
    pub allow_public_access: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            server_url: DEFAULT_SERVER_URL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            allow_public_access: false,
        }
    }
}

/// Parse a boolean-like environment flag value.
///
/// # Supported Values
/// - Truthy: `1`, `true`, `yes`, `on`
/// - Falsy: `0`, `false`, `no`, `off`, empty string
///
/// Matching is case-insensitive and ignores surrounding whitespace.
///
/// # Returns
/// `Some(bool)` when the value is recognized, otherwise `None`.
pub fn parse_env_flag(value: &str) -> Option<bool> {
    let normalized = value.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "" | "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Returns
    /// A populated [`Config`] with defaults applied when env vars are missing.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable source.
    ///
    /// Unparseable values fall back to their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            port: lookup("PORT")
                .and_then(|p| p.trim().parse().ok())
                .unwrap_or(defaults.port),
            max_body_size: lookup("MAX_BODY_SIZE")
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(defaults.max_body_size),
            server_url: lookup("CURATE_SERVER")
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or(defaults.server_url),
            request_timeout_secs: lookup("REQUEST_TIMEOUT_SECS")
                .and_then(|s| s.trim().parse().ok())
                .filter(|secs| *secs > 0)
                .unwrap_or(defaults.request_timeout_secs),
            allow_public_access: lookup("ALLOW_PUBLIC_ACCESS")
                .and_then(|value| parse_env_flag(&value))
                .unwrap_or(false),
        }
    }

    /// Per-request timeout handed to HTTP transports.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_env_flag, Config};
    use crate::constants::{DEFAULT_PORT, DEFAULT_SERVER_URL};
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn parse_env_flag_accepts_truthy_values() {
        for value in ["1", "true", "TRUE", " yes ", "on"] {
            assert_eq!(parse_env_flag(value), Some(true), "value: {}", value);
        }
    }

    #[test]
    fn parse_env_flag_accepts_falsy_values() {
        for value in ["", "0", "false", "FALSE", " no ", "off"] {
            assert_eq!(parse_env_flag(value), Some(false), "value: {}", value);
        }
    }

    #[test]
    fn parse_env_flag_rejects_unknown_values() {
        assert_eq!(parse_env_flag("maybe"), None);
        assert_eq!(parse_env_flag("enabled"), None);
    }

    #[test]
    fn missing_variables_fall_back_to_defaults() {
        let config = Config::from_lookup(lookup_from(&[]));
        assert_eq!(config, Config::default());
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.server_url, DEFAULT_SERVER_URL);
    }

    #[test]
    fn explicit_variables_override_defaults() {
        let config = Config::from_lookup(lookup_from(&[
            ("PORT", "4040"),
            ("MAX_BODY_SIZE", "2048"),
            ("CURATE_SERVER", " http://10.0.0.2:4040 "),
            ("REQUEST_TIMEOUT_SECS", "5"),
            ("ALLOW_PUBLIC_ACCESS", "yes"),
        ]));
        assert_eq!(config.port, 4040);
        assert_eq!(config.max_body_size, 2048);
        assert_eq!(config.server_url, "http://10.0.0.2:4040");
        assert_eq!(config.request_timeout().as_secs(), 5);
        assert!(config.allow_public_access);
    }

    #[test]
    fn invalid_values_are_ignored() {
        let config = Config::from_lookup(lookup_from(&[
            ("PORT", "not-a-port"),
            ("REQUEST_TIMEOUT_SECS", "0"),
            ("ALLOW_PUBLIC_ACCESS", "sometimes"),
            ("CURATE_SERVER", "   "),
        ]));
        assert_eq!(config, Config::default());
    }
}
