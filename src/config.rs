//! Process-wide configuration, loaded once at startup.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Default registration endpoint the bot posts to.
const DEFAULT_REGISTRATION_URL: &str = "http://127.0.0.1:8000/create-telegram-user/";

/// Immutable service configuration.
///
/// Injected into the gateway and the bot at construction; never read from
/// ambient globals after startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Telegram Bot API token.
    pub bot_token: SecretString,
    /// Shared secret the bot attaches as `X-Bot-Secret`.
    pub api_secret: SecretString,
    /// Full URL of the registration endpoint (bot side).
    pub registration_url: String,
    /// Bind address for the gateway HTTP server.
    pub bind_addr: String,
    /// Path to the libSQL database file.
    pub db_path: PathBuf,
    /// Number of notification worker tasks.
    pub worker_count: usize,
    /// Timeout for the bot's registration HTTP call.
    pub request_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// `TELEGRAM_BOT_TOKEN` and `TELEGRAM_BOT_API_SECRET` are required;
    /// everything else has a default.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup (tests inject a map).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bot_token = lookup("TELEGRAM_BOT_TOKEN")
            .ok_or_else(|| ConfigError::MissingEnvVar("TELEGRAM_BOT_TOKEN".into()))?;
        let api_secret = lookup("TELEGRAM_BOT_API_SECRET")
            .ok_or_else(|| ConfigError::MissingEnvVar("TELEGRAM_BOT_API_SECRET".into()))?;

        let registration_url = lookup("REGISTRATION_API_URL")
            .unwrap_or_else(|| DEFAULT_REGISTRATION_URL.to_string());

        let bind_addr = lookup("REGBRIDGE_BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8000".to_string());

        let db_path = lookup("REGBRIDGE_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./data/regbridge.db"));

        let worker_count = match lookup("REGBRIDGE_WORKERS") {
            Some(raw) => raw.parse::<usize>().map_err(|_| ConfigError::InvalidValue {
                key: "REGBRIDGE_WORKERS".into(),
                message: format!("expected a positive integer, got '{raw}'"),
            })?,
            None => 2,
        };
        if worker_count == 0 {
            return Err(ConfigError::InvalidValue {
                key: "REGBRIDGE_WORKERS".into(),
                message: "must be at least 1".into(),
            });
        }

        let request_timeout_secs: u64 = match lookup("REGBRIDGE_REQUEST_TIMEOUT_SECS") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
                key: "REGBRIDGE_REQUEST_TIMEOUT_SECS".into(),
                message: format!("expected seconds, got '{raw}'"),
            })?,
            None => 10,
        };

        Ok(Self {
            bot_token: SecretString::from(bot_token),
            api_secret: SecretString::from(api_secret),
            registration_url,
            bind_addr,
            db_path,
            worker_count,
            request_timeout: Duration::from_secs(request_timeout_secs),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base_vars() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("TELEGRAM_BOT_TOKEN", "123:ABC"),
            ("TELEGRAM_BOT_API_SECRET", "s3cret"),
        ])
    }

    fn lookup_in(vars: HashMap<&'static str, &'static str>) -> impl Fn(&str) -> Option<String> {
        move |key| vars.get(key).map(|v| v.to_string())
    }

    #[test]
    fn defaults_applied() {
        let config = Config::from_lookup(lookup_in(base_vars())).unwrap();
        assert_eq!(config.registration_url, DEFAULT_REGISTRATION_URL);
        assert_eq!(config.bind_addr, "0.0.0.0:8000");
        assert_eq!(config.worker_count, 2);
        assert_eq!(config.request_timeout, Duration::from_secs(10));
    }

    #[test]
    fn missing_token_is_an_error() {
        let err = Config::from_lookup(|_| None).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref k) if k == "TELEGRAM_BOT_TOKEN"));
    }

    #[test]
    fn missing_secret_is_an_error() {
        let mut vars = base_vars();
        vars.remove("TELEGRAM_BOT_API_SECRET");
        let err = Config::from_lookup(lookup_in(vars)).unwrap_err();
        assert!(
            matches!(err, ConfigError::MissingEnvVar(ref k) if k == "TELEGRAM_BOT_API_SECRET")
        );
    }

    #[test]
    fn worker_count_must_be_positive() {
        let mut vars = base_vars();
        vars.insert("REGBRIDGE_WORKERS", "0");
        let err = Config::from_lookup(lookup_in(vars)).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn worker_count_parse_failure() {
        let mut vars = base_vars();
        vars.insert("REGBRIDGE_WORKERS", "many");
        let err = Config::from_lookup(lookup_in(vars)).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn overrides_respected() {
        let mut vars = base_vars();
        vars.insert(
            "REGISTRATION_API_URL",
            "http://10.0.0.1:9000/create-telegram-user/",
        );
        vars.insert("REGBRIDGE_WORKERS", "8");
        let config = Config::from_lookup(lookup_in(vars)).unwrap();
        assert_eq!(
            config.registration_url,
            "http://10.0.0.1:9000/create-telegram-user/"
        );
        assert_eq!(config.worker_count, 8);
    }
}
