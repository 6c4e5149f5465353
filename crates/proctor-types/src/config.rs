//! Bot configuration.
//!
//! `BotConfig` represents the `proctor.toml` the binary loads at
//! startup. All fields except the backend URL have defaults; secrets
//! (the chat transport token, the shared login secret) come from the
//! environment and are wrapped in `SecretString`.

use secrecy::SecretString;
use serde::Deserialize;

/// Top-level configuration for the Proctor bot.
#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
    /// Base URL of the backend API, e.g. `https://api.example.edu`.
    pub api_base_url: String,

    /// Path of the SQLite state database.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Buttons per keyboard page.
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Buttons per keyboard row.
    #[serde(default = "default_line_size")]
    pub line_size: usize,

    /// Long-poll timeout for the chat transport, in seconds.
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u64,
}

impl BotConfig {
    /// A config with every defaulted field at its default, for runs
    /// without a `proctor.toml`.
    pub fn with_api_url(api_base_url: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            database_path: default_database_path(),
            page_size: default_page_size(),
            line_size: default_line_size(),
            poll_timeout_secs: default_poll_timeout_secs(),
        }
    }
}

fn default_database_path() -> String {
    "proctor.db".to_string()
}

fn default_page_size() -> usize {
    6
}

fn default_line_size() -> usize {
    1
}

fn default_poll_timeout_secs() -> u64 {
    30
}

/// Secrets read from the environment, never from the config file.
#[derive(Debug, Clone)]
pub struct BotSecrets {
    /// Chat transport bot token.
    pub bot_token: SecretString,
    /// Shared secret for the backend's HMAC login endpoint.
    pub login_secret: SecretString,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let toml_str = r#"api_base_url = "http://localhost:5000""#;
        let config: BotConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.database_path, "proctor.db");
        assert_eq!(config.page_size, 6);
        assert_eq!(config.line_size, 1);
        assert_eq!(config.poll_timeout_secs, 30);
    }

    #[test]
    fn test_config_overrides() {
        let toml_str = r#"
api_base_url = "http://localhost:5000"
page_size = 10
line_size = 2
"#;
        let config: BotConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.page_size, 10);
        assert_eq!(config.line_size, 2);
    }

    #[test]
    fn test_config_requires_api_url() {
        let result: Result<BotConfig, _> = toml::from_str("");
        assert!(result.is_err());
    }
}
