//! Command-line interface for the bot binary.

use std::path::{Path, PathBuf};

use clap::Parser;
use proctor_types::config::{BotConfig, BotSecrets};
use secrecy::SecretString;

#[derive(Debug, Parser)]
#[command(name = "proctor", about = "Education-management Telegram admin bot")]
pub struct Cli {
    /// Path of the configuration file.
    #[arg(long, default_value = "proctor.toml")]
    pub config: PathBuf,

    /// Base URL of the backend API; overrides the config file.
    #[arg(long, env = "PROCTOR_API_URL")]
    pub api_url: Option<String>,

    /// Keep sessions in memory instead of SQLite (they will not survive
    /// a restart).
    #[arg(long)]
    pub in_memory: bool,

    /// Export tracing spans via OpenTelemetry (stdout exporter).
    #[arg(long)]
    pub otel: bool,

    /// Telegram bot token.
    #[arg(long, env = "TELEGRAM_BOT_TOKEN", hide_env_values = true)]
    pub bot_token: String,

    /// Shared secret for the backend's telegram-login endpoint.
    #[arg(long, env = "PROCTOR_LOGIN_SECRET", hide_env_values = true)]
    pub login_secret: String,
}

impl Cli {
    /// Resolve the effective config: the file when present, otherwise
    /// defaults around `--api-url`.
    pub fn load_config(&self) -> anyhow::Result<BotConfig> {
        let mut config = if self.config.exists() {
            read_config(&self.config)?
        } else {
            let Some(api_url) = &self.api_url else {
                anyhow::bail!(
                    "no config file at {} and no --api-url / PROCTOR_API_URL given",
                    self.config.display()
                );
            };
            BotConfig::with_api_url(api_url.clone())
        };

        if let Some(api_url) = &self.api_url {
            config.api_base_url = api_url.clone();
        }
        Ok(config)
    }

    pub fn secrets(&self) -> BotSecrets {
        BotSecrets {
            bot_token: SecretString::from(self.bot_token.clone()),
            login_secret: SecretString::from(self.login_secret.clone()),
        }
    }
}

fn read_config(path: &Path) -> anyhow::Result<BotConfig> {
    let raw = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(args: &[&str]) -> Cli {
        let mut full = vec!["proctor", "--bot-token", "t", "--login-secret", "s"];
        full.extend_from_slice(args);
        Cli::parse_from(full)
    }

    #[test]
    fn test_api_url_override_without_config_file() {
        let cli = cli(&["--config", "/nonexistent/proctor.toml", "--api-url", "http://api"]);
        let config = cli.load_config().unwrap();
        assert_eq!(config.api_base_url, "http://api");
        assert_eq!(config.page_size, 6);
    }

    #[test]
    fn test_missing_config_and_api_url_is_an_error() {
        let cli = cli(&["--config", "/nonexistent/proctor.toml"]);
        assert!(cli.load_config().is_err());
    }

    #[test]
    fn test_flags_default_off() {
        let cli = cli(&[]);
        assert!(!cli.in_memory);
        assert!(!cli.otel);
    }
}
