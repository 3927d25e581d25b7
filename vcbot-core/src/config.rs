//! vcbot-core/src/config.rs
//!
//! Runtime settings. The token only ever comes from the environment (or a `.env`
//! file); everything else has a default that the binary's flags may override.

use std::time::Duration;

use tracing::debug;

use crate::Error;

pub const TOKEN_ENV_VAR: &str = "DISCORD_TOKEN";
pub const DEFAULT_HTTP_PORT: u16 = 3000;
pub const DEFAULT_JOIN_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_COMMAND_PREFIX: &str = "!";

#[derive(Clone)]
pub struct BotConfig {
    /// `None` when the variable is unset or blank.
    pub discord_token: Option<String>,
    pub http_port: u16,
    pub join_timeout: Duration,
    pub command_prefix: String,
}

impl std::fmt::Debug for BotConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotConfig")
            .field("discord_token", &self.discord_token.as_ref().map(|_| "<redacted>"))
            .field("http_port", &self.http_port)
            .field("join_timeout", &self.join_timeout)
            .field("command_prefix", &self.command_prefix)
            .finish()
    }
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            discord_token: None,
            http_port: DEFAULT_HTTP_PORT,
            join_timeout: DEFAULT_JOIN_TIMEOUT,
            command_prefix: DEFAULT_COMMAND_PREFIX.to_string(),
        }
    }
}

impl BotConfig {
    /// Loads `.env` (if present) and reads the process environment.
    pub fn from_env() -> Self {
        if let Err(e) = dotenv::dotenv() {
            debug!("No .env file loaded => {e}");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env`, but with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let discord_token = lookup(TOKEN_ENV_VAR)
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());

        Self {
            discord_token,
            ..Self::default()
        }
    }

    pub fn with_http_port(mut self, port: Option<u16>) -> Self {
        if let Some(p) = port {
            self.http_port = p;
        }
        self
    }

    pub fn with_join_timeout_secs(mut self, secs: Option<u64>) -> Self {
        if let Some(s) = secs {
            self.join_timeout = Duration::from_secs(s);
        }
        self
    }

    pub fn with_command_prefix(mut self, prefix: Option<String>) -> Self {
        if let Some(p) = prefix {
            self.command_prefix = p;
        }
        self
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.command_prefix.trim().is_empty() {
            return Err(Error::Config("command prefix must not be empty".into()));
        }
        if self.join_timeout.is_zero() {
            return Err(Error::Config("join timeout must be greater than zero".into()));
        }
        Ok(())
    }
}
