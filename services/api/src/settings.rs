//! Service settings
//!
//! Loaded from an optional `settings` file (any format the `config` crate
//! understands) overlaid with `APP__`-prefixed environment variables, e.g.
//! `APP__SERVER__ADDR=127.0.0.1:9000` or `APP__TELEGRAM__TOKEN=...`.
//! Database and Redis connections keep their own `DATABASE_*` / `REDIS_URL`
//! variables.

use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Deserialize, Debug, Clone)]
pub struct ServerSettings {
    pub addr: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct SessionSettings {
    pub ttl_seconds: u64,
}

#[derive(Deserialize, Debug, Clone)]
pub struct SchedulerSettings {
    pub period_seconds: u64,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct TelegramSettings {
    /// Bot token; the bot and Telegram delivery are disabled without it
    pub token: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct AppSettings {
    pub server: ServerSettings,
    pub session: SessionSettings,
    pub scheduler: SchedulerSettings,
    #[serde(default)]
    pub telegram: TelegramSettings,
}

impl AppSettings {
    pub fn load() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .set_default("server.addr", "0.0.0.0:8080")?
            .set_default("session.ttl_seconds", 86_400)?
            .set_default("scheduler.period_seconds", 86_400)?
            .add_source(File::with_name("settings").required(false))
            .add_source(
                Environment::with_prefix("APP")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: AppSettings = settings.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.session.ttl_seconds == 0 {
            return Err(ConfigError::Message(
                "session.ttl_seconds must be positive".to_string(),
            ));
        }
        if self.scheduler.period_seconds == 0 {
            return Err(ConfigError::Message(
                "scheduler.period_seconds must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn scheduler_period(&self) -> Duration {
        Duration::from_secs(self.scheduler.period_seconds)
    }

    /// Configured bot token, ignoring blank values
    pub fn telegram_token(&self) -> Option<&str> {
        self.telegram
            .token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
    }
}
