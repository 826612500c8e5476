//! Outbound notification channels

use async_trait::async_trait;
use teloxide::prelude::*;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The subscriber never bound a Telegram account
    #[error("User {0} does not have a Telegram account bound")]
    RecipientUnreachable(i64),

    #[error(transparent)]
    Telegram(#[from] teloxide::RequestError),
}

/// Capability to deliver a text to a bound external account
#[async_trait]
pub trait Notifier: Send + Sync + 'static {
    async fn send(&self, recipient: i64, text: &str) -> Result<(), DeliveryError>;
}

pub struct TelegramNotifier {
    bot: Bot,
}

impl TelegramNotifier {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, recipient: i64, text: &str) -> Result<(), DeliveryError> {
        self.bot.send_message(ChatId(recipient), text).await?;
        Ok(())
    }
}

/// Notifier used when no bot token is configured; writes messages to the log
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, recipient: i64, text: &str) -> Result<(), DeliveryError> {
        info!(recipient, "Notification (not delivered, Telegram disabled): {}", text);
        Ok(())
    }
}

/// Text of the birthday notification
pub fn birthday_message(display_name: &str) -> String {
    format!(
        "Today is {}'s birthday! Don't forget to congratulate them!",
        display_name
    )
}
