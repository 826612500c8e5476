//! Inbound Telegram command loop
//!
//! Commands are parsed into [`Command`] by teloxide and answered by
//! [`CommandHandler`], which knows nothing about Telegram transport and is
//! tested directly.

use std::sync::Arc;

use auth::{AuthError, AuthGateway};
use common::{
    error::RepositoryError,
    models::{User, normalize_handle},
    repositories::require_any,
};
use teloxide::{prelude::*, utils::command::BotCommands};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

type HandlerResult = anyhow::Result<()>;

const STORE_FAULT_REPLY: &str = "Something went wrong, please try again later.";

/// Telegram rejects longer message texts
pub const MAX_REPLY_CHARS: usize = 4096;

#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(
    rename_rule = "lowercase",
    description = "These commands are supported:"
)]
pub enum Command {
    #[command(description = "link this Telegram account to your registration")]
    Start,
    #[command(description = "list registered users")]
    Users,
    #[command(description = "subscribe to a user's birthday, e.g. /subscribe 1")]
    Subscribe(i64),
    #[command(description = "unsubscribe from a user's birthday, e.g. /unsubscribe 1")]
    Unsubscribe(i64),
}

/// Telegram identity of the message author
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sender {
    pub account_id: i64,
    /// Username without the leading `@`
    pub username: Option<String>,
}

impl Sender {
    fn handle(&self) -> Option<String> {
        self.username
            .as_deref()
            .filter(|name| !name.is_empty())
            .map(normalize_handle)
    }
}

pub struct CommandHandler {
    gateway: AuthGateway,
}

impl CommandHandler {
    pub fn new(gateway: AuthGateway) -> Self {
        Self { gateway }
    }

    /// Answer a command with one or more messages; failures become reply text
    ///
    /// Every message fits in [`MAX_REPLY_CHARS`].
    pub async fn handle(&self, command: Command, sender: &Sender) -> Vec<String> {
        let result = match command {
            Command::Start => self.start(sender).await.map(|reply| vec![reply]),
            Command::Users => self.users().await,
            Command::Subscribe(user_id) => self
                .set_subscription(user_id, sender, true)
                .await
                .map(|reply| vec![reply]),
            Command::Unsubscribe(user_id) => self
                .set_subscription(user_id, sender, false)
                .await
                .map(|reply| vec![reply]),
        };

        result.unwrap_or_else(|reply| vec![reply])
    }

    async fn start(&self, sender: &Sender) -> Result<String, String> {
        let handle = sender.handle().ok_or_else(missing_username)?;

        self.gateway
            .bind_external_account(sender.account_id, &handle)
            .await
            .map_err(|e| match e {
                AuthError::UserNotFound => format!(
                    "No user is registered with the Telegram handle {}. Register first, then send /start again.",
                    handle
                ),
                AuthError::AlreadyExists => format!(
                    "Either {} is already linked to another Telegram account or this account is linked to another user.",
                    handle
                ),
                other => {
                    error!("Failed to bind account {}: {}", sender.account_id, other);
                    STORE_FAULT_REPLY.to_string()
                }
            })?;

        info!("Bound Telegram account {} to {}", sender.account_id, handle);
        Ok(format!(
            "Welcome! You will be notified about birthdays of the users you subscribe to.\n\n{}",
            Command::descriptions()
        ))
    }

    async fn users(&self) -> Result<Vec<String>, String> {
        let users = self
            .gateway
            .users()
            .list()
            .await
            .and_then(require_any)
            .map_err(reply_for)?;

        Ok(pack_lines(users.iter().map(user_line), MAX_REPLY_CHARS))
    }

    async fn set_subscription(
        &self,
        user_id: i64,
        sender: &Sender,
        active: bool,
    ) -> Result<String, String> {
        let handle = sender.handle().ok_or_else(missing_username)?;
        let users = self.gateway.users();

        let subscriber = users
            .find_by_telegram(&handle)
            .await
            .map_err(reply_for)?
            .ok_or_else(|| format!("No user is registered with the Telegram handle {}.", handle))?;

        // A handle can change owners on Telegram; only the bound account acts for the user
        if subscriber
            .telegram_id
            .is_some_and(|bound| bound != sender.account_id)
        {
            warn!(
                "Account {} tried to act as {}, which is bound to another account",
                sender.account_id, handle
            );
            return Err(format!(
                "{} is linked to another Telegram account.",
                handle
            ));
        }

        let target = if active {
            users.subscribe(user_id, subscriber.id).await
        } else {
            users.unsubscribe(user_id, subscriber.id).await
        }
        .map_err(reply_for)?;

        Ok(if active {
            format!("You subscribed to {}", target.telegram)
        } else {
            format!("You unsubscribed from {}", target.telegram)
        })
    }
}

fn missing_username() -> String {
    "Set a Telegram username in your profile first, it is how we find your registration."
        .to_string()
}

fn reply_for(err: RepositoryError) -> String {
    if err.is_store_fault() {
        error!("User store failure while answering a command: {}", err);
        STORE_FAULT_REPLY.to_string()
    } else {
        err.to_string()
    }
}

/// Join lines into as few messages as possible, each at most `limit` characters
///
/// A single line longer than `limit` is cut.
fn pack_lines(lines: impl IntoIterator<Item = String>, limit: usize) -> Vec<String> {
    let mut messages = Vec::new();
    let mut current = String::new();
    let mut current_chars = 0;

    for line in lines {
        let line: String = line.chars().take(limit).collect();
        let line_chars = line.chars().count();

        if current_chars > 0 && current_chars + 1 + line_chars > limit {
            messages.push(std::mem::take(&mut current));
            current_chars = 0;
        }
        if current_chars > 0 {
            current.push('\n');
            current_chars += 1;
        }
        current.push_str(&line);
        current_chars += line_chars;
    }

    if current_chars > 0 {
        messages.push(current);
    }
    messages
}

fn user_line(user: &User) -> String {
    format!(
        "ID: {} Name: {} {} {}",
        user.id,
        user.display_name(),
        user.birthday.format("%Y-%m-%d"),
        user.telegram
    )
}

/// Serve bot commands until `cancellation_token` fires
pub async fn run_bot(
    bot: Bot,
    handler: Arc<CommandHandler>,
    cancellation_token: CancellationToken,
) {
    info!("Starting Telegram bot");

    let schema = Update::filter_message()
        .branch(teloxide::filter_command::<Command, _>().endpoint(answer))
        .branch(
            dptree::filter(|msg: Message| looks_like_command(msg.text()))
                .endpoint(unknown_command),
        );

    let mut dispatcher = Dispatcher::builder(bot, schema)
        .dependencies(dptree::deps![handler])
        .build();

    tokio::select! {
        _ = dispatcher.dispatch() => warn!("Telegram dispatcher exited on its own"),
        _ = cancellation_token.cancelled() => {}
    }

    info!("Telegram bot stopped");
}

async fn answer(
    bot: Bot,
    msg: Message,
    command: Command,
    handler: Arc<CommandHandler>,
) -> HandlerResult {
    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };
    let sender = Sender {
        account_id: user.id.0 as i64,
        username: user.username.clone(),
    };

    for reply in handler.handle(command, &sender).await {
        bot.send_message(msg.chat.id, reply).await?;
    }
    Ok(())
}

/// Plain chatter is ignored; only unparsable `/commands` get a hint
fn looks_like_command(text: Option<&str>) -> bool {
    text.is_some_and(|text| text.starts_with('/'))
}

async fn unknown_command(bot: Bot, msg: Message) -> HandlerResult {
    bot.send_message(
        msg.chat.id,
        format!("Unknown command.\n\n{}", Command::descriptions()),
    )
    .await?;
    Ok(())
}
