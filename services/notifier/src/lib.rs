//! Birthday notifications
//!
//! - [`delivery`] - the [`Notifier`] capability and its Telegram implementation
//! - [`scheduler`] - the periodic birthday scan
//! - [`bot`] - inbound Telegram commands

pub mod bot;
pub mod delivery;
pub mod scheduler;

pub use bot::{Command, CommandHandler, Sender, run_bot};
pub use delivery::{DeliveryError, LogNotifier, Notifier, TelegramNotifier, birthday_message};
pub use scheduler::{BirthdayScheduler, CycleReport};
