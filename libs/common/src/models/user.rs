//! User model and related functionality

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// User entity
///
/// The password hash is loaded from the store for credential checks but is
/// never serialized into responses.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(rename = "firstname")]
    pub first_name: String,
    #[serde(rename = "middlename")]
    pub middle_name: String,
    #[serde(rename = "lastname")]
    pub last_name: String,
    pub birthday: NaiveDate,
    /// Telegram handle, always stored with a leading `@`
    pub telegram: String,
    /// Telegram account id, bound the first time the user talks to the bot
    #[serde(rename = "telegramid", skip_serializing_if = "Option::is_none")]
    pub telegram_id: Option<i64>,
    #[serde(skip)]
    pub password_hash: String,
}

impl User {
    /// Full name with empty parts skipped, e.g. "Ivan Petrovich Sidorov"
    pub fn display_name(&self) -> String {
        [&self.first_name, &self.middle_name, &self.last_name]
            .into_iter()
            .map(|part| part.trim())
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Whether the birthday falls on the given month and day; the year is ignored
    pub fn has_birthday_on(&self, month: u32, day: u32) -> bool {
        self.birthday.month() == month && self.birthday.day() == day
    }
}

/// New user creation payload
///
/// `password_hash` must already be hashed; the repository stores it verbatim.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub first_name: String,
    pub middle_name: String,
    pub last_name: String,
    pub birthday: NaiveDate,
    pub telegram: String,
}

/// Normalize a Telegram handle to the stored `@name` form
pub fn normalize_handle(raw: &str) -> String {
    let trimmed = raw.trim();
    match trimmed.strip_prefix('@') {
        Some(_) => trimmed.to_string(),
        None => format!("@{}", trimmed),
    }
}
