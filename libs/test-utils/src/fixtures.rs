use chrono::NaiveDate;
use common::models::NewUser;

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid fixture date")
}

/// A user named after `username`, with handle `@username`
///
/// The password hash is a placeholder; tests that log in should register
/// through the auth gateway instead.
pub fn new_user(username: &str, birthday: NaiveDate) -> NewUser {
    let mut chars = username.chars();
    let first_name = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    };

    NewUser {
        username: username.to_string(),
        password_hash: "unused".to_string(),
        first_name,
        middle_name: String::new(),
        last_name: "Testova".to_string(),
        birthday,
        telegram: format!("@{}", username),
    }
}
