//! Input validation for login and registration forms
//!
//! Every problem is reported per field, in the `{location, param, msg}` shape
//! the HTTP layer returns verbatim.

use std::sync::OnceLock;

use chrono::NaiveDate;
use common::models::normalize_handle;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// A single field-level validation failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub location: &'static str,
    pub param: String,
    pub msg: String,
}

impl FieldError {
    fn body(param: &str, msg: impl Into<String>) -> Self {
        Self {
            location: "body",
            param: param.to_string(),
            msg: msg.into(),
        }
    }

    fn required(param: &str) -> Self {
        Self::body(param, "is required")
    }
}

/// Login form
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// Registration form
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegistrationForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default, rename = "firstname")]
    pub first_name: String,
    #[serde(default, rename = "middlename")]
    pub middle_name: String,
    #[serde(default, rename = "lastname")]
    pub last_name: String,
    /// `YYYY-MM-DD`
    #[serde(default)]
    pub birthday: String,
    #[serde(default)]
    pub telegram: String,
}

/// A registration form that passed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidRegistration {
    pub username: String,
    pub password: String,
    pub first_name: String,
    pub middle_name: String,
    pub last_name: String,
    pub birthday: NaiveDate,
    /// Normalized `@handle`
    pub telegram: String,
}

pub fn validate_login(form: &LoginForm) -> Result<(), Vec<FieldError>> {
    let mut errors = Vec::new();
    if form.username.trim().is_empty() {
        errors.push(FieldError::required("username"));
    }
    if form.password.is_empty() {
        errors.push(FieldError::required("password"));
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

pub fn validate_registration(form: &RegistrationForm) -> Result<ValidRegistration, Vec<FieldError>> {
    let mut errors = Vec::new();

    let required = [
        ("username", form.username.trim()),
        ("firstname", form.first_name.trim()),
        ("lastname", form.last_name.trim()),
        ("password", form.password.as_str()),
        ("birthday", form.birthday.trim()),
        ("telegram", form.telegram.trim()),
    ];
    for (param, value) in required {
        if value.is_empty() {
            errors.push(FieldError::required(param));
        }
    }

    let username = form.username.trim();
    if !username.is_empty() {
        if let Err(msg) = validate_username(username) {
            errors.push(FieldError::body("username", msg));
        }
    }

    let birthday = match form.birthday.trim() {
        "" => None,
        raw => match validate_birthday(raw) {
            Ok(date) => Some(date),
            Err(msg) => {
                errors.push(FieldError::body("birthday", msg));
                None
            }
        },
    };

    let telegram = match form.telegram.trim() {
        "" => None,
        raw => {
            let handle = normalize_handle(raw);
            match validate_telegram_handle(&handle) {
                Ok(()) => Some(handle),
                Err(msg) => {
                    errors.push(FieldError::body("telegram", msg));
                    None
                }
            }
        }
    };

    match (birthday, telegram) {
        (Some(birthday), Some(telegram)) if errors.is_empty() => Ok(ValidRegistration {
            username: username.to_string(),
            password: form.password.clone(),
            first_name: form.first_name.trim().to_string(),
            middle_name: form.middle_name.trim().to_string(),
            last_name: form.last_name.trim().to_string(),
            birthday,
            telegram,
        }),
        _ => Err(errors),
    }
}

/// Validate username
pub fn validate_username(username: &str) -> Result<(), String> {
    if username.len() > 32 {
        return Err("must be at most 32 characters long".to_string());
    }

    static USERNAME_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = USERNAME_REGEX
        .get_or_init(|| Regex::new(r"^[a-zA-Z0-9_.]+$").expect("Failed to compile username regex"));

    if !regex.is_match(username) {
        return Err("can only contain letters, numbers, dots and underscores".to_string());
    }

    Ok(())
}

/// Validate a normalized `@handle`
pub fn validate_telegram_handle(handle: &str) -> Result<(), String> {
    static HANDLE_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = HANDLE_REGEX.get_or_init(|| {
        Regex::new(r"^@[a-zA-Z0-9_]{3,32}$").expect("Failed to compile handle regex")
    });

    if !regex.is_match(handle) {
        return Err("must be a Telegram username like @name".to_string());
    }

    Ok(())
}

/// Parse a `YYYY-MM-DD` birthday
pub fn validate_birthday(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| "must be a date in YYYY-MM-DD format".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete_form() -> RegistrationForm {
        RegistrationForm {
            username: "anna".to_string(),
            password: "secret".to_string(),
            first_name: "Anna".to_string(),
            middle_name: String::new(),
            last_name: "Karenina".to_string(),
            birthday: "1990-06-15".to_string(),
            telegram: "anna_k".to_string(),
        }
    }

    fn params(errors: &[FieldError]) -> Vec<&str> {
        errors.iter().map(|e| e.param.as_str()).collect()
    }

    #[test]
    fn complete_form_is_valid() {
        let valid = validate_registration(&complete_form()).unwrap();
        assert_eq!(valid.telegram, "@anna_k");
        assert_eq!(valid.birthday, NaiveDate::from_ymd_opt(1990, 6, 15).unwrap());
    }

    #[test]
    fn each_missing_field_is_reported() {
        let errors = validate_registration(&RegistrationForm::default()).unwrap_err();
        assert_eq!(
            params(&errors),
            vec!["username", "firstname", "lastname", "password", "birthday", "telegram"]
        );
        assert!(errors.iter().all(|e| e.msg == "is required" && e.location == "body"));
    }

    #[test]
    fn middle_name_is_optional() {
        let mut form = complete_form();
        form.middle_name = "   ".to_string();
        assert_eq!(validate_registration(&form).unwrap().middle_name, "");
    }

    #[test]
    fn malformed_values_are_reported() {
        let mut form = complete_form();
        form.birthday = "15.06.1990".to_string();
        form.telegram = "@a b".to_string();
        form.username = "anna karenina".to_string();

        let errors = validate_registration(&form).unwrap_err();
        assert_eq!(params(&errors), vec!["username", "birthday", "telegram"]);
    }

    #[test]
    fn login_requires_both_fields() {
        let errors = validate_login(&LoginForm::default()).unwrap_err();
        assert_eq!(params(&errors), vec!["username", "password"]);

        let form = LoginForm {
            username: "anna".to_string(),
            password: "x".to_string(),
        };
        assert!(validate_login(&form).is_ok());
    }
}
