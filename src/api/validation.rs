//! Input validation for API requests.
//!
//! Validators return `Err(message)` and are collected per field with
//! `ValidationErrorBuilder` from the `error` module.

use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::Decimal;

use crate::db::{amount_to_cents, check_duration, parse_calendar_date, parse_instant};
use crate::error::Error;

pub const MIN_PASSWORD_LENGTH: usize = 6;
const MAX_PASSWORD_LENGTH: usize = 128;
const MAX_NAME_LENGTH: usize = 200;
const MAX_NOTES_LENGTH: usize = 10_000;

lazy_static! {
    /// Pragmatic email check: one `@`, no whitespace, a dot in the domain
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[^\s@]+@[^\s@]+\.[^\s@]+$"
    ).unwrap();

    /// Digits with the usual separators, optional leading `+`
    static ref PHONE_REGEX: Regex = Regex::new(
        r"^\+?[0-9()\-.\s]{6,30}$"
    ).unwrap();
}

/// Validate a UUID string
pub fn validate_uuid(id: &str, field_name: &str) -> Result<(), String> {
    if id.is_empty() {
        return Err(format!("{} is required", field_name));
    }

    if uuid::Uuid::parse_str(id).is_err() {
        return Err(format!("Invalid {} format", field_name));
    }

    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), String> {
    let email = email.trim();
    if email.is_empty() {
        return Err("Email is required".to_string());
    }

    if email.len() > 254 {
        return Err("Email is too long (max 254 characters)".to_string());
    }

    if !EMAIL_REGEX.is_match(email) {
        return Err("Invalid email format".to_string());
    }

    Ok(())
}

/// Optional email; an empty string clears the field and is accepted
pub fn validate_optional_email(email: &Option<String>) -> Result<(), String> {
    match email.as_deref().map(str::trim) {
        Some(e) if !e.is_empty() => validate_email(e),
        _ => Ok(()),
    }
}

pub fn validate_phone(phone: &Option<String>) -> Result<(), String> {
    if let Some(p) = phone.as_deref().map(str::trim) {
        if !p.is_empty() && !PHONE_REGEX.is_match(p) {
            return Err("Invalid phone number format".to_string());
        }
    }

    Ok(())
}

/// Validate a required free-text name (person, income source, expense category)
pub fn validate_name(value: &str, label: &str) -> Result<(), String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(format!("{} is required", label));
    }

    if value.chars().count() > MAX_NAME_LENGTH {
        return Err(format!(
            "{} is too long (max {} characters)",
            label, MAX_NAME_LENGTH
        ));
    }

    Ok(())
}

pub fn validate_notes(notes: &Option<String>) -> Result<(), String> {
    if let Some(n) = notes {
        if n.chars().count() > MAX_NOTES_LENGTH {
            return Err(format!(
                "Notes are too long (max {} characters)",
                MAX_NOTES_LENGTH
            ));
        }
    }

    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), String> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        ));
    }

    if password.len() > MAX_PASSWORD_LENGTH {
        return Err(format!(
            "Password is too long (max {} characters)",
            MAX_PASSWORD_LENGTH
        ));
    }

    Ok(())
}

/// Message of a core validation error, for the per-field error map
fn field_message(err: Error) -> String {
    match err {
        Error::Validation { message, .. } => message,
        other => other.to_string(),
    }
}

/// Same bounds the session store enforces
pub fn validate_duration(minutes: i64) -> Result<(), String> {
    check_duration(minutes).map_err(field_message)
}

/// Same rules the finance stores apply when converting to cents
pub fn validate_amount(amount: Decimal) -> Result<(), String> {
    amount_to_cents(amount).map(|_| ()).map_err(field_message)
}

/// A calendar day (`YYYY-MM-DD`) or a timestamp whose day is taken
pub fn validate_calendar_date(date: &str) -> Result<(), String> {
    if date.trim().is_empty() {
        return Err("Date is required".to_string());
    }

    parse_calendar_date(date)
        .map(|_| ())
        .map_err(|_| "Invalid date, expected YYYY-MM-DD".to_string())
}

/// An ISO 8601 date-time
pub fn validate_instant(date: &str) -> Result<(), String> {
    if date.trim().is_empty() {
        return Err("Date is required".to_string());
    }

    parse_instant(date)
        .map(|_| ())
        .map_err(|_| "Invalid date, expected an ISO 8601 date-time".to_string())
}
