//! Common types and helpers shared across models.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::{Error, Result};

/// Body returned by every delete endpoint
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DeleteResponse {
    pub success: bool,
}

impl DeleteResponse {
    pub fn ok() -> Self {
        Self { success: true }
    }
}

pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Current time as stored in `created_at` / `updated_at`
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Trim an optional text field; blank strings become `None`
pub fn normalize_optional(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

// -------------------------------------------------------------------------
// Money
// -------------------------------------------------------------------------

/// Largest amount a single income or expense may carry. JSON numbers arrive
/// as f64, which stays exact to the cent well past this value.
pub const MAX_AMOUNT_CENTS: i64 = 99_999_999_999;

/// Convert an amount into integer cents.
///
/// Rejects negative amounts, anything finer than a cent and anything above
/// `MAX_AMOUNT_CENTS`.
pub fn amount_to_cents(amount: Decimal) -> Result<i64> {
    if amount < Decimal::ZERO {
        return Err(Error::validation(
            "amount",
            "Amount must be greater than or equal to zero",
        ));
    }

    if amount.normalize().scale() > 2 {
        return Err(Error::validation(
            "amount",
            "Amount must have at most two decimal places",
        ));
    }

    let max = cents_to_amount(MAX_AMOUNT_CENTS);
    if amount > max {
        return Err(Error::validation(
            "amount",
            format!("Amount must not exceed {}", max),
        ));
    }

    (amount * Decimal::ONE_HUNDRED)
        .trunc()
        .to_i64()
        .ok_or_else(|| Error::validation("amount", format!("Amount must not exceed {}", max)))
}

pub fn cents_to_amount(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

// -------------------------------------------------------------------------
// Dates
// -------------------------------------------------------------------------

const NAIVE_DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"];

/// Parse a calendar day from `YYYY-MM-DD` or a timestamp.
///
/// Timestamps keep the day as written in their own offset, so
/// `2024-03-31T23:30:00-03:00` is March 31st.
pub fn parse_calendar_date(value: &str) -> Result<NaiveDate> {
    let value = value.trim();

    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Ok(date);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.date_naive());
    }

    NAIVE_DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|dt| dt.date())
        .ok_or_else(|| Error::validation("date", "Invalid date, expected YYYY-MM-DD"))
}

pub fn format_calendar_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Parse a point in time. Values without an offset are taken as UTC.
pub fn parse_instant(value: &str) -> Result<DateTime<Utc>> {
    let value = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }

    NAIVE_DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|dt| dt.and_utc())
        .ok_or_else(|| Error::validation("date", "Invalid date, expected an ISO 8601 date-time"))
}

/// Stored instant format; lexical order equals chronological order
pub fn format_instant(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Secs, true)
}
