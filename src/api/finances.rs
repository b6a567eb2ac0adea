//! Incomes, expenses and the financial summary.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;

use super::auth::AuthUser;
use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{validate_amount, validate_calendar_date, validate_name};
use super::{require_uuid, ApiJson};
use crate::db::{
    summarize, CreateExpenseRequest, CreateIncomeRequest, DeleteResponse, Expense,
    ExpenseResponse, FinancialSummary, Income, IncomeResponse, OwnedRepository,
    UpdateExpenseRequest, UpdateIncomeRequest,
};
use crate::AppState;

/// Shared checks for an income or expense payload. `None` fields are absent from a patch.
fn validate_entry(
    amount: Option<Decimal>,
    label_field: &str,
    label: Option<&str>,
    label_name: &str,
    date: Option<&str>,
) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    if let Some(amount) = amount {
        if let Err(e) = validate_amount(amount) {
            errors.add("amount", e);
        }
    }
    if let Some(label) = label {
        if let Err(e) = validate_name(label, label_name) {
            errors.add(label_field, e);
        }
    }
    if let Some(date) = date {
        if let Err(e) = validate_calendar_date(date) {
            errors.add("date", e);
        }
    }

    errors.finish()
}

// -------------------------------------------------------------------------
// Incomes
// -------------------------------------------------------------------------

pub async fn list_incomes(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<Vec<IncomeResponse>>, ApiError> {
    let incomes = Income::find_all(&state.db, &user.id).await?;
    Ok(Json(incomes.into_iter().map(IncomeResponse::from).collect()))
}

pub async fn create_income(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiJson(req): ApiJson<CreateIncomeRequest>,
) -> Result<(StatusCode, Json<IncomeResponse>), ApiError> {
    validate_entry(
        Some(req.amount),
        "source",
        Some(req.source.as_str()),
        "Source",
        Some(req.date.as_str()),
    )?;

    let income = Income::create(&state.db, &req, &user.id).await?;
    tracing::info!(income_id = %income.id, user_id = %user.id, "Recorded income");

    Ok((StatusCode::CREATED, Json(IncomeResponse::from(income))))
}

pub async fn get_income(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<IncomeResponse>, ApiError> {
    require_uuid(&id, "income_id")?;

    let income = Income::find_one(&state.db, &id, &user.id).await?;
    Ok(Json(IncomeResponse::from(income)))
}

pub async fn update_income(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<UpdateIncomeRequest>,
) -> Result<Json<IncomeResponse>, ApiError> {
    require_uuid(&id, "income_id")?;
    validate_entry(
        req.amount,
        "source",
        req.source.as_deref(),
        "Source",
        req.date.as_deref(),
    )?;

    let income = Income::update(&state.db, &id, &req, &user.id).await?;
    Ok(Json(IncomeResponse::from(income)))
}

pub async fn delete_income(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    require_uuid(&id, "income_id")?;

    Income::remove(&state.db, &id, &user.id).await?;
    tracing::info!(income_id = %id, user_id = %user.id, "Deleted income");

    Ok(Json(DeleteResponse::ok()))
}

// -------------------------------------------------------------------------
// Expenses
// -------------------------------------------------------------------------

pub async fn list_expenses(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<Vec<ExpenseResponse>>, ApiError> {
    let expenses = Expense::find_all(&state.db, &user.id).await?;
    Ok(Json(expenses.into_iter().map(ExpenseResponse::from).collect()))
}

pub async fn create_expense(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiJson(req): ApiJson<CreateExpenseRequest>,
) -> Result<(StatusCode, Json<ExpenseResponse>), ApiError> {
    validate_entry(
        Some(req.amount),
        "category",
        Some(req.category.as_str()),
        "Category",
        Some(req.date.as_str()),
    )?;

    let expense = Expense::create(&state.db, &req, &user.id).await?;
    tracing::info!(expense_id = %expense.id, user_id = %user.id, "Recorded expense");

    Ok((StatusCode::CREATED, Json(ExpenseResponse::from(expense))))
}

pub async fn get_expense(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<ExpenseResponse>, ApiError> {
    require_uuid(&id, "expense_id")?;

    let expense = Expense::find_one(&state.db, &id, &user.id).await?;
    Ok(Json(ExpenseResponse::from(expense)))
}

pub async fn update_expense(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<UpdateExpenseRequest>,
) -> Result<Json<ExpenseResponse>, ApiError> {
    require_uuid(&id, "expense_id")?;
    validate_entry(
        req.amount,
        "category",
        req.category.as_deref(),
        "Category",
        req.date.as_deref(),
    )?;

    let expense = Expense::update(&state.db, &id, &req, &user.id).await?;
    Ok(Json(ExpenseResponse::from(expense)))
}

pub async fn delete_expense(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    require_uuid(&id, "expense_id")?;

    Expense::remove(&state.db, &id, &user.id).await?;
    tracing::info!(expense_id = %id, user_id = %user.id, "Deleted expense");

    Ok(Json(DeleteResponse::ok()))
}

// -------------------------------------------------------------------------
// Summary
// -------------------------------------------------------------------------

/// Raw query parameters; parsed by hand so errors use the API envelope
#[derive(Debug, Default, Deserialize)]
pub struct SummaryQuery {
    pub year: Option<String>,
    pub month: Option<String>,
}

impl SummaryQuery {
    /// Year is required; an empty `month` means the whole year
    fn parse(&self) -> Result<(i32, Option<u32>), ApiError> {
        let mut errors = ValidationErrorBuilder::new();

        let year = match self.year.as_deref().map(str::trim).filter(|y| !y.is_empty()) {
            None => {
                errors.add("year", "Year is required");
                None
            }
            Some(y) => match y.parse::<i32>() {
                Ok(year) => Some(year),
                Err(_) => {
                    errors.add("year", "Year must be a number");
                    None
                }
            },
        };

        let month = match self.month.as_deref().map(str::trim).filter(|m| !m.is_empty()) {
            None => None,
            Some(m) => match m.parse::<u32>() {
                Ok(month) => Some(month),
                Err(_) => {
                    errors.add("month", "Month must be between 1 and 12");
                    None
                }
            },
        };

        errors.finish()?;
        let year = year.ok_or_else(|| ApiError::validation_field("year", "Year is required"))?;
        Ok((year, month))
    }
}

pub async fn get_summary(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<FinancialSummary>, ApiError> {
    let (year, month) = query.parse()?;

    let summary = summarize(&state.db, &user.id, year, month).await?;
    Ok(Json(summary))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(year: Option<&str>, month: Option<&str>) -> SummaryQuery {
        SummaryQuery {
            year: year.map(String::from),
            month: month.map(String::from),
        }
    }

    #[test]
    fn test_summary_query_parsing() {
        assert_eq!(query(Some("2024"), None).parse().unwrap(), (2024, None));
        assert_eq!(query(Some("2024"), Some("3")).parse().unwrap(), (2024, Some(3)));
        assert_eq!(query(Some("2024"), Some("")).parse().unwrap(), (2024, None));
    }

    #[test]
    fn test_summary_query_rejects_missing_or_garbled_values() {
        assert!(query(None, Some("3")).parse().is_err());
        assert!(query(Some(""), None).parse().is_err());
        assert!(query(Some("twenty"), None).parse().is_err());
        assert!(query(Some("2024"), Some("-1")).parse().is_err());
    }

    #[test]
    fn test_entry_validation() {
        use std::str::FromStr;
        let amount = Decimal::from_str("10.50").unwrap();

        assert!(validate_entry(Some(amount), "source", Some("Consulta"), "Source", Some("2024-03-01")).is_ok());
        assert!(validate_entry(None, "source", None, "Source", None).is_ok());

        let negative = Decimal::from_str("-5").unwrap();
        let err = validate_entry(Some(negative), "source", Some(""), "Source", Some("bad")).unwrap_err();
        assert!(err.to_string().contains("3 fields"));
    }
}
