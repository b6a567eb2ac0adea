//! Incomes, expenses and the financial summary over a calendar window.
//!
//! Amounts are kept as integer cents in the database, so totals are exact
//! sums no matter how many small entries a month has.

use async_trait::async_trait;
use chrono::{Datelike, Months, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::common::{
    amount_to_cents, cents_to_amount, format_calendar_date, new_id, now_timestamp,
    parse_calendar_date,
};
use super::owned::OwnedRepository;
use crate::db::DbPool;
use crate::error::{Error, Result};

// -------------------------------------------------------------------------
// Income
// -------------------------------------------------------------------------

#[derive(Debug, Clone, FromRow, PartialEq, Eq)]
pub struct Income {
    pub id: String,
    pub user_id: String,
    pub amount_cents: i64,
    pub source: String,
    /// Calendar day, `YYYY-MM-DD`
    pub date: String,
    pub created_at: String,
    pub updated_at: String,
}

impl Income {
    pub fn amount(&self) -> Decimal {
        cents_to_amount(self.amount_cents)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IncomeResponse {
    pub id: String,
    pub user_id: String,
    pub amount: Decimal,
    pub source: String,
    pub date: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Income> for IncomeResponse {
    fn from(i: Income) -> Self {
        Self {
            amount: i.amount(),
            id: i.id,
            user_id: i.user_id,
            source: i.source,
            date: i.date,
            created_at: i.created_at,
            updated_at: i.updated_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateIncomeRequest {
    pub amount: Decimal,
    pub source: String,
    pub date: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateIncomeRequest {
    pub amount: Option<Decimal>,
    pub source: Option<String>,
    pub date: Option<String>,
}

#[async_trait]
impl OwnedRepository for Income {
    type Create = CreateIncomeRequest;
    type Update = UpdateIncomeRequest;

    const ENTITY: &'static str = "Income";

    async fn create(db: &DbPool, input: &CreateIncomeRequest, owner_id: &str) -> Result<Income> {
        let now = now_timestamp();
        let income = Income {
            id: new_id(),
            user_id: owner_id.to_string(),
            amount_cents: amount_to_cents(input.amount)?,
            source: input.source.trim().to_string(),
            date: format_calendar_date(parse_calendar_date(&input.date)?),
            created_at: now.clone(),
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO incomes (id, user_id, amount_cents, source, date, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&income.id)
        .bind(&income.user_id)
        .bind(income.amount_cents)
        .bind(&income.source)
        .bind(&income.date)
        .bind(&income.created_at)
        .bind(&income.updated_at)
        .execute(db)
        .await?;

        Ok(income)
    }

    async fn find_all(db: &DbPool, owner_id: &str) -> Result<Vec<Income>> {
        let incomes = sqlx::query_as::<_, Income>(
            "SELECT * FROM incomes WHERE user_id = ? ORDER BY date DESC, created_at DESC",
        )
        .bind(owner_id)
        .fetch_all(db)
        .await?;
        Ok(incomes)
    }

    async fn find_one(db: &DbPool, id: &str, owner_id: &str) -> Result<Income> {
        sqlx::query_as::<_, Income>("SELECT * FROM incomes WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(owner_id)
            .fetch_optional(db)
            .await?
            .ok_or_else(|| Self::not_found(id))
    }

    async fn update(
        db: &DbPool,
        id: &str,
        patch: &UpdateIncomeRequest,
        owner_id: &str,
    ) -> Result<Income> {
        let amount_cents = patch.amount.map(amount_to_cents).transpose()?;
        let date = patch
            .date
            .as_deref()
            .map(parse_calendar_date)
            .transpose()?
            .map(format_calendar_date);

        let result = sqlx::query(
            r#"
            UPDATE incomes SET
                amount_cents = COALESCE(?, amount_cents),
                source = COALESCE(?, source),
                date = COALESCE(?, date),
                updated_at = ?
            WHERE id = ? AND user_id = ?
            "#,
        )
        .bind(amount_cents)
        .bind(patch.source.as_deref().map(str::trim))
        .bind(&date)
        .bind(now_timestamp())
        .bind(id)
        .bind(owner_id)
        .execute(db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Self::not_found(id));
        }

        Self::find_one(db, id, owner_id).await
    }

    async fn remove(db: &DbPool, id: &str, owner_id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM incomes WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(owner_id)
            .execute(db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Self::not_found(id));
        }
        Ok(())
    }
}

// -------------------------------------------------------------------------
// Expense
// -------------------------------------------------------------------------

#[derive(Debug, Clone, FromRow, PartialEq, Eq)]
pub struct Expense {
    pub id: String,
    pub user_id: String,
    pub amount_cents: i64,
    pub category: String,
    /// Calendar day, `YYYY-MM-DD`
    pub date: String,
    pub created_at: String,
    pub updated_at: String,
}

impl Expense {
    pub fn amount(&self) -> Decimal {
        cents_to_amount(self.amount_cents)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseResponse {
    pub id: String,
    pub user_id: String,
    pub amount: Decimal,
    pub category: String,
    pub date: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Expense> for ExpenseResponse {
    fn from(e: Expense) -> Self {
        Self {
            amount: e.amount(),
            id: e.id,
            user_id: e.user_id,
            category: e.category,
            date: e.date,
            created_at: e.created_at,
            updated_at: e.updated_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateExpenseRequest {
    pub amount: Decimal,
    pub category: String,
    pub date: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateExpenseRequest {
    pub amount: Option<Decimal>,
    pub category: Option<String>,
    pub date: Option<String>,
}

#[async_trait]
impl OwnedRepository for Expense {
    type Create = CreateExpenseRequest;
    type Update = UpdateExpenseRequest;

    const ENTITY: &'static str = "Expense";

    async fn create(db: &DbPool, input: &CreateExpenseRequest, owner_id: &str) -> Result<Expense> {
        let now = now_timestamp();
        let expense = Expense {
            id: new_id(),
            user_id: owner_id.to_string(),
            amount_cents: amount_to_cents(input.amount)?,
            category: input.category.trim().to_string(),
            date: format_calendar_date(parse_calendar_date(&input.date)?),
            created_at: now.clone(),
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO expenses (id, user_id, amount_cents, category, date, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&expense.id)
        .bind(&expense.user_id)
        .bind(expense.amount_cents)
        .bind(&expense.category)
        .bind(&expense.date)
        .bind(&expense.created_at)
        .bind(&expense.updated_at)
        .execute(db)
        .await?;

        Ok(expense)
    }

    async fn find_all(db: &DbPool, owner_id: &str) -> Result<Vec<Expense>> {
        let expenses = sqlx::query_as::<_, Expense>(
            "SELECT * FROM expenses WHERE user_id = ? ORDER BY date DESC, created_at DESC",
        )
        .bind(owner_id)
        .fetch_all(db)
        .await?;
        Ok(expenses)
    }

    async fn find_one(db: &DbPool, id: &str, owner_id: &str) -> Result<Expense> {
        sqlx::query_as::<_, Expense>("SELECT * FROM expenses WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(owner_id)
            .fetch_optional(db)
            .await?
            .ok_or_else(|| Self::not_found(id))
    }

    async fn update(
        db: &DbPool,
        id: &str,
        patch: &UpdateExpenseRequest,
        owner_id: &str,
    ) -> Result<Expense> {
        let amount_cents = patch.amount.map(amount_to_cents).transpose()?;
        let date = patch
            .date
            .as_deref()
            .map(parse_calendar_date)
            .transpose()?
            .map(format_calendar_date);

        let result = sqlx::query(
            r#"
            UPDATE expenses SET
                amount_cents = COALESCE(?, amount_cents),
                category = COALESCE(?, category),
                date = COALESCE(?, date),
                updated_at = ?
            WHERE id = ? AND user_id = ?
            "#,
        )
        .bind(amount_cents)
        .bind(patch.category.as_deref().map(str::trim))
        .bind(&date)
        .bind(now_timestamp())
        .bind(id)
        .bind(owner_id)
        .execute(db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Self::not_found(id));
        }

        Self::find_one(db, id, owner_id).await
    }

    async fn remove(db: &DbPool, id: &str, owner_id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM expenses WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(owner_id)
            .execute(db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Self::not_found(id));
        }
        Ok(())
    }
}

// -------------------------------------------------------------------------
// Summary
// -------------------------------------------------------------------------

/// Inclusive range of calendar days: a whole year or one month of it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarWindow {
    pub year: i32,
    pub month: Option<u32>,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl CalendarWindow {
    pub fn new(year: i32, month: Option<u32>) -> Result<Self> {
        if !(1..=9999).contains(&year) {
            return Err(Error::validation("year", "Year must be between 1 and 9999"));
        }

        let invalid_month = || Error::validation("month", "Month must be between 1 and 12");

        let (start, end) = match month {
            None => (
                NaiveDate::from_ymd_opt(year, 1, 1),
                NaiveDate::from_ymd_opt(year, 12, 31),
            ),
            Some(m) => {
                if !(1..=12).contains(&m) {
                    return Err(invalid_month());
                }
                let start = NaiveDate::from_ymd_opt(year, m, 1);
                let end = start
                    .and_then(|d| d.checked_add_months(Months::new(1)))
                    .and_then(|d| d.pred_opt());
                (start, end)
            }
        };

        match (start, end) {
            (Some(start), Some(end)) => Ok(Self {
                year,
                month,
                start,
                end,
            }),
            _ => Err(invalid_month()),
        }
    }

    /// Window for the month containing `date`
    pub fn month_of(date: NaiveDate) -> Result<Self> {
        Self::new(date.year(), Some(date.month()))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Period {
    pub year: i32,
    pub month: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FinancialSummary {
    pub total_income: Decimal,
    pub total_expense: Decimal,
    pub balance: Decimal,
    pub period: Period,
}

impl FinancialSummary {
    /// Totals of the owner's incomes and expenses dated inside the window
    pub async fn compute(db: &DbPool, owner_id: &str, window: &CalendarWindow) -> Result<Self> {
        let start = format_calendar_date(window.start);
        let end = format_calendar_date(window.end);

        let income_cents = sum_cents(db, "incomes", owner_id, &start, &end).await?;
        let expense_cents = sum_cents(db, "expenses", owner_id, &start, &end).await?;

        let total_income = cents_to_amount(income_cents);
        let total_expense = cents_to_amount(expense_cents);

        Ok(Self {
            total_income,
            total_expense,
            balance: total_income - total_expense,
            period: Period {
                year: window.year,
                month: window.month,
            },
        })
    }
}

/// Summarize a year, or one month of it when `month` is given
pub async fn summarize(
    db: &DbPool,
    owner_id: &str,
    year: i32,
    month: Option<u32>,
) -> Result<FinancialSummary> {
    let window = CalendarWindow::new(year, month)?;
    FinancialSummary::compute(db, owner_id, &window).await
}

async fn sum_cents(db: &DbPool, table: &str, owner_id: &str, start: &str, end: &str) -> Result<i64> {
    // table is one of two fixed names, never caller input
    let query = format!(
        "SELECT COALESCE(SUM(amount_cents), 0) FROM {} WHERE user_id = ? AND date >= ? AND date <= ?",
        table
    );
    let total = sqlx::query_scalar::<_, i64>(&query)
        .bind(owner_id)
        .bind(start)
        .bind(end)
        .fetch_one(db)
        .await?;
    Ok(total)
}
