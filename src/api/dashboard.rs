use axum::{extract::State, Json};
use chrono::{Duration, Local, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::auth::AuthUser;
use super::error::ApiError;
use crate::db::{CalendarWindow, FinancialSummary, Patient, TherapySession};
use crate::AppState;

/// Sessions within this many days from now count as upcoming
const UPCOMING_DAYS: i64 = 7;

#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DashboardResponse {
    pub patient_count: i64,
    pub upcoming_sessions: i64,
    pub monthly_income: Decimal,
}

/// Counters for the landing page
pub async fn get_dashboard(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<DashboardResponse>, ApiError> {
    let now = Utc::now();

    let patient_count = Patient::count_for_owner(&state.db, &user.id).await?;
    let upcoming_sessions = TherapySession::count_between(
        &state.db,
        &user.id,
        now,
        now + Duration::days(UPCOMING_DAYS),
    )
    .await?;
    // Income dates are calendar days, so the month follows the local clock
    let window = CalendarWindow::month_of(Local::now().date_naive())?;
    let month = FinancialSummary::compute(&state.db, &user.id, &window).await?;

    Ok(Json(DashboardResponse {
        patient_count,
        upcoming_sessions,
        monthly_income: month.total_income,
    }))
}
