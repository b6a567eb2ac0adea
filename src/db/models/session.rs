//! Clinical sessions (appointments) and their link to patients.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::common::{format_instant, new_id, normalize_optional, now_timestamp, parse_instant};
use super::owned::OwnedRepository;
use crate::db::DbPool;
use crate::error::{Error, Result};

/// Shortest session that can be booked, in minutes
pub const MIN_DURATION_MINUTES: i64 = 15;
/// Longest session that can be booked, in minutes
pub const MAX_DURATION_MINUTES: i64 = 240;

const SELECT_SESSION: &str = r#"
    SELECT s.id, s.user_id, s.patient_id, p.name AS patient_name, s.date,
           s.duration_minutes, s.notes, s.created_at, s.updated_at
    FROM sessions s
    JOIN patients p ON p.id = s.patient_id
"#;

/// A session row joined with its patient's name
#[derive(Debug, Clone, FromRow, PartialEq, Eq)]
pub struct TherapySession {
    pub id: String,
    pub user_id: String,
    pub patient_id: String,
    pub patient_name: String,
    /// RFC 3339 UTC, second precision
    pub date: String,
    pub duration_minutes: i64,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PatientRef {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub id: String,
    pub user_id: String,
    pub patient_id: String,
    pub date: String,
    pub duration_minutes: i64,
    /// Same value as `duration_minutes`, under the name the web client reads
    pub duration: i64,
    pub notes: Option<String>,
    pub patient: PatientRef,
    pub created_at: String,
    pub updated_at: String,
}

impl From<TherapySession> for SessionResponse {
    fn from(s: TherapySession) -> Self {
        Self {
            patient: PatientRef {
                id: s.patient_id.clone(),
                name: s.patient_name,
            },
            id: s.id,
            user_id: s.user_id,
            patient_id: s.patient_id,
            date: s.date,
            duration_minutes: s.duration_minutes,
            duration: s.duration_minutes,
            notes: s.notes,
            created_at: s.created_at,
            updated_at: s.updated_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    pub date: String,
    #[serde(alias = "duration")]
    pub duration_minutes: i64,
    pub notes: Option<String>,
    pub patient_id: String,
}

/// Session update. Moving a session to another patient re-checks ownership.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSessionRequest {
    pub date: Option<String>,
    #[serde(alias = "duration")]
    pub duration_minutes: Option<i64>,
    pub notes: Option<String>,
    pub patient_id: Option<String>,
}

pub fn check_duration(minutes: i64) -> Result<()> {
    if !(MIN_DURATION_MINUTES..=MAX_DURATION_MINUTES).contains(&minutes) {
        return Err(Error::validation(
            "durationMinutes",
            format!(
                "Duration must be between {} and {} minutes",
                MIN_DURATION_MINUTES, MAX_DURATION_MINUTES
            ),
        ));
    }
    Ok(())
}

impl TherapySession {
    /// Sessions of one patient, newest first. An unknown patient yields an empty list.
    pub async fn find_by_patient(
        db: &DbPool,
        patient_id: &str,
        owner_id: &str,
    ) -> Result<Vec<TherapySession>> {
        let query = format!(
            "{} WHERE s.patient_id = ? AND s.user_id = ? ORDER BY s.date DESC, s.created_at DESC",
            SELECT_SESSION
        );
        let sessions = sqlx::query_as::<_, TherapySession>(&query)
            .bind(patient_id)
            .bind(owner_id)
            .fetch_all(db)
            .await?;
        Ok(sessions)
    }

    /// Number of sessions with `from <= date <= to`
    pub async fn count_between(
        db: &DbPool,
        owner_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM sessions WHERE user_id = ? AND date >= ? AND date <= ?",
        )
        .bind(owner_id)
        .bind(format_instant(from))
        .bind(format_instant(to))
        .fetch_one(db)
        .await?;
        Ok(count)
    }
}

#[async_trait]
impl OwnedRepository for TherapySession {
    type Create = CreateSessionRequest;
    type Update = UpdateSessionRequest;

    const ENTITY: &'static str = "Session";

    /// The insert only happens when the patient belongs to the same owner;
    /// otherwise nothing is written and the patient is reported missing.
    async fn create(
        db: &DbPool,
        input: &CreateSessionRequest,
        owner_id: &str,
    ) -> Result<TherapySession> {
        let date = format_instant(parse_instant(&input.date)?);
        check_duration(input.duration_minutes)?;

        let id = new_id();
        let now = now_timestamp();

        let result = sqlx::query(
            r#"
            INSERT INTO sessions (id, user_id, patient_id, date, duration_minutes, notes, created_at, updated_at)
            SELECT ?, ?, p.id, ?, ?, ?, ?, ?
            FROM patients p
            WHERE p.id = ? AND p.user_id = ?
            "#,
        )
        .bind(&id)
        .bind(owner_id)
        .bind(&date)
        .bind(input.duration_minutes)
        .bind(normalize_optional(input.notes.as_deref()))
        .bind(&now)
        .bind(&now)
        .bind(&input.patient_id)
        .bind(owner_id)
        .execute(db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::not_found("Patient", &input.patient_id));
        }

        Self::find_one(db, &id, owner_id).await
    }

    async fn find_all(db: &DbPool, owner_id: &str) -> Result<Vec<TherapySession>> {
        let query = format!(
            "{} WHERE s.user_id = ? ORDER BY s.date DESC, s.created_at DESC",
            SELECT_SESSION
        );
        let sessions = sqlx::query_as::<_, TherapySession>(&query)
            .bind(owner_id)
            .fetch_all(db)
            .await?;
        Ok(sessions)
    }

    async fn find_one(db: &DbPool, id: &str, owner_id: &str) -> Result<TherapySession> {
        let query = format!("{} WHERE s.id = ? AND s.user_id = ?", SELECT_SESSION);
        sqlx::query_as::<_, TherapySession>(&query)
            .bind(id)
            .bind(owner_id)
            .fetch_optional(db)
            .await?
            .ok_or_else(|| Self::not_found(id))
    }

    async fn update(
        db: &DbPool,
        id: &str,
        patch: &UpdateSessionRequest,
        owner_id: &str,
    ) -> Result<TherapySession> {
        let date = patch
            .date
            .as_deref()
            .map(parse_instant)
            .transpose()?
            .map(format_instant);
        if let Some(minutes) = patch.duration_minutes {
            check_duration(minutes)?;
        }
        let notes = patch.notes.as_deref().map(str::trim);

        let mut tx = db.begin().await?;

        if let Some(patient_id) = &patch.patient_id {
            let owned: Option<(String,)> =
                sqlx::query_as("SELECT id FROM patients WHERE id = ? AND user_id = ?")
                    .bind(patient_id)
                    .bind(owner_id)
                    .fetch_optional(&mut *tx)
                    .await?;
            if owned.is_none() {
                return Err(Error::not_found("Patient", patient_id));
            }
        }

        let result = sqlx::query(
            r#"
            UPDATE sessions SET
                patient_id = COALESCE(?, patient_id),
                date = COALESCE(?, date),
                duration_minutes = COALESCE(?, duration_minutes),
                notes = CASE WHEN ? IS NULL THEN notes ELSE NULLIF(?, '') END,
                updated_at = ?
            WHERE id = ? AND user_id = ?
            "#,
        )
        .bind(&patch.patient_id)
        .bind(&date)
        .bind(patch.duration_minutes)
        .bind(notes)
        .bind(notes)
        .bind(now_timestamp())
        .bind(id)
        .bind(owner_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Self::not_found(id));
        }

        tx.commit().await?;

        Self::find_one(db, id, owner_id).await
    }

    async fn remove(db: &DbPool, id: &str, owner_id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM sessions WHERE id = ? AND user_id = ?")
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
