//! Patient records.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::common::{new_id, normalize_optional, now_timestamp};
use super::owned::OwnedRepository;
use crate::db::DbPool;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreatePatientRequest {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub notes: Option<String>,
}

/// Patient update. An empty string clears an optional field.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdatePatientRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub notes: Option<String>,
}

impl Patient {
    pub async fn count_for_owner(db: &DbPool, owner_id: &str) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM patients WHERE user_id = ?")
            .bind(owner_id)
            .fetch_one(db)
            .await?;
        Ok(count)
    }
}

#[async_trait]
impl OwnedRepository for Patient {
    type Create = CreatePatientRequest;
    type Update = UpdatePatientRequest;

    const ENTITY: &'static str = "Patient";

    async fn create(db: &DbPool, input: &CreatePatientRequest, owner_id: &str) -> Result<Patient> {
        let now = now_timestamp();
        let patient = Patient {
            id: new_id(),
            user_id: owner_id.to_string(),
            name: input.name.trim().to_string(),
            email: normalize_optional(input.email.as_deref()),
            phone: normalize_optional(input.phone.as_deref()),
            notes: normalize_optional(input.notes.as_deref()),
            created_at: now.clone(),
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO patients (id, user_id, name, email, phone, notes, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&patient.id)
        .bind(&patient.user_id)
        .bind(&patient.name)
        .bind(&patient.email)
        .bind(&patient.phone)
        .bind(&patient.notes)
        .bind(&patient.created_at)
        .bind(&patient.updated_at)
        .execute(db)
        .await?;

        Ok(patient)
    }

    async fn find_all(db: &DbPool, owner_id: &str) -> Result<Vec<Patient>> {
        let patients = sqlx::query_as::<_, Patient>(
            "SELECT * FROM patients WHERE user_id = ? ORDER BY name COLLATE NOCASE ASC, created_at ASC",
        )
        .bind(owner_id)
        .fetch_all(db)
        .await?;
        Ok(patients)
    }

    async fn find_one(db: &DbPool, id: &str, owner_id: &str) -> Result<Patient> {
        sqlx::query_as::<_, Patient>("SELECT * FROM patients WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(owner_id)
            .fetch_optional(db)
            .await?
            .ok_or_else(|| Self::not_found(id))
    }

    async fn update(
        db: &DbPool,
        id: &str,
        patch: &UpdatePatientRequest,
        owner_id: &str,
    ) -> Result<Patient> {
        let email = patch.email.as_deref().map(str::trim);
        let phone = patch.phone.as_deref().map(str::trim);
        let notes = patch.notes.as_deref().map(str::trim);

        let result = sqlx::query(
            r#"
            UPDATE patients SET
                name = COALESCE(?, name),
                email = CASE WHEN ? IS NULL THEN email ELSE NULLIF(?, '') END,
                phone = CASE WHEN ? IS NULL THEN phone ELSE NULLIF(?, '') END,
                notes = CASE WHEN ? IS NULL THEN notes ELSE NULLIF(?, '') END,
                updated_at = ?
            WHERE id = ? AND user_id = ?
            "#,
        )
        .bind(patch.name.as_deref().map(str::trim))
        .bind(email)
        .bind(email)
        .bind(phone)
        .bind(phone)
        .bind(notes)
        .bind(notes)
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

    /// Delete a patient. Sessions are never removed implicitly, so a patient
    /// that still has sessions is a conflict.
    async fn remove(db: &DbPool, id: &str, owner_id: &str) -> Result<()> {
        let mut tx = db.begin().await?;

        let owned: Option<(String,)> =
            sqlx::query_as("SELECT id FROM patients WHERE id = ? AND user_id = ?")
                .bind(id)
                .bind(owner_id)
                .fetch_optional(&mut *tx)
                .await?;
        if owned.is_none() {
            return Err(Self::not_found(id));
        }

        let sessions: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sessions WHERE patient_id = ?")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        if sessions > 0 {
            return Err(Error::Conflict(format!(
                "Patient has {} session(s); delete them first",
                sessions
            )));
        }

        sqlx::query("DELETE FROM patients WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(owner_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}
