//! User accounts (the credential store).

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::common::{new_id, now_timestamp};
use crate::db::DbPool;
use crate::error::{Error, Result};

/// Stored account. Deliberately not `Serialize`: the hash must never reach a response.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: String,
    pub name: String,
    pub email: String,
    pub created_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub user: UserResponse,
    pub access_token: String,
}

/// Registration payload
#[derive(Debug, Clone, Deserialize)]
pub struct CreateUserRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Profile update; a new password is re-hashed before storage
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Emails are compared case-insensitively
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl User {
    pub async fn find_by_email(db: &DbPool, email: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
            .bind(normalize_email(email))
            .fetch_optional(db)
            .await?;
        Ok(user)
    }

    pub async fn find_by_id(db: &DbPool, id: &str) -> Result<User> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(db)
            .await?
            .ok_or_else(|| Error::not_found("User", id))
    }

    /// Insert a new account. A duplicate email surfaces as `Conflict`.
    pub async fn insert(db: &DbPool, name: &str, email: &str, password_hash: &str) -> Result<User> {
        let user = User {
            id: new_id(),
            name: name.trim().to_string(),
            email: normalize_email(email),
            password_hash: password_hash.to_string(),
            created_at: now_timestamp(),
            updated_at: now_timestamp(),
        };

        sqlx::query(
            r#"
            INSERT INTO users (id, name, email, password_hash, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.created_at)
        .bind(&user.updated_at)
        .execute(db)
        .await
        .map_err(conflict_on_duplicate_email)?;

        Ok(user)
    }

    /// Apply a profile change. `password_hash` must already be hashed.
    pub async fn update_profile(
        db: &DbPool,
        id: &str,
        name: Option<&str>,
        email: Option<&str>,
        password_hash: Option<&str>,
    ) -> Result<User> {
        let result = sqlx::query(
            r#"
            UPDATE users SET
                name = COALESCE(?, name),
                email = COALESCE(?, email),
                password_hash = COALESCE(?, password_hash),
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(name.map(str::trim))
        .bind(email.map(normalize_email))
        .bind(password_hash)
        .bind(now_timestamp())
        .bind(id)
        .execute(db)
        .await
        .map_err(conflict_on_duplicate_email)?;

        if result.rows_affected() == 0 {
            return Err(Error::not_found("User", id));
        }

        Self::find_by_id(db, id).await
    }
}

fn conflict_on_duplicate_email(err: sqlx::Error) -> Error {
    let err = Error::from(err);
    if err.is_unique_violation() {
        Error::Conflict("Email is already in use".to_string())
    } else {
        err
    }
}
