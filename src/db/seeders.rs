//! Startup seeding of the initial account.

use anyhow::{Context, Result};
use tracing::info;

use crate::auth::hash_password;
use crate::config::AuthConfig;
use crate::db::{DbPool, User};

/// Make sure the configured admin account exists.
///
/// Does nothing unless both `admin_email` and `admin_password` are set. An
/// existing account with that email is left untouched.
pub async fn seed_admin_user(pool: &DbPool, auth: &AuthConfig) -> Result<()> {
    let (Some(email), Some(password)) = (&auth.admin_email, &auth.admin_password) else {
        return Ok(());
    };

    if User::find_by_email(pool, email).await?.is_some() {
        info!(email = %email, "Admin user already exists");
        return Ok(());
    }

    let password_hash =
        hash_password(password).map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?;
    User::insert(pool, &auth.admin_name, email, &password_hash)
        .await
        .context("Failed to create admin user")?;

    info!(email = %email, "Created admin user");
    Ok(())
}
