//! Authentication: password hashing, access tokens, login and registration.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use lazy_static::lazy_static;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::db::{
    normalize_email, CreateUserRequest, DbPool, LoginRequest, LoginResponse, UpdateUserRequest,
    User, UserResponse,
};
use crate::error::{Error, Result};

lazy_static! {
    /// Verified against when the email is unknown, so both login failures cost the same
    static ref DUMMY_HASH: String = hash_password("timing-equalizer-password").unwrap_or_default();
}

const INVALID_CREDENTIALS: &str = "Invalid credentials";

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> std::result::Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2.hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verify a password against a hash
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// Generate a random signing secret
pub fn generate_secret() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 32] = rng.random();
    hex::encode(bytes)
}

/// Access token claims
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    /// User id
    pub sub: String,
    pub email: String,
    pub iat: i64,
    pub exp: i64,
}

/// Signs and verifies HS256 access tokens
#[derive(Clone)]
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl TokenKeys {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl,
        }
    }

    pub fn issue(&self, user_id: &str, email: &str) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            email: email.to_string(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| Error::Internal(format!("Failed to sign token: {}", e)))
    }

    /// Check signature and expiry
    pub fn verify(&self, token: &str) -> Result<Claims> {
        decode::<Claims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|_| Error::Unauthorized("Invalid or expired token".to_string()))
    }
}

/// Exchange an email/password pair for an access token.
///
/// Unknown email and wrong password fail identically.
pub async fn login(db: &DbPool, keys: &TokenKeys, request: &LoginRequest) -> Result<LoginResponse> {
    let user = User::find_by_email(db, &request.email).await?;

    let user = match user {
        Some(user) if verify_password(&request.password, &user.password_hash) => user,
        Some(_) => {
            warn!(email = %normalize_email(&request.email), "Login failed");
            return Err(Error::Unauthorized(INVALID_CREDENTIALS.to_string()));
        }
        None => {
            verify_password(&request.password, &DUMMY_HASH);
            warn!(email = %normalize_email(&request.email), "Login failed");
            return Err(Error::Unauthorized(INVALID_CREDENTIALS.to_string()));
        }
    };

    let access_token = keys.issue(&user.id, &user.email)?;
    info!(user_id = %user.id, "User logged in");

    Ok(LoginResponse {
        user: UserResponse::from(user),
        access_token,
    })
}

/// Create an account. The email must not be taken.
pub async fn register(db: &DbPool, request: &CreateUserRequest) -> Result<UserResponse> {
    if User::find_by_email(db, &request.email).await?.is_some() {
        return Err(Error::Conflict("Email is already in use".to_string()));
    }

    let password_hash = hash_password(&request.password)
        .map_err(|e| Error::Internal(format!("Failed to hash password: {}", e)))?;

    let user = User::insert(db, &request.name, &request.email, &password_hash).await?;
    info!(user_id = %user.id, "Registered new user");

    Ok(UserResponse::from(user))
}

pub async fn profile(db: &DbPool, user_id: &str) -> Result<UserResponse> {
    User::find_by_id(db, user_id).await.map(UserResponse::from)
}

/// Update name, email or password of the caller's own account
pub async fn update_profile(
    db: &DbPool,
    user_id: &str,
    request: &UpdateUserRequest,
) -> Result<UserResponse> {
    if let Some(email) = &request.email {
        if let Some(existing) = User::find_by_email(db, email).await? {
            if existing.id != user_id {
                return Err(Error::Conflict("Email is already in use".to_string()));
            }
        }
    }

    let password_hash = request
        .password
        .as_deref()
        .map(hash_password)
        .transpose()
        .map_err(|e| Error::Internal(format!("Failed to hash password: {}", e)))?;

    let user = User::update_profile(
        db,
        user_id,
        request.name.as_deref(),
        request.email.as_deref(),
        password_hash.as_deref(),
    )
    .await?;

    info!(user_id = %user.id, "Updated user profile");
    Ok(UserResponse::from(user))
}
