use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use super::auth::AuthUser;
use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{validate_email, validate_name, validate_password};
use super::ApiJson;
use crate::auth;
use crate::db::{CreateUserRequest, UpdateUserRequest, UserResponse};
use crate::AppState;

fn validate_create_request(req: &CreateUserRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    if let Err(e) = validate_name(&req.name, "Name") {
        errors.add("name", e);
    }
    if let Err(e) = validate_email(&req.email) {
        errors.add("email", e);
    }
    if let Err(e) = validate_password(&req.password) {
        errors.add("password", e);
    }

    errors.finish()
}

fn validate_update_request(req: &UpdateUserRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    if let Some(name) = &req.name {
        if let Err(e) = validate_name(name, "Name") {
            errors.add("name", e);
        }
    }
    if let Some(email) = &req.email {
        if let Err(e) = validate_email(email) {
            errors.add("email", e);
        }
    }
    if let Some(password) = &req.password {
        if let Err(e) = validate_password(password) {
            errors.add("password", e);
        }
    }

    errors.finish()
}

/// Register a new account
pub async fn register(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    validate_create_request(&req)?;

    let user = auth::register(&state.db, &req).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<UserResponse>, ApiError> {
    let profile = auth::profile(&state.db, &user.id).await?;
    Ok(Json(profile))
}

pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiJson(req): ApiJson<UpdateUserRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    validate_update_request(&req)?;

    let profile = auth::update_profile(&state.db, &user.id, &req).await?;
    Ok(Json(profile))
}
