use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use super::auth::AuthUser;
use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{validate_duration, validate_instant, validate_notes, validate_uuid};
use super::{require_uuid, ApiJson};
use crate::db::{
    CreateSessionRequest, DeleteResponse, OwnedRepository, SessionResponse, TherapySession,
    UpdateSessionRequest,
};
use crate::AppState;

fn validate_create_request(req: &CreateSessionRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    if let Err(e) = validate_instant(&req.date) {
        errors.add("date", e);
    }
    if let Err(e) = validate_duration(req.duration_minutes) {
        errors.add("durationMinutes", e);
    }
    if let Err(e) = validate_uuid(&req.patient_id, "patientId") {
        errors.add("patientId", e);
    }
    if let Err(e) = validate_notes(&req.notes) {
        errors.add("notes", e);
    }

    errors.finish()
}

fn validate_update_request(req: &UpdateSessionRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    if let Some(date) = &req.date {
        if let Err(e) = validate_instant(date) {
            errors.add("date", e);
        }
    }
    if let Some(duration) = req.duration_minutes {
        if let Err(e) = validate_duration(duration) {
            errors.add("durationMinutes", e);
        }
    }
    if let Some(patient_id) = &req.patient_id {
        if let Err(e) = validate_uuid(patient_id, "patientId") {
            errors.add("patientId", e);
        }
    }
    if let Err(e) = validate_notes(&req.notes) {
        errors.add("notes", e);
    }

    errors.finish()
}

pub async fn list_sessions(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<Vec<SessionResponse>>, ApiError> {
    let sessions = TherapySession::find_all(&state.db, &user.id).await?;
    Ok(Json(sessions.into_iter().map(SessionResponse::from).collect()))
}

/// Sessions of one patient, newest first
pub async fn list_patient_sessions(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(patient_id): Path<String>,
) -> Result<Json<Vec<SessionResponse>>, ApiError> {
    require_uuid(&patient_id, "patient_id")?;

    let sessions = TherapySession::find_by_patient(&state.db, &patient_id, &user.id).await?;
    Ok(Json(sessions.into_iter().map(SessionResponse::from).collect()))
}

pub async fn create_session(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiJson(req): ApiJson<CreateSessionRequest>,
) -> Result<(StatusCode, Json<SessionResponse>), ApiError> {
    validate_create_request(&req)?;

    let session = TherapySession::create(&state.db, &req, &user.id).await?;
    tracing::info!(
        session_id = %session.id,
        patient_id = %session.patient_id,
        user_id = %user.id,
        "Created session"
    );

    Ok((StatusCode::CREATED, Json(SessionResponse::from(session))))
}

pub async fn get_session(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, ApiError> {
    require_uuid(&id, "session_id")?;

    let session = TherapySession::find_one(&state.db, &id, &user.id).await?;
    Ok(Json(SessionResponse::from(session)))
}

pub async fn update_session(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<UpdateSessionRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    require_uuid(&id, "session_id")?;
    validate_update_request(&req)?;

    let session = TherapySession::update(&state.db, &id, &req, &user.id).await?;
    Ok(Json(SessionResponse::from(session)))
}

pub async fn delete_session(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    require_uuid(&id, "session_id")?;

    TherapySession::remove(&state.db, &id, &user.id).await?;
    tracing::info!(session_id = %id, user_id = %user.id, "Deleted session");

    Ok(Json(DeleteResponse::ok()))
}
