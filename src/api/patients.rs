use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use super::auth::AuthUser;
use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{validate_name, validate_notes, validate_optional_email, validate_phone};
use super::{require_uuid, ApiJson};
use crate::db::{CreatePatientRequest, DeleteResponse, OwnedRepository, Patient, UpdatePatientRequest};
use crate::AppState;

fn validate_create_request(req: &CreatePatientRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    if let Err(e) = validate_name(&req.name, "Name") {
        errors.add("name", e);
    }
    if let Err(e) = validate_optional_email(&req.email) {
        errors.add("email", e);
    }
    if let Err(e) = validate_phone(&req.phone) {
        errors.add("phone", e);
    }
    if let Err(e) = validate_notes(&req.notes) {
        errors.add("notes", e);
    }

    errors.finish()
}

fn validate_update_request(req: &UpdatePatientRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    if let Some(name) = &req.name {
        if let Err(e) = validate_name(name, "Name") {
            errors.add("name", e);
        }
    }
    if let Err(e) = validate_optional_email(&req.email) {
        errors.add("email", e);
    }
    if let Err(e) = validate_phone(&req.phone) {
        errors.add("phone", e);
    }
    if let Err(e) = validate_notes(&req.notes) {
        errors.add("notes", e);
    }

    errors.finish()
}

pub async fn list_patients(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<Vec<Patient>>, ApiError> {
    let patients = Patient::find_all(&state.db, &user.id).await?;
    Ok(Json(patients))
}

pub async fn create_patient(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiJson(req): ApiJson<CreatePatientRequest>,
) -> Result<(StatusCode, Json<Patient>), ApiError> {
    validate_create_request(&req)?;

    let patient = Patient::create(&state.db, &req, &user.id).await?;
    tracing::info!(patient_id = %patient.id, user_id = %user.id, "Created patient");

    Ok((StatusCode::CREATED, Json(patient)))
}

pub async fn get_patient(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Patient>, ApiError> {
    require_uuid(&id, "patient_id")?;

    let patient = Patient::find_one(&state.db, &id, &user.id).await?;
    Ok(Json(patient))
}

pub async fn update_patient(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<UpdatePatientRequest>,
) -> Result<Json<Patient>, ApiError> {
    require_uuid(&id, "patient_id")?;
    validate_update_request(&req)?;

    let patient = Patient::update(&state.db, &id, &req, &user.id).await?;
    Ok(Json(patient))
}

pub async fn delete_patient(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    require_uuid(&id, "patient_id")?;

    Patient::remove(&state.db, &id, &user.id).await?;
    tracing::info!(patient_id = %id, user_id = %user.id, "Deleted patient");

    Ok(Json(DeleteResponse::ok()))
}
