pub mod auth;
mod dashboard;
pub mod error;
mod finances;
mod patients;
pub mod rate_limit;
mod sessions;
mod users;
pub mod validation;

use axum::{
    extract::FromRequest,
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::AppState;
use error::ApiError;

/// JSON body extractor whose rejections use the API error envelope
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// Reject malformed path ids before they reach the store
pub(crate) fn require_uuid(id: &str, field: &str) -> Result<(), ApiError> {
    validation::validate_uuid(id, field).map_err(|e| ApiError::validation_field(field, e))
}

pub fn create_router(state: Arc<AppState>) -> Router {
    // Public endpoints, throttled per client
    let auth_routes = Router::new()
        .route("/auth/login", post(auth::login))
        .route("/users", post(users::register))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::rate_limit_auth,
        ));

    // Protected API routes
    let api_routes = Router::new()
        .route("/auth/me", get(auth::me))
        .route("/auth/profile", get(auth::me))
        .route(
            "/users/me",
            get(users::get_profile).patch(users::update_profile),
        )
        // Patients
        .route(
            "/patients",
            get(patients::list_patients).post(patients::create_patient),
        )
        .route(
            "/patients/:id",
            get(patients::get_patient)
                .patch(patients::update_patient)
                .delete(patients::delete_patient),
        )
        // Sessions
        .route(
            "/sessions",
            get(sessions::list_sessions).post(sessions::create_session),
        )
        .route(
            "/sessions/patient/:patient_id",
            get(sessions::list_patient_sessions),
        )
        .route(
            "/sessions/:id",
            get(sessions::get_session)
                .patch(sessions::update_session)
                .delete(sessions::delete_session),
        )
        // Finances
        .route(
            "/finances/incomes",
            get(finances::list_incomes).post(finances::create_income),
        )
        .route(
            "/finances/incomes/:id",
            get(finances::get_income)
                .patch(finances::update_income)
                .delete(finances::delete_income),
        )
        .route(
            "/finances/expenses",
            get(finances::list_expenses).post(finances::create_expense),
        )
        .route(
            "/finances/expenses/:id",
            get(finances::get_expense)
                .patch(finances::update_expense)
                .delete(finances::delete_expense),
        )
        .route("/finances/summary", get(finances::get_summary))
        .route("/dashboard", get(dashboard::get_dashboard))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::auth_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", auth_routes.merge(api_routes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}
