//! End-to-end tests that drive the router in memory.

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use practice_desk::config::Config;
use practice_desk::{api, db, AppState};

async fn app_with(config: Config) -> Router {
    let pool = db::init_memory().await.unwrap();
    api::create_router(Arc::new(AppState::new(config, pool)))
}

async fn app() -> Router {
    let mut config = Config::default();
    config.auth.jwt_secret = Some("integration-test-secret".to_string());
    config.rate_limit.enabled = false;
    app_with(config).await
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let body = match body {
        Some(json) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

/// Register an account and return its access token
async fn signup(app: &Router, email: &str) -> String {
    let (status, _) = send(
        app,
        Method::POST,
        "/api/users",
        None,
        Some(json!({"name": "Dra. Ana", "email": email, "password": "senha123"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(
        app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({"email": email, "password": "senha123"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body["access_token"].as_str().unwrap().to_string()
}

async fn create_patient(app: &Router, token: &str, name: &str) -> String {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/patients",
        Some(token),
        Some(json!({"name": name, "phone": "+55 11 98765-4321"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["id"].as_str().unwrap().to_string()
}

fn amount(value: &Value) -> f64 {
    value.as_f64().unwrap()
}

#[tokio::test]
async fn test_health_check_is_public() {
    let app = app().await;
    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_login_flow_and_profile() {
    let app = app().await;
    let token = signup(&app, "ana@example.com").await;

    for uri in ["/api/auth/me", "/api/auth/profile"] {
        let (status, me) = send(&app, Method::GET, uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::OK, "{}", uri);
        assert_eq!(me["email"], "ana@example.com");
        assert!(me.get("passwordHash").is_none());
        assert!(me.get("password_hash").is_none());
    }

    let (status, updated) = send(
        &app,
        Method::PATCH,
        "/api/users/me",
        Some(&token),
        Some(json!({"name": "Ana Souza"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["name"], "Ana Souza");
}

#[tokio::test]
async fn test_login_response_field_names() {
    let app = app().await;
    signup(&app, "ana@example.com").await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({"email": "ana@example.com", "password": "senha123"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let mut keys: Vec<&str> = body.as_object().unwrap().keys().map(String::as_str).collect();
    keys.sort();
    assert_eq!(keys, vec!["access_token", "user"]);
    assert_eq!(body["user"]["email"], "ana@example.com");
}

#[tokio::test]
async fn test_duplicate_registration_conflicts() {
    let app = app().await;
    signup(&app, "ana@example.com").await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/users",
        None,
        Some(json!({"name": "Other", "email": "ANA@example.com", "password": "senha123"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "conflict");
}

#[tokio::test]
async fn test_login_failures_look_the_same() {
    let app = app().await;
    signup(&app, "ana@example.com").await;

    let (wrong_status, wrong_body) = send(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({"email": "ana@example.com", "password": "errada"})),
    )
    .await;
    let (unknown_status, unknown_body) = send(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({"email": "ghost@example.com", "password": "senha123"})),
    )
    .await;

    assert_eq!(wrong_status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_body, unknown_body);
}

#[tokio::test]
async fn test_protected_routes_require_a_valid_token() {
    let app = app().await;

    let (status, body) = send(&app, Method::GET, "/api/patients", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "unauthorized");

    let (status, _) = send(&app, Method::GET, "/api/patients", Some("not.a.jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_malformed_bodies_and_ids_are_bad_requests() {
    let app = app().await;
    let token = signup(&app, "ana@example.com").await;

    let (status, body) = send(&app, Method::GET, "/api/patients/not-a-uuid", Some(&token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "validation_error");

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/patients",
        Some(&token),
        Some(json!({"email": "x@example.com"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "bad_request");
}

#[tokio::test]
async fn test_patients_are_scoped_to_their_owner() {
    let app = app().await;
    let ana = signup(&app, "ana@example.com").await;
    let bia = signup(&app, "bia@example.com").await;

    let id = create_patient(&app, &ana, "Maria").await;
    let uri = format!("/api/patients/{}", id);

    let (status, body) = send(&app, Method::GET, &uri, Some(&bia), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(
        body["error"]["message"],
        format!("Patient with ID {} not found", id)
    );

    let (status, _) = send(
        &app,
        Method::PATCH,
        &uri,
        Some(&bia),
        Some(json!({"name": "Hijacked"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, Method::DELETE, &uri, Some(&bia), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, list) = send(&app, Method::GET, "/api/patients", Some(&bia), None).await;
    assert_eq!(list.as_array().unwrap().len(), 0);

    let (status, patient) = send(&app, Method::GET, &uri, Some(&ana), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(patient["name"], "Maria");

    let (status, body) = send(&app, Method::DELETE, &uri, Some(&ana), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"success": true}));

    let (status, _) = send(&app, Method::GET, &uri, Some(&ana), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_sessions_and_finances_are_scoped_to_their_owner() {
    let app = app().await;
    let ana = signup(&app, "ana@example.com").await;
    let bia = signup(&app, "bia@example.com").await;
    let patient = create_patient(&app, &ana, "Maria").await;

    let records = [
        (
            "/api/sessions",
            "Session",
            json!({"date": "2024-03-15T14:00:00Z", "durationMinutes": 50, "patientId": patient}),
            json!({"notes": "Hijacked"}),
        ),
        (
            "/api/finances/incomes",
            "Income",
            json!({"amount": 150.0, "source": "Consulta", "date": "2024-03-15"}),
            json!({"source": "Hijacked"}),
        ),
        (
            "/api/finances/expenses",
            "Expense",
            json!({"amount": 30.0, "category": "Aluguel", "date": "2024-03-15"}),
            json!({"category": "Hijacked"}),
        ),
    ];

    for (collection, entity, create, patch) in records {
        let (status, created) = send(&app, Method::POST, collection, Some(&ana), Some(create)).await;
        assert_eq!(status, StatusCode::CREATED, "{}", collection);
        let id = created["id"].as_str().unwrap().to_string();
        let uri = format!("{}/{}", collection, id);
        let not_found = format!("{} with ID {} not found", entity, id);

        let (status, body) = send(&app, Method::GET, &uri, Some(&bia), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{}", uri);
        assert_eq!(body["error"]["message"], not_found);

        let (status, body) = send(&app, Method::PATCH, &uri, Some(&bia), Some(patch)).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{}", uri);
        assert_eq!(body["error"]["message"], not_found);

        let (status, body) = send(&app, Method::DELETE, &uri, Some(&bia), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{}", uri);
        assert_eq!(body["error"]["message"], not_found);

        let (status, unchanged) = send(&app, Method::GET, &uri, Some(&ana), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(unchanged, created);

        let (_, list) = send(&app, Method::GET, collection, Some(&bia), None).await;
        assert!(list.as_array().unwrap().is_empty());
    }
}

#[tokio::test]
async fn test_sessions_link_only_to_own_patients() {
    let app = app().await;
    let ana = signup(&app, "ana@example.com").await;
    let bia = signup(&app, "bia@example.com").await;

    let bias_patient = create_patient(&app, &bia, "Joana").await;
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/sessions",
        Some(&ana),
        Some(json!({
            "date": "2024-03-15T14:00:00Z",
            "durationMinutes": 50,
            "patientId": bias_patient,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(
        body["error"]["message"],
        format!("Patient with ID {} not found", bias_patient)
    );

    let (_, sessions) = send(&app, Method::GET, "/api/sessions", Some(&ana), None).await;
    assert_eq!(sessions.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_session_lifecycle() {
    let app = app().await;
    let token = signup(&app, "ana@example.com").await;
    let patient = create_patient(&app, &token, "Maria").await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/sessions",
        Some(&token),
        Some(json!({"date": "2024-03-15T14:00:00Z", "duration": 10, "patientId": patient})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["details"]["durationMinutes"].is_array());

    let (status, session) = send(
        &app,
        Method::POST,
        "/api/sessions",
        Some(&token),
        Some(json!({
            "date": "2024-03-15T11:00:00-03:00",
            "durationMinutes": 50,
            "patientId": patient,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(session["date"], "2024-03-15T14:00:00Z");
    assert_eq!(session["patient"]["name"], "Maria");
    let session_id = session["id"].as_str().unwrap().to_string();

    let (_, by_patient) = send(
        &app,
        Method::GET,
        &format!("/api/sessions/patient/{}", patient),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(by_patient.as_array().unwrap().len(), 1);

    let (status, updated) = send(
        &app,
        Method::PATCH,
        &format!("/api/sessions/{}", session_id),
        Some(&token),
        Some(json!({"durationMinutes": 90, "notes": "Follow-up"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["durationMinutes"], 90);
    assert_eq!(updated["duration"], 90);
    assert_eq!(updated["notes"], "Follow-up");

    // Patient with sessions cannot be removed
    let patient_uri = format!("/api/patients/{}", patient);
    let (status, body) = send(&app, Method::DELETE, &patient_uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(
        body["error"]["message"],
        "Patient has 1 session(s); delete them first"
    );

    let (status, _) = send(
        &app,
        Method::DELETE,
        &format!("/api/sessions/{}", session_id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, Method::DELETE, &patient_uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_financial_summary_by_month_and_year() {
    let app = app().await;
    let token = signup(&app, "ana@example.com").await;

    for (value, date) in [("100.50", "2024-03-10"), ("50.25", "2024-03-31"), ("10.00", "2024-04-01")] {
        let (status, _) = send(
            &app,
            Method::POST,
            "/api/finances/incomes",
            Some(&token),
            Some(json!({"amount": value.parse::<f64>().unwrap(), "source": "Consulta", "date": date})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/finances/expenses",
        Some(&token),
        Some(json!({"amount": 30.0, "category": "Aluguel", "date": "2024-03-15"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, march) = send(
        &app,
        Method::GET,
        "/api/finances/summary?year=2024&month=3",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(amount(&march["totalIncome"]), 150.75);
    assert_eq!(amount(&march["totalExpense"]), 30.0);
    assert_eq!(amount(&march["balance"]), 120.75);
    assert_eq!(march["period"], json!({"year": 2024, "month": 3}));

    let (_, year) = send(
        &app,
        Method::GET,
        "/api/finances/summary?year=2024",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(amount(&year["totalIncome"]), 160.75);
    assert_eq!(amount(&year["balance"]), 130.75);
    assert!(year["period"]["month"].is_null());

    let (status, _) = send(
        &app,
        Method::GET,
        "/api/finances/summary?year=2024&month=13",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&app, Method::GET, "/api/finances/summary", Some(&token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["details"]["year"].is_array());
}

#[tokio::test]
async fn test_income_update_and_validation() {
    let app = app().await;
    let token = signup(&app, "ana@example.com").await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/finances/incomes",
        Some(&token),
        Some(json!({"amount": -5.0, "source": "", "date": "2024-02-30"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let details = body["error"]["details"].as_object().unwrap();
    assert!(details.contains_key("amount"));
    assert!(details.contains_key("source"));
    assert!(details.contains_key("date"));

    let (_, income) = send(
        &app,
        Method::POST,
        "/api/finances/incomes",
        Some(&token),
        Some(json!({"amount": 200.0, "source": "Consulta", "date": "2024-05-02"})),
    )
    .await;
    let uri = format!("/api/finances/incomes/{}", income["id"].as_str().unwrap());

    let (status, updated) = send(
        &app,
        Method::PATCH,
        &uri,
        Some(&token),
        Some(json!({"amount": 250.5})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(amount(&updated["amount"]), 250.5);

    let (status, body) = send(
        &app,
        Method::PATCH,
        &uri,
        Some(&token),
        Some(json!({"amount": 12345678901234567.89})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["details"]["amount"].is_array());
    assert_eq!(updated["source"], "Consulta");
    assert_eq!(updated["date"], "2024-05-02");
}

#[tokio::test]
async fn test_dashboard_counts_only_the_callers_data() {
    let app = app().await;
    let ana = signup(&app, "ana@example.com").await;
    let bia = signup(&app, "bia@example.com").await;

    let patient = create_patient(&app, &ana, "Maria").await;
    create_patient(&app, &bia, "Joana").await;

    let soon = (chrono::Utc::now() + chrono::Duration::days(2)).to_rfc3339();
    let later = (chrono::Utc::now() + chrono::Duration::days(30)).to_rfc3339();
    for date in [soon, later] {
        let (status, _) = send(
            &app,
            Method::POST,
            "/api/sessions",
            Some(&ana),
            Some(json!({"date": date, "durationMinutes": 50, "patientId": patient})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let today = chrono::Local::now().format("%Y-%m-%d").to_string();
    send(
        &app,
        Method::POST,
        "/api/finances/incomes",
        Some(&ana),
        Some(json!({"amount": 180.0, "source": "Consulta", "date": today})),
    )
    .await;

    let (status, dashboard) = send(&app, Method::GET, "/api/dashboard", Some(&ana), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(dashboard["patientCount"], 1);
    assert_eq!(dashboard["upcomingSessions"], 1);
    assert_eq!(amount(&dashboard["monthlyIncome"]), 180.0);
}

#[tokio::test]
async fn test_login_is_rate_limited() {
    let mut config = Config::default();
    config.auth.jwt_secret = Some("integration-test-secret".to_string());
    config.rate_limit.auth_requests_per_window = 2;
    let app = app_with(config).await;

    // A fresh forwarded address per attempt must not reset the limit
    let attempt = |n: u8| {
        let app = app.clone();
        async move {
            app.oneshot(
                Request::post("/api/auth/login")
                    .header(header::CONTENT_TYPE, "application/json")
                    .header("x-forwarded-for", format!("203.0.113.{}", n))
                    .body(Body::from(r#"{"email":"a@example.com","password":"x"}"#))
                    .unwrap(),
            )
            .await
            .unwrap()
        }
    };

    assert_eq!(attempt(1).await.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(attempt(2).await.status(), StatusCode::UNAUTHORIZED);

    let limited = attempt(3).await;
    assert_eq!(limited.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(limited.headers().contains_key("retry-after"));
}

#[tokio::test]
async fn test_trusted_proxy_limits_each_forwarded_client() {
    let mut config = Config::default();
    config.auth.jwt_secret = Some("integration-test-secret".to_string());
    config.server.trust_proxy_headers = true;
    config.rate_limit.auth_requests_per_window = 1;
    let app = app_with(config).await;

    let attempt = |client: &'static str| {
        let app = app.clone();
        async move {
            app.oneshot(
                Request::post("/api/auth/login")
                    .header(header::CONTENT_TYPE, "application/json")
                    .header("x-forwarded-for", client)
                    .body(Body::from(r#"{"email":"a@example.com","password":"x"}"#))
                    .unwrap(),
            )
            .await
            .unwrap()
            .status()
        }
    };

    assert_eq!(attempt("203.0.113.7").await, StatusCode::UNAUTHORIZED);
    assert_eq!(attempt("203.0.113.7").await, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(attempt("203.0.113.8").await, StatusCode::UNAUTHORIZED);
}
