//! Thin HTTP surface over the lifecycle engine.
//!
//! Handlers parse input, call the engine and map errors to status codes;
//! no business logic lives here. Caller identities arrive as plain ids:
//! session validation is the identity collaborator's job, and the engine
//! checks the role itself.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use bugboard_core::{EngineError, Report, ReportDraft, ReportId, ReportStatus, Role, UserId};

use crate::AppState;

/// Engine error wrapped for HTTP responses.
struct ApiError(EngineError);

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            EngineError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            EngineError::NotFound { .. } => StatusCode::NOT_FOUND,
            EngineError::InvalidTransition { .. } => StatusCode::CONFLICT,
            EngineError::Authorization { .. } => StatusCode::FORBIDDEN,
            EngineError::Storage { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // Storage details go to the log, not the client.
        let message = if matches!(self.0, EngineError::Storage { .. }) {
            error!("storage failure: {}", self.0);
            "internal storage failure".to_string()
        } else {
            self.0.to_string()
        };

        (
            status,
            Json(json!({ "error": self.0.kind(), "message": message })),
        )
            .into_response()
    }
}

#[derive(Deserialize)]
struct RegisterUserRequest {
    id: String,
    name: String,
    role: Role,
}

#[derive(Deserialize)]
struct IntakeRequest {
    reporter_id: String,
    #[serde(flatten)]
    draft: ReportDraft,
}

#[derive(Deserialize)]
struct TransitionRequest {
    caller_id: String,
    target: String,
    #[serde(default)]
    points: u64,
}

#[derive(Deserialize)]
struct LeaderboardQuery {
    #[serde(default = "default_leaderboard_limit")]
    limit: usize,
}

fn default_leaderboard_limit() -> usize {
    10
}

async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "service": "bugboard"
    }))
}

async fn register_user_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterUserRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    if req.id.trim().is_empty() || req.name.trim().is_empty() {
        return Err(EngineError::validation("user id and name are required").into());
    }
    let user = state
        .engine
        .register_user(req.id, req.name, req.role)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "id": user.id,
            "name": user.name,
            "role": user.role,
            "point_balance": user.point_balance,
        })),
    ))
}

async fn intake_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<IntakeRequest>,
) -> Result<(StatusCode, Json<Report>), ApiError> {
    let report = state
        .engine
        .intake(req.draft, &UserId::from(req.reporter_id))
        .await?;
    Ok((StatusCode::CREATED, Json(report)))
}

async fn transition_handler(
    State(state): State<Arc<AppState>>,
    Path(report_id): Path<String>,
    Json(req): Json<TransitionRequest>,
) -> Result<Json<Report>, ApiError> {
    // An unparseable target is a state machine violation, not a 400: it
    // names an edge that cannot exist.
    let target = ReportStatus::from_str(&req.target)
        .ok_or_else(|| EngineError::unknown_target(&req.target))?;

    let report = state
        .engine
        .transition(
            &ReportId::from(report_id),
            target,
            req.points,
            &UserId::from(req.caller_id),
        )
        .await?;
    Ok(Json(report))
}

async fn leaderboard_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let entries = state.engine.leaderboard(query.limit).await?;
    Ok(Json(json!({ "leaderboard": entries })))
}

async fn list_reports_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let reports = state.engine.list_reports().await?;
    Ok(Json(json!({ "reports": reports })))
}

async fn get_report_handler(
    State(state): State<Arc<AppState>>,
    Path(report_id): Path<String>,
) -> Result<Json<Report>, ApiError> {
    let report = state.engine.get_report(&ReportId::from(report_id)).await?;
    Ok(Json(report))
}

/// Build the application router.
pub fn app_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/users", post(register_user_handler))
        .route("/reports", post(intake_handler).get(list_reports_handler))
        .route("/reports/{id}", get(get_report_handler))
        .route("/reports/{id}/transition", post(transition_handler))
        .route("/leaderboard", get(leaderboard_handler))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemoryRepository;
    use crate::LifecycleEngine;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    async fn test_app() -> Router {
        let engine = LifecycleEngine::new(Arc::new(InMemoryRepository::new("BUG")));
        engine
            .register_user("ada", "Ada", Role::Reporter)
            .await
            .unwrap();
        engine
            .register_user("admin", "Root", Role::Admin)
            .await
            .unwrap();
        app_router(Arc::new(AppState { engine }))
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn intake_body(severity: &str) -> serde_json::Value {
        json!({
            "reporter_id": "ada",
            "title": "Crash on login",
            "description": "crashes with long password",
            "steps": "enter 200 chars, tap login",
            "environment": "Pixel 8",
            "app_name": "acme-mobile",
            "severity": severity
        })
    }

    #[tokio::test]
    async fn test_health() {
        let app = test_app().await;
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_intake_then_transition_roundtrip() {
        let app = test_app().await;

        let response = app
            .clone()
            .oneshot(post_json("/reports", intake_body("high")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let report = body_json(response).await;
        assert_eq!(report["id"], "BUG-001");
        assert_eq!(report["review_deadline_hours"], 6);
        assert_eq!(report["status"], "submitted");

        let response = app
            .clone()
            .oneshot(post_json(
                "/reports/BUG-001/transition",
                json!({ "caller_id": "admin", "target": "verified", "points": 500 }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let updated = body_json(response).await;
        assert_eq!(updated["status"], "verified");
        assert_eq!(updated["awarded_points"], 500);

        let response = app
            .oneshot(Request::get("/leaderboard").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let board = body_json(response).await;
        assert_eq!(board["leaderboard"][0]["point_balance"], 500);
    }

    #[tokio::test]
    async fn test_error_status_mapping() {
        let app = test_app().await;

        // Validation -> 422
        let mut missing = intake_body("high");
        missing["title"] = json!("");
        let response = app
            .clone()
            .oneshot(post_json("/reports", missing))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        // NotFound -> 404
        let response = app
            .clone()
            .oneshot(post_json(
                "/reports/BUG-404/transition",
                json!({ "caller_id": "admin", "target": "verified", "points": 0 }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        // Authorization -> 403
        app.clone()
            .oneshot(post_json("/reports", intake_body("low")))
            .await
            .unwrap();
        let response = app
            .clone()
            .oneshot(post_json(
                "/reports/BUG-001/transition",
                json!({ "caller_id": "ada", "target": "verified", "points": 150 }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        // Unknown target status -> 409 (invalid transition, per the state
        // machine's contract for garbage targets).
        let response = app
            .clone()
            .oneshot(post_json(
                "/reports/BUG-001/transition",
                json!({ "caller_id": "admin", "target": "escalated", "points": 0 }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let body = body_json(response).await;
        assert_eq!(body["error"], "invalid_transition");

        // Illegal edge -> 409
        let response = app
            .clone()
            .oneshot(post_json(
                "/reports/BUG-001/transition",
                json!({ "caller_id": "admin", "target": "fixed", "points": 0 }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_leaderboard_limit_query() {
        let app = test_app().await;
        let response = app
            .oneshot(
                Request::get("/leaderboard?limit=1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
