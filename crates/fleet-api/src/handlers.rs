//! REST API handlers.
//!
//! Each handler goes through the `Coordinator` and returns the JSON
//! envelope `{success, data?, error?}`.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use tracing::warn;

use fleet_coordinator::{CoordinatorError, WorkerCommand};
use fleet_failover::FailoverError;
use fleet_registry::{render_prometheus, RegistryError, WorkerFilter};
use fleet_state::{HealthClassification, WorkerStatus};

use crate::ApiState;

/// Response wrapper for consistent API format.
#[derive(serde::Serialize)]
struct ApiResponse<T: serde::Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: serde::Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

fn error_response(msg: &str, status: StatusCode) -> Response {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        }),
    )
        .into_response()
}

/// Map a coordinator error onto its HTTP status.
fn coordinator_error(e: CoordinatorError) -> Response {
    let status = match &e {
        CoordinatorError::Registry(RegistryError::NotFound(_)) => StatusCode::NOT_FOUND,
        CoordinatorError::Registry(RegistryError::StaleWrite { .. }) => StatusCode::CONFLICT,
        CoordinatorError::NotConnected(_)
        | CoordinatorError::ChannelClosed(_)
        | CoordinatorError::RotationInProgress => StatusCode::CONFLICT,
        CoordinatorError::MalformedMessage(_) | CoordinatorError::NotRegistered => StatusCode::BAD_REQUEST,
        CoordinatorError::Failover(FailoverError::UpstreamExhausted { .. }) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        CoordinatorError::Registry(_) | CoordinatorError::Failover(_) => {
            warn!(error = %e, "request failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    error_response(&e.to_string(), status)
}

fn bad_json(rejection: JsonRejection) -> Response {
    error_response(&rejection.body_text(), StatusCode::BAD_REQUEST)
}

// ── Workers ────────────────────────────────────────────────────

/// Query string for `GET /api/v1/workers`.
#[derive(Debug, Default, Deserialize)]
pub struct WorkerQuery {
    pub group: Option<String>,
    pub status: Option<WorkerStatus>,
    pub health: Option<HealthClassification>,
}

impl From<WorkerQuery> for WorkerFilter {
    fn from(q: WorkerQuery) -> Self {
        WorkerFilter {
            group: q.group,
            status: q.status,
            health: q.health,
        }
    }
}

/// GET /api/v1/workers
pub async fn list_workers(
    State(state): State<ApiState>,
    query: Result<Query<WorkerQuery>, QueryRejection>,
) -> Response {
    let Query(query) = match query {
        Ok(q) => q,
        Err(rejection) => return error_response(&rejection.body_text(), StatusCode::BAD_REQUEST),
    };
    let workers = state.coordinator.list_workers(&WorkerFilter::from(query));
    ApiResponse::ok(workers).into_response()
}

/// GET /api/v1/workers/{id}
pub async fn get_worker(State(state): State<ApiState>, Path(id): Path<String>) -> Response {
    match state.coordinator.get_worker(&id) {
        Ok(record) => ApiResponse::ok(record).into_response(),
        Err(e) => coordinator_error(e),
    }
}

/// DELETE /api/v1/workers/{id}
pub async fn delete_worker(State(state): State<ApiState>, Path(id): Path<String>) -> Response {
    match state.coordinator.remove_worker(&id) {
        Ok(true) => ApiResponse::ok("deleted").into_response(),
        Ok(false) => error_response("worker not found", StatusCode::NOT_FOUND),
        Err(e) => coordinator_error(e),
    }
}

/// Body of `PUT /api/v1/workers/{id}/group`. `null` clears the group.
#[derive(Debug, Deserialize)]
pub struct GroupRequest {
    pub group: Option<String>,
}

/// PUT /api/v1/workers/{id}/group
pub async fn set_group(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    body: Result<Json<GroupRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match body {
        Ok(body) => body,
        Err(rejection) => return bad_json(rejection),
    };
    let group = req.group.filter(|g| !g.trim().is_empty());
    match state.coordinator.set_group(&id, group) {
        Ok(record) => ApiResponse::ok(record).into_response(),
        Err(e) => coordinator_error(e),
    }
}

/// POST /api/v1/workers/{id}/reset-counters
pub async fn reset_counters(State(state): State<ApiState>, Path(id): Path<String>) -> Response {
    match state.coordinator.reset_counters(&id) {
        Ok(record) => ApiResponse::ok(record).into_response(),
        Err(e) => coordinator_error(e),
    }
}

// ── Commands ───────────────────────────────────────────────────

/// POST /api/v1/workers/{id}/commands
pub async fn send_command(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    body: Result<Json<WorkerCommand>, JsonRejection>,
) -> Response {
    let Json(command) = match body {
        Ok(body) => body,
        Err(rejection) => return bad_json(rejection),
    };
    match state.coordinator.send_command(&id, command).await {
        Ok(()) => ApiResponse::ok(serde_json::json!({ "workerId": id, "delivered": true })).into_response(),
        Err(e) => coordinator_error(e),
    }
}

/// Body of `POST /api/v1/commands`.
#[derive(Debug, Deserialize)]
pub struct BroadcastRequest {
    pub command: WorkerCommand,
    #[serde(default)]
    pub group: Option<String>,
}

/// POST /api/v1/commands
pub async fn broadcast_command(
    State(state): State<ApiState>,
    body: Result<Json<BroadcastRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match body {
        Ok(body) => body,
        Err(rejection) => return bad_json(rejection),
    };
    let delivered = state
        .coordinator
        .broadcast_command(&req.command, req.group.as_deref());
    ApiResponse::ok(serde_json::json!({ "delivered": delivered })).into_response()
}

// ── Fleet and failover ─────────────────────────────────────────

/// GET /api/v1/fleet
pub async fn fleet_snapshot(State(state): State<ApiState>) -> Response {
    ApiResponse::ok(state.coordinator.snapshot()).into_response()
}

/// GET /api/v1/failover
pub async fn failover_status(State(state): State<ApiState>) -> Response {
    ApiResponse::ok(state.coordinator.failover_status()).into_response()
}

/// POST /api/v1/failover/rotate
pub async fn force_rotate(State(state): State<ApiState>) -> Response {
    match state.coordinator.force_rotate().await {
        Ok(rotation) => ApiResponse::ok(rotation).into_response(),
        Err(e) => coordinator_error(e),
    }
}

/// POST /api/v1/failover/resume
pub async fn resume_failover(State(state): State<ApiState>) -> Response {
    state.coordinator.resume_failover();
    ApiResponse::ok(state.coordinator.failover_status()).into_response()
}

// ── Prometheus ─────────────────────────────────────────────────

/// GET /metrics
pub async fn prometheus_metrics(State(state): State<ApiState>) -> impl IntoResponse {
    let body = render_prometheus(&state.coordinator.snapshot());
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}
