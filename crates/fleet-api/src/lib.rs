//! fleet-api: HTTP surface of the fleet coordinator.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/ws` | Worker channel (WebSocket) |
//! | GET | `/api/v1/workers` | List workers (`?group=&status=&health=`) |
//! | GET | `/api/v1/workers/{id}` | Get one worker |
//! | DELETE | `/api/v1/workers/{id}` | Remove a worker |
//! | PUT | `/api/v1/workers/{id}/group` | Assign or clear the group |
//! | POST | `/api/v1/workers/{id}/reset-counters` | Zero accepted/rejected |
//! | POST | `/api/v1/workers/{id}/commands` | Send a command to one worker |
//! | POST | `/api/v1/commands` | Broadcast a command |
//! | GET | `/api/v1/fleet` | Fleet snapshot |
//! | GET | `/api/v1/failover` | Failover status |
//! | POST | `/api/v1/failover/rotate` | Force an upstream rotation |
//! | POST | `/api/v1/failover/resume` | Resume after exhaustion |
//! | GET | `/metrics` | Prometheus exposition |

pub mod handlers;
pub mod ws;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};

use fleet_coordinator::Coordinator;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub coordinator: Arc<Coordinator>,
}

/// Build the complete router (REST + worker WebSocket + metrics).
///
/// Serve it with `into_make_service_with_connect_info::<SocketAddr>()` so
/// worker channels know their source address.
pub fn build_router(coordinator: Arc<Coordinator>) -> Router {
    let state = ApiState { coordinator };

    let api_routes = Router::new()
        .route("/workers", get(handlers::list_workers))
        .route(
            "/workers/{id}",
            get(handlers::get_worker).delete(handlers::delete_worker),
        )
        .route("/workers/{id}/group", put(handlers::set_group))
        .route("/workers/{id}/reset-counters", post(handlers::reset_counters))
        .route("/workers/{id}/commands", post(handlers::send_command))
        .route("/commands", post(handlers::broadcast_command))
        .route("/fleet", get(handlers::fleet_snapshot))
        .route("/failover", get(handlers::failover_status))
        .route("/failover/rotate", post(handlers::force_rotate))
        .route("/failover/resume", post(handlers::resume_failover));

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/ws", get(ws::worker_socket))
        .route("/metrics", get(handlers::prometheus_metrics))
        .with_state(state)
}


#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    async fn body_json(resp: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    /// Register a worker; the returned session keeps its channel open.
    fn register(
        coordinator: &Coordinator,
        hostname: &str,
        group: Option<&str>,
    ) -> (String, fleet_coordinator::WorkerSession) {
        let mut session = coordinator.open_session(None);
        let group = group.map(|g| format!(r#","group":"{g}""#)).unwrap_or_default();
        let text = format!(r#"{{"type":"register","hostInfo":{{"hostname":"{hostname}"}}{group}}}"#);
        coordinator.handle_text(&mut session, &text).unwrap();
        let id = session.worker_id().unwrap().to_string();
        (id, session)
    }

    #[tokio::test]
    async fn list_workers_with_filters() {
        let coordinator = test_support::coordinator();
        let _a = register(&coordinator, "a", Some("east"));
        let _b = register(&coordinator, "b", Some("west"));
        let router = build_router(coordinator);

        let req = Request::builder()
            .uri("/api/v1/workers?group=east&status=online")
            .body(Body::empty())
            .unwrap();
        let resp = router.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["data"].as_array().unwrap().len(), 1);
        assert_eq!(json["data"][0]["group"], "east");

        let req = Request::builder()
            .uri("/api/v1/workers?status=sleeping")
            .body(Body::empty())
            .unwrap();
        let resp = router.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_worker_is_404() {
        let router = build_router(test_support::coordinator());
        for (method, uri) in [
            ("GET", "/api/v1/workers/worker-nope"),
            ("DELETE", "/api/v1/workers/worker-nope"),
            ("POST", "/api/v1/workers/worker-nope/reset-counters"),
        ] {
            let req = Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap();
            let resp = router.clone().oneshot(req).await.unwrap();
            assert_eq!(resp.status(), StatusCode::NOT_FOUND, "{method} {uri}");
            let json = body_json(resp).await;
            assert_eq!(json["success"], false);
        }
    }

    #[tokio::test]
    async fn set_group_then_broadcast_to_group() {
        let coordinator = test_support::coordinator();
        let (id, _a) = register(&coordinator, "a", None);
        let _b = register(&coordinator, "b", None);
        let router = build_router(coordinator);

        let req = Request::builder()
            .method("PUT")
            .uri(format!("/api/v1/workers/{id}/group"))
            .header("content-type", "application/json")
            .body(Body::from(r#"{"group":"night"}"#))
            .unwrap();
        let resp = router.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["data"]["group"], "night");

        let req = Request::builder()
            .method("POST")
            .uri("/api/v1/commands")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"command":{"type":"stop"},"group":"night"}"#))
            .unwrap();
        let resp = router.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["data"]["delivered"], 1);
    }

    #[tokio::test]
    async fn malformed_body_is_400() {
        let coordinator = test_support::coordinator();
        let (id, _session) = register(&coordinator, "a", None);
        let router = build_router(coordinator);

        let req = Request::builder()
            .method("POST")
            .uri(format!("/api/v1/workers/{id}/commands"))
            .header("content-type", "application/json")
            .body(Body::from(r#"{"type":"reboot"}"#))
            .unwrap();
        let resp = router.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn fleet_and_metrics() {
        let coordinator = test_support::coordinator();
        let _session = register(&coordinator, "a", None);
        let router = build_router(coordinator);

        let req = Request::builder().uri("/api/v1/fleet").body(Body::empty()).unwrap();
        let resp = router.clone().oneshot(req).await.unwrap();
        let json = body_json(resp).await;
        assert_eq!(json["data"]["totalWorkers"], 1);
        assert_eq!(json["data"]["connectedWorkers"], 1);

        let req = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
        let resp = router.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("fleet_workers{status=\"online\"} 1"));
    }

    #[tokio::test]
    async fn rotate_via_api() {
        let router = build_router(test_support::coordinator());

        let req = Request::builder()
            .method("POST")
            .uri("/api/v1/failover/rotate")
            .body(Body::empty())
            .unwrap();
        let resp = router.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["data"]["to"]["id"], "backup");

        let req = Request::builder().uri("/api/v1/failover").body(Body::empty()).unwrap();
        let resp = router.oneshot(req).await.unwrap();
        let json = body_json(resp).await;
        assert_eq!(json["data"]["activeUpstream"]["id"], "backup");
        assert_eq!(json["data"]["activeIndex"], 1);
    }
}
