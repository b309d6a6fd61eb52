//! API regression tests: REST routes through the router, and a worker
//! channel over a real WebSocket connection.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;
use tower::ServiceExt;

use fleet_api::build_router;
use fleet_coordinator::{Coordinator, CoordinatorSettings, WorkerCommand};
use fleet_core::FleetConfig;
use fleet_failover::{FailoverController, FailureClassifier};
use fleet_health::HealthPolicy;
use fleet_registry::WorkerRegistry;
use fleet_state::StateStore;

const CONFIG: &str = r#"
[failover]
failure_threshold = 2
cooldown = "30s"
settle_delay = "0s"

[[failover.upstreams]]
id = "primary"
address = "stratum+tcp://primary.example:3333"
priority = 0

[[failover.upstreams]]
id = "backup"
address = "stratum+tcp://backup.example:3333"
priority = 1
"#;

fn coordinator() -> Arc<Coordinator> {
    let config = FleetConfig::from_toml_str(CONFIG).unwrap();
    config.validate().unwrap();
    let registry = Arc::new(
        WorkerRegistry::new(HealthPolicy::from(&config.health))
            .with_store(StateStore::open_in_memory().unwrap()),
    );
    Arc::new(Coordinator::new(
        registry,
        FailoverController::from_config(&config.failover).unwrap(),
        FailureClassifier::from_config(&config.failover).unwrap(),
        CoordinatorSettings::from(&config),
    ))
}

async fn body_json(resp: axum::response::Response) -> serde_json::Value {
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn serve(coordinator: Arc<Coordinator>) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = build_router(coordinator);
    tokio::spawn(async move {
        axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>())
            .await
            .unwrap();
    });
    addr
}

async fn next_json<S>(ws: &mut S) -> serde_json::Value
where
    S: futures_util::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("socket closed")
            .unwrap();
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

#[tokio::test]
async fn empty_fleet_endpoints() {
    let router = build_router(coordinator());

    for uri in ["/api/v1/workers", "/api/v1/fleet", "/api/v1/failover", "/metrics"] {
        let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let resp = router.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK, "{uri}");
    }

    let req = Request::builder().uri("/api/v1/failover").body(Body::empty()).unwrap();
    let json = body_json(router.oneshot(req).await.unwrap()).await;
    assert_eq!(json["data"]["activeUpstream"]["id"], "primary");
    assert_eq!(json["data"]["phase"], "connected");
    assert_eq!(json["data"]["upstreamCount"], 2);
}

#[tokio::test]
async fn failover_rotates_and_resumes_over_rest() {
    let coordinator = coordinator();
    let router = build_router(coordinator.clone());

    coordinator.report_local_line("pool timeout").await.unwrap();
    coordinator.report_local_line("pool timeout").await.unwrap();
    assert_eq!(coordinator.active_upstream().id, "backup");

    let req = Request::builder()
        .method("POST")
        .uri("/api/v1/failover/rotate")
        .body(Body::empty())
        .unwrap();
    let json = body_json(router.clone().oneshot(req).await.unwrap()).await;
    assert_eq!(json["data"]["to"]["id"], "primary");
    assert_eq!(json["data"]["forced"], true);

    let req = Request::builder()
        .method("POST")
        .uri("/api/v1/failover/resume")
        .body(Body::empty())
        .unwrap();
    let json = body_json(router.oneshot(req).await.unwrap()).await;
    assert_eq!(json["data"]["paused"], false);
    assert_eq!(json["data"]["activeUpstream"]["id"], "primary");
}

#[tokio::test]
async fn worker_channel_round_trip() {
    let coordinator = coordinator();
    let addr = serve(coordinator.clone()).await;

    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws"))
        .await
        .unwrap();

    ws.send(Message::Text(
        r#"{"type":"register","hostInfo":{"hostname":"rig-ws","hardwareId":"hw-1"},"name":"Rig WS"}"#.into(),
    ))
    .await
    .unwrap();
    let reply = next_json(&mut ws).await;
    assert_eq!(reply["type"], "registered");
    let worker_id = reply["workerId"].as_str().unwrap().to_string();
    assert!(worker_id.starts_with("worker-"));

    let record = coordinator.get_worker(&worker_id).unwrap();
    assert_eq!(record.display_name, "Rig WS");
    assert!(record.source_address.is_some_and(|a| a.starts_with("127.0.0.1:")));

    // A bad message is answered but does not close the channel.
    ws.send(Message::Text(r#"{"type":"statusUpdate","metrics":{"throughput":-1}}"#.into()))
        .await
        .unwrap();
    let reply = next_json(&mut ws).await;
    assert_eq!(reply["type"], "error");

    ws.send(Message::Text(
        r#"{"type":"statusUpdate","metrics":{"throughput":42.5,"accepted":7}}"#.into(),
    ))
        .await
        .unwrap();
    coordinator
        .send_command(&worker_id, WorkerCommand::Stop)
        .await
        .unwrap();
    let command = next_json(&mut ws).await;
    assert_eq!(command["type"], "stop");

    let mut record = coordinator.get_worker(&worker_id).unwrap();
    for _ in 0..50 {
        if record.metrics.accepted == 7 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        record = coordinator.get_worker(&worker_id).unwrap();
    }
    assert_eq!(record.metrics.throughput, 42.5);
    assert_eq!(record.metrics.accepted, 7);

    ws.close(None).await.unwrap();
    for _ in 0..50 {
        if !coordinator.is_connected(&worker_id) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(!coordinator.is_connected(&worker_id));
    assert!(coordinator.get_worker(&worker_id).is_ok());
}
