//! End-to-end tests of the HTTP contract.

use std::sync::Arc;

use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::TestServer;
use serde_json::{json, Value};
use tempfile::TempDir;

use tidepool_control::{CommandKind, ControlPlane, ControlPlaneService, DeviceId};
use tidepool_gateway::{create_router, GatewayConfig, GatewayState, TokenAuthorizer};
use tidepool_store::{RocksStore, Store};

const TOKEN: &str = "tank-admin";

struct Harness {
    server: TestServer,
    control: Arc<ControlPlaneService<RocksStore>>,
    _dir: TempDir,
}

impl Harness {
    fn store(&self) -> &RocksStore {
        self.control.store()
    }

    fn pending(&self, kind: CommandKind) -> usize {
        self.store()
            .list_unprocessed_commands(&DeviceId::DEFAULT)
            .unwrap()
            .iter()
            .filter(|c| c.kind() == kind)
            .count()
    }
}

async fn harness(authorizer: TokenAuthorizer) -> Harness {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(RocksStore::open(dir.path()).unwrap());
    let control = Arc::new(ControlPlaneService::with_defaults(store));
    control.provision_device(&DeviceId::DEFAULT).await.unwrap();

    let state = GatewayState::new(
        Arc::clone(&control),
        Arc::new(authorizer),
        GatewayConfig::default(),
    );
    let server = TestServer::new(create_router(state)).unwrap();

    Harness {
        server,
        control,
        _dir: dir,
    }
}

async fn open() -> Harness {
    harness(TokenAuthorizer::open()).await
}

fn bearer(token: &str) -> (HeaderName, HeaderValue) {
    (
        HeaderName::from_static("authorization"),
        HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
    )
}

#[tokio::test]
async fn pump_then_poll() {
    let h = open().await;

    let response = h
        .server
        .post("/api/control/pump")
        .json(&json!({"state": true}))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "queued");
    assert_eq!(body["command"]["type"], "PUMP");
    assert_eq!(body["command"]["value"], true);

    let state = h.store().get_device_state(&DeviceId::DEFAULT).unwrap().unwrap();
    assert!(state.pump_active);
    assert_eq!(h.pending(CommandKind::Pump), 1);

    let poll: Value = h.server.get("/api/control/latest").await.json();
    assert_eq!(
        poll,
        json!({"has_command": true, "command": {"type": "PUMP", "value": true}})
    );
    assert_eq!(h.pending(CommandKind::Pump), 0);

    let poll: Value = h.server.get("/api/control/latest").await.json();
    assert_eq!(poll, json!({"has_command": false}));
}

#[tokio::test]
async fn brightness_validation() {
    let h = open().await;

    let response = h
        .server
        .post("/api/control/brightness")
        .json(&json!({"value": 150}))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "bad_request");

    let response = h
        .server
        .post("/api/control/brightness")
        .json(&json!({"value": 70}))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["command"]["type"], "LIGHT");
    assert_eq!(body["command"]["value"], 70);
}

#[tokio::test]
async fn malformed_bodies_use_error_format() {
    let h = open().await;

    let response = h.server.post("/api/control/pump").json(&json!({})).await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "bad_request");
    assert!(body["error"]["message"].as_str().unwrap().contains("state"));

    let response = h
        .server
        .post("/api/control/brightness")
        .json(&json!({"value": "bright"}))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

    let response = h
        .server
        .post("/api/sensors/upload")
        .json(&json!({"water_level": 80.0}))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "bad_request");

    let response = h
        .server
        .post("/api/sensors/upload")
        .text("temperature=25")
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

    assert!(h
        .store()
        .list_unprocessed_commands(&DeviceId::DEFAULT)
        .unwrap()
        .is_empty());
    assert!(h
        .store()
        .latest_sensor_reading(&DeviceId::DEFAULT)
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn feed_and_settings() {
    let h = open().await;

    let response = h.server.post("/api/control/feed").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "queued");
    assert!(body["next_feeding_at"].is_string());

    let poll: Value = h.server.get("/api/control/latest").await.json();
    assert_eq!(poll["command"], json!({"type": "FEED", "value": "NOW"}));

    let response = h
        .server
        .post("/api/control/feeding-settings")
        .json(&json!({"quantity": 2}))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body, json!({"success": true}));

    let response = h
        .server
        .post("/api/control/feeding-settings")
        .json(&json!({"interval": "6h"}))
        .await;
    let body: Value = response.json();
    assert_eq!(body["success"], true);
    assert!(body["next_feeding_at"].is_string());

    // Only the latest CONFIG survives
    assert_eq!(h.pending(CommandKind::Config), 1);
    let poll: Value = h.server.get("/api/control/latest").await.json();
    assert_eq!(
        poll["command"],
        json!({"type": "CONFIG", "value": {"interval": "6h"}})
    );
}

#[tokio::test]
async fn empty_settings_rejected() {
    let h = open().await;

    let response = h
        .server
        .post("/api/control/feeding-settings")
        .json(&json!({}))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("no settings provided"));
}

#[tokio::test]
async fn confirm_feed_reschedules() {
    let h = open().await;

    let response = h.server.post("/api/control/confirm-feed").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["success"], true);
    assert!(body["next_feeding_at"].is_string());

    let state = h.store().get_device_state(&DeviceId::DEFAULT).unwrap().unwrap();
    assert!(state.last_fed_at.is_some());
    assert!(h
        .store()
        .list_unprocessed_commands(&DeviceId::DEFAULT)
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn hot_upload_queues_one_pump_command() {
    let h = open().await;

    for _ in 0..2 {
        let response = h
            .server
            .post("/api/sensors/upload")
            .json(&json!({"temperature": 29.0, "water_level": 75.0}))
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body, json!({"success": true}));
    }

    assert_eq!(h.pending(CommandKind::Pump), 1);
    let state = h.store().get_device_state(&DeviceId::DEFAULT).unwrap().unwrap();
    assert!(state.pump_active);
}

#[tokio::test]
async fn dashboard_and_history() {
    let h = open().await;

    let response = h.server.get("/api/sensors/latest").await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);

    h.server
        .post("/api/sensors/upload")
        .json(&json!({"temperature": 25.5}))
        .await
        .assert_status_ok();
    h.server
        .post("/api/control/brightness")
        .json(&json!({"value": 30}))
        .await
        .assert_status_ok();

    let body: Value = h.server.get("/api/sensors/latest").await.json();
    assert_eq!(body["temperature"], 25.5);
    assert_eq!(body["water_level"], Value::Null);
    assert_eq!(body["brightness"], 30);
    assert_eq!(body["pump_status"], "OFF");
    assert_eq!(body["feeding"]["interval"], "4h");
    assert_eq!(body["feeding"]["quantity"], 1);
    assert_eq!(body["last_pump_toggle"], Value::Null);

    let body: Value = h
        .server
        .get("/api/sensors/history")
        .add_query_param("range", "7d")
        .await
        .json();
    let data = body["data"].as_array().unwrap();
    assert_eq!(data.len(), 1);
    assert_eq!(data[0]["temperature"], 25.5);
}

#[tokio::test]
async fn status_follows_polls() {
    let h = open().await;

    let body: Value = h.server.get("/api/system/status").await.json();
    assert_eq!(body, json!({"esp32_online": false, "last_seen": null}));

    h.server.get("/api/control/latest").await.assert_status_ok();

    let body: Value = h.server.get("/api/system/status").await.json();
    assert_eq!(body["esp32_online"], true);
    assert!(body["last_seen"].is_string());
}

#[tokio::test]
async fn operator_writes_require_token() {
    let h = harness(TokenAuthorizer::with_token(TOKEN)).await;

    let response = h
        .server
        .post("/api/control/pump")
        .json(&json!({"state": true}))
        .await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "unauthorized");

    let (name, value) = bearer("wrong");
    let response = h
        .server
        .post("/api/control/feed")
        .add_header(name, value)
        .await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
    assert!(h
        .store()
        .list_unprocessed_commands(&DeviceId::DEFAULT)
        .unwrap()
        .is_empty());

    let (name, value) = bearer(TOKEN);
    h.server
        .post("/api/control/pump")
        .add_header(name, value)
        .json(&json!({"state": true}))
        .await
        .assert_status_ok();
    assert_eq!(h.pending(CommandKind::Pump), 1);
}

#[tokio::test]
async fn device_endpoints_stay_open() {
    let h = harness(TokenAuthorizer::with_token(TOKEN)).await;

    h.server.get("/api/control/latest").await.assert_status_ok();
    h.server.post("/api/control/confirm-feed").await.assert_status_ok();
    h.server
        .post("/api/sensors/upload")
        .json(&json!({"temperature": 24.0}))
        .await
        .assert_status_ok();
    h.server.get("/api/system/status").await.assert_status_ok();
    h.server.get("/health").await.assert_status_ok();
}
