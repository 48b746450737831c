//! Gateway behaviour against an in-process fake of the provider API.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, Method, StatusCode, Uri},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use hostel_power_service::{
    config::TuyaConfig,
    models::PowerThresholds,
    monitor::MonitorService,
    snapshot_cache::{Snapshot, SnapshotCache},
    tuya::{error::GatewayError, signing::Signer, TuyaClient, HISTORY_PAGE_SIZE},
};

const CLIENT_ID: &str = "test-client";
const CLIENT_SECRET: &str = "test-secret";
const ACCESS_TOKEN: &str = "tok-1";

// ---------------------------------------------------------------------------
// Fake provider
// ---------------------------------------------------------------------------

struct Fake {
    signer: Signer,
    token_calls: AtomicUsize,
    devices_calls: AtomicUsize,
    bad_signatures: AtomicUsize,
    token_response: Mutex<Value>,
    devices_response: Mutex<Value>,
    devices_status: Mutex<StatusCode>,
    devices_delay: Mutex<Duration>,
    status_response: Mutex<Value>,
    command_response: Mutex<Value>,
    logs_response: Mutex<Value>,
    last_command: Mutex<Option<Value>>,
    last_logs_query: Mutex<Option<HashMap<String, String>>>,
    last_access_token: Mutex<Option<String>>,
}

impl Fake {
    fn new() -> Self {
        Self {
            signer: Signer::new(CLIENT_ID, CLIENT_SECRET, "1.0"),
            token_calls: AtomicUsize::new(0),
            devices_calls: AtomicUsize::new(0),
            bad_signatures: AtomicUsize::new(0),
            token_response: Mutex::new(json!({
                "success": true,
                "t": 1_700_000_000_000_i64,
                "result": { "access_token": ACCESS_TOKEN, "expire_time": 7200, "uid": "u1" }
            })),
            devices_response: Mutex::new(json!({
                "success": true,
                "result": [
                    {
                        "id": "plug-203",
                        "name": "Room 203 Plug",
                        "online": true,
                        "status": [
                            { "code": "switch_1", "value": true },
                            { "code": "cur_power", "value": 9000 },
                            { "code": "cur_voltage", "value": 2301 },
                            { "code": "cur_current", "value": 390 },
                            { "code": "add_ele", "value": 12 },
                            { "code": "countdown_1", "value": 0 }
                        ]
                    },
                    {
                        "id": "plug-104",
                        "name": "Plug-104",
                        "online": false,
                        "status": [{ "code": "cur_power", "value": 1000 }]
                    }
                ]
            })),
            devices_status: Mutex::new(StatusCode::OK),
            devices_delay: Mutex::new(Duration::ZERO),
            status_response: Mutex::new(json!({
                "success": true,
                "result": [
                    { "code": "switch_1", "value": false },
                    { "code": "cur_power", "value": 42 }
                ]
            })),
            command_response: Mutex::new(json!({ "success": true, "result": true })),
            logs_response: Mutex::new(json!({
                "success": true,
                "result": {
                    "logs": [
                        { "event_time": 1_700_000_000_000_i64, "code": "cur_power", "value": "1500" },
                        { "event_time": 1_700_000_060_000_i64, "code": "cur_power", "value": 1600 }
                    ]
                }
            })),
            last_command: Mutex::new(None),
            last_logs_query: Mutex::new(None),
            last_access_token: Mutex::new(None),
        }
    }

    fn set(slot: &Mutex<Value>, value: Value) {
        *slot.lock().unwrap() = value;
    }

    /// Recompute the signature the way the client must have and count
    /// mismatches.
    fn check(&self, method: &Method, uri: &Uri, headers: &HeaderMap, body: &[u8]) {
        let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
        let t: i64 = header("t").and_then(|t| t.parse().ok()).unwrap_or_default();
        let path = uri.path_and_query().map(|p| p.as_str()).unwrap_or_default();
        let expected = self.signer.sign(method.as_str(), path, body, t);

        let valid = header("client_id") == Some(CLIENT_ID)
            && header("sign_method") == Some("HMAC-SHA256")
            && header("sign") == Some(expected.as_str());
        if !valid {
            self.bad_signatures.fetch_add(1, Ordering::SeqCst);
        }
        *self.last_access_token.lock().unwrap() = header("access_token").map(str::to_owned);
    }
}

type Shared = Arc<Fake>;

async fn token(State(fake): State<Shared>, method: Method, uri: Uri, headers: HeaderMap) -> Json<Value> {
    fake.check(&method, &uri, &headers, b"");
    fake.token_calls.fetch_add(1, Ordering::SeqCst);
    Json(fake.token_response.lock().unwrap().clone())
}

async fn devices(
    State(fake): State<Shared>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> impl IntoResponse {
    fake.check(&method, &uri, &headers, b"");
    fake.devices_calls.fetch_add(1, Ordering::SeqCst);
    let delay = *fake.devices_delay.lock().unwrap();
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
    let status = *fake.devices_status.lock().unwrap();
    (status, Json(fake.devices_response.lock().unwrap().clone()))
}

async fn status(State(fake): State<Shared>, method: Method, uri: Uri, headers: HeaderMap) -> Json<Value> {
    fake.check(&method, &uri, &headers, b"");
    Json(fake.status_response.lock().unwrap().clone())
}

async fn commands(
    State(fake): State<Shared>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Json<Value> {
    fake.check(&method, &uri, &headers, &body);
    *fake.last_command.lock().unwrap() = serde_json::from_slice(&body).ok();
    Json(fake.command_response.lock().unwrap().clone())
}

async fn logs(
    State(fake): State<Shared>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Json<Value> {
    fake.check(&method, &uri, &headers, b"");
    *fake.last_logs_query.lock().unwrap() = Some(query);
    Json(fake.logs_response.lock().unwrap().clone())
}

/// Start the fake on an ephemeral port and return it with a client wired to it.
async fn start() -> (Shared, TuyaClient) {
    start_with_timeout(Duration::from_secs(5)).await
}

async fn start_with_timeout(request_timeout: Duration) -> (Shared, TuyaClient) {
    let fake = Arc::new(Fake::new());
    let app = Router::new()
        .route("/v1.0/token", get(token))
        .route("/v1.0/devices", get(devices))
        .route("/v1.0/devices/{device_id}/status", get(status))
        .route("/v1.0/devices/{device_id}/commands", post(commands))
        .route("/v1.0/devices/{device_id}/logs", get(logs))
        .with_state(fake.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let mut config = TuyaConfig::new(format!("http://{addr}/"), CLIENT_ID, CLIENT_SECRET);
    config.request_timeout = request_timeout;
    (fake, TuyaClient::new(&config).unwrap())
}

// ---------------------------------------------------------------------------
// Device list
// ---------------------------------------------------------------------------

#[tokio::test]
async fn list_devices_maps_provider_payload() {
    let (fake, client) = start().await;

    let devices = client.list_devices().await;

    assert_eq!(devices.len(), 2);
    let d = &devices[0];
    assert_eq!(d.id, "plug-203");
    assert_eq!(d.room_number, "Room 203");
    assert!(d.online);
    assert!(d.power_state);
    assert_eq!(d.current_power, 9000.0);
    assert_eq!(d.voltage, 2301.0);
    assert_eq!(d.current, 390.0);
    assert_eq!(d.total_energy, 12.0);

    let d = &devices[1];
    assert_eq!(d.room_number, "Room 104");
    assert!(!d.online);
    assert!(!d.power_state);
    assert_eq!(d.voltage, 0.0);

    assert_eq!(fake.bad_signatures.load(Ordering::SeqCst), 0);
    assert_eq!(fake.last_access_token.lock().unwrap().as_deref(), Some(ACCESS_TOKEN));
}

#[tokio::test]
async fn repeated_listing_is_idempotent_and_reuses_token() {
    let (fake, client) = start().await;

    let first = client.list_devices().await;
    let second = client.list_devices().await;

    assert_eq!(first.len(), second.len());
    assert!(first.iter().zip(&second).all(|(a, b)| a.same_telemetry(b)));
    assert_eq!(fake.token_calls.load(Ordering::SeqCst), 1);
    assert_eq!(fake.devices_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn concurrent_calls_share_one_token_fetch() {
    let (fake, client) = start().await;

    let (a, b, c) = tokio::join!(
        client.list_devices(),
        client.get_device_status("plug-203"),
        client.get_power_history("plug-203", 1),
    );

    assert_eq!(a.len(), 2);
    assert!(b.is_some());
    assert_eq!(c.len(), 2);
    assert_eq!(fake.token_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn http_error_degrades_to_empty_list() {
    let (fake, client) = start().await;
    *fake.devices_status.lock().unwrap() = StatusCode::INTERNAL_SERVER_ERROR;

    assert!(client.list_devices().await.is_empty());
    assert!(matches!(
        client.try_list_devices().await,
        Err(GatewayError::Transport(_))
    ));
}

#[tokio::test]
async fn slow_provider_times_out_as_transport_error() {
    let (fake, client) = start_with_timeout(Duration::from_millis(100)).await;
    *fake.devices_delay.lock().unwrap() = Duration::from_millis(500);

    assert!(client.list_devices().await.is_empty());
    match client.try_list_devices().await {
        Err(GatewayError::Transport(e)) => assert!(e.is_timeout()),
        other => panic!("expected transport timeout, got {other:?}"),
    }
}

#[tokio::test]
async fn provider_failure_is_reported_by_try_variant() {
    let (fake, client) = start().await;
    Fake::set(
        &fake.devices_response,
        json!({ "success": false, "code": 1106, "msg": "permission deny" }),
    );

    assert!(client.list_devices().await.is_empty());
    match client.try_list_devices().await {
        Err(GatewayError::Provider { code, msg }) => {
            assert_eq!(code, 1106);
            assert_eq!(msg, "permission deny");
        }
        other => panic!("expected provider error, got {other:?}"),
    }
}

#[tokio::test]
async fn success_without_result_is_mapping_error() {
    let (fake, client) = start().await;
    Fake::set(&fake.devices_response, json!({ "success": true }));

    assert!(matches!(
        client.try_list_devices().await,
        Err(GatewayError::Mapping(_))
    ));
}

// ---------------------------------------------------------------------------
// Token lifecycle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn token_failure_surfaces_as_authentication_error() {
    let (fake, client) = start().await;
    Fake::set(
        &fake.token_response,
        json!({ "success": false, "code": 1004, "msg": "sign invalid" }),
    );

    assert!(matches!(
        client.try_list_devices().await,
        Err(GatewayError::Authentication(_))
    ));
    assert!(client.list_devices().await.is_empty());
    assert_eq!(fake.devices_calls.load(Ordering::SeqCst), 0);
    // Failures are not cached: each call retries the token endpoint.
    assert_eq!(fake.token_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn token_invalid_code_forces_refresh_on_next_call() {
    let (fake, client) = start().await;
    let ok = fake.devices_response.lock().unwrap().clone();
    Fake::set(
        &fake.devices_response,
        json!({ "success": false, "code": 1010, "msg": "token invalid" }),
    );

    let err = client.try_list_devices().await.unwrap_err();
    assert!(err.is_token_invalid());
    assert_eq!(fake.token_calls.load(Ordering::SeqCst), 1);

    Fake::set(&fake.devices_response, ok);
    assert_eq!(client.list_devices().await.len(), 2);
    assert_eq!(fake.token_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn short_lived_token_is_refreshed_within_margin() {
    let (fake, client) = start().await;
    // Shorter than the default 60 s refresh margin, so never reusable.
    Fake::set(
        &fake.token_response,
        json!({ "success": true, "result": { "access_token": ACCESS_TOKEN, "expire_time": 30 } }),
    );

    client.list_devices().await;
    client.list_devices().await;

    assert_eq!(fake.token_calls.load(Ordering::SeqCst), 2);
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

#[tokio::test]
async fn status_from_bare_property_list_uses_requested_id() {
    let (_fake, client) = start().await;

    let reading = client.get_device_status("plug-999").await.unwrap();

    assert_eq!(reading.id, "plug-999");
    assert_eq!(reading.name, "Device plug-999");
    // The placeholder name carries no room, whatever digits the id holds.
    assert_eq!(reading.room_number, "Unknown Room");
    assert!(!reading.power_state);
    assert_eq!(reading.current_power, 42.0);
}

#[tokio::test]
async fn status_from_device_object() {
    let (fake, client) = start().await;
    Fake::set(
        &fake.status_response,
        json!({
            "success": true,
            "result": {
                "id": "echoed-id",
                "name": "room 12 heater",
                "online": true,
                "status": [{ "code": "cur_power", "value": 5500 }]
            }
        }),
    );

    let reading = client.get_device_status("plug-7").await.unwrap();
    assert_eq!(reading.id, "plug-7");
    assert_eq!(reading.room_number, "Room 12");
    assert!(reading.online);
    assert_eq!(reading.current_power, 5500.0);
}

#[tokio::test]
async fn status_failure_is_none() {
    let (fake, client) = start().await;
    Fake::set(
        &fake.status_response,
        json!({ "success": false, "code": 2001, "msg": "device is offline" }),
    );

    assert!(client.get_device_status("plug-203").await.is_none());
}

// ---------------------------------------------------------------------------
// Control
// ---------------------------------------------------------------------------

#[tokio::test]
async fn control_sends_signed_switch_command() {
    let (fake, client) = start().await;

    assert!(client.control_device("plug-203", false).await);

    assert_eq!(
        fake.last_command.lock().unwrap().clone(),
        Some(json!({ "commands": [{ "code": "switch_1", "value": false }] }))
    );
    assert_eq!(fake.bad_signatures.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn control_reports_false_when_provider_refuses() {
    let (fake, client) = start().await;
    Fake::set(
        &fake.command_response,
        json!({ "success": false, "code": 2008, "msg": "command or value not support" }),
    );

    assert!(!client.control_device("plug-203", true).await);
}

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

#[tokio::test]
async fn history_requests_window_and_maps_entries() {
    let (fake, client) = start().await;

    let history = client.get_power_history("plug-203", 7).await;

    assert_eq!(history.len(), 2);
    assert_eq!(history[0].device_id, "plug-203");
    assert_eq!(history[0].power, 1500.0);
    assert_eq!(history[0].timestamp.timestamp_millis(), 1_700_000_000_000);
    assert_eq!(history[1].power, 1600.0);
    assert!(history.iter().all(|h| h.voltage.is_none() && h.energy.is_none()));

    let query = fake.last_logs_query.lock().unwrap().clone().unwrap();
    assert_eq!(query["type"], "7");
    assert_eq!(query["size"], HISTORY_PAGE_SIZE.to_string());
    let start: i64 = query["start_time"].parse().unwrap();
    let end: i64 = query["end_time"].parse().unwrap();
    assert_eq!(end - start, 7 * 24 * 60 * 60 * 1000);
    assert_eq!(fake.bad_signatures.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn history_accepts_plain_array_payload() {
    let (fake, client) = start().await;
    Fake::set(
        &fake.logs_response,
        json!({ "success": true, "result": [{ "event_time": 1_000, "value": 10 }] }),
    );

    let history = client.get_power_history("plug-203", 1).await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].power, 10.0);
}

#[tokio::test]
async fn history_failure_is_empty() {
    let (fake, client) = start().await;
    Fake::set(&fake.logs_response, json!({ "success": false, "code": 1106 }));

    assert!(client.get_power_history("plug-203", 7).await.is_empty());
}

// ---------------------------------------------------------------------------
// Monitor
// ---------------------------------------------------------------------------

#[tokio::test]
async fn poll_publishes_rooms_and_alerts() {
    let (_fake, client) = start().await;
    let cache = SnapshotCache::new();
    let monitor = MonitorService::new(client, cache.clone(), PowerThresholds::default());

    let snapshot = monitor.poll_once().await.unwrap();

    assert_eq!(cache.view(Snapshot::clone).await, Some(snapshot));
    let rooms = cache.view(|s| s.rooms.clone()).await.unwrap();
    assert_eq!(rooms.len(), 2);
    assert_eq!(rooms[0].number, "Room 203");
    assert_eq!(rooms[0].percentage, 100);
    // 9 kW online: high_power + unauthorized_device; 1 kW offline: offline.
    assert_eq!(cache.view(|s| s.alerts.len()).await, Some(3));
    assert_eq!(monitor.active_alert_count().await, 3);
    assert_eq!(monitor.hostel_room_data().await.len(), 2);
}

#[tokio::test]
async fn failed_poll_after_success_keeps_snapshot() {
    let (fake, client) = start().await;
    let cache = SnapshotCache::new();
    let monitor = MonitorService::new(client, cache.clone(), PowerThresholds::default());

    let first = monitor.poll_once().await.unwrap();
    *fake.devices_status.lock().unwrap() = StatusCode::BAD_GATEWAY;

    assert!(monitor.poll_once().await.is_err());
    assert_eq!(cache.view(Snapshot::clone).await, Some(first));
}

#[tokio::test]
async fn control_room_power_switches_the_room_plug() {
    let (fake, client) = start().await;
    let monitor = MonitorService::new(client, SnapshotCache::new(), PowerThresholds::default());

    assert!(monitor.control_room_power("plug-104", true).await);
    assert_eq!(
        fake.last_command.lock().unwrap().clone(),
        Some(json!({ "commands": [{ "code": "switch_1", "value": true }] }))
    );
}
