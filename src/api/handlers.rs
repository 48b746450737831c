use axum::{
    extract::{Path, Query, State},
    Json,
};
use tracing::info;
use utoipa::OpenApi;

use super::{
    dto::{
        AlertCountResponse, AlertsResponse, DevicesResponse, HistoryParams, PowerRequest,
        PowerResponse, RoomsResponse,
    },
    errors::AppError,
    AppState,
};
use crate::{
    models::{
        AlertType, DeviceAlert, DeviceReading, PowerReading, RoomState, RoomStatus, Severity,
    },
    tuya::DEFAULT_HISTORY_DAYS,
};

const MAX_HISTORY_DAYS: u32 = 30;

// ---------------------------------------------------------------------------
// Devices
// ---------------------------------------------------------------------------

/// Devices from the latest poll.
#[utoipa::path(
    get,
    path = "/devices",
    responses(
        (status = 200, description = "Devices from the latest snapshot", body = DevicesResponse),
    ),
    tag = "devices"
)]
pub async fn list_devices(State(state): State<AppState>) -> Json<DevicesResponse> {
    let (devices, polled_at) = state
        .cache
        .view(|s| (s.devices.clone(), Some(s.polled_at)))
        .await
        .unwrap_or_default();
    Json(DevicesResponse { devices, polled_at })
}

/// Live status of a single device, fetched from the provider.
#[utoipa::path(
    get,
    path = "/devices/{device_id}",
    params(
        ("device_id" = String, Path, description = "Tuya device ID"),
    ),
    responses(
        (status = 200, description = "Current device reading", body = DeviceReading),
        (status = 404, description = "Device could not be resolved"),
    ),
    tag = "devices"
)]
pub async fn get_device(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
) -> Result<Json<DeviceReading>, AppError> {
    state
        .tuya
        .get_device_status(&device_id)
        .await
        .map(Json)
        .ok_or_else(|| AppError::not_found(format!("device {device_id} could not be resolved")))
}

/// Power log of a device over the last `days` days (at most 100 entries).
#[utoipa::path(
    get,
    path = "/devices/{device_id}/history",
    params(
        ("device_id" = String, Path, description = "Tuya device ID"),
        HistoryParams,
    ),
    responses(
        (status = 200, description = "Power readings", body = Vec<PowerReading>),
        (status = 400, description = "`days` out of range"),
    ),
    tag = "devices"
)]
pub async fn get_device_history(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<Vec<PowerReading>>, AppError> {
    let days = params.days.unwrap_or(DEFAULT_HISTORY_DAYS);
    if !(1..=MAX_HISTORY_DAYS).contains(&days) {
        return Err(AppError::bad_request(format!(
            "days must be between 1 and {MAX_HISTORY_DAYS}, got {days}"
        )));
    }

    Ok(Json(state.tuya.get_power_history(&device_id, days).await))
}

/// Switch a plug on or off.
#[utoipa::path(
    post,
    path = "/devices/{device_id}/power",
    params(
        ("device_id" = String, Path, description = "Tuya device ID"),
    ),
    request_body = PowerRequest,
    responses(
        (status = 200, description = "Provider confirmed the command", body = PowerResponse),
        (status = 502, description = "Provider rejected or could not be reached"),
    ),
    tag = "devices"
)]
pub async fn set_device_power(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
    Json(body): Json<PowerRequest>,
) -> Result<Json<PowerResponse>, AppError> {
    state
        .tuya
        .try_control_device(&device_id, body.power_state)
        .await
        .map_err(AppError::bad_gateway)?;

    info!(device_id = %device_id, power_state = body.power_state, "Device switched via API");
    Ok(Json(PowerResponse { success: true }))
}

// ---------------------------------------------------------------------------
// Rooms & alerts
// ---------------------------------------------------------------------------

/// Room statuses from the latest poll.
#[utoipa::path(
    get,
    path = "/rooms",
    responses(
        (status = 200, description = "Room statuses", body = RoomsResponse),
    ),
    tag = "rooms"
)]
pub async fn list_rooms(State(state): State<AppState>) -> Json<RoomsResponse> {
    let (rooms, polled_at) = state
        .cache
        .view(|s| (s.rooms.clone(), Some(s.polled_at)))
        .await
        .unwrap_or_default();
    Json(RoomsResponse { rooms, polled_at })
}

/// Alerts from the latest poll.
#[utoipa::path(
    get,
    path = "/alerts",
    responses(
        (status = 200, description = "Active alerts", body = AlertsResponse),
    ),
    tag = "alerts"
)]
pub async fn list_alerts(State(state): State<AppState>) -> Json<AlertsResponse> {
    let (alerts, polled_at) = state
        .cache
        .view(|s| (s.alerts.clone(), Some(s.polled_at)))
        .await
        .unwrap_or_default();
    Json(AlertsResponse { alerts, polled_at })
}

#[utoipa::path(
    get,
    path = "/alerts/count",
    responses(
        (status = 200, description = "Number of active alerts", body = AlertCountResponse),
    ),
    tag = "alerts"
)]
pub async fn count_alerts(State(state): State<AppState>) -> Json<AlertCountResponse> {
    let (count, polled_at) = state
        .cache
        .view(|s| (s.alerts.len(), Some(s.polled_at)))
        .await
        .unwrap_or_default();
    Json(AlertCountResponse { count, polled_at })
}

// ---------------------------------------------------------------------------
// Health check
// ---------------------------------------------------------------------------

/// Returns `200 OK` with `{"status":"ok"}` when the server is running.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy"),
    ),
    tag = "system"
)]
pub async fn health() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({ "status": "ok" }))
}

// ---------------------------------------------------------------------------
// OpenAPI document
// ---------------------------------------------------------------------------

#[derive(OpenApi)]
#[openapi(
    paths(
        list_devices,
        get_device,
        get_device_history,
        set_device_power,
        list_rooms,
        list_alerts,
        count_alerts,
        health
    ),
    components(schemas(
        DevicesResponse,
        RoomsResponse,
        AlertsResponse,
        AlertCountResponse,
        PowerRequest,
        PowerResponse,
        DeviceReading,
        PowerReading,
        RoomStatus,
        RoomState,
        DeviceAlert,
        AlertType,
        Severity
    )),
    tags(
        (name = "devices", description = "Smart plug readings and control"),
        (name = "rooms",   description = "Per-room power usage"),
        (name = "alerts",  description = "Power and connectivity alerts"),
        (name = "system",  description = "System endpoints"),
    ),
    info(
        title = "Hostel Power Monitor API",
        version = "0.1.0",
        description = "REST API for hostel smart-plug telemetry"
    )
)]
pub struct ApiDoc;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
