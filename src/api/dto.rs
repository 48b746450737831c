use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::models::{DeviceAlert, DeviceReading, RoomStatus};

/// Response for `GET /devices`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DevicesResponse {
    pub devices: Vec<DeviceReading>,
    /// Time of the last successful poll. `null` means nothing has been
    /// polled yet and an empty list is "unknown", not "no devices".
    pub polled_at: Option<DateTime<Utc>>,
}

/// Response for `GET /rooms`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RoomsResponse {
    pub rooms: Vec<RoomStatus>,
    pub polled_at: Option<DateTime<Utc>>,
}

/// Response for `GET /alerts`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AlertsResponse {
    pub alerts: Vec<DeviceAlert>,
    pub polled_at: Option<DateTime<Utc>>,
}

/// Response for `GET /alerts/count`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AlertCountResponse {
    pub count: usize,
    pub polled_at: Option<DateTime<Utc>>,
}

/// Request body for `POST /devices/{device_id}/power`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PowerRequest {
    /// `true` switches the relay on.
    pub power_state: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PowerResponse {
    pub success: bool,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct HistoryParams {
    /// Look-back window in days, 1 to 30. Defaults to 7.
    pub days: Option<u32>,
}
