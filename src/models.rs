use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One poll snapshot of a single smart plug.
///
/// Values are taken as the provider reports them; negative values are
/// clamped to zero during mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DeviceReading {
    pub id: String,
    pub name: String,
    /// Room label derived from the device name, e.g. `"Room 203"`.
    pub room_number: String,
    pub online: bool,
    /// Relay on/off (`switch_1`).
    pub power_state: bool,
    /// Instantaneous power in watts (`cur_power`).
    pub current_power: f64,
    /// Volts (`cur_voltage`).
    pub voltage: f64,
    /// Amperes (`cur_current`).
    pub current: f64,
    /// Cumulative energy in kWh (`add_ele`).
    pub total_energy: f64,
    pub last_update: DateTime<Utc>,
}

impl DeviceReading {
    /// Equality that ignores `last_update`, which differs between otherwise
    /// identical polls.
    pub fn same_telemetry(&self, other: &Self) -> bool {
        Self {
            last_update: other.last_update,
            ..self.clone()
        } == *other
    }
}

/// A single entry of a device's power log.
///
/// The log endpoint only reports power. `voltage`, `current` and `energy` are
/// therefore always `None` for entries built from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PowerReading {
    pub device_id: String,
    pub timestamp: DateTime<Utc>,
    pub power: f64,
    pub voltage: Option<f64>,
    pub current: Option<f64>,
    pub energy: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RoomState {
    Normal,
    Warning,
    Alert,
}

impl fmt::Display for RoomState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RoomState::Normal => "normal",
            RoomState::Warning => "warning",
            RoomState::Alert => "alert",
        };
        f.write_str(s)
    }
}

/// Room-level usage derived from one `DeviceReading`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RoomStatus {
    /// Id of the backing device.
    pub id: String,
    pub number: String,
    pub status: RoomState,
    /// kW, rounded to one decimal.
    pub current_usage: f64,
    /// Share of the capacity ceiling, 0..=100.
    pub percentage: u8,
    /// Placeholder label for very high draw; not an identified appliance.
    pub detected_device: Option<String>,
    pub warning_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    HighPower,
    Offline,
    UnauthorizedDevice,
}

impl fmt::Display for AlertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AlertType::HighPower => "high_power",
            AlertType::Offline => "offline",
            AlertType::UnauthorizedDevice => "unauthorized_device",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DeviceAlert {
    pub device_id: String,
    pub room_number: String,
    #[serde(rename = "type")]
    pub alert_type: AlertType,
    pub message: String,
    /// Time of detection, not of the underlying reading.
    pub timestamp: DateTime<Utc>,
    pub severity: Severity,
}

/// Power bands shared by the room normaliser and the alert detector.
///
/// Defaults are the values the hostel dashboard has always used.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PowerThresholds {
    /// Above this a room is in the warning band.
    pub warning_watts: f64,
    /// Above this a room is in the alert band and a high-power alert fires.
    pub alert_watts: f64,
    /// Above this high-power alerts escalate and an unauthorized-device alert fires.
    pub critical_watts: f64,
    /// Draw that counts as 100 % of a room's capacity.
    pub capacity_watts: f64,
}

impl Default for PowerThresholds {
    fn default() -> Self {
        Self {
            warning_watts: 3000.0,
            alert_watts: 5000.0,
            critical_watts: 8000.0,
            capacity_watts: 6000.0,
        }
    }
}
