use serde::{Deserialize, Serialize};

use super::{
    error::{GatewayError, Result},
    token::TokenGrant,
};

// ---------------------------------------------------------------------------
// Generic response envelope
//
// Every Tuya Cloud API wraps its payload in the same outer object:
//
// Success:
//   { "success": true, "t": 1545447665981, "result": <T>, "tid": "..." }
//
// Failure:
//   { "success": false, "t": 1561348644346, "code": 1010, "msg": "token invalid" }
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct TuyaResponse<T> {
    pub success: bool,

    /// 13-digit Unix timestamp in milliseconds returned by the server.
    #[serde(default)]
    pub t: Option<i64>,

    /// Server-side request trace ID.
    #[serde(default)]
    pub tid: Option<String>,

    /// Present on success. No `serde(default)`: a missing `Option` is already
    /// `None`, and the attribute would demand `T: Default`.
    pub result: Option<T>,

    /// Present on failure.
    #[serde(default)]
    pub code: Option<i64>,

    /// Present on failure.
    #[serde(default)]
    pub msg: Option<String>,
}

impl<T> TuyaResponse<T> {
    /// Map API-level failures to `GatewayError::Provider` and require a result.
    pub fn into_result(self) -> Result<T> {
        if self.success {
            self.result.ok_or_else(|| {
                GatewayError::Mapping("success=true but result field is missing".into())
            })
        } else {
            Err(self.into_provider_error())
        }
    }

    /// Like `into_result` for endpoints where only `success` matters.
    pub fn into_success(self) -> Result<()> {
        if self.success {
            Ok(())
        } else {
            Err(self.into_provider_error())
        }
    }

    pub(crate) fn into_provider_error(self) -> GatewayError {
        GatewayError::Provider {
            code: self.code.unwrap_or(-1),
            msg: self.msg.unwrap_or_else(|| "(no message)".to_owned()),
        }
    }
}

/// Parse a raw body into an envelope; an unreadable envelope is a mapping error.
pub fn parse_envelope<T>(bytes: &[u8]) -> Result<TuyaResponse<T>>
where
    T: for<'de> Deserialize<'de>,
{
    serde_json::from_slice(bytes).map_err(|e| GatewayError::Mapping(e.to_string()))
}

// ---------------------------------------------------------------------------
// DpValue
//
// Data-point values are polymorphic. Bool MUST come before Integer, and
// Integer before Float, so that `true` and `220` keep their natural types.
// `Other` swallows anything else (objects, arrays) so that a single odd DP
// never fails the whole payload.
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum DpValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    Other(serde_json::Value),
}

impl DpValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            DpValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Numeric view; numeric strings (as sent by the logs endpoint) are parsed.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            DpValue::Integer(v) => Some(*v as f64),
            DpValue::Float(v) => Some(*v),
            DpValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

impl From<bool> for DpValue {
    fn from(v: bool) -> Self {
        DpValue::Bool(v)
    }
}

// ---------------------------------------------------------------------------
// Token: GET /v1.0/token?grant_type=1
// ---------------------------------------------------------------------------

pub type TokenResponse = TuyaResponse<TokenResult>;

#[derive(Debug, Deserialize)]
pub struct TokenResult {
    pub access_token: String,

    /// Validity period in **seconds** (typically 7200).
    pub expire_time: i64,

    #[serde(default)]
    pub refresh_token: Option<String>,

    #[serde(default)]
    pub uid: Option<String>,
}

impl From<TokenResult> for TokenGrant {
    fn from(r: TokenResult) -> Self {
        Self {
            access_token: r.access_token,
            expire_time: r.expire_time,
        }
    }
}

// ---------------------------------------------------------------------------
// Devices: GET /v1.0/devices, GET /v1.0/devices/{id}/status
// ---------------------------------------------------------------------------

/// A single data point, e.g. `{"code": "cur_power", "value": 1234}`.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceProperty {
    #[serde(default)]
    pub code: String,

    #[serde(default)]
    pub value: Option<DpValue>,
}

/// A device object as returned by the device list.
///
/// Every field is optional on the wire; defaults are applied when mapping.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeviceDto {
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub online: Option<bool>,

    #[serde(default)]
    pub status: Option<Vec<DeviceProperty>>,
}

pub type DeviceListResponse = TuyaResponse<Vec<DeviceDto>>;

/// The status endpoint answers either with a device object or with a bare
/// list of data points, depending on the API generation.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum StatusPayload {
    Properties(Vec<DeviceProperty>),
    Device(DeviceDto),
}

impl StatusPayload {
    pub fn into_device(self) -> DeviceDto {
        match self {
            StatusPayload::Device(device) => device,
            StatusPayload::Properties(props) => DeviceDto {
                status: Some(props),
                ..DeviceDto::default()
            },
        }
    }
}

pub type DeviceStatusResponse = TuyaResponse<StatusPayload>;

// ---------------------------------------------------------------------------
// Send commands: POST /v1.0/devices/{device_id}/commands
// ---------------------------------------------------------------------------

pub type SendCommandResponse = TuyaResponse<serde_json::Value>;

#[derive(Debug, Serialize)]
pub struct SendCommandRequest {
    pub commands: Vec<Command>,
}

#[derive(Debug, Serialize)]
pub struct Command {
    /// DP code to target, e.g. `"switch_1"`.
    pub code: String,
    pub value: DpValue,
}

// ---------------------------------------------------------------------------
// Logs: GET /v1.0/devices/{device_id}/logs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct LogEntry {
    /// Unix timestamp in milliseconds.
    #[serde(default)]
    pub event_time: Option<i64>,

    #[serde(default)]
    pub code: Option<String>,

    #[serde(default)]
    pub value: Option<DpValue>,
}

/// Logs arrive either as a plain array or wrapped in `{"logs": [...]}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum LogsPayload {
    Entries(Vec<LogEntry>),
    Paged { logs: Vec<LogEntry> },
}

impl LogsPayload {
    pub fn into_entries(self) -> Vec<LogEntry> {
        match self {
            LogsPayload::Entries(entries) | LogsPayload::Paged { logs: entries } => entries,
        }
    }
}

pub type DeviceLogsResponse = TuyaResponse<LogsPayload>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
