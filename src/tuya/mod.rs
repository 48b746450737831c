pub mod error;
pub mod mapping;
pub mod models;
pub mod signing;
pub mod token;

use std::{path::PathBuf, sync::Arc};

use chrono::Utc;
use reqwest::{header::CONTENT_TYPE, Client, Method};
use serde::de::DeserializeOwned;
use tracing::{debug, error, info, warn};

use crate::{
    config::TuyaConfig,
    models::{DeviceReading, PowerReading},
    response_store,
};

use self::{
    error::{GatewayError, Result},
    models::{
        parse_envelope, Command, DeviceListResponse, DeviceLogsResponse, DeviceStatusResponse,
        SendCommandRequest, SendCommandResponse, TokenResponse, TuyaResponse,
    },
    signing::Signer,
    token::{TokenGrant, TokenManager},
};

const TOKEN_PATH: &str = "/v1.0/token?grant_type=1";

/// `type` filter of the logs endpoint selecting data-point reports.
const LOG_TYPE_DP_REPORT: u8 = 7;

/// Largest page the logs endpoint returns.
pub const HISTORY_PAGE_SIZE: u32 = 100;

pub const DEFAULT_HISTORY_DAYS: u32 = 7;

const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// Signed client for the smart-plug cloud API.
///
/// This is the only type that talks to the provider. Every public operation
/// issues at most one business request (plus a token request when the cache
/// is empty) and never retries; retry policy belongs to the caller.
#[derive(Debug, Clone)]
pub struct TuyaClient {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    http: Client,
    base_url: String,
    signer: Signer,
    token: TokenManager,
    response_dump_dir: Option<PathBuf>,
}

impl TuyaClient {
    pub fn new(config: &TuyaConfig) -> Result<Self> {
        let http = Client::builder().timeout(config.request_timeout).build()?;

        Ok(Self {
            inner: Arc::new(Inner {
                http,
                base_url: config.base_url.trim_end_matches('/').to_owned(),
                signer: Signer::new(
                    config.client_id.clone(),
                    config.client_secret.clone(),
                    config.api_version.clone(),
                ),
                token: TokenManager::new(config.token_refresh_margin),
                response_dump_dir: config.response_dump_dir.clone(),
            }),
        })
    }

    // -----------------------------------------------------------------------
    // Devices
    // -----------------------------------------------------------------------

    /// All devices visible to the app, or an empty list on any failure.
    ///
    /// An empty result means "unknown right now", not "no devices". Use
    /// [`TuyaClient::try_list_devices`] to tell the two apart.
    pub async fn list_devices(&self) -> Vec<DeviceReading> {
        match self.try_list_devices().await {
            Ok(devices) => devices,
            Err(e) => {
                error!(error = %e, "Failed to list devices");
                Vec::new()
            }
        }
    }

    pub async fn try_list_devices(&self) -> Result<Vec<DeviceReading>> {
        let resp: DeviceListResponse = self
            .call(Method::GET, "/v1.0/devices", None, "devices", "")
            .await?;
        let now = Utc::now();

        let devices: Vec<_> = resp
            .into_result()?
            .into_iter()
            .map(|device| mapping::device_reading(device, None, now))
            .collect();

        debug!(count = devices.len(), "Fetched device list");
        Ok(devices)
    }

    /// Current reading of one device, `None` if it cannot be resolved.
    pub async fn get_device_status(&self, device_id: &str) -> Option<DeviceReading> {
        match self.try_get_device_status(device_id).await {
            Ok(reading) => Some(reading),
            Err(e) => {
                error!(device_id = %device_id, error = %e, "Failed to fetch device status");
                None
            }
        }
    }

    pub async fn try_get_device_status(&self, device_id: &str) -> Result<DeviceReading> {
        let path = format!("/v1.0/devices/{device_id}/status");
        let resp: DeviceStatusResponse = self
            .call(Method::GET, &path, None, "device_status", device_id)
            .await?;

        let device = resp.into_result()?.into_device();
        Ok(mapping::device_reading(device, Some(device_id), Utc::now()))
    }

    // -----------------------------------------------------------------------
    // Control
    // -----------------------------------------------------------------------

    /// Switch the plug relay. `true` only when the provider confirms.
    pub async fn control_device(&self, device_id: &str, power_state: bool) -> bool {
        match self.try_control_device(device_id, power_state).await {
            Ok(()) => {
                info!(device_id = %device_id, power_state, "Device switched");
                true
            }
            Err(e) => {
                error!(device_id = %device_id, power_state, error = %e, "Failed to switch device");
                false
            }
        }
    }

    pub async fn try_control_device(&self, device_id: &str, power_state: bool) -> Result<()> {
        let path = format!("/v1.0/devices/{device_id}/commands");
        let body = SendCommandRequest {
            commands: vec![Command {
                code: mapping::SWITCH_CODE.to_owned(),
                value: power_state.into(),
            }],
        };
        let body = serde_json::to_vec(&body).map_err(|e| GatewayError::Mapping(e.to_string()))?;

        let resp: SendCommandResponse = self
            .call(Method::POST, &path, Some(body), "send_commands", device_id)
            .await?;
        resp.into_success()
    }

    // -----------------------------------------------------------------------
    // History
    // -----------------------------------------------------------------------

    /// Up to [`HISTORY_PAGE_SIZE`] power log entries from the last `days`
    /// days, or an empty list on any failure.
    pub async fn get_power_history(&self, device_id: &str, days: u32) -> Vec<PowerReading> {
        match self.try_get_power_history(device_id, days).await {
            Ok(history) => history,
            Err(e) => {
                error!(device_id = %device_id, days, error = %e, "Failed to fetch power history");
                Vec::new()
            }
        }
    }

    pub async fn try_get_power_history(
        &self,
        device_id: &str,
        days: u32,
    ) -> Result<Vec<PowerReading>> {
        let end_time = Utc::now().timestamp_millis();
        let start_time = end_time - i64::from(days) * MILLIS_PER_DAY;
        let path = format!(
            "/v1.0/devices/{device_id}/logs?start_time={start_time}&end_time={end_time}\
             &type={LOG_TYPE_DP_REPORT}&size={HISTORY_PAGE_SIZE}"
        );

        let resp: DeviceLogsResponse = self
            .call(Method::GET, &path, None, "logs", device_id)
            .await?;

        Ok(resp
            .into_result()?
            .into_entries()
            .iter()
            .map(|entry| mapping::power_reading(device_id, entry))
            .collect())
    }

    // -----------------------------------------------------------------------
    // Transport
    // -----------------------------------------------------------------------

    async fn access_token(&self) -> Result<String> {
        self.inner
            .token
            .access_token(Utc::now(), || self.fetch_token())
            .await
    }

    async fn fetch_token(&self) -> Result<TokenGrant> {
        let bytes = self
            .send(Method::GET, TOKEN_PATH, None, None, "token", "")
            .await?;
        let resp: TokenResponse = parse_envelope(&bytes)?;
        Ok(resp.into_result()?.into())
    }

    /// Authenticated business call. A `success=false` envelope becomes
    /// `GatewayError::Provider`; a "token invalid" answer also drops the
    /// cached token so the next call starts with a fresh one. Successful
    /// envelopes are returned as-is for the caller to unpack.
    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
        endpoint: &str,
        suffix: &str,
    ) -> Result<TuyaResponse<T>> {
        let token = self.access_token().await?;
        let bytes = self
            .send(method, path, body, Some(&token), endpoint, suffix)
            .await?;
        let resp: TuyaResponse<T> = parse_envelope(&bytes)?;
        if resp.success {
            return Ok(resp);
        }

        let err = resp.into_provider_error();
        if err.is_token_invalid() {
            warn!(path = %path, "Provider rejected access token");
            self.inner.token.invalidate().await;
        }
        Err(err)
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
        access_token: Option<&str>,
        endpoint: &str,
        suffix: &str,
    ) -> Result<Vec<u8>> {
        let url = format!("{}{}", self.inner.base_url, path);
        let t = Utc::now().timestamp_millis();
        let body = body.unwrap_or_default();
        let headers = self
            .inner
            .signer
            .headers(method.as_str(), path, &body, t, access_token);
        debug!(method = %method, url = %url, "Sending Tuya request");

        let mut request = self
            .inner
            .http
            .request(method, &url)
            .header(CONTENT_TYPE, "application/json");
        for (name, value) in headers.iter() {
            request = request.header(name, value);
        }
        if !body.is_empty() {
            request = request.body(body);
        }

        let bytes = request
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?
            .to_vec();

        if let Some(dir) = &self.inner.response_dump_dir {
            response_store::save(dir, endpoint, suffix, &bytes).await;
        }

        Ok(bytes)
    }
}
