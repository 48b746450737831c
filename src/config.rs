use std::{path::PathBuf, str::FromStr, time::Duration};

use anyhow::{Context, Result};

use crate::models::PowerThresholds;

pub const DEFAULT_TUYA_BASE_URL: &str = "https://openapi.tuyaus.com";

/// Tuya tokens live two hours; a margin past one hour would refresh on
/// nearly every call.
pub const MAX_TOKEN_REFRESH_MARGIN_SECS: u64 = 3600;

// ---------------------------------------------------------------------------
// TuyaConfig
// ---------------------------------------------------------------------------

/// Everything the gateway needs to talk to the provider.
#[derive(Debug, Clone)]
pub struct TuyaConfig {
    pub base_url: String,
    pub client_id: String,
    pub client_secret: String,
    /// Sent as the `v` header.
    pub api_version: String,
    /// Upper bound for every provider request.
    pub request_timeout: Duration,
    /// Refresh the access token this long before it expires.
    pub token_refresh_margin: Duration,
    /// When set, raw provider responses are dumped below this directory.
    pub response_dump_dir: Option<PathBuf>,
}

impl TuyaConfig {
    /// Config with default timeouts and no response dumping.
    pub fn new(
        base_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            api_version: "1.0".to_owned(),
            request_timeout: Duration::from_secs(10),
            token_refresh_margin: Duration::from_secs(60),
            response_dump_dir: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub tuya: TuyaConfig,
    pub thresholds: PowerThresholds,
    pub server_host: String,
    pub server_port: u16,
    /// Device polling interval in seconds.
    pub poll_interval_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);
        let defaults = PowerThresholds::default();

        let tuya = TuyaConfig {
            base_url: env.optional("TUYA_BASE_URL", DEFAULT_TUYA_BASE_URL),
            client_id: env.required("TUYA_CLIENT_ID")?,
            client_secret: env.required("TUYA_CLIENT_SECRET")?,
            api_version: env.optional("TUYA_API_VERSION", "1.0"),
            request_timeout: Duration::from_secs(env.parsed("TUYA_REQUEST_TIMEOUT_SECS", 10)?),
            token_refresh_margin: Duration::from_secs(refresh_margin_secs(&env)?),
            response_dump_dir: env
                .get("TUYA_RESPONSE_DUMP_DIR")
                .filter(|s| !s.is_empty())
                .map(PathBuf::from),
        };

        let thresholds = PowerThresholds {
            warning_watts: env.parsed("WARNING_POWER_WATTS", defaults.warning_watts)?,
            alert_watts: env.parsed("ALERT_POWER_WATTS", defaults.alert_watts)?,
            critical_watts: env.parsed("CRITICAL_POWER_WATTS", defaults.critical_watts)?,
            capacity_watts: env.parsed("CAPACITY_WATTS", defaults.capacity_watts)?,
        };
        validate_thresholds(&thresholds)?;

        let poll_interval_secs = env.parsed("POLL_INTERVAL_SECS", 30)?;
        anyhow::ensure!(poll_interval_secs > 0, "POLL_INTERVAL_SECS must be greater than zero");

        Ok(Self {
            tuya,
            thresholds,
            server_host: env.optional("SERVER_HOST", "0.0.0.0"),
            server_port: env.parsed("SERVER_PORT", 8080)?,
            poll_interval_secs,
        })
    }
}

fn refresh_margin_secs<F>(env: &Env<F>) -> Result<u64>
where
    F: Fn(&str) -> Option<String>,
{
    let secs = env.parsed("TUYA_TOKEN_REFRESH_MARGIN_SECS", 60)?;
    anyhow::ensure!(
        secs <= MAX_TOKEN_REFRESH_MARGIN_SECS,
        "TUYA_TOKEN_REFRESH_MARGIN_SECS must be at most {MAX_TOKEN_REFRESH_MARGIN_SECS}, got {secs}"
    );
    Ok(secs)
}

/// Bands must be ordered and the capacity ceiling positive, otherwise
/// percentages and severities stop making sense.
fn validate_thresholds(t: &PowerThresholds) -> Result<()> {
    anyhow::ensure!(
        t.warning_watts <= t.alert_watts && t.alert_watts <= t.critical_watts,
        "power thresholds must satisfy WARNING <= ALERT <= CRITICAL, got {} / {} / {}",
        t.warning_watts,
        t.alert_watts,
        t.critical_watts
    );
    anyhow::ensure!(
        t.capacity_watts > 0.0,
        "CAPACITY_WATTS must be positive, got {}",
        t.capacity_watts
    );
    Ok(())
}

struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key)
    }

    fn required(&self, key: &str) -> Result<String> {
        self.get(key)
            .filter(|v| !v.is_empty())
            .with_context(|| format!("missing required env var: {key}"))
    }

    fn optional(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_owned())
    }

    fn parsed<T>(&self, key: &str, default: T) -> Result<T>
    where
        T: FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        match self.get(key) {
            None => Ok(default),
            Some(raw) => raw
                .trim()
                .parse()
                .with_context(|| format!("{key} has an invalid value: {raw:?}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(pairs: &[(&str, &str)]) -> Result<Config> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    const CREDS: [(&str, &str); 2] = [("TUYA_CLIENT_ID", "id"), ("TUYA_CLIENT_SECRET", "secret")];

    #[test]
    fn defaults_apply_when_only_credentials_set() {
        let c = config(&CREDS).unwrap();
        assert_eq!(c.tuya.base_url, DEFAULT_TUYA_BASE_URL);
        assert_eq!(c.tuya.client_id, "id");
        assert_eq!(c.tuya.client_secret, "secret");
        assert_eq!(c.tuya.api_version, "1.0");
        assert_eq!(c.tuya.request_timeout, Duration::from_secs(10));
        assert_eq!(c.tuya.token_refresh_margin, Duration::from_secs(60));
        assert!(c.tuya.response_dump_dir.is_none());
        assert_eq!(c.thresholds, PowerThresholds::default());
        assert_eq!(c.server_host, "0.0.0.0");
        assert_eq!(c.server_port, 8080);
        assert_eq!(c.poll_interval_secs, 30);
    }

    #[test]
    fn missing_secret_errors() {
        let err = config(&[("TUYA_CLIENT_ID", "id")]).unwrap_err();
        assert!(err.to_string().contains("TUYA_CLIENT_SECRET"));
    }

    #[test]
    fn empty_client_id_counts_as_missing() {
        let err = config(&[("TUYA_CLIENT_ID", ""), ("TUYA_CLIENT_SECRET", "s")]).unwrap_err();
        assert!(err.to_string().contains("TUYA_CLIENT_ID"));
    }

    #[test]
    fn overrides_are_parsed() {
        let mut pairs = CREDS.to_vec();
        pairs.extend([
            ("TUYA_BASE_URL", "https://openapi.tuyaeu.com"),
            ("TUYA_REQUEST_TIMEOUT_SECS", "3"),
            ("TUYA_TOKEN_REFRESH_MARGIN_SECS", "0"),
            ("TUYA_RESPONSE_DUMP_DIR", "responses"),
            ("CAPACITY_WATTS", "7500"),
            ("SERVER_PORT", "9090"),
            ("POLL_INTERVAL_SECS", "5"),
        ]);
        let c = config(&pairs).unwrap();
        assert_eq!(c.tuya.base_url, "https://openapi.tuyaeu.com");
        assert_eq!(c.tuya.request_timeout, Duration::from_secs(3));
        assert_eq!(c.tuya.token_refresh_margin, Duration::ZERO);
        assert_eq!(c.tuya.response_dump_dir, Some(PathBuf::from("responses")));
        assert_eq!(c.thresholds.capacity_watts, 7500.0);
        assert_eq!(c.server_port, 9090);
        assert_eq!(c.poll_interval_secs, 5);
    }

    #[test]
    fn malformed_number_errors_with_key() {
        let mut pairs = CREDS.to_vec();
        pairs.push(("SERVER_PORT", "eighty"));
        let err = config(&pairs).unwrap_err();
        assert!(err.to_string().contains("SERVER_PORT"));
    }

    #[test]
    fn unordered_thresholds_error() {
        let mut pairs = CREDS.to_vec();
        pairs.push(("WARNING_POWER_WATTS", "9000"));
        let err = config(&pairs).unwrap_err();
        assert!(err.to_string().contains("WARNING <= ALERT <= CRITICAL"));
    }

    #[test]
    fn oversized_refresh_margin_errors() {
        let mut pairs = CREDS.to_vec();
        pairs.push(("TUYA_TOKEN_REFRESH_MARGIN_SECS", "18446744073709551615"));
        let err = config(&pairs).unwrap_err();
        assert!(err.to_string().contains("TUYA_TOKEN_REFRESH_MARGIN_SECS"));
    }

    #[test]
    fn zero_poll_interval_errors() {
        let mut pairs = CREDS.to_vec();
        pairs.push(("POLL_INTERVAL_SECS", "0"));
        assert!(config(&pairs).is_err());
    }

    #[test]
    fn tuya_config_new_uses_defaults() {
        let c = TuyaConfig::new("http://localhost:1", "id", "secret");
        assert_eq!(c.request_timeout, Duration::from_secs(10));
        assert_eq!(c.api_version, "1.0");
        assert!(c.response_dump_dir.is_none());
    }
}
