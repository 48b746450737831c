use std::future::Future;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::error::{GatewayError, Result};

/// What the token endpoint hands back.
#[derive(Debug, Clone)]
pub struct TokenGrant {
    pub access_token: String,
    /// Validity period in seconds.
    pub expire_time: i64,
}

#[derive(Debug, Clone)]
struct AccessToken {
    value: String,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
enum TokenState {
    #[default]
    Empty,
    Valid(AccessToken),
}

/// Owns the bearer token used for every business call.
///
/// The state lock is held for the whole refresh, so callers racing on an
/// empty or expired token wait for the one in-flight fetch instead of
/// issuing their own.
#[derive(Debug)]
pub struct TokenManager {
    state: Mutex<TokenState>,
    refresh_margin: TimeDelta,
}

impl TokenManager {
    /// `refresh_margin` makes a token count as expired that long before the
    /// provider's own expiry.
    pub fn new(refresh_margin: std::time::Duration) -> Self {
        Self {
            state: Mutex::new(TokenState::Empty),
            refresh_margin: TimeDelta::from_std(refresh_margin).unwrap_or(TimeDelta::MAX),
        }
    }

    /// Return the cached token if it is still usable at `now`, otherwise run
    /// `fetch` once and cache its result.
    ///
    /// Every failure of `fetch` surfaces as `GatewayError::Authentication`
    /// and leaves the manager empty.
    pub async fn access_token<F, Fut>(&self, now: DateTime<Utc>, fetch: F) -> Result<String>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<TokenGrant>>,
    {
        let mut guard = self.state.lock().await;

        if let TokenState::Valid(ref token) = *guard {
            let usable_until = token.expires_at.checked_sub_signed(self.refresh_margin);
            if usable_until.is_some_and(|until| now < until) {
                return Ok(token.value.clone());
            }
        }

        *guard = TokenState::Empty;
        info!("Fetching new Tuya access token");

        let grant = fetch().await.map_err(|e| match e {
            GatewayError::Authentication(_) => e,
            other => GatewayError::Authentication(other.to_string()),
        })?;

        let expires_at = expiry(now, grant.expire_time).ok_or_else(|| {
            GatewayError::Authentication(format!(
                "unusable token lifetime: {}s",
                grant.expire_time
            ))
        })?;
        let value = grant.access_token;
        *guard = TokenState::Valid(AccessToken {
            value: value.clone(),
            expires_at,
        });

        Ok(value)
    }

    /// Drop the held token so the next call fetches a fresh one.
    pub async fn invalidate(&self) {
        let mut guard = self.state.lock().await;
        if matches!(*guard, TokenState::Valid(_)) {
            warn!("Discarding cached Tuya access token");
        }
        *guard = TokenState::Empty;
    }

    /// Expiry of the held token, `None` when empty.
    #[cfg(test)]
    async fn expires_at(&self) -> Option<DateTime<Utc>> {
        match *self.state.lock().await {
            TokenState::Valid(ref token) => Some(token.expires_at),
            TokenState::Empty => None,
        }
    }
}

/// `now + secs`, or `None` when the lifetime is not positive or does not fit
/// in a timestamp.
fn expiry(now: DateTime<Utc>, secs: i64) -> Option<DateTime<Utc>> {
    if secs <= 0 {
        return None;
    }
    TimeDelta::try_seconds(secs).and_then(|lifetime| now.checked_add_signed(lifetime))
}
