use thiserror::Error;

/// Tuya error code for an expired or revoked access token.
pub(crate) const TOKEN_INVALID_CODE: i64 = 1010;

#[derive(Debug, Error)]
pub enum GatewayError {
    /// The token endpoint could not be reached or refused the credentials.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Network failure, timeout or non-2xx HTTP status on a business call.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Well-formed envelope with `success=false`.
    #[error("provider error: code={code}, msg={msg}")]
    Provider { code: i64, msg: String },

    /// The response envelope itself could not be understood.
    #[error("unexpected provider payload: {0}")]
    Mapping(String),
}

impl GatewayError {
    pub fn is_token_invalid(&self) -> bool {
        matches!(self, GatewayError::Provider { code, .. } if *code == TOKEN_INVALID_CODE)
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;
