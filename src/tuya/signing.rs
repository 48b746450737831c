use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

pub(crate) const SIGN_METHOD: &str = "HMAC-SHA256";

/// Signs outbound requests with the app credentials.
///
/// Signing scheme:
///
/// ```text
/// body_hash      = hex(SHA256(body))
/// string_to_sign = METHOD \n body_hash \n <empty> \n path_and_query
/// signature      = HEX(HMAC-SHA256(secret, client_id + t + string_to_sign))
/// ```
///
/// The third line is the Signature-Headers segment; no custom headers are
/// signed, so it is always empty.
#[derive(Clone)]
pub struct Signer {
    client_id: String,
    client_secret: String,
    api_version: String,
}

impl std::fmt::Debug for Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signer")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("api_version", &self.api_version)
            .finish()
    }
}

/// Headers required on every signed request, in the order they are sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedHeaders(Vec<(&'static str, String)>);

impl SignedHeaders {
    #[cfg(test)]
    fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.0.iter().map(|(k, v)| (*k, v.as_str()))
    }
}

impl Signer {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        api_version: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            api_version: api_version.into(),
        }
    }

    /// Compute the uppercase hex signature for one request.
    ///
    /// `path_and_query` must be exactly what goes on the wire after the base
    /// URL, query string included.
    pub fn sign(&self, method: &str, path_and_query: &str, body: &[u8], t: i64) -> String {
        let body_hash = hex::encode(Sha256::digest(body));
        let string_to_sign = format!("{method}\n{body_hash}\n\n{path_and_query}");
        let payload = format!("{}{}{}", self.client_id, t, string_to_sign);

        let mut mac = HmacSha256::new_from_slice(self.client_secret.as_bytes())
            .expect("HMAC accepts any key length");
        mac.update(payload.as_bytes());
        hex::encode(mac.finalize().into_bytes()).to_uppercase()
    }

    /// Build the full signed header set.
    ///
    /// `access_token` is `None` for the token call and `Some` for everything else.
    pub fn headers(
        &self,
        method: &str,
        path_and_query: &str,
        body: &[u8],
        t: i64,
        access_token: Option<&str>,
    ) -> SignedHeaders {
        let sign = self.sign(method, path_and_query, body, t);

        let mut headers = vec![
            ("client_id", self.client_id.clone()),
            ("sign", sign),
            ("sign_method", SIGN_METHOD.to_owned()),
            ("t", t.to_string()),
            ("v", self.api_version.clone()),
        ];
        if let Some(token) = access_token {
            headers.push(("access_token", token.to_owned()));
        }
        SignedHeaders(headers)
    }
}
