//! Canonical-request signing for the delegated-credential strategy.
//!
//! The scheme is a SigV4-style protocol: a hashed canonical request, a
//! date-scoped derived key chain (date → region → service → terminator, each
//! link an HMAC-SHA256), and an `Authorization` header carrying the
//! credential scope, the signed-headers list, and the hex signature. Service
//! and region are fixed for the planning endpoint.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use thiserror::Error;
use url::Url;

pub const SIGNING_ALGORITHM: &str = "WP1-HMAC-SHA256";
pub const SIGNING_SERVICE: &str = "planner";
pub const SIGNING_REGION: &str = "us-east-1";

const KEY_PREFIX: &str = "WP1";
const SCOPE_TERMINATOR: &str = "wp1_request";
const DATE_HEADER: &str = "x-wp-date";
const TOKEN_HEADER: &str = "x-wp-security-token";

type HmacSha256 = Hmac<Sha256>;

/// Delegated signing credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct SigningCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl SigningCredentials {
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token: None,
        }
    }

    /// Builder: attach a session token for temporary credentials.
    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into());
        self
    }

    /// Whether both key halves are present.
    pub fn is_configured(&self) -> bool {
        !self.access_key_id.is_empty() && !self.secret_access_key.is_empty()
    }
}

impl std::fmt::Debug for SigningCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Signing failure, raised before any request leaves the process.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SigningError {
    #[error("invalid endpoint url: {0}")]
    InvalidUrl(String),

    #[error("signing key rejected")]
    InvalidKey,
}

/// Sign one request; returns the headers to attach, `Authorization` included.
pub fn sign_request(
    credentials: &SigningCredentials,
    method: &str,
    url: &str,
    content_type: &str,
    body: &str,
    now: DateTime<Utc>,
) -> Result<Vec<(String, String)>, SigningError> {
    let parsed = Url::parse(url).map_err(|error| SigningError::InvalidUrl(error.to_string()))?;
    let host = match (parsed.host_str(), parsed.port()) {
        (Some(host), Some(port)) => format!("{host}:{port}"),
        (Some(host), None) => host.to_string(),
        (None, _) => return Err(SigningError::InvalidUrl("url has no host".into())),
    };
    let path = if parsed.path().is_empty() {
        "/"
    } else {
        parsed.path()
    };
    let query = parsed.query().unwrap_or("");

    let datetime = now.format("%Y%m%dT%H%M%SZ").to_string();
    let date = now.format("%Y%m%d").to_string();

    let mut canonical_headers: BTreeMap<String, String> = BTreeMap::new();
    canonical_headers.insert("content-type".into(), content_type.to_string());
    canonical_headers.insert("host".into(), host);
    canonical_headers.insert(DATE_HEADER.into(), datetime.clone());
    if let Some(token) = &credentials.session_token {
        canonical_headers.insert(TOKEN_HEADER.into(), token.clone());
    }

    let signed_headers = canonical_headers
        .keys()
        .cloned()
        .collect::<Vec<_>>()
        .join(";");
    let canonical_header_block = canonical_headers
        .iter()
        .map(|(name, value)| format!("{name}:{value}\n"))
        .collect::<String>();

    let payload_hash = hex::encode(Sha256::digest(body.as_bytes()));
    let canonical_request = format!(
        "{method}\n{path}\n{query}\n{canonical_header_block}\n{signed_headers}\n{payload_hash}"
    );

    let scope = format!("{date}/{SIGNING_REGION}/{SIGNING_SERVICE}/{SCOPE_TERMINATOR}");
    let string_to_sign = format!(
        "{SIGNING_ALGORITHM}\n{datetime}\n{scope}\n{}",
        hex::encode(Sha256::digest(canonical_request.as_bytes()))
    );

    let k_secret = format!("{KEY_PREFIX}{}", credentials.secret_access_key);
    let k_date = hmac_sha256(k_secret.as_bytes(), &date)?;
    let k_region = hmac_sha256(&k_date, SIGNING_REGION)?;
    let k_service = hmac_sha256(&k_region, SIGNING_SERVICE)?;
    let k_signing = hmac_sha256(&k_service, SCOPE_TERMINATOR)?;
    let signature = hex::encode(hmac_sha256(&k_signing, &string_to_sign)?);

    let authorization = format!(
        "{SIGNING_ALGORITHM} Credential={}/{scope}, SignedHeaders={signed_headers}, \
         Signature={signature}",
        credentials.access_key_id
    );

    let mut headers = vec![
        ("content-type".to_string(), content_type.to_string()),
        (DATE_HEADER.to_string(), datetime),
        ("authorization".to_string(), authorization),
    ];
    if let Some(token) = &credentials.session_token {
        headers.push((TOKEN_HEADER.to_string(), token.clone()));
    }
    Ok(headers)
}

fn hmac_sha256(key: &[u8], data: &str) -> Result<Vec<u8>, SigningError> {
    let mut mac = HmacSha256::new_from_slice(key).map_err(|_| SigningError::InvalidKey)?;
    mac.update(data.as_bytes());
    Ok(mac.finalize().into_bytes().to_vec())
}
