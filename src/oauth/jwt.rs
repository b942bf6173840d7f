//! Access token claim inspection
//!
//! Only the payload's `iat`/`exp` are read. The signature is never checked;
//! the backend is the trust boundary.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde_json::Value;

use crate::{Error, Result};

/// Issued-at / expiry timestamps of an access token (Unix seconds)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JwtClaims {
    /// `iat` claim
    pub issued_at: i64,
    /// `exp` claim
    pub expires_at: i64,
}

/// Decode the payload segment of a JWT and read `iat` and `exp`
pub fn extract_claims(jwt: &str) -> Result<JwtClaims> {
    let mut parts = jwt.split('.');
    let payload = match (parts.next(), parts.next()) {
        (Some(_), Some(payload)) => payload,
        _ => return Err(Error::Parse("invalid JWT: expected at least 2 segments".into())),
    };

    // Tolerate producers that keep the '=' padding
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| Error::Parse(format!("error decoding JWT payload: {e}")))?;

    let claims: Value = serde_json::from_slice(&bytes)
        .map_err(|e| Error::Parse(format!("error parsing JWT JSON: {e}")))?;
    if !claims.is_object() {
        return Err(Error::Parse("JWT payload is not a JSON object".into()));
    }

    Ok(JwtClaims {
        issued_at: numeric_claim(&claims, "iat")?,
        expires_at: numeric_claim(&claims, "exp")?,
    })
}

#[allow(clippy::cast_possible_truncation)]
fn numeric_claim(claims: &Value, name: &str) -> Result<i64> {
    let value = &claims[name];
    value
        .as_i64()
        .or_else(|| value.as_f64().map(|f| f.trunc() as i64))
        .ok_or_else(|| Error::Parse(format!("{name} not found or invalid")))
}
