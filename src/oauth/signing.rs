//! Request signing for the Comfort Cloud backend
//!
//! The backend expects an `x-cfc-api-key` header computed from the access
//! token and the request time. The scheme is fixed by the vendor app and
//! must match byte for byte.

use chrono::{DateTime, Utc};
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use sha2::{Digest, Sha256};

use super::token::Token;
use crate::config::AuthConfig;
use crate::{Error, Result};

/// Application name, also sent as `x-app-name`
pub const APP_NAME: &str = "Comfort Cloud";

const KEY_SALT: &str = "521325fb2dd486bf4831b47644317fca";

/// Format of the `x-app-timestamp` header
pub const APP_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Derive the API key for `access_token` at `timestamp`
///
/// Sub-second precision is dropped before hashing.
#[must_use]
pub fn derive_key(access_token: &str, timestamp: DateTime<Utc>) -> String {
    let millis = timestamp.timestamp() * 1000;

    let mut hasher = Sha256::new();
    hasher.update(APP_NAME.as_bytes());
    hasher.update(KEY_SALT.as_bytes());
    hasher.update(millis.to_string().as_bytes());
    hasher.update(b"Bearer ");
    hasher.update(access_token.as_bytes());
    let digest = hex::encode(hasher.finalize());

    let (head, tail) = digest.split_at(9);
    format!("{head}cfc{tail}")
}

/// Render `timestamp` for the `x-app-timestamp` header
#[must_use]
pub fn app_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.format(APP_TIMESTAMP_FORMAT).to_string()
}

/// Header set the backend expects on every call
///
/// `x-client-id` is only sent once the backend login has assigned one.
pub fn api_headers(auth: &AuthConfig, token: &Token, now: DateTime<Utc>) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_static("application/json;charset=utf-8"),
    );
    headers.insert(USER_AGENT, HeaderValue::from_static("G-RAC"));
    headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
    headers.insert("x-app-name", HeaderValue::from_static(APP_NAME));
    headers.insert("x-app-type", HeaderValue::from_static("1"));
    headers.insert("x-app-version", header_value(&auth.app_version)?);
    headers.insert("x-app-timestamp", header_value(&app_timestamp(now))?);
    headers.insert(
        "x-cfc-api-key",
        header_value(&derive_key(&token.access_token, now))?,
    );
    if !token.acc_client_id.is_empty() {
        headers.insert("x-client-id", header_value(&token.acc_client_id)?);
    }
    headers.insert(
        HeaderName::from_static("x-user-authorization-v2"),
        header_value(&format!("Bearer {}", token.access_token))?,
    );
    Ok(headers)
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|_| Error::Validation("value not representable as an HTTP header".into()))
}
