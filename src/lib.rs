//! Panasonic Comfort Cloud client library
//!
//! Authenticates against Panasonic ID the way the Comfort Cloud mobile app
//! does and talks to the Comfort Cloud backend with signed requests.
//!
//! # Features
//!
//! - **OAuth2 + PKCE login**: scripted Auth0 form login, no browser needed
//! - **Token lifecycle**: valid tokens are reused, expired ones refreshed,
//!   full login as the fallback
//! - **Signed transport**: `x-cfc-api-key` and app headers on every call
//! - **Device access**: group listing and device status

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod oauth;

pub use client::ComfortCloudClient;
pub use error::{Error, Result};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Setup tracing/logging
pub fn setup_tracing(level: &str, format: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    match format {
        Some("json") => {
            subscriber
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .try_init()
                .map_err(|e| Error::Config(e.to_string()))?;
        }
        _ => {
            subscriber
                .with(fmt::layer().with_writer(std::io::stderr))
                .try_init()
                .map_err(|e| Error::Config(e.to_string()))?;
        }
    }

    Ok(())
}
