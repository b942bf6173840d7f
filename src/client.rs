//! Comfort Cloud device client
//!
//! Thin layer over [`Session`] that persists the token between runs and
//! exposes the device listing and status endpoints.

use std::sync::OnceLock;

use regex::Regex;
use reqwest::StatusCode;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::config::Config;
use crate::models::{Device, Group, GroupResponse};
use crate::oauth::{Credentials, Freshness, Session, TokenStorage};
use crate::{Error, Result};

/// Device client with a persisted token
pub struct ComfortCloudClient {
    session: Session,
    storage: TokenStorage,
    devices: RwLock<Vec<Device>>,
}

impl ComfortCloudClient {
    /// Build a client from configuration and credentials
    pub fn new(config: &Config, credentials: Credentials) -> Result<Self> {
        let session = Session::new(config.auth.clone(), credentials, &config.http)?;
        let storage = TokenStorage::new(config.token_path()?);
        Ok(Self::from_parts(session, storage))
    }

    /// Build a client around an existing session and token store
    #[must_use]
    pub fn from_parts(session: Session, storage: TokenStorage) -> Self {
        Self {
            session,
            storage,
            devices: RwLock::new(Vec::new()),
        }
    }

    /// Underlying session
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Token store
    #[must_use]
    pub fn storage(&self) -> &TokenStorage {
        &self.storage
    }

    /// Make sure the session holds a valid token
    ///
    /// A valid token file is reused as is. Otherwise the stored token (if
    /// any) is refreshed, or a full login runs, and the result is saved.
    pub async fn login(&self) -> Result<Freshness> {
        if self.session.token().await.is_some_and(|t| t.is_valid()) {
            return Ok(Freshness::AlreadyValid);
        }

        if let Some(stored) = self.storage.load() {
            if stored.is_valid() {
                debug!(path = %self.storage.path().display(), "Reusing stored token");
                self.session.set_token(Some(stored)).await;
                return Ok(Freshness::AlreadyValid);
            }
            // Expired, but its refresh token may still be good
            self.session.set_token(Some(stored)).await;
        }

        self.ensure_logged_in().await
    }

    /// End the backend session
    ///
    /// The local token file is left in place.
    pub async fn logout(&self) -> Result<()> {
        self.ensure_logged_in().await?;
        self.session.logout().await
    }

    /// Fetch all groups and cache their devices
    pub async fn fetch_groups_and_devices(&self) -> Result<Vec<Group>> {
        self.ensure_logged_in().await?;

        let url = self.session.auth_config().acc_url("/device/group");
        let body = self
            .session
            .execute_get(&url, "get_groups", StatusCode::OK)
            .await?;
        let response: GroupResponse = serde_json::from_slice(&body)
            .map_err(|e| Error::Parse(format!("failed to parse groups response: {e}")))?;

        let devices: Vec<Device> = response
            .group_list
            .iter()
            .flat_map(|g| g.device_list.iter().cloned())
            .collect();
        info!(
            groups = response.group_list.len(),
            devices = devices.len(),
            "Fetched device groups"
        );
        *self.devices.write().await = devices;

        Ok(response.group_list)
    }

    /// Devices from the last fetch
    pub async fn devices(&self) -> Vec<Device> {
        self.devices.read().await.clone()
    }

    /// Fetch the status document of a device
    ///
    /// `id` may be the hash GUID, the raw GUID or the MD5 hex of the raw
    /// GUID. The device list is fetched first if it has not been yet.
    pub async fn get_device(&self, id: &str) -> Result<(Device, Value)> {
        if self.devices.read().await.is_empty() {
            self.fetch_groups_and_devices().await?;
        } else {
            self.ensure_logged_in().await?;
        }

        let device = self
            .devices
            .read()
            .await
            .iter()
            .find(|d| d.matches(id))
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("device not found: {id}")))?;

        let url = self.session.auth_config().acc_url(&format!(
            "/deviceStatus/{}",
            escape_device_guid(&device.device_guid)
        ));
        let body = self
            .session
            .execute_get(&url, "get_device", StatusCode::OK)
            .await?;
        let status: Value = serde_json::from_slice(&body)
            .map_err(|e| Error::Parse(format!("failed to parse device status: {e}")))?;

        Ok((device, status))
    }

    /// Bring the token up to date and save it when it changed
    async fn ensure_logged_in(&self) -> Result<Freshness> {
        let freshness = self.session.ensure_fresh().await?;
        if freshness != Freshness::AlreadyValid {
            if let Some(token) = self.session.token().await {
                self.storage.save(&token)?;
            }
        }
        Ok(freshness)
    }
}

/// Path segment for a device GUID
///
/// The GUID is query-escaped and every `%2F` is then replaced by a bare `f`,
/// which is what the backend routes on.
#[must_use]
pub fn escape_device_guid(guid: &str) -> String {
    static SLASH_RE: OnceLock<Regex> = OnceLock::new();

    let escaped: String = url::form_urlencoded::byte_serialize(guid.as_bytes()).collect();
    #[allow(clippy::unwrap_used)]
    let slash_re = SLASH_RE.get_or_init(|| Regex::new("(?i)%2f").unwrap());
    slash_re.replace_all(&escaped, "f").into_owned()
}
