//! Configuration management

use std::{path::Path, path::PathBuf, time::Duration};

use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Identity provider base URL
pub const DEFAULT_AUTH_BASE: &str = "https://authglb.digital.panasonic.com";
/// Comfort Cloud backend base URL
pub const DEFAULT_ACC_BASE: &str = "https://accsmart.panasonic.com";
/// OAuth client id of the Android app
pub const DEFAULT_CLIENT_ID: &str = "Xmy6xIYIitMxngjB2rHvlm6HSDNnaMJx";
/// `Auth0-Client` header blob of the Android app
pub const DEFAULT_AUTH0_CLIENT: &str =
    "eyJuYW1lIjoiQXV0aDAuQW5kcm9pZCIsImVudiI6eyJhbmRyb2lkIjoiMzAifSwidmVyc2lvbiI6IjIuOS4zIn0=";
/// Redirect URI registered for the app
pub const DEFAULT_REDIRECT_URI: &str =
    "panasonic-iot-cfc://authglb.digital.panasonic.com/android/com.panasonic.ACCsmart/callback";
/// Requested scopes
pub const DEFAULT_SCOPE: &str = "openid offline_access comfortcloud.control a2w.control";
/// Audience template, `{client_id}` is substituted
pub const AUDIENCE_TEMPLATE: &str = "https://digital.panasonic.com/{client_id}/api/v1/";
/// App version reported in `x-app-version`
pub const DEFAULT_APP_VERSION: &str = "1.22.0";

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Environment files to load before reading credentials.
    /// Paths support ~ expansion. Missing files are skipped.
    pub env_files: Vec<String>,
    /// Token file path (defaults to `~/.comfort-cloud/token.json`)
    pub token_file: Option<PathBuf>,
    /// Identity provider and backend settings
    pub auth: AuthConfig,
    /// HTTP client settings
    pub http: HttpConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            env_files: vec![".env".to_string()],
            token_file: None,
            auth: AuthConfig::default(),
            http: HttpConfig::default(),
        }
    }
}

/// Identity provider / backend protocol settings
///
/// Defaults are the values the vendor's Android app uses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Identity provider base URL
    pub auth_base: String,
    /// Backend base URL
    pub acc_base: String,
    /// OAuth client id
    pub client_id: String,
    /// `Auth0-Client` header value
    pub auth0_client: String,
    /// OAuth redirect URI
    pub redirect_uri: String,
    /// OAuth scopes (space separated)
    pub scope: String,
    /// Explicit audience; derived from the client id when unset
    pub audience: Option<String>,
    /// App version reported to the backend
    pub app_version: String,
    /// Auth0 tenant submitted with the credentials
    pub tenant: String,
    /// Auth0 connection submitted with the credentials
    pub connection: String,
    /// Login page language
    pub lang: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            auth_base: DEFAULT_AUTH_BASE.to_string(),
            acc_base: DEFAULT_ACC_BASE.to_string(),
            client_id: DEFAULT_CLIENT_ID.to_string(),
            auth0_client: DEFAULT_AUTH0_CLIENT.to_string(),
            redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
            scope: DEFAULT_SCOPE.to_string(),
            audience: None,
            app_version: DEFAULT_APP_VERSION.to_string(),
            tenant: "pdpauthglb-a1".to_string(),
            connection: "PanasonicID-Authentication".to_string(),
            lang: "en".to_string(),
        }
    }
}

impl AuthConfig {
    /// OAuth audience
    #[must_use]
    pub fn audience(&self) -> String {
        self.audience
            .clone()
            .unwrap_or_else(|| AUDIENCE_TEMPLATE.replace("{client_id}", &self.client_id))
    }

    /// Identity provider URL for `path`
    #[must_use]
    pub fn auth_url(&self, path: &str) -> String {
        format!("{}{path}", self.auth_base.trim_end_matches('/'))
    }

    /// Backend URL for `path`
    #[must_use]
    pub fn acc_url(&self, path: &str) -> String {
        format!("{}{path}", self.acc_base.trim_end_matches('/'))
    }
}

/// HTTP client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Per-request timeout
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
        }
    }
}

impl Config {
    /// Load configuration from file and environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new();

        // Load from file if provided
        if let Some(p) = path {
            if !p.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            figment = figment.merge(Yaml::file(p));
        }

        // Merge environment variables (COMFORT_CLOUD_ prefix)
        figment = figment.merge(Env::prefixed("COMFORT_CLOUD_").split("__"));

        let config: Self = figment
            .extract()
            .map_err(|e| Error::Config(e.to_string()))?;

        config.load_env_files();

        Ok(config)
    }

    /// Load environment files into the process environment.
    /// Supports ~ expansion. Files that don't exist are silently skipped.
    pub fn load_env_files(&self) {
        for path_str in &self.env_files {
            let expanded = expand_home(path_str);

            let path = Path::new(&expanded);
            if path.exists() {
                match dotenvy::from_path(path) {
                    Ok(()) => {
                        tracing::info!("Loaded env file: {expanded}");
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load env file {expanded}: {e}");
                    }
                }
            } else {
                tracing::debug!("Env file not found (skipped): {expanded}");
            }
        }
    }

    /// Token file path, falling back to the default location
    pub fn token_path(&self) -> Result<PathBuf> {
        if let Some(ref p) = self.token_file {
            return Ok(PathBuf::from(expand_home(&p.to_string_lossy())));
        }
        let home = dirs::home_dir()
            .ok_or_else(|| Error::Config("Cannot determine home directory".to_string()))?;
        Ok(home.join(".comfort-cloud").join("token.json"))
    }
}

fn expand_home(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.display().to_string(), 1);
        }
    }
    path.to_string()
}

/// Custom humantime serde module for Duration
pub mod humantime_serde {
    use std::time::Duration;

    use serde::{self, Deserialize, Deserializer, Serializer};

    /// Serialize Duration to human-readable string (e.g., "30s")
    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("{}s", duration.as_secs()))
    }

    /// Deserialize human-readable duration string (e.g., "30s", "5m", "100ms")
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;

        if let Some(ms) = s.strip_suffix("ms") {
            ms.parse::<u64>()
                .map(Duration::from_millis)
                .map_err(serde::de::Error::custom)
        } else if let Some(secs) = s.strip_suffix('s') {
            secs.parse::<u64>()
                .map(Duration::from_secs)
                .map_err(serde::de::Error::custom)
        } else if let Some(mins) = s.strip_suffix('m') {
            mins.parse::<u64>()
                .map(|m| Duration::from_secs(m * 60))
                .map_err(serde::de::Error::custom)
        } else {
            // Assume seconds
            s.parse::<u64>()
                .map(Duration::from_secs)
                .map_err(serde::de::Error::custom)
        }
    }
}
