//! Token file persistence
//!
//! Keeps the session token on disk so a restart can skip the login flow.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::token::Token;
use crate::Result;

/// File-backed token store
pub struct TokenStorage {
    path: PathBuf,
}

impl TokenStorage {
    /// Store tokens at `path`
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the token file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the stored token, `None` when missing or unreadable
    ///
    /// Expired tokens are returned too; their refresh token is still useful.
    pub fn load(&self) -> Option<Token> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "No stored token found");
            return None;
        }

        match fs::read_to_string(&self.path) {
            Ok(content) => match serde_json::from_str::<Token>(&content) {
                Ok(token) => {
                    if token.is_valid() {
                        info!(expires_in = ?token.seconds_until_expiry(), "Loaded valid token");
                    } else {
                        debug!("Stored token is no longer valid");
                    }
                    Some(token)
                }
                Err(e) => {
                    warn!(path = %self.path.display(), error = %e, "Failed to parse stored token");
                    None
                }
            },
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to read token file");
                None
            }
        }
    }

    /// Write the token, creating parent directories as needed
    pub fn save(&self, token: &Token) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let content = serde_json::to_string_pretty(token)?;
        fs::write(&self.path, content)?;

        // Owner read/write only
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o600);
            let _ = fs::set_permissions(&self.path, perms);
        }

        info!(path = %self.path.display(), "Saved token");
        Ok(())
    }

    /// Remove the token file if present
    pub fn delete(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
            info!(path = %self.path.display(), "Deleted token file");
        }
        Ok(())
    }
}
