//! Authenticated session
//!
//! Owns the current [`Token`] and decides, before every API call, whether
//! it can be used as is, refreshed cheaply, or must be replaced by a full
//! login. The decision is an explicit state machine ([`SessionState`]) so
//! the path taken is observable.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use reqwest::header::USER_AGENT;
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::credentials::Credentials;
use super::html::{HiddenFieldExtractor, RegexFieldExtractor};
use super::login::{APP_USER_AGENT, LoginFlow};
use super::signing;
use super::token::{Token, TokenResponse};
use crate::config::{AuthConfig, HttpConfig};
use crate::{Error, Result};

/// Where the token lifecycle currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Token can be used as is
    Valid,
    /// Token expired but a refresh token is available
    NeedsRefresh,
    /// No usable token; a full login is required
    NeedsRelogin,
    /// Full login failed
    Failed,
}

impl SessionState {
    /// Classify a token
    #[must_use]
    pub fn assess(token: Option<&Token>) -> Self {
        let Some(token) = token else {
            return Self::NeedsRelogin;
        };
        if !token.is_well_formed() {
            return Self::NeedsRelogin;
        }
        match token.is_expired() {
            Ok(false) => Self::Valid,
            Ok(true) if !token.refresh_token.is_empty() => Self::NeedsRefresh,
            Ok(true) | Err(_) => Self::NeedsRelogin,
        }
    }
}

/// How [`Session::ensure_fresh`] reached a valid token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// The existing token was still valid
    AlreadyValid,
    /// The token was renewed with the refresh token
    Refreshed,
    /// A full login was performed
    Relogged,
}

/// Authenticated Comfort Cloud session
pub struct Session {
    auth: AuthConfig,
    credentials: Credentials,
    /// Client for refresh and API calls (no cookies)
    http_client: Client,
    timeout: Duration,
    extractor: Arc<dyn HiddenFieldExtractor>,
    /// Single writer: held across refresh/login so only one runs at a time
    token: Mutex<Option<Token>>,
}

impl Session {
    /// Create a session without a token
    pub fn new(auth: AuthConfig, credentials: Credentials, http: &HttpConfig) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(http.timeout)
            .build()
            .map_err(|e| Error::Transport(e.to_string()))?;

        Ok(Self {
            auth,
            credentials,
            http_client,
            timeout: http.timeout,
            extractor: Arc::new(RegexFieldExtractor),
            token: Mutex::new(None),
        })
    }

    /// Start from a previously stored token
    #[must_use]
    pub fn with_token(mut self, token: Option<Token>) -> Self {
        self.token = Mutex::new(token);
        self
    }

    /// Replace the hidden-field extractor used by the login flow
    #[must_use]
    pub fn with_extractor(mut self, extractor: Arc<dyn HiddenFieldExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    /// Protocol settings in use
    #[must_use]
    pub fn auth_config(&self) -> &AuthConfig {
        &self.auth
    }

    /// Copy of the current token
    pub async fn token(&self) -> Option<Token> {
        self.token.lock().await.clone()
    }

    /// Replace the current token
    pub async fn set_token(&self, token: Option<Token>) {
        *self.token.lock().await = token;
    }

    /// Current lifecycle state
    pub async fn state(&self) -> SessionState {
        SessionState::assess(self.token.lock().await.as_ref())
    }

    /// Make sure a valid token is held, refreshing or logging in as needed
    ///
    /// A failed refresh always falls back to a full login; only a failed
    /// login is reported.
    pub async fn ensure_fresh(&self) -> Result<Freshness> {
        let mut guard = self.token.lock().await;
        let mut state = SessionState::assess(guard.as_ref());
        let mut freshness = Freshness::AlreadyValid;
        let mut failure = None;

        loop {
            debug!(?state, "Session state");
            state = match state {
                SessionState::Valid => return Ok(freshness),
                SessionState::NeedsRefresh => {
                    let refreshed = match guard.as_ref() {
                        Some(current) => self.refresh_token(current).await,
                        None => Err(Error::Validation("no token to refresh".into())),
                    };
                    match refreshed {
                        Ok(token) => {
                            *guard = Some(token);
                            freshness = Freshness::Refreshed;
                            SessionState::Valid
                        }
                        Err(e) => {
                            warn!(error = %e, "Token refresh failed, falling back to full login");
                            SessionState::NeedsRelogin
                        }
                    }
                }
                SessionState::NeedsRelogin => match self.new_token().await {
                    Ok(token) => {
                        *guard = Some(token);
                        freshness = Freshness::Relogged;
                        SessionState::Valid
                    }
                    Err(e) => {
                        failure = Some(e);
                        SessionState::Failed
                    }
                },
                SessionState::Failed => {
                    return Err(failure
                        .take()
                        .unwrap_or_else(|| Error::Validation("login failed".into())));
                }
            };
        }
    }

    /// Force a full login, replacing any current token
    pub async fn login(&self) -> Result<()> {
        let mut guard = self.token.lock().await;
        *guard = Some(self.new_token().await?);
        Ok(())
    }

    /// Renew the current token with its refresh token
    ///
    /// Unlike [`Session::ensure_fresh`] a failure is returned, not papered over.
    pub async fn refresh(&self) -> Result<()> {
        let mut guard = self.token.lock().await;
        let current = guard
            .as_ref()
            .ok_or_else(|| Error::Validation("no token to refresh".into()))?;
        let token = self.refresh_token(current).await?;
        *guard = Some(token);
        Ok(())
    }

    async fn new_token(&self) -> Result<Token> {
        LoginFlow::new(
            &self.auth,
            &self.credentials,
            self.extractor.as_ref(),
            self.timeout,
        )?
        .run()
        .await
    }

    async fn refresh_token(&self, current: &Token) -> Result<Token> {
        if current.refresh_token.is_empty() {
            return Err(Error::Validation("token has no refresh token".into()));
        }

        let body = serde_json::json!({
            "scope": current.scope,
            "client_id": self.auth.client_id,
            "refresh_token": current.refresh_token,
            "grant_type": "refresh_token",
        });

        let response = self
            .http_client
            .post(self.auth.auth_url("/oauth/token"))
            .header("Auth0-Client", &self.auth.auth0_client)
            .header(USER_AGENT, APP_USER_AGENT)
            .json(&body)
            .send()
            .await?;
        if response.status() != StatusCode::OK {
            return Err(Error::protocol("refresh_token", 200, response.status()));
        }

        let token_response: TokenResponse = response
            .json()
            .await
            .map_err(|e| Error::Parse(format!("failed to parse refresh response: {e}")))?;

        // Claims come from the new access token, never the one it replaces
        let mut token = Token::from_response(token_response)?;
        token.acc_client_id.clone_from(&current.acc_client_id);
        if token.refresh_token.is_empty() {
            token.refresh_token.clone_from(&current.refresh_token);
        }
        if token.id_token.is_empty() {
            token.id_token.clone_from(&current.id_token);
        }
        if token.scope.is_empty() {
            token.scope.clone_from(&current.scope);
        }

        if !token.is_valid() {
            return Err(Error::Validation(
                "refresh returned a malformed or already expired token".into(),
            ));
        }

        info!(expires_in = ?token.seconds_until_expiry(), "Token refreshed successfully");
        Ok(token)
    }

    /// Authenticated GET returning the raw body
    pub async fn execute_get(
        &self,
        url: &str,
        operation: &str,
        expected: StatusCode,
    ) -> Result<Vec<u8>> {
        self.execute(Method::GET, url, None, operation, expected).await
    }

    /// Authenticated POST of a JSON body returning the raw body
    pub async fn execute_post(
        &self,
        url: &str,
        body: Option<&Value>,
        operation: &str,
        expected: StatusCode,
    ) -> Result<Vec<u8>> {
        self.execute(Method::POST, url, body, operation, expected).await
    }

    async fn execute(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
        operation: &str,
        expected: StatusCode,
    ) -> Result<Vec<u8>> {
        self.ensure_fresh().await?;
        let token = self
            .token()
            .await
            .ok_or_else(|| Error::Validation("no token after login".into()))?;

        let headers = signing::api_headers(&self.auth, &token, Utc::now())?;
        let mut request = self
            .http_client
            .request(method.clone(), url)
            .headers(headers);
        if let Some(body) = body {
            request = request.body(serde_json::to_vec(body)?);
        }

        let response = request.send().await?;
        let status = response.status();
        debug!(%method, %url, operation, status = status.as_u16(), "API call");

        if status != expected {
            return Err(Error::Status {
                operation: operation.to_string(),
                expected: expected.as_u16(),
                actual: status.as_u16(),
                status_text: status.to_string(),
            });
        }

        Ok(response.bytes().await?.to_vec())
    }

    /// End the backend session
    ///
    /// A non-zero `result` from the backend is logged, not treated as an error.
    pub async fn logout(&self) -> Result<()> {
        let url = self.auth.acc_url("/auth/v2/logout");
        let response = self
            .execute_post(&url, None, "logout", StatusCode::OK)
            .await?;

        let result: Value = serde_json::from_slice(&response)
            .map_err(|e| Error::Parse(format!("failed to parse logout response: {e}")))?;
        match result.get("result").and_then(Value::as_i64) {
            Some(0) => info!("Logged out"),
            other => warn!(result = ?other, "Logout issue detected, ignoring"),
        }
        Ok(())
    }
}
