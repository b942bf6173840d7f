//! Identity provider login flow
//!
//! Drives the Auth0 authorization-code + PKCE sequence the vendor app uses:
//!
//! 1. `GET /authorize` (expect 302, never auto-followed)
//! 2. inspect the redirect, adopting a rotated `state`
//! 3. `GET` the login page (expect 200, pick up the `_csrf` cookie)
//! 4. `POST /usernamepassword/login` with the credentials (expect 200)
//! 5. relay the hidden form to `/login/callback` (302) and follow once (302)
//! 6. `POST /oauth/token` with the code and verifier (expect 200)
//! 7. `POST {acc}/auth/v2/login` to obtain the backend client id
//!
//! Steps 3-5 are skipped when the provider redirects straight back to the
//! app (an existing provider session). Every attempt uses its own cookie
//! jar and PKCE parameters; there is no resumption after a failure.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE, USER_AGENT};
use reqwest::{Client, Response, StatusCode, redirect};
use serde::Deserialize;
use tracing::{debug, info};
use url::Url;

use super::credentials::Credentials;
use super::html::HiddenFieldExtractor;
use super::pkce::PkceParams;
use super::signing;
use super::token::{Token, TokenResponse};
use crate::config::AuthConfig;
use crate::{Error, Result};

/// User agent of the vendor app's HTTP stack
pub const APP_USER_AGENT: &str = "okhttp/4.10.0";

/// Mobile browser user agent used for the HTML pages
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Linux; Android 10; K) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/113.0.0.0 Mobile Safari/537.36";

/// Backend login response
#[derive(Debug, Deserialize)]
struct AccLoginResponse {
    #[serde(rename = "clientId")]
    client_id: String,
}

/// One login attempt
pub struct LoginFlow<'a> {
    auth: &'a AuthConfig,
    credentials: &'a Credentials,
    extractor: &'a dyn HiddenFieldExtractor,
    /// Cookies collected across the hops of this attempt
    jar: Arc<Jar>,
    /// Client that never follows redirects
    client: Client,
}

impl<'a> LoginFlow<'a> {
    /// Prepare an attempt with a fresh cookie jar
    pub fn new(
        auth: &'a AuthConfig,
        credentials: &'a Credentials,
        extractor: &'a dyn HiddenFieldExtractor,
        timeout: Duration,
    ) -> Result<Self> {
        let jar = Arc::new(Jar::default());
        let client = Client::builder()
            .redirect(redirect::Policy::none())
            .cookie_provider(Arc::clone(&jar))
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Transport(e.to_string()))?;

        Ok(Self {
            auth,
            credentials,
            extractor,
            jar,
            client,
        })
    }

    /// Run all steps and return a token carrying the backend client id
    pub async fn run(self) -> Result<Token> {
        info!("Starting token retrieval");
        let pkce = PkceParams::generate();
        debug!(
            state = %pkce.state,
            code_challenge = %pkce.code_challenge,
            "OAuth parameters generated"
        );

        // Step 1
        let response = self.authorize(&pkce).await?;
        expect_status(&response, "authorize", StatusCode::FOUND)?;

        // Step 2
        let location = redirect_location(&response, "authorize")?;
        let state = rotated_state(&location).unwrap_or(pkce.state);

        let final_location = if location.starts_with(&self.auth.redirect_uri) {
            debug!("Provider redirected straight back to the app, skipping credential login");
            location
        } else {
            // Step 3
            let csrf = self.open_login_page(&location).await?;
            // Step 4
            let html = self.submit_credentials(&csrf, &state).await?;
            // Step 5
            self.relay_callback(&html).await?
        };

        // Step 6
        let mut token = self.exchange_code(&final_location, &pkce.code_verifier).await?;

        // Step 7
        token.acc_client_id = self.backend_login(&token).await?;
        info!(expires_in = ?token.seconds_until_expiry(), "Obtained new token");
        Ok(token)
    }

    async fn authorize(&self, pkce: &PkceParams) -> Result<Response> {
        let audience = self.auth.audience();
        let query = [
            ("scope", self.auth.scope.as_str()),
            ("audience", audience.as_str()),
            ("protocol", "oauth2"),
            ("response_type", "code"),
            ("code_challenge", pkce.code_challenge.as_str()),
            ("code_challenge_method", "S256"),
            ("auth0Client", self.auth.auth0_client.as_str()),
            ("client_id", self.auth.client_id.as_str()),
            ("redirect_uri", self.auth.redirect_uri.as_str()),
            ("state", pkce.state.as_str()),
        ];

        let response = self
            .client
            .get(self.auth.auth_url("/authorize"))
            .query(&query)
            .header("Auth0-Client", &self.auth.auth0_client)
            .header(USER_AGENT, APP_USER_AGENT)
            .send()
            .await?;
        debug!(step = "authorize", status = %response.status(), "Authorize response");
        Ok(response)
    }

    /// Load the hosted login page and return its `_csrf` cookie
    async fn open_login_page(&self, location: &str) -> Result<String> {
        let url = self.resolve(location)?;
        let response = self
            .client
            .get(url)
            .header(USER_AGENT, BROWSER_USER_AGENT)
            .send()
            .await?;
        expect_status(&response, "authorize_redirect", StatusCode::OK)?;

        response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find_map(|cookie| cookie_value(cookie, "_csrf"))
            .ok_or_else(|| Error::Parse("authorize_redirect: login page did not set _csrf".into()))
    }

    /// Post the credentials; the answer is the auto-submitting callback form
    async fn submit_credentials(&self, csrf: &str, state: &str) -> Result<String> {
        let audience = self.auth.audience();
        let body = serde_json::json!({
            "client_id": self.auth.client_id,
            "redirect_uri": self.auth.redirect_uri,
            "tenant": self.auth.tenant,
            "response_type": "code",
            "scope": self.auth.scope,
            "audience": audience,
            "_csrf": csrf,
            "state": state,
            "_intstate": "deprecated",
            "username": self.credentials.username(),
            "password": self.credentials.password(),
            "lang": self.auth.lang,
            "connection": self.auth.connection,
        });

        let url = Url::parse(&self.auth.auth_url("/usernamepassword/login"))
            .map_err(|e| Error::Parse(format!("invalid login URL: {e}")))?;
        let cookies = self.cookie_header(&url, csrf);

        let response = self
            .client
            .post(url)
            .header("Auth0-Client", &self.auth.auth0_client)
            .header(USER_AGENT, APP_USER_AGENT)
            .header(COOKIE, cookies)
            .json(&body)
            .send()
            .await?;
        expect_status(&response, "login", StatusCode::OK)?;

        Ok(response.text().await?)
    }

    /// Replay the hidden form and follow the provider back to the app redirect
    async fn relay_callback(&self, html: &str) -> Result<String> {
        let fields: HashMap<String, String> = self.extractor.extract_hidden_fields(html);
        if fields.is_empty() {
            return Err(Error::Parse(
                "login_callback: no hidden form fields in login response".into(),
            ));
        }
        debug!(fields = ?fields.keys().collect::<Vec<_>>(), "Relaying login callback form");

        let response = self
            .client
            .post(self.auth.auth_url("/login/callback"))
            .header(USER_AGENT, BROWSER_USER_AGENT)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .form(&fields)
            .send()
            .await?;
        expect_status(&response, "login_callback", StatusCode::FOUND)?;
        let location = redirect_location(&response, "login_callback")?;

        let response = self
            .client
            .get(self.resolve(&location)?)
            .header(USER_AGENT, APP_USER_AGENT)
            .send()
            .await?;
        expect_status(&response, "login_redirect", StatusCode::FOUND)?;
        redirect_location(&response, "login_redirect")
    }

    /// Trade the authorization code for tokens
    async fn exchange_code(&self, location: &str, code_verifier: &str) -> Result<Token> {
        let url = self.resolve(location)?;
        let code = url
            .query_pairs()
            .find(|(k, _)| k == "code")
            .map(|(_, v)| v.into_owned())
            .filter(|code| !code.is_empty())
            .ok_or_else(|| {
                Error::Parse("get_token: redirect carries no authorization code".into())
            })?;

        let body = serde_json::json!({
            "scope": "openid",
            "client_id": self.auth.client_id,
            "grant_type": "authorization_code",
            "code": code,
            "redirect_uri": self.auth.redirect_uri,
            "code_verifier": code_verifier,
        });

        let response = self
            .client
            .post(self.auth.auth_url("/oauth/token"))
            .header("Auth0-Client", &self.auth.auth0_client)
            .header(USER_AGENT, APP_USER_AGENT)
            .json(&body)
            .send()
            .await?;
        expect_status(&response, "get_token", StatusCode::OK)?;

        let token_response: TokenResponse = response
            .json()
            .await
            .map_err(|e| Error::Parse(format!("failed to decode token response: {e}")))?;
        let token = Token::from_response(token_response)?;

        if !token.is_valid() {
            return Err(Error::Validation(
                "token endpoint returned a malformed or already expired token".into(),
            ));
        }
        Ok(token)
    }

    /// Open the backend session, signing with the token's own issue time
    async fn backend_login(&self, token: &Token) -> Result<String> {
        let issued_at = Utc
            .timestamp_opt(token.access_token_issued_at, 0)
            .single()
            .ok_or_else(|| Error::Validation("token issue time out of range".into()))?;
        let headers = signing::api_headers(self.auth, token, issued_at)?;

        let response = self
            .client
            .post(self.auth.acc_url("/auth/v2/login"))
            .headers(headers)
            .body(r#"{"language": 0}"#)
            .send()
            .await?;
        expect_status(&response, "get_acc_client_id", StatusCode::OK)?;

        let body: AccLoginResponse = response
            .json()
            .await
            .map_err(|e| Error::Parse(format!("get_acc_client_id: {e}")))?;
        Ok(body.client_id)
    }

    /// Jar cookies for `url` with `_csrf` set to `csrf`
    ///
    /// An explicit `Cookie` header replaces the jar's, so the jar's cookies
    /// are merged in here.
    fn cookie_header(&self, url: &Url, csrf: &str) -> String {
        let stored = self
            .jar
            .cookies(url)
            .and_then(|v| v.to_str().map(str::to_string).ok())
            .unwrap_or_default();

        stored
            .split(';')
            .map(str::trim)
            .filter(|pair| !pair.is_empty() && !pair.starts_with("_csrf="))
            .map(str::to_string)
            .chain(std::iter::once(format!("_csrf={csrf}")))
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Resolve a `Location` value against the identity provider base
    fn resolve(&self, location: &str) -> Result<Url> {
        let base = Url::parse(&self.auth.auth_base)
            .map_err(|e| Error::Parse(format!("invalid auth base URL: {e}")))?;
        base.join(location)
            .map_err(|e| Error::Parse(format!("failed to parse redirect URL: {e}")))
    }
}

fn expect_status(response: &Response, step: &'static str, expected: StatusCode) -> Result<()> {
    if response.status() == expected {
        return Ok(());
    }
    tracing::error!(
        step,
        expected = expected.as_u16(),
        got = response.status().as_u16(),
        "Unexpected login response"
    );
    Err(Error::protocol(step, expected.as_u16(), response.status()))
}

fn redirect_location(response: &Response, step: &'static str) -> Result<String> {
    response
        .headers()
        .get(LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .ok_or_else(|| Error::Parse(format!("{step}: redirect without Location header")))
}

/// `state` query parameter of a redirect, if the provider rotated it
fn rotated_state(location: &str) -> Option<String> {
    let query = location.split_once('?')?.1;
    let query = query.split_once('#').map_or(query, |(q, _)| q);
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(k, _)| k == "state")
        .map(|(_, v)| v.into_owned())
        .filter(|v| !v.is_empty())
}

/// Value of cookie `name` in a `Set-Cookie` header line
fn cookie_value(set_cookie: &str, name: &str) -> Option<String> {
    let pair = set_cookie.split(';').next()?;
    let (key, value) = pair.split_once('=')?;
    (key.trim() == name).then(|| value.trim().to_string())
}
