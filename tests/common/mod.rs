//! Shared fixtures: a scripted Panasonic ID + backend on one mock server

#![allow(dead_code)]

use std::time::Duration;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::Utc;
use comfort_cloud::config::{AuthConfig, HttpConfig};
use comfort_cloud::oauth::{Credentials, Session, Token};
use serde_json::{Value, json};
use wiremock::matchers::{body_partial_json, body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const USERNAME: &str = "user@example.com";
pub const PASSWORD: &str = "correct horse battery staple";
pub const ROTATED_STATE: &str = "rotated-state-123";
pub const CSRF: &str = "csrf-token-abc";
pub const AUTH_CODE: &str = "auth-code-xyz";
pub const ACC_CLIENT_ID: &str = "acc-client-42";
pub const DEVICE_COOKIE: &str = "device-cookie-1";

pub const CALLBACK_HTML: &str = r#"<html><body>
<form method="post" name="hiddenform" action="https://authglb.digital.panasonic.com/login/callback">
    <input type="hidden" name="wa" value="wsignin1.0">
    <input type="hidden" name="wresult" value="eyJhbGciOi.payload.sig">
    <input type="hidden" name="wctx" value="{&#34;strategy&#34;:&#34;auth0&#34;}">
    <noscript><input type="submit" value="Continue"></noscript>
</form>
</body></html>"#;

/// Unsigned JWT with the given claims
pub fn jwt(iat: i64, exp: i64) -> String {
    jwt_with(&json!({"iat": iat, "exp": exp}))
}

/// Unsigned JWT with an arbitrary payload
pub fn jwt_with(claims: &Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.c2lnbmF0dXJl")
}

pub fn now() -> i64 {
    Utc::now().timestamp()
}

pub fn auth_config(server: &MockServer) -> AuthConfig {
    AuthConfig {
        auth_base: server.uri(),
        acc_base: server.uri(),
        ..AuthConfig::default()
    }
}

pub fn http_config() -> HttpConfig {
    HttpConfig {
        timeout: Duration::from_secs(5),
    }
}

pub fn credentials() -> Credentials {
    Credentials::new(USERNAME, PASSWORD)
}

pub fn session(server: &MockServer, token: Option<Token>) -> Session {
    Session::new(auth_config(server), credentials(), &http_config())
        .expect("session")
        .with_token(token)
}

/// Stored token that expired an hour ago
pub fn expired_token(refresh_token: &str) -> Token {
    let iat = now() - 7200;
    Token {
        access_token: jwt(iat, iat + 3600),
        access_token_issued_at: iat,
        access_token_expires_at: iat + 3600,
        refresh_token: refresh_token.to_string(),
        acc_client_id: "acc-old".to_string(),
        scope: "openid offline_access".to_string(),
        ..Token::default()
    }
}

/// Stored token valid for another hour
pub fn valid_token() -> Token {
    let iat = now() - 60;
    Token {
        access_token: jwt(iat, iat + 3660),
        access_token_issued_at: iat,
        access_token_expires_at: iat + 3660,
        refresh_token: "refresh-valid".to_string(),
        acc_client_id: "acc-7".to_string(),
        ..Token::default()
    }
}

pub fn token_body(access_token: &str) -> Value {
    json!({
        "access_token": access_token,
        "refresh_token": "refresh-new",
        "id_token": "id-new",
        "scope": "openid offline_access comfortcloud.control",
        "expires_in": 86400,
        "token_type": "Bearer"
    })
}

/// Redirect URI with an authorization code, as the provider sends it back
pub fn app_callback() -> String {
    format!(
        "{}?code={AUTH_CODE}&state={ROTATED_STATE}",
        AuthConfig::default().redirect_uri
    )
}

/// Mount steps 1-5 of the interactive login
pub async fn mount_form_login(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/authorize"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header(
                    "location",
                    format!("/login?state={ROTATED_STATE}&client=abc&protocol=oauth2").as_str(),
                )
                .insert_header("set-cookie", format!("did={DEVICE_COOKIE}; Path=/").as_str()),
        )
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/login"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", format!("_csrf={CSRF}; Path=/; HttpOnly").as_str())
                .set_body_string("<html>login page</html>"),
        )
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/usernamepassword/login"))
        .and(body_partial_json(json!({
            "state": ROTATED_STATE,
            "_csrf": CSRF,
            "username": USERNAME,
            "password": PASSWORD,
        })))
        .respond_with(ResponseTemplate::new(200).set_body_string(CALLBACK_HTML))
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/login/callback"))
        .and(body_string_contains("wresult=eyJhbGciOi.payload.sig"))
        .respond_with(ResponseTemplate::new(302).insert_header(
            "location",
            format!("/authorize/resume?state={ROTATED_STATE}").as_str(),
        ))
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/authorize/resume"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", app_callback().as_str()))
        .expect(1)
        .mount(server)
        .await;
}

/// Mount steps 6-7: code exchange answering with `access_token`, backend login
pub async fn mount_exchange(server: &MockServer, access_token: &str) {
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_partial_json(json!({
            "grant_type": "authorization_code",
            "code": AUTH_CODE,
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body(access_token)))
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/auth/v2/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"clientId": ACC_CLIENT_ID})))
        .expect(1)
        .mount(server)
        .await;
}

/// Mount the whole interactive login; returns the access token it issues
pub async fn mount_full_login(server: &MockServer) -> String {
    let access_token = jwt(now() - 5, now() + 3600);
    mount_form_login(server).await;
    mount_exchange(server, &access_token).await;
    access_token
}
