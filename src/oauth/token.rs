//! Session token

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::jwt::{self, JwtClaims};
use crate::Result;

/// Token issued by the identity provider plus the backend client id
///
/// Serialized as-is to the token file.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Token {
    /// Access token (JWT)
    pub access_token: String,

    /// `iat` of the access token (Unix seconds)
    pub access_token_issued_at: i64,

    /// `exp` of the access token (Unix seconds)
    pub access_token_expires_at: i64,

    /// Refresh token
    pub refresh_token: String,

    /// OpenID id token, carried through untouched
    pub id_token: String,

    /// `expires_in` from the token response
    pub expires_in: u64,

    /// Client id assigned by the backend login
    pub acc_client_id: String,

    /// Granted scopes
    pub scope: String,
}

/// Token endpoint response body
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub id_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub scope: Option<String>,
}

impl Token {
    /// Build a token from a token endpoint response
    ///
    /// Issued/expiry times come from the access token's own claims.
    pub(crate) fn from_response(response: TokenResponse) -> Result<Self> {
        let claims = jwt::extract_claims(&response.access_token)?;

        Ok(Self {
            access_token: response.access_token,
            access_token_issued_at: claims.issued_at,
            access_token_expires_at: claims.expires_at,
            refresh_token: response.refresh_token.unwrap_or_default(),
            id_token: response.id_token.unwrap_or_default(),
            expires_in: response.expires_in.unwrap_or_default(),
            acc_client_id: String::new(),
            scope: response.scope.unwrap_or_default(),
        })
    }

    /// Issued/expiry times, decoded from the JWT when they were never stored
    pub fn claims(&self) -> Result<JwtClaims> {
        if self.access_token_issued_at == 0 || self.access_token_expires_at == 0 {
            return jwt::extract_claims(&self.access_token);
        }
        Ok(JwtClaims {
            issued_at: self.access_token_issued_at,
            expires_at: self.access_token_expires_at,
        })
    }

    /// Whether the access token looks like a JWT (three dot-separated parts)
    pub fn is_well_formed(&self) -> bool {
        !self.access_token.is_empty() && self.access_token.split('.').count() == 3
    }

    /// Whether the access token has passed its expiry
    pub fn is_expired(&self) -> Result<bool> {
        let claims = self.claims()?;
        Ok(Utc::now().timestamp() > claims.expires_at)
    }

    /// A token is valid when it is well formed and not expired
    pub fn is_valid(&self) -> bool {
        self.is_well_formed() && matches!(self.is_expired(), Ok(false))
    }

    /// Seconds until expiry, `None` when already expired or undecodable
    pub fn seconds_until_expiry(&self) -> Option<i64> {
        let claims = self.claims().ok()?;
        let remaining = claims.expires_at - Utc::now().timestamp();
        (remaining >= 0).then_some(remaining)
    }
}

impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Token")
            .field("access_token", &"[redacted]")
            .field("access_token_issued_at", &self.access_token_issued_at)
            .field("access_token_expires_at", &self.access_token_expires_at)
            .field("refresh_token", &"[redacted]")
            .field("expires_in", &self.expires_in)
            .field("acc_client_id", &self.acc_client_id)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::oauth::jwt::tests::make_jwt;

    fn token_expiring_in(secs: i64) -> Token {
        let now = Utc::now().timestamp();
        let access_token = make_jwt(&json!({"iat": now - 60, "exp": now + secs}));
        Token::from_response(TokenResponse {
            access_token,
            refresh_token: Some("refresh".into()),
            id_token: Some("id".into()),
            expires_in: Some(86_400),
            scope: Some("openid".into()),
        })
        .unwrap()
    }

    #[test]
    fn fresh_token_is_valid() {
        assert!(token_expiring_in(3600).is_valid());
    }

    #[test]
    fn expired_token_is_invalid() {
        let token = token_expiring_in(-3600);
        assert!(!token.is_valid());
        assert!(token.is_expired().unwrap());
        assert_eq!(token.seconds_until_expiry(), None);
    }

    #[test]
    fn empty_token_is_invalid() {
        assert!(!Token::default().is_valid());
    }

    #[test]
    fn two_segment_token_is_invalid() {
        let mut token = token_expiring_in(3600);
        let (head, _) = token.access_token.rsplit_once('.').unwrap();
        token.access_token = head.to_string();
        assert!(!token.is_valid());
    }

    #[test]
    fn claims_are_taken_from_the_access_token() {
        let access_token = make_jwt(&json!({"iat": 1_000, "exp": 2_000}));
        let token = Token::from_response(TokenResponse {
            access_token,
            refresh_token: None,
            id_token: None,
            expires_in: None,
            scope: None,
        })
        .unwrap();
        assert_eq!(token.access_token_issued_at, 1_000);
        assert_eq!(token.access_token_expires_at, 2_000);
        assert!(token.refresh_token.is_empty());
    }

    #[test]
    fn missing_stored_claims_are_decoded_lazily() {
        let mut token = token_expiring_in(3600);
        let expected = token.access_token_expires_at;
        token.access_token_issued_at = 0;
        token.access_token_expires_at = 0;
        assert_eq!(token.claims().unwrap().expires_at, expected);
        assert!(token.is_valid());
    }

    #[test]
    fn undecodable_claims_make_token_invalid() {
        let token = Token {
            access_token: "a.b.c".into(),
            ..Token::default()
        };
        assert!(!token.is_valid());
    }

    #[test]
    fn json_round_trip_preserves_validity() {
        for token in [token_expiring_in(3600), token_expiring_in(-3600), Token::default()] {
            let json = serde_json::to_string(&token).unwrap();
            let parsed: Token = serde_json::from_str(&json).unwrap();
            assert_eq!(parsed, token);
            assert_eq!(parsed.is_valid(), token.is_valid());
        }
    }

    #[test]
    fn persisted_field_names() {
        let mut token = token_expiring_in(3600);
        token.acc_client_id = "client-1".into();
        let value = serde_json::to_value(&token).unwrap();
        for field in [
            "access_token",
            "access_token_issued_at",
            "access_token_expires_at",
            "refresh_token",
            "id_token",
            "expires_in",
            "acc_client_id",
            "scope",
        ] {
            assert!(value.get(field).is_some(), "missing {field}");
        }
    }

    #[test]
    fn partial_json_uses_defaults() {
        let token: Token = serde_json::from_str(r#"{"access_token": "x.y.z"}"#).unwrap();
        assert_eq!(token.access_token_expires_at, 0);
        assert!(token.acc_client_id.is_empty());
    }

    #[test]
    fn debug_redacts_secrets() {
        let token = token_expiring_in(3600);
        let rendered = format!("{token:?}");
        assert!(!rendered.contains(&token.access_token));
        assert!(!rendered.contains("refresh\""));
    }
}
