//! Panasonic ID authentication
//!
//! Implements the Auth0 authorization code flow with PKCE (RFC 7636) that
//! the Comfort Cloud mobile app performs against Panasonic ID, followed by
//! the backend login that assigns the per-account client id.
//!
//! Features:
//! - HTML form login with hidden-field relay
//! - Request signing (`x-cfc-api-key`)
//! - JWT claim inspection without signature verification
//! - Token lifecycle: reuse, refresh, full login fallback
//! - Token persistence

mod credentials;
mod html;
pub(crate) mod jwt;
mod login;
mod pkce;
mod session;
pub mod signing;
mod storage;
mod token;

pub use credentials::Credentials;
pub use html::{HiddenFieldExtractor, RegexFieldExtractor};
pub use jwt::{JwtClaims, extract_claims};
pub use login::LoginFlow;
pub use pkce::{PkceParams, code_challenge};
pub use session::{Freshness, Session, SessionState};
pub use signing::derive_key;
pub use storage::TokenStorage;
pub use token::Token;
