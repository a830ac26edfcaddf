//! Signed session tokens carried in the `session_id` cookie.
//!
//! A token only names the user (`sub`) and its validity window. The user
//! record is loaded fresh on every request, so role changes apply at once.

use axum::http::HeaderMap;
use axum_extra::extract::cookie::{Cookie, SameSite};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::AuthConfig;

/// Name of the session cookie
pub const SESSION_COOKIE: &str = "session_id";

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,
    pub iat: u64,
    pub exp: u64,
}

/// HMAC keys and lifetime for session tokens
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl_seconds: u64,
    secure_cookies: bool,
}

impl SessionKeys {
    pub fn new(secret: &[u8], ttl_seconds: u64, secure_cookies: bool) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            ttl_seconds,
            secure_cookies,
        }
    }

    /// Build keys from configuration. Without a configured secret a random
    /// one is generated, which invalidates all sessions on restart.
    pub fn from_config(auth: &AuthConfig) -> Self {
        let secret = match auth.jwt_secret.as_deref().filter(|s| !s.is_empty()) {
            Some(secret) => secret.to_string(),
            None => {
                tracing::warn!(
                    "No JWT secret configured; generated a random one. Sessions will not survive a restart."
                );
                generate_secret()
            }
        };
        Self::new(secret.as_bytes(), auth.session_ttl_seconds, auth.secure_cookies)
    }

    pub fn ttl_seconds(&self) -> u64 {
        self.ttl_seconds
    }

    /// Issue a token for `user_id`, valid for the configured lifetime
    pub fn issue(&self, user_id: &str) -> Result<String, jsonwebtoken::errors::Error> {
        self.issue_at(user_id, chrono::Utc::now().timestamp().max(0) as u64)
    }

    fn issue_at(&self, user_id: &str, now: u64) -> Result<String, jsonwebtoken::errors::Error> {
        let claims = Claims {
            sub: user_id.to_string(),
            iat: now,
            exp: now + self.ttl_seconds,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
    }

    /// The user id of a valid token; `None` for bad signatures, malformed or
    /// expired tokens.
    pub fn verify(&self, token: &str) -> Option<String> {
        match decode::<Claims>(token, &self.decoding, &self.validation) {
            Ok(data) => Some(data.claims.sub),
            Err(e) => {
                tracing::debug!("Rejected session token: {}", e);
                None
            }
        }
    }

    /// Session cookie for a freshly issued token. `Secure` is set when
    /// configured or when the request came in over HTTPS through a proxy.
    pub fn session_cookie(&self, token: String, headers: &HeaderMap) -> Cookie<'static> {
        Cookie::build((SESSION_COOKIE, token))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.secure_cookies || forwarded_https(headers))
            .max_age(time::Duration::seconds(self.ttl_seconds as i64))
            .build()
    }

    /// Cookie that makes the browser drop the session
    pub fn expired_cookie(&self, headers: &HeaderMap) -> Cookie<'static> {
        Cookie::build((SESSION_COOKIE, ""))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.secure_cookies || forwarded_https(headers))
            .max_age(time::Duration::ZERO)
            .build()
    }
}

fn forwarded_https(headers: &HeaderMap) -> bool {
    headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("https"))
        .unwrap_or(false)
}

/// Generate a random 256-bit secret, hex encoded
fn generate_secret() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 32] = rng.random();
    hex::encode(bytes)
}
