//! Google OAuth 2.0 sign-in.
//!
//! # OAuth Flow
//!
//! 1. Generate a random `state` with [`generate_state`] and keep it in the session
//! 2. Redirect the browser to [`GoogleClient::authorization_url`]
//! 3. Google redirects back with an authorization code
//! 4. Exchange the code with [`GoogleClient::exchange_code`]
//! 5. Resolve the returned identity to a user with
//!    [`UserService::find_or_create_google`](crate::services::UserService::find_or_create_google)
//!
//! The ID token arrives directly from Google's token endpoint over TLS in
//! response to a request authenticated with the client secret, so its
//! signature is not re-verified here. The audience, issuer and expiry claims
//! are still checked.

mod error;

pub use error::AuthError;

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use rand::Rng;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use url::Url;

use vidriera_core::Email;

use crate::config::GoogleOAuthConfig;

const AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const SCOPES: &str = "openid email profile";
const ISSUERS: [&str; 2] = ["https://accounts.google.com", "accounts.google.com"];

/// Length of the CSRF `state` parameter.
const STATE_LENGTH: usize = 32;

/// Verified identity extracted from a Google ID token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoogleIdentity {
    /// Stable Google account id (`sub` claim).
    pub subject: String,
    pub email: Email,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    id_token: String,
}

#[derive(Debug, Deserialize)]
struct IdTokenClaims {
    iss: String,
    aud: String,
    sub: String,
    exp: i64,
    email: Option<String>,
    email_verified: Option<bool>,
}

/// Client for Google's OAuth endpoints.
#[derive(Clone)]
pub struct GoogleClient {
    inner: Arc<GoogleClientInner>,
}

struct GoogleClientInner {
    client: reqwest::Client,
    client_id: String,
    client_secret: SecretString,
}

impl GoogleClient {
    #[must_use]
    pub fn new(config: &GoogleOAuthConfig) -> Self {
        Self {
            inner: Arc::new(GoogleClientInner {
                client: reqwest::Client::new(),
                client_id: config.client_id.clone(),
                client_secret: config.client_secret.clone(),
            }),
        }
    }

    /// Get the OAuth client ID (safe to expose in frontend).
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.inner.client_id
    }

    /// Consent page URL for the authorization-code flow.
    ///
    /// # Arguments
    ///
    /// * `redirect_uri` - The callback URL registered with Google
    /// * `state` - A random string stored in the session to prevent CSRF attacks
    #[must_use]
    pub fn authorization_url(&self, redirect_uri: &Url, state: &str) -> String {
        let query = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("client_id", &self.inner.client_id)
            .append_pair("redirect_uri", redirect_uri.as_str())
            .append_pair("response_type", "code")
            .append_pair("scope", SCOPES)
            .append_pair("state", state)
            .append_pair("prompt", "select_account")
            .finish();
        format!("{AUTHORIZE_URL}?{query}")
    }

    /// Exchange an authorization code for the signed-in identity.
    ///
    /// # Arguments
    ///
    /// * `code` - The authorization code from the OAuth callback
    /// * `redirect_uri` - The same redirect URI used in the authorization request
    ///
    /// # Errors
    ///
    /// Returns an error if the token exchange fails or the ID token is not
    /// acceptable.
    pub async fn exchange_code(&self, code: &str, redirect_uri: &Url) -> Result<GoogleIdentity, AuthError> {
        let params = [
            ("grant_type", "authorization_code"),
            ("client_id", self.inner.client_id.as_str()),
            ("client_secret", self.inner.client_secret.expose_secret()),
            ("code", code),
            ("redirect_uri", redirect_uri.as_str()),
        ];

        let response = self.inner.client.post(TOKEN_URL).form(&params).send().await?;

        if !response.status().is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AuthError::OAuth(format!("Token exchange failed: {text}")));
        }

        let token: TokenResponse = response.json().await?;
        decode_id_token(&token.id_token, &self.inner.client_id, Utc::now())
    }
}

/// Read and check the claims of an ID token obtained from the token endpoint.
///
/// # Errors
///
/// Returns `AuthError::InvalidIdToken` for a malformed token, a foreign
/// audience or issuer, or an expired token, and `AuthError::UnverifiedEmail`
/// when Google reports the address as unverified.
pub fn decode_id_token(token: &str, client_id: &str, now: DateTime<Utc>) -> Result<GoogleIdentity, AuthError> {
    let mut parts = token.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(AuthError::InvalidIdToken("expected three segments".into()));
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| AuthError::InvalidIdToken(format!("payload is not base64url: {e}")))?;
    let claims: IdTokenClaims = serde_json::from_slice(&bytes)
        .map_err(|e| AuthError::InvalidIdToken(format!("payload is not valid claims: {e}")))?;

    if claims.aud != client_id {
        return Err(AuthError::InvalidIdToken("audience mismatch".into()));
    }
    if !ISSUERS.contains(&claims.iss.as_str()) {
        return Err(AuthError::InvalidIdToken(format!("unexpected issuer {}", claims.iss)));
    }
    if claims.exp <= now.timestamp() {
        return Err(AuthError::InvalidIdToken("token expired".into()));
    }
    if claims.email_verified == Some(false) {
        return Err(AuthError::UnverifiedEmail);
    }

    let email = claims
        .email
        .ok_or_else(|| AuthError::InvalidIdToken("missing email claim".into()))?;

    Ok(GoogleIdentity {
        subject: claims.sub,
        email: Email::parse(&email)?,
    })
}

/// Generate a cryptographically secure random `state` value.
#[must_use]
pub fn generate_state() -> String {
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::rng();
    (0..STATE_LENGTH)
        .filter_map(|_| CHARSET.get(rng.random_range(0..CHARSET.len())).copied())
        .map(char::from)
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    const CLIENT_ID: &str = "1234.apps.googleusercontent.com";

    fn token(claims: &serde_json::Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
        format!("{header}.{payload}.c2lnbmF0dXJl")
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn claims() -> serde_json::Value {
        serde_json::json!({
            "iss": "https://accounts.google.com",
            "aud": CLIENT_ID,
            "sub": "110169484474386276334",
            "exp": now().timestamp() + 3600,
            "email": "Ana@Tienda.com.ar",
            "email_verified": true,
        })
    }

    fn client() -> GoogleClient {
        GoogleClient::new(&GoogleOAuthConfig {
            client_id: CLIENT_ID.into(),
            client_secret: SecretString::from("shh"),
        })
    }

    #[test]
    fn test_authorization_url() {
        let redirect = Url::parse("https://api.tienda.com.ar/auth/google/callback").unwrap();
        let url = Url::parse(&client().authorization_url(&redirect, "abc123")).unwrap();

        assert_eq!(url.host_str(), Some("accounts.google.com"));
        let pairs: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs.get("client_id").map(String::as_str), Some(CLIENT_ID));
        assert_eq!(pairs.get("redirect_uri").map(String::as_str), Some(redirect.as_str()));
        assert_eq!(pairs.get("response_type").map(String::as_str), Some("code"));
        assert_eq!(pairs.get("scope").map(String::as_str), Some("openid email profile"));
        assert_eq!(pairs.get("state").map(String::as_str), Some("abc123"));
    }

    #[test]
    fn test_decode_id_token() {
        let identity = decode_id_token(&token(&claims()), CLIENT_ID, now()).unwrap();
        assert_eq!(identity.subject, "110169484474386276334");
        assert_eq!(identity.email.as_str(), "ana@tienda.com.ar");
    }

    #[test]
    fn test_decode_rejects_foreign_or_stale_tokens() {
        let mut foreign = claims();
        foreign["aud"] = "someone-else".into();
        assert!(matches!(
            decode_id_token(&token(&foreign), CLIENT_ID, now()),
            Err(AuthError::InvalidIdToken(_))
        ));

        let mut issuer = claims();
        issuer["iss"] = "https://evil.example".into();
        assert!(decode_id_token(&token(&issuer), CLIENT_ID, now()).is_err());

        let mut expired = claims();
        expired["exp"] = (now().timestamp() - 1).into();
        assert!(decode_id_token(&token(&expired), CLIENT_ID, now()).is_err());

        let mut unverified = claims();
        unverified["email_verified"] = false.into();
        assert!(matches!(
            decode_id_token(&token(&unverified), CLIENT_ID, now()),
            Err(AuthError::UnverifiedEmail)
        ));
    }

    #[test]
    fn test_decode_rejects_malformed_tokens() {
        assert!(decode_id_token("not-a-jwt", CLIENT_ID, now()).is_err());
        assert!(decode_id_token("a.!!!.c", CLIENT_ID, now()).is_err());
        assert!(decode_id_token("a.b.c.d", CLIENT_ID, now()).is_err());
    }

    #[test]
    fn test_generate_state() {
        let a = generate_state();
        let b = generate_state();
        assert_eq!(a.len(), STATE_LENGTH);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);
    }
}
