//! Authentication error types.

use thiserror::Error;

/// Errors that can occur during Google sign-in.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The token endpoint refused the code exchange.
    #[error("OAuth error: {0}")]
    OAuth(String),

    /// HTTP request to Google failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// ID token is malformed or its claims do not check out.
    #[error("invalid ID token: {0}")]
    InvalidIdToken(String),

    /// The Google account has not verified its email address.
    #[error("email address is not verified")]
    UnverifiedEmail,

    /// Email claim is not a usable address.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] vidriera_core::EmailError),

    /// Session state missing or invalid.
    #[error("invalid session state")]
    InvalidSessionState,
}
