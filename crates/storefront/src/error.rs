//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.
//!
//! Responses carry a JSON body `{"error": "<reason>"}`. Incomplete shipping
//! details add `"missing_fields"` and conflicts add `"retryable": true`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::ShopError;
use crate::services::auth::AuthError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Domain operation failed.
    #[error(transparent)]
    Shop(#[from] ShopError),

    /// Sign-in failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Session storage failed.
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        Self::Shop(err.into())
    }
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Shop(err) => match err {
                ShopError::NotFound(_) => StatusCode::NOT_FOUND,
                ShopError::Forbidden => StatusCode::FORBIDDEN,
                ShopError::Conflict(_) => StatusCode::CONFLICT,
                ShopError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
                ShopError::OutOfStock { .. }
                | ShopError::InsufficientStock { .. }
                | ShopError::InvalidQuantity
                | ShopError::EmptyCart
                | ShopError::IncompleteShippingInfo { .. }
                | ShopError::InvalidPaymentMethod(_)
                | ShopError::InvalidStatus(_)
                | ShopError::InvalidTransition(_)
                | ShopError::InvalidProduct(_) => StatusCode::BAD_REQUEST,
            },
            Self::Auth(err) => match err {
                AuthError::InvalidSessionState
                | AuthError::InvalidIdToken(_)
                | AuthError::UnverifiedEmail => StatusCode::UNAUTHORIZED,
                AuthError::InvalidEmail(_) => StatusCode::BAD_REQUEST,
                AuthError::OAuth(_) | AuthError::Http(_) => StatusCode::BAD_GATEWAY,
            },
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Session(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn body(&self) -> Value {
        match self {
            Self::Shop(ShopError::IncompleteShippingInfo { missing }) => json!({
                "error": self.to_string(),
                "missing_fields": missing,
            }),
            Self::Shop(err @ ShopError::Conflict(_)) => json!({
                "error": err.to_string(),
                "retryable": err.is_retryable(),
            }),
            // Don't expose internal error details to clients
            Self::Shop(ShopError::Internal(_)) | Self::Session(_) | Self::Internal(_) => {
                json!({ "error": "Internal server error" })
            }
            Self::Auth(AuthError::OAuth(_) | AuthError::Http(_)) => {
                json!({ "error": "Sign-in provider error" })
            }
            Self::Auth(AuthError::InvalidSessionState) => {
                json!({ "error": "Session expired, please try again" })
            }
            Self::Auth(_) => json!({ "error": "Authentication failed" }),
            Self::Unauthorized(msg) | Self::BadRequest(msg) => json!({ "error": msg }),
            Self::Shop(err) => json!({ "error": err.to_string() }),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() || matches!(self, Self::Auth(AuthError::OAuth(_) | AuthError::Http(_))) {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else if matches!(self, Self::Shop(ShopError::Conflict(_))) {
            tracing::warn!(error = %self, "Request conflicted with a concurrent update");
        }

        (status, Json(self.body())).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("checkout", "Order placed", Some(&[("order_number", "#0042")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}
