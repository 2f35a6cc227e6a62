//! Session-related types.

use serde::{Deserialize, Serialize};

use vidriera_core::{Email, Role, UserId};

/// Session-stored user identity.
///
/// Written by the Google OAuth callback. The role is a snapshot taken at
/// sign-in; a promotion takes effect on the next sign-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: UserId,
    pub email: Email,
    pub role: Role,
}

impl CurrentUser {
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

/// Session keys for authentication data.
pub mod keys {
    /// Key for storing the current logged-in user.
    pub const CURRENT_USER: &str = "current_user";

    /// Key for the Google OAuth `state` parameter (CSRF protection).
    pub const GOOGLE_OAUTH_STATE: &str = "google_oauth_state";
}
