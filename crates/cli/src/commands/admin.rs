//! Admin account management commands.
//!
//! # Usage
//!
//! ```bash
//! vidriera-cli admin promote -e admin@tienda.com.ar
//! vidriera-cli admin demote -e admin@tienda.com.ar
//! ```
//!
//! The account must exist already, which happens on its first Google
//! sign-in. Sessions carry a role snapshot, so the change applies from the
//! next sign-in.

use thiserror::Error;

use vidriera_core::{Email, EmailError, Role};
use vidriera_storefront::db::PgStore;
use vidriera_storefront::services::{ShopError, UserService};

use super::CommandError;

/// Errors that can occur during admin operations.
#[derive(Debug, Error)]
pub enum AdminError {
    #[error(transparent)]
    Command(#[from] CommandError),

    /// Invalid email.
    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    /// No account uses the email.
    #[error("No account found with email: {0}")]
    UnknownAccount(Email),

    #[error(transparent)]
    Shop(ShopError),
}

/// Set the role of the account registered under `email`.
///
/// # Errors
///
/// Returns an error if the email is malformed, no account uses it, or the
/// database is unreachable.
pub async fn set_role(email: &str, role: Role) -> Result<(), AdminError> {
    let email = Email::parse(email)?;
    let store = PgStore::new(super::connect().await?);

    let user = UserService::new(&store)
        .set_role_by_email(&email, role)
        .await
        .map_err(|e| match e {
            ShopError::NotFound(_) => AdminError::UnknownAccount(email.clone()),
            other => AdminError::Shop(other),
        })?;

    tracing::info!("Role updated! ID: {}, Email: {}, Role: {:?}", user.id, user.email, user.role);
    Ok(())
}
