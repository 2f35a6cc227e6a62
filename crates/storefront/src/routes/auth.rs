//! Google OAuth route handlers.
//!
//! - Login: Redirects to Google's consent page
//! - Callback: Exchanges the code and signs the user in
//! - Success: Returns the signed-in account
//! - Failed: Fixed 401 for clients that land on a failed sign-in
//! - Logout: Ends the session

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::Redirect,
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::db::Store;
use crate::error::{AppError, Result, clear_sentry_user, set_sentry_user};
use crate::middleware::{RequireAuth, clear_current_user, set_current_user};
use crate::models::{User, session::keys};
use crate::services::UserService;
use crate::services::auth::{AuthError, generate_state};
use crate::state::AppState;

/// Query parameters from the Google OAuth callback.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    /// Authorization code to exchange for tokens.
    pub code: Option<String>,
    /// State parameter for CSRF protection.
    pub state: Option<String>,
    /// Error code if the user denied consent.
    pub error: Option<String>,
}

/// Start Google sign-in.
///
/// # Route
///
/// `GET /auth/google`
pub async fn google_login<S: Store>(State(state): State<AppState<S>>, session: Session) -> Result<Redirect> {
    let oauth_state = generate_state();
    session.insert(keys::GOOGLE_OAUTH_STATE, &oauth_state).await?;

    let url = state
        .google()
        .authorization_url(&state.config().google_redirect_uri(), &oauth_state);
    Ok(Redirect::to(&url))
}

/// Finish Google sign-in and redirect to the client app.
///
/// # Route
///
/// `GET /auth/google/callback`
#[instrument(skip(state, session, query))]
pub async fn google_callback<S: Store>(
    State(state): State<AppState<S>>,
    session: Session,
    Query(query): Query<CallbackQuery>,
) -> Result<Redirect> {
    let mut client_url = state.config().client_url.clone();

    if let Some(error) = query.error {
        tracing::warn!(%error, "Google sign-in was not completed");
        client_url.set_query(Some("login=failed"));
        return Ok(Redirect::to(client_url.as_str()));
    }

    // One-time use: removed whether or not it matches.
    let expected: Option<String> = session.remove(keys::GOOGLE_OAUTH_STATE).await?;
    if expected.is_none() || expected != query.state {
        tracing::warn!("Google OAuth state mismatch");
        return Err(AuthError::InvalidSessionState.into());
    }
    let code = query
        .code
        .ok_or_else(|| AppError::BadRequest("missing authorization code".into()))?;

    let identity = state
        .google()
        .exchange_code(&code, &state.config().google_redirect_uri())
        .await?;
    let user = UserService::new(state.store())
        .find_or_create_google(&identity.subject, &identity.email)
        .await?;

    set_current_user(&session, &user.session_identity()).await?;
    set_sentry_user(&user.id, Some(user.email.as_str()));
    tracing::info!(user_id = %user.id, "User signed in with Google");

    Ok(Redirect::to(client_url.as_str()))
}

/// The signed-in account.
///
/// # Route
///
/// `GET /auth/login/success`
pub async fn login_success<S: Store>(
    State(state): State<AppState<S>>,
    RequireAuth(actor): RequireAuth,
) -> Result<Json<User>> {
    let user = UserService::new(state.store()).get(&actor, actor.id).await?;
    Ok(Json(user))
}

/// Always 401; the body is shown to the shopper as-is.
///
/// # Route
///
/// `GET /auth/login/failed`
pub async fn login_failed() -> AppError {
    AppError::Unauthorized("Fallo en el inicio de sesión".into())
}

/// # Route
///
/// `POST /auth/logout`
pub async fn logout(session: Session) -> Result<StatusCode> {
    clear_current_user(&session).await?;
    clear_sentry_user();
    Ok(StatusCode::NO_CONTENT)
}
