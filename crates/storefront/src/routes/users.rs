//! User directory handlers.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use tracing::instrument;

use vidriera_core::{ShippingInfo, UserId};

use crate::db::Store;
use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::models::{OrderView, ProfileUpdate, User};
use crate::services::{OrderService, UserService};
use crate::state::AppState;

/// `GET /api/users` (admin)
pub async fn index<S: Store>(State(state): State<AppState<S>>, RequireAuth(actor): RequireAuth) -> Result<Json<Vec<User>>> {
    Ok(Json(UserService::new(state.store()).list(&actor).await?))
}

/// `GET /api/users/{id}`
pub async fn show<S: Store>(
    State(state): State<AppState<S>>,
    RequireAuth(actor): RequireAuth,
    Path(id): Path<UserId>,
) -> Result<Json<User>> {
    Ok(Json(UserService::new(state.store()).get(&actor, id).await?))
}

/// `GET /api/users/{id}/orders`
pub async fn orders<S: Store>(
    State(state): State<AppState<S>>,
    RequireAuth(actor): RequireAuth,
    Path(id): Path<UserId>,
) -> Result<Json<Vec<OrderView>>> {
    let orders = OrderService::new(state.store(), state.status_policy())
        .list_for_user(&actor, id)
        .await?;
    Ok(Json(orders))
}

/// `PUT /api/users/me`
#[instrument(skip(state, actor, update), fields(user_id = %actor.id))]
pub async fn update_me<S: Store>(
    State(state): State<AppState<S>>,
    RequireAuth(actor): RequireAuth,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<User>> {
    Ok(Json(UserService::new(state.store()).update_profile(&actor, update).await?))
}

/// `PUT /api/users/me/shipping`
#[instrument(skip(state, actor, shipping), fields(user_id = %actor.id))]
pub async fn update_shipping<S: Store>(
    State(state): State<AppState<S>>,
    RequireAuth(actor): RequireAuth,
    Json(shipping): Json<ShippingInfo>,
) -> Result<Json<User>> {
    Ok(Json(UserService::new(state.store()).update_shipping(&actor, shipping).await?))
}

/// `DELETE /api/users/{id}` (admin)
#[instrument(skip(state, actor), fields(user_id = %actor.id))]
pub async fn destroy<S: Store>(
    State(state): State<AppState<S>>,
    RequireAuth(actor): RequireAuth,
    Path(id): Path<UserId>,
) -> Result<StatusCode> {
    UserService::new(state.store()).delete(&actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
