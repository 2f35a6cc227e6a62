//! Cart handlers. Every route acts on the signed-in user's own cart.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Deserialize;
use tracing::instrument;

use vidriera_core::ProductId;

use crate::db::Store;
use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::models::CartView;
use crate::services::CartService;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AddLine {
    pub product_id: ProductId,
}

#[derive(Debug, Deserialize)]
pub struct SetQuantity {
    pub quantity: i32,
}

/// `GET /api/cart`
pub async fn show<S: Store>(State(state): State<AppState<S>>, RequireAuth(user): RequireAuth) -> Result<Json<CartView>> {
    Ok(Json(CartService::new(state.store()).read(user.id).await?))
}

/// `POST /api/cart/items`
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn add<S: Store>(
    State(state): State<AppState<S>>,
    RequireAuth(user): RequireAuth,
    Json(body): Json<AddLine>,
) -> Result<Json<CartView>> {
    Ok(Json(CartService::new(state.store()).add_line(user.id, body.product_id).await?))
}

/// `PUT /api/cart/items/{product_id}`
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn update<S: Store>(
    State(state): State<AppState<S>>,
    RequireAuth(user): RequireAuth,
    Path(product_id): Path<ProductId>,
    Json(body): Json<SetQuantity>,
) -> Result<Json<CartView>> {
    let view = CartService::new(state.store())
        .update_line_quantity(user.id, product_id, body.quantity)
        .await?;
    Ok(Json(view))
}

/// `DELETE /api/cart/items/{product_id}`
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn remove<S: Store>(
    State(state): State<AppState<S>>,
    RequireAuth(user): RequireAuth,
    Path(product_id): Path<ProductId>,
) -> Result<Json<CartView>> {
    Ok(Json(CartService::new(state.store()).remove_line(user.id, product_id).await?))
}

/// `DELETE /api/cart`
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn clear<S: Store>(State(state): State<AppState<S>>, RequireAuth(user): RequireAuth) -> Result<Json<CartView>> {
    Ok(Json(CartService::new(state.store()).clear(user.id).await?))
}
