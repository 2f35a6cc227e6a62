//! Order handlers.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use tracing::instrument;

use vidriera_core::OrderId;

use crate::db::Store;
use crate::error::{Result, add_breadcrumb};
use crate::middleware::RequireAuth;
use crate::models::OrderView;
use crate::services::{OrderService, PlaceOrder, StatusChange};
use crate::state::AppState;

/// `POST /api/orders`
#[instrument(skip(state, actor, request), fields(user_id = %actor.id))]
pub async fn place<S: Store>(
    State(state): State<AppState<S>>,
    RequireAuth(actor): RequireAuth,
    Json(request): Json<PlaceOrder>,
) -> Result<(StatusCode, Json<OrderView>)> {
    let order = OrderService::new(state.store(), state.status_policy())
        .place(&actor, request)
        .await?;
    add_breadcrumb("checkout", "Order placed", Some(&[("order_number", order.label.as_str())]));
    Ok((StatusCode::CREATED, Json(order)))
}

/// `GET /api/orders` (admin)
pub async fn index<S: Store>(
    State(state): State<AppState<S>>,
    RequireAuth(actor): RequireAuth,
) -> Result<Json<Vec<OrderView>>> {
    let orders = OrderService::new(state.store(), state.status_policy())
        .list_all(&actor)
        .await?;
    Ok(Json(orders))
}

/// `GET /api/orders/{id}`
pub async fn show<S: Store>(
    State(state): State<AppState<S>>,
    RequireAuth(actor): RequireAuth,
    Path(id): Path<OrderId>,
) -> Result<Json<OrderView>> {
    let order = OrderService::new(state.store(), state.status_policy())
        .get(&actor, id)
        .await?;
    Ok(Json(order))
}

/// `PATCH /api/orders/{id}/status` (admin)
#[instrument(skip(state, actor, change), fields(user_id = %actor.id))]
pub async fn update_status<S: Store>(
    State(state): State<AppState<S>>,
    RequireAuth(actor): RequireAuth,
    Path(id): Path<OrderId>,
    Json(change): Json<StatusChange>,
) -> Result<Json<OrderView>> {
    let order = OrderService::new(state.store(), state.status_policy())
        .transition(&actor, id, change)
        .await?;
    Ok(Json(order))
}
