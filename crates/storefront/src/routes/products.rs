//! Product catalog handlers.
//!
//! Reads are public; writes require an admin session.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use tracing::instrument;

use vidriera_core::ProductId;

use crate::db::Store;
use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::models::{Product, ProductDraft, ProductFilter};
use crate::services::CatalogService;
use crate::state::AppState;

/// `GET /api/products?category=&search=`
pub async fn index<S: Store>(
    State(state): State<AppState<S>>,
    Query(filter): Query<ProductFilter>,
) -> Result<Json<Vec<Product>>> {
    let products = CatalogService::new(state.store()).list(&filter).await?;
    Ok(Json(products))
}

/// `GET /api/products/{id}`
pub async fn show<S: Store>(State(state): State<AppState<S>>, Path(id): Path<ProductId>) -> Result<Json<Product>> {
    Ok(Json(CatalogService::new(state.store()).get(id).await?))
}

/// `POST /api/products`
#[instrument(skip(state, actor, draft))]
pub async fn create<S: Store>(
    State(state): State<AppState<S>>,
    RequireAuth(actor): RequireAuth,
    Json(draft): Json<ProductDraft>,
) -> Result<(StatusCode, Json<Product>)> {
    let product = CatalogService::new(state.store()).create(&actor, draft).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// `PUT /api/products/{id}`
#[instrument(skip(state, actor, draft))]
pub async fn update<S: Store>(
    State(state): State<AppState<S>>,
    RequireAuth(actor): RequireAuth,
    Path(id): Path<ProductId>,
    Json(draft): Json<ProductDraft>,
) -> Result<Json<Product>> {
    Ok(Json(CatalogService::new(state.store()).update(&actor, id, draft).await?))
}

/// `DELETE /api/products/{id}`
#[instrument(skip(state, actor))]
pub async fn destroy<S: Store>(
    State(state): State<AppState<S>>,
    RequireAuth(actor): RequireAuth,
    Path(id): Path<ProductId>,
) -> Result<StatusCode> {
    CatalogService::new(state.store()).delete(&actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
