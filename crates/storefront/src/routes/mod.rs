//! HTTP route handlers for the storefront API.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                          - Liveness
//! GET    /health/ready                    - Readiness (storage ping)
//!
//! # Auth
//! GET    /auth/google                     - Redirect to Google consent
//! GET    /auth/google/callback            - Handle OAuth callback
//! GET    /auth/login/success              - Signed-in account
//! GET    /auth/login/failed               - Fixed 401 sign-in failure
//! POST   /auth/logout                     - End session
//!
//! # Catalog
//! GET    /api/products                    - List (?category=&search=)
//! POST   /api/products                    - Create (admin)
//! GET    /api/products/{id}               - Detail
//! PUT    /api/products/{id}               - Replace (admin)
//! DELETE /api/products/{id}               - Delete (admin)
//!
//! # Cart (signed-in user's own)
//! GET    /api/cart                        - Read
//! DELETE /api/cart                        - Clear
//! POST   /api/cart/items                  - Add one unit {product_id}
//! PUT    /api/cart/items/{product_id}     - Set quantity {quantity}
//! DELETE /api/cart/items/{product_id}     - Remove line
//!
//! # Orders
//! POST   /api/orders                      - Place from cart
//! GET    /api/orders                      - All orders (admin)
//! GET    /api/orders/{id}                 - Detail (owner or admin)
//! PATCH  /api/orders/{id}/status          - Append status (admin)
//!
//! # Users
//! GET    /api/users                       - All users (admin)
//! PUT    /api/users/me                    - Partial profile edit
//! PUT    /api/users/me/shipping           - Replace shipping profile
//! GET    /api/users/{id}                  - Detail (self or admin)
//! GET    /api/users/{id}/orders           - Order history (self or admin)
//! DELETE /api/users/{id}                  - Delete (admin)
//! ```

pub mod auth;
pub mod cart;
pub mod health;
pub mod orders;
pub mod products;
pub mod users;

use axum::{
    Router,
    extract::Request,
    http::{HeaderValue, Method, header},
    routing::{get, patch, post, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tower_sessions::{SessionManagerLayer, SessionStore};

use crate::config::StorefrontConfig;
use crate::db::Store;
use crate::middleware::request_id_middleware;
use crate::state::AppState;

/// Create the auth routes router.
pub fn auth_routes<S: Store>() -> Router<AppState<S>> {
    Router::new()
        .route("/google", get(auth::google_login::<S>))
        .route("/google/callback", get(auth::google_callback::<S>))
        .route("/login/success", get(auth::login_success::<S>))
        .route("/login/failed", get(auth::login_failed))
        .route("/logout", post(auth::logout))
}

/// Create the product routes router.
pub fn product_routes<S: Store>() -> Router<AppState<S>> {
    Router::new()
        .route("/", get(products::index::<S>).post(products::create::<S>))
        .route(
            "/{id}",
            get(products::show::<S>)
                .put(products::update::<S>)
                .delete(products::destroy::<S>),
        )
}

/// Create the cart routes router.
pub fn cart_routes<S: Store>() -> Router<AppState<S>> {
    Router::new()
        .route("/", get(cart::show::<S>).delete(cart::clear::<S>))
        .route("/items", post(cart::add::<S>))
        .route(
            "/items/{product_id}",
            put(cart::update::<S>).delete(cart::remove::<S>),
        )
}

/// Create the order routes router.
pub fn order_routes<S: Store>() -> Router<AppState<S>> {
    Router::new()
        .route("/", post(orders::place::<S>).get(orders::index::<S>))
        .route("/{id}", get(orders::show::<S>))
        .route("/{id}/status", patch(orders::update_status::<S>))
}

/// Create the user routes router.
pub fn user_routes<S: Store>() -> Router<AppState<S>> {
    Router::new()
        .route("/", get(users::index::<S>))
        .route("/me", put(users::update_me::<S>))
        .route("/me/shipping", put(users::update_shipping::<S>))
        .route("/{id}", get(users::show::<S>).delete(users::destroy::<S>))
        .route("/{id}/orders", get(users::orders::<S>))
}

/// Create all routes for the storefront.
pub fn routes<S: Store>() -> Router<AppState<S>> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness::<S>))
        .nest("/auth", auth_routes())
        .nest("/api/products", product_routes())
        .nest("/api/cart", cart_routes())
        .nest("/api/orders", order_routes())
        .nest("/api/users", user_routes())
}

/// Allow credentialed requests from the configured client app.
#[must_use]
pub fn cors_layer(config: &StorefrontConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true);

    match HeaderValue::from_str(&config.client_url.origin().ascii_serialization()) {
        Ok(origin) => layer.allow_origin(origin),
        Err(e) => {
            tracing::warn!(error = %e, "Client URL is not a valid origin; CORS disabled");
            layer
        }
    }
}

/// The full application: routes, sessions, CORS, request ids and tracing.
///
/// Sentry layers are added by the binary on top of this.
pub fn app<S, T>(state: AppState<S>, session_layer: SessionManagerLayer<T>) -> Router
where
    S: Store,
    T: SessionStore + Clone,
{
    let cors = cors_layer(state.config());

    routes()
        .layer(session_layer)
        .layer(cors)
        .with_state(state)
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request| {
            tracing::info_span!(
                "http_request",
                method = %request.method(),
                uri = %request.uri(),
                request_id = tracing::field::Empty,
            )
        }))
}
