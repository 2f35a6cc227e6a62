//! Integration tests for Vidriera.
//!
//! Everything runs against the in-process `MemoryStore` and
//! `tower_sessions::MemoryStore`, so no database is needed:
//!
//! ```bash
//! cargo test -p vidriera-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `order_workflow` - Placement, concurrency and status history at the service level
//! - `http_api` - The axum router end to end, driven with `tower::ServiceExt::oneshot`

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use axum::{
    Router,
    body::Body,
    extract::{Path, State},
    http::{Method, Request, StatusCode, header},
    routing::post,
};
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde_json::Value;
use tower::ServiceExt;
use tower_sessions::{MemoryStore as SessionMemoryStore, Session};
use url::Url;

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;

use vidriera_core::{
    CartId, Email, OrderId, ProductId, Role, ShippingInfo, StatusEntry, StatusPolicy, UserId,
};
use vidriera_storefront::config::{GoogleOAuthConfig, StorefrontConfig};
use vidriera_storefront::db::memory::MemoryUnitOfWork;
use vidriera_storefront::db::{
    CartStore, CatalogStore, MemoryStore, OrderStore, RepositoryError, Store, UserStore,
};
use vidriera_storefront::middleware::{create_session_layer, set_current_user};
use vidriera_storefront::models::{
    Cart, CartLine, CurrentUser, Order, Product, ProductDraft, ProductFilter, User,
};
use vidriera_storefront::routes;
use vidriera_storefront::state::AppState;

/// Configuration for tests; nothing is read from the environment.
#[must_use]
pub fn test_config(policy: StatusPolicy) -> StorefrontConfig {
    StorefrontConfig {
        database_url: SecretString::from("postgres://localhost/vidriera_test"),
        host: [127, 0, 0, 1].into(),
        port: 3000,
        base_url: Url::parse("http://localhost:3000").unwrap(),
        client_url: Url::parse("http://localhost:5173").unwrap(),
        session_secret: SecretString::from("k3Jx9QvL2mWp8RtY5nZb7HcF4dGs6AeU"),
        google: GoogleOAuthConfig {
            client_id: "1234.apps.googleusercontent.com".into(),
            client_secret: SecretString::from("test-client-secret"),
        },
        status_policy: policy,
        sentry_dsn: None,
        sentry_environment: None,
    }
}

pub async fn seed_user(store: &MemoryStore, email: &str, role: Role) -> CurrentUser {
    store
        .create_user(&Email::parse(email).unwrap(), None, role)
        .await
        .unwrap()
        .session_identity()
}

#[must_use]
pub fn draft(model: &str, stock: i32, base_price: i64) -> ProductDraft {
    ProductDraft {
        brand: "Samsung".into(),
        model: model.into(),
        category: "celulares".into(),
        size: Decimal::new(65, 1),
        base_price: Decimal::new(base_price, 0),
        offer_price: None,
        description: "Pantalla AMOLED".into(),
        color: "negro".into(),
        stock,
        images: vec![format!("https://cdn.tienda.com.ar/{model}.jpg")],
    }
}

pub async fn seed_product(store: &MemoryStore, model: &str, stock: i32, base_price: i64) -> Product {
    store.create_product(&draft(model, stock, base_price)).await.unwrap()
}

/// A complete shipping profile.
#[must_use]
pub fn shipping() -> ShippingInfo {
    ShippingInfo {
        name: "Ana".into(),
        surname: "Pérez".into(),
        province: "Santa Fe".into(),
        city: "Rosario".into(),
        street: "Córdoba".into(),
        number: "1234".into(),
        postal_code: "2000".into(),
        phone: "341 555 0000".into(),
        tracking_number: None,
        shipping_company: None,
    }
}

/// Sign-in shortcut standing in for the Google callback.
async fn sign_in_as(State(state): State<AppState<MemoryStore>>, session: Session, Path(id): Path<UserId>) -> StatusCode {
    match state.store().get_user(id).await {
        Ok(Some(user)) => match set_current_user(&session, &user.session_identity()).await {
            Ok(()) => StatusCode::NO_CONTENT,
            Err(_) => StatusCode::INTERNAL_SERVER_ERROR,
        },
        _ => StatusCode::NOT_FOUND,
    }
}

/// The storefront router over in-memory storage.
pub struct TestApp {
    pub store: MemoryStore,
    router: Router,
}

impl TestApp {
    #[must_use]
    pub fn new(policy: StatusPolicy) -> Self {
        let store = MemoryStore::new();
        let sessions = SessionMemoryStore::default();
        let state = AppState::new(test_config(policy), store.clone());

        let sign_in = Router::new()
            .route("/test/sign-in/{id}", post(sign_in_as))
            .layer(create_session_layer(sessions.clone(), state.config()))
            .with_state(state.clone());
        let session_layer = create_session_layer(sessions, state.config());
        let router = routes::app(state, session_layer).merge(sign_in);

        Self { store, router }
    }

    /// Sign in and return the session cookie to send back.
    pub async fn sign_in(&self, user: &CurrentUser) -> String {
        let response = self
            .router
            .clone()
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri(format!("/test/sign-in/{}", user.id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        session_cookie(&response).unwrap()
    }

    /// Send a request and return the status and JSON body (`Null` if none).
    pub async fn send(&self, method: Method, uri: &str, cookie: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let (status, _, json) = self.send_raw(method, uri, cookie, body).await;
        (status, json)
    }

    /// Like [`send`](Self::send) but also returns the response headers.
    pub async fn send_raw(
        &self,
        method: Method,
        uri: &str,
        cookie: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, axum::http::HeaderMap, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            request = request.header(header::COOKIE, cookie);
        }
        let request = match body {
            Some(json) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, headers, json)
    }
}

/// `name=value` of the session cookie set by a response, if any.
#[must_use]
pub fn session_cookie(response: &axum::response::Response) -> Option<String> {
    cookie_from(response.headers())
}

#[must_use]
pub fn cookie_from(headers: &axum::http::HeaderMap) -> Option<String> {
    headers
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|value| value.split(';').next())
        .find(|pair| pair.starts_with("vidriera_session="))
        .map(String::from)
}

/// Parse a decimal serialized as a JSON string.
#[must_use]
pub fn decimal(value: &Value) -> Decimal {
    value.as_str().unwrap().parse().unwrap()
}

// =============================================================================
// Gated store
// =============================================================================

/// A [`MemoryStore`] whose `begin` waits for the test to open a gate.
///
/// Lets a test hold placements between their pre-transaction reads and
/// their unit of work, then change the world underneath them.
#[derive(Clone)]
pub struct GatedStore {
    pub inner: MemoryStore,
    arrived: Arc<Semaphore>,
    gate: Arc<Semaphore>,
}

impl GatedStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            arrived: Arc::new(Semaphore::new(0)),
            gate: Arc::new(Semaphore::new(0)),
        }
    }

    /// Wait until `n` callers are parked in `begin`.
    pub async fn wait_for_begin(&self, n: u32) {
        self.arrived.acquire_many(n).await.unwrap().forget();
    }

    /// Let `n` parked callers through.
    pub fn open(&self, n: usize) {
        self.gate.add_permits(n);
    }
}

impl CatalogStore for GatedStore {
    fn list_products(
        &self,
        filter: &ProductFilter,
    ) -> impl Future<Output = Result<Vec<Product>, RepositoryError>> + Send {
        self.inner.list_products(filter)
    }

    fn get_product(
        &self,
        id: ProductId,
    ) -> impl Future<Output = Result<Option<Product>, RepositoryError>> + Send {
        self.inner.get_product(id)
    }

    fn get_products(
        &self,
        ids: &[ProductId],
    ) -> impl Future<Output = Result<Vec<Product>, RepositoryError>> + Send {
        self.inner.get_products(ids)
    }

    fn create_product(
        &self,
        draft: &ProductDraft,
    ) -> impl Future<Output = Result<Product, RepositoryError>> + Send {
        self.inner.create_product(draft)
    }

    fn update_product(
        &self,
        id: ProductId,
        draft: &ProductDraft,
    ) -> impl Future<Output = Result<Product, RepositoryError>> + Send {
        self.inner.update_product(id, draft)
    }

    fn delete_product(&self, id: ProductId) -> impl Future<Output = Result<(), RepositoryError>> + Send {
        self.inner.delete_product(id)
    }
}

impl CartStore for GatedStore {
    fn cart_for_user(&self, user: UserId) -> impl Future<Output = Result<Option<Cart>, RepositoryError>> + Send {
        self.inner.cart_for_user(user)
    }

    fn ensure_cart(&self, user: UserId) -> impl Future<Output = Result<Cart, RepositoryError>> + Send {
        self.inner.ensure_cart(user)
    }

    fn upsert_line(
        &self,
        cart: CartId,
        line: CartLine,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send {
        self.inner.upsert_line(cart, line)
    }

    fn delete_line(
        &self,
        cart: CartId,
        product: ProductId,
    ) -> impl Future<Output = Result<bool, RepositoryError>> + Send {
        self.inner.delete_line(cart, product)
    }

    fn clear_lines(&self, cart: CartId) -> impl Future<Output = Result<(), RepositoryError>> + Send {
        self.inner.clear_lines(cart)
    }
}

impl UserStore for GatedStore {
    fn get_user(&self, id: UserId) -> impl Future<Output = Result<Option<User>, RepositoryError>> + Send {
        self.inner.get_user(id)
    }

    fn find_by_google_id(
        &self,
        google_id: &str,
    ) -> impl Future<Output = Result<Option<User>, RepositoryError>> + Send {
        self.inner.find_by_google_id(google_id)
    }

    fn find_by_email(&self, email: &Email) -> impl Future<Output = Result<Option<User>, RepositoryError>> + Send {
        self.inner.find_by_email(email)
    }

    fn create_user(
        &self,
        email: &Email,
        google_id: Option<&str>,
        role: Role,
    ) -> impl Future<Output = Result<User, RepositoryError>> + Send {
        self.inner.create_user(email, google_id, role)
    }

    fn link_google_id(
        &self,
        id: UserId,
        google_id: &str,
    ) -> impl Future<Output = Result<User, RepositoryError>> + Send {
        self.inner.link_google_id(id, google_id)
    }

    fn set_role(&self, id: UserId, role: Role) -> impl Future<Output = Result<User, RepositoryError>> + Send {
        self.inner.set_role(id, role)
    }

    fn update_shipping(
        &self,
        id: UserId,
        shipping: &ShippingInfo,
    ) -> impl Future<Output = Result<User, RepositoryError>> + Send {
        self.inner.update_shipping(id, shipping)
    }

    fn list_users(&self) -> impl Future<Output = Result<Vec<User>, RepositoryError>> + Send {
        self.inner.list_users()
    }

    fn delete_user(&self, id: UserId) -> impl Future<Output = Result<(), RepositoryError>> + Send {
        self.inner.delete_user(id)
    }
}

impl OrderStore for GatedStore {
    fn get_order(&self, id: OrderId) -> impl Future<Output = Result<Option<Order>, RepositoryError>> + Send {
        self.inner.get_order(id)
    }

    fn orders_for_user(&self, user: UserId) -> impl Future<Output = Result<Vec<Order>, RepositoryError>> + Send {
        self.inner.orders_for_user(user)
    }

    fn all_orders(&self) -> impl Future<Output = Result<Vec<Order>, RepositoryError>> + Send {
        self.inner.all_orders()
    }

    fn append_status(
        &self,
        id: OrderId,
        entry: StatusEntry,
        tracking_number: Option<&str>,
        shipping_company: Option<&str>,
    ) -> impl Future<Output = Result<Order, RepositoryError>> + Send {
        self.inner
            .append_status(id, entry, tracking_number, shipping_company)
    }
}

impl Store for GatedStore {
    type Tx = MemoryUnitOfWork;

    async fn begin(&self) -> Result<MemoryUnitOfWork, RepositoryError> {
        self.arrived.add_permits(1);
        self.gate
            .acquire()
            .await
            .map_err(|e| RepositoryError::Conflict(e.to_string()))?
            .forget();
        self.inner.begin().await
    }

    fn ping(&self) -> impl Future<Output = Result<(), RepositoryError>> + Send {
        self.inner.ping()
    }
}
