//! Storage for the storefront.
//!
//! # Database: `vidriera`
//!
//! ## Tables (schema `storefront`)
//!
//! - `product` - Catalog, with non-negative `stock`
//! - `user` - Accounts and their default shipping profile
//! - `cart` / `cart_line` - One cart per user, one line per product
//! - `order` / `order_line` / `order_status` - Placed orders and their
//!   append-only status history
//! - `order_counter` - Atomic order number sequence
//! - `tower_sessions.session` - Session storage
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p vidriera-cli -- migrate
//! ```
//!
//! # Seams
//!
//! Services are written against the [`Store`] family of traits. [`PgStore`]
//! is the production implementation; [`MemoryStore`] keeps everything in
//! process for tests and local runs.

pub mod carts;
pub mod memory;
pub mod orders;
pub mod postgres;
pub mod products;
pub mod users;

use std::future::Future;
use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use vidriera_core::{CartId, Email, OrderId, OrderNumber, ProductId, Role, ShippingInfo, StatusEntry, UserId};

use crate::models::{Cart, CartLine, NewOrder, Order, Product, ProductDraft, ProductFilter, User};

pub use carts::CartRepository;
pub use memory::MemoryStore;
pub use orders::OrderRepository;
pub use postgres::{PgStore, PgUnitOfWork};
pub use products::ProductRepository;
pub use users::UserRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation or lost concurrent update.
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Translate constraint violations and lost concurrent updates into
/// [`RepositoryError::Conflict`]; everything else stays a database error.
pub(crate) fn classify(e: sqlx::Error, context: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e {
        if db_err.is_unique_violation() || db_err.is_foreign_key_violation() {
            return RepositoryError::Conflict(format!("{context}: {}", db_err.message()));
        }
        // serialization_failure, deadlock_detected
        if matches!(db_err.code().as_deref(), Some("40001" | "40P01")) {
            return RepositoryError::Conflict(format!("{context}: concurrent update"));
        }
    }
    RepositoryError::Database(e)
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Catalog reads and admin writes.
pub trait CatalogStore {
    /// Products matching `filter`, ordered by id.
    fn list_products(
        &self,
        filter: &ProductFilter,
    ) -> impl Future<Output = Result<Vec<Product>, RepositoryError>> + Send;

    fn get_product(
        &self,
        id: ProductId,
    ) -> impl Future<Output = Result<Option<Product>, RepositoryError>> + Send;

    /// Products with the given ids. Missing ids are skipped.
    fn get_products(
        &self,
        ids: &[ProductId],
    ) -> impl Future<Output = Result<Vec<Product>, RepositoryError>> + Send;

    fn create_product(
        &self,
        draft: &ProductDraft,
    ) -> impl Future<Output = Result<Product, RepositoryError>> + Send;

    /// Replace every editable field. [`RepositoryError::NotFound`] if missing.
    fn update_product(
        &self,
        id: ProductId,
        draft: &ProductDraft,
    ) -> impl Future<Output = Result<Product, RepositoryError>> + Send;

    /// Delete a product, removing it from every cart.
    ///
    /// [`RepositoryError::Conflict`] if any order line references it.
    fn delete_product(
        &self,
        id: ProductId,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;
}

/// Cart persistence. Every call is a single-statement write.
pub trait CartStore {
    fn cart_for_user(
        &self,
        user: UserId,
    ) -> impl Future<Output = Result<Option<Cart>, RepositoryError>> + Send;

    /// Create the user's cart if it does not exist and return it.
    fn ensure_cart(&self, user: UserId) -> impl Future<Output = Result<Cart, RepositoryError>> + Send;

    /// Insert or replace the line for `line.product_id`.
    fn upsert_line(
        &self,
        cart: CartId,
        line: CartLine,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// Returns `false` when there was no such line.
    fn delete_line(
        &self,
        cart: CartId,
        product: ProductId,
    ) -> impl Future<Output = Result<bool, RepositoryError>> + Send;

    fn clear_lines(&self, cart: CartId) -> impl Future<Output = Result<(), RepositoryError>> + Send;
}

/// Account persistence.
pub trait UserStore {
    fn get_user(&self, id: UserId) -> impl Future<Output = Result<Option<User>, RepositoryError>> + Send;

    fn find_by_google_id(
        &self,
        google_id: &str,
    ) -> impl Future<Output = Result<Option<User>, RepositoryError>> + Send;

    fn find_by_email(
        &self,
        email: &Email,
    ) -> impl Future<Output = Result<Option<User>, RepositoryError>> + Send;

    /// Create a user together with its empty cart, atomically.
    ///
    /// [`RepositoryError::Conflict`] if the email or Google id is taken.
    fn create_user(
        &self,
        email: &Email,
        google_id: Option<&str>,
        role: Role,
    ) -> impl Future<Output = Result<User, RepositoryError>> + Send;

    fn link_google_id(
        &self,
        id: UserId,
        google_id: &str,
    ) -> impl Future<Output = Result<User, RepositoryError>> + Send;

    fn set_role(&self, id: UserId, role: Role) -> impl Future<Output = Result<User, RepositoryError>> + Send;

    fn update_shipping(
        &self,
        id: UserId,
        shipping: &ShippingInfo,
    ) -> impl Future<Output = Result<User, RepositoryError>> + Send;

    fn list_users(&self) -> impl Future<Output = Result<Vec<User>, RepositoryError>> + Send;

    /// Delete a user and their cart.
    ///
    /// [`RepositoryError::Conflict`] if the user has placed orders.
    fn delete_user(&self, id: UserId) -> impl Future<Output = Result<(), RepositoryError>> + Send;
}

/// Order reads and status history writes.
pub trait OrderStore {
    fn get_order(&self, id: OrderId) -> impl Future<Output = Result<Option<Order>, RepositoryError>> + Send;

    /// A user's orders, newest first.
    fn orders_for_user(
        &self,
        user: UserId,
    ) -> impl Future<Output = Result<Vec<Order>, RepositoryError>> + Send;

    /// Every order, newest first.
    fn all_orders(&self) -> impl Future<Output = Result<Vec<Order>, RepositoryError>> + Send;

    /// Append one history entry and overwrite the tracking fields that are
    /// `Some`. Existing entries are never touched.
    fn append_status(
        &self,
        id: OrderId,
        entry: StatusEntry,
        tracking_number: Option<&str>,
        shipping_company: Option<&str>,
    ) -> impl Future<Output = Result<Order, RepositoryError>> + Send;
}

/// One all-or-nothing group of writes used by order placement.
///
/// Nothing is visible to other callers until [`commit`](Self::commit).
/// Dropping a unit without committing discards every change.
pub trait UnitOfWork: Send + Sized {
    /// Decrement stock by `quantity` if at least that much is available.
    ///
    /// Returns `false`, changing nothing, when stock is short.
    fn reserve_stock(
        &mut self,
        product: ProductId,
        quantity: i32,
    ) -> impl Future<Output = Result<bool, RepositoryError>> + Send;

    /// Take the next value of the order number counter.
    fn next_order_number(&mut self) -> impl Future<Output = Result<OrderNumber, RepositoryError>> + Send;

    /// Insert an order with its lines and an initial `creado` entry.
    fn insert_order(
        &mut self,
        order: &NewOrder,
    ) -> impl Future<Output = Result<Order, RepositoryError>> + Send;

    /// Empty the cart and return the lines it held, ordered by product.
    ///
    /// Concurrent units taking the same cart are serialized: the later one
    /// sees the cart as the earlier one left it.
    fn take_cart_lines(
        &mut self,
        cart: CartId,
    ) -> impl Future<Output = Result<Vec<CartLine>, RepositoryError>> + Send;

    fn commit(self) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    fn rollback(self) -> impl Future<Output = Result<(), RepositoryError>> + Send;
}

/// Everything the services need from storage.
pub trait Store:
    CatalogStore + CartStore + UserStore + OrderStore + Clone + Send + Sync + 'static
{
    type Tx: UnitOfWork;

    /// Open a unit of work.
    fn begin(&self) -> impl Future<Output = Result<Self::Tx, RepositoryError>> + Send;

    /// Cheap connectivity check for readiness probes.
    fn ping(&self) -> impl Future<Output = Result<(), RepositoryError>> + Send;
}
