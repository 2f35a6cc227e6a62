//! `PostgreSQL` implementation of the storage traits.

use sqlx::{PgPool, Postgres, Transaction};

use vidriera_core::{
    CartId, Email, OrderId, OrderNumber, ProductId, Role, ShippingInfo, StatusEntry, UserId,
};

use super::{
    CartRepository, CartStore, CatalogStore, OrderRepository, OrderStore, ProductRepository,
    RepositoryError, Store, UnitOfWork, UserRepository, UserStore, carts, classify, orders,
};
use crate::models::{Cart, CartLine, NewOrder, Order, Product, ProductDraft, ProductFilter, User};

/// Storage backed by a `PostgreSQL` pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl CatalogStore for PgStore {
    async fn list_products(&self, filter: &ProductFilter) -> Result<Vec<Product>, RepositoryError> {
        ProductRepository::new(&self.pool).list(filter).await
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        ProductRepository::new(&self.pool).get(id).await
    }

    async fn get_products(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        ProductRepository::new(&self.pool).get_many(ids).await
    }

    async fn create_product(&self, draft: &ProductDraft) -> Result<Product, RepositoryError> {
        ProductRepository::new(&self.pool).create(draft).await
    }

    async fn update_product(
        &self,
        id: ProductId,
        draft: &ProductDraft,
    ) -> Result<Product, RepositoryError> {
        ProductRepository::new(&self.pool).update(id, draft).await
    }

    async fn delete_product(&self, id: ProductId) -> Result<(), RepositoryError> {
        ProductRepository::new(&self.pool).delete(id).await
    }
}

impl CartStore for PgStore {
    async fn cart_for_user(&self, user: UserId) -> Result<Option<Cart>, RepositoryError> {
        CartRepository::new(&self.pool).for_user(user).await
    }

    async fn ensure_cart(&self, user: UserId) -> Result<Cart, RepositoryError> {
        CartRepository::new(&self.pool).ensure(user).await
    }

    async fn upsert_line(&self, cart: CartId, line: CartLine) -> Result<(), RepositoryError> {
        CartRepository::new(&self.pool).upsert_line(cart, line).await
    }

    async fn delete_line(&self, cart: CartId, product: ProductId) -> Result<bool, RepositoryError> {
        CartRepository::new(&self.pool).delete_line(cart, product).await
    }

    async fn clear_lines(&self, cart: CartId) -> Result<(), RepositoryError> {
        CartRepository::new(&self.pool).clear(cart).await
    }
}

impl UserStore for PgStore {
    async fn get_user(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        UserRepository::new(&self.pool).get_by_id(id).await
    }

    async fn find_by_google_id(&self, google_id: &str) -> Result<Option<User>, RepositoryError> {
        UserRepository::new(&self.pool).get_by_google_id(google_id).await
    }

    async fn find_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        UserRepository::new(&self.pool).get_by_email(email).await
    }

    async fn create_user(
        &self,
        email: &Email,
        google_id: Option<&str>,
        role: Role,
    ) -> Result<User, RepositoryError> {
        UserRepository::new(&self.pool).create(email, google_id, role).await
    }

    async fn link_google_id(&self, id: UserId, google_id: &str) -> Result<User, RepositoryError> {
        UserRepository::new(&self.pool).link_google_id(id, google_id).await
    }

    async fn set_role(&self, id: UserId, role: Role) -> Result<User, RepositoryError> {
        UserRepository::new(&self.pool).set_role(id, role).await
    }

    async fn update_shipping(
        &self,
        id: UserId,
        shipping: &ShippingInfo,
    ) -> Result<User, RepositoryError> {
        UserRepository::new(&self.pool).update_shipping(id, shipping).await
    }

    async fn list_users(&self) -> Result<Vec<User>, RepositoryError> {
        UserRepository::new(&self.pool).list().await
    }

    async fn delete_user(&self, id: UserId) -> Result<(), RepositoryError> {
        UserRepository::new(&self.pool).delete(id).await
    }
}

impl OrderStore for PgStore {
    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        OrderRepository::new(&self.pool).get(id).await
    }

    async fn orders_for_user(&self, user: UserId) -> Result<Vec<Order>, RepositoryError> {
        OrderRepository::new(&self.pool).for_user(user).await
    }

    async fn all_orders(&self) -> Result<Vec<Order>, RepositoryError> {
        OrderRepository::new(&self.pool).all().await
    }

    async fn append_status(
        &self,
        id: OrderId,
        entry: StatusEntry,
        tracking_number: Option<&str>,
        shipping_company: Option<&str>,
    ) -> Result<Order, RepositoryError> {
        OrderRepository::new(&self.pool)
            .append_status(id, entry, tracking_number, shipping_company)
            .await
    }
}

impl Store for PgStore {
    type Tx = PgUnitOfWork;

    async fn begin(&self) -> Result<PgUnitOfWork, RepositoryError> {
        Ok(PgUnitOfWork {
            tx: self.pool.begin().await?,
        })
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// A unit of work over one database transaction.
///
/// Dropping it without [`commit`](UnitOfWork::commit) rolls the transaction
/// back.
pub struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

impl UnitOfWork for PgUnitOfWork {
    async fn reserve_stock(&mut self, product: ProductId, quantity: i32) -> Result<bool, RepositoryError> {
        // The row lock taken here is held until commit, so a competing
        // placement for the same product waits and then re-checks the guard.
        let result = sqlx::query(
            "UPDATE storefront.product
             SET stock = stock - $2, updated_at = now()
             WHERE id = $1 AND stock >= $2",
        )
        .bind(product)
        .bind(quantity)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| classify(e, "reserve stock"))?;

        Ok(result.rows_affected() == 1)
    }

    async fn next_order_number(&mut self) -> Result<OrderNumber, RepositoryError> {
        let seq: i64 = sqlx::query_scalar(
            "INSERT INTO storefront.order_counter AS c (name, seq) VALUES ('orders', 1)
             ON CONFLICT (name) DO UPDATE SET seq = c.seq + 1
             RETURNING seq",
        )
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| classify(e, "order counter"))?;

        Ok(OrderNumber::new(seq))
    }

    async fn insert_order(&mut self, order: &NewOrder) -> Result<Order, RepositoryError> {
        orders::insert(&mut *self.tx, order).await
    }

    async fn take_cart_lines(&mut self, cart: CartId) -> Result<Vec<CartLine>, RepositoryError> {
        carts::take_lines(&mut *self.tx, cart).await
    }

    async fn commit(self) -> Result<(), RepositoryError> {
        self.tx
            .commit()
            .await
            .map_err(|e| classify(e, "commit order"))
    }

    async fn rollback(self) -> Result<(), RepositoryError> {
        self.tx.rollback().await?;
        Ok(())
    }
}
