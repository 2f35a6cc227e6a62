//! Cart repository.

use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use vidriera_core::{CartId, ProductId, UserId};

use super::{RepositoryError, classify};
use crate::models::{Cart, CartLine};

#[derive(sqlx::FromRow)]
struct CartRow {
    id: CartId,
    user_id: UserId,
}

#[derive(sqlx::FromRow)]
struct CartLineRow {
    product_id: ProductId,
    quantity: i32,
    price: Decimal,
}

impl From<CartLineRow> for CartLine {
    fn from(row: CartLineRow) -> Self {
        Self {
            product_id: row.product_id,
            quantity: row.quantity,
            price: row.price,
        }
    }
}

/// Delete every line of `cart` and return what was deleted, ordered by
/// product.
///
/// The deleted rows stay locked until the surrounding transaction ends, so
/// a second checkout of the same cart waits and then finds nothing.
pub(crate) async fn take_lines(conn: &mut PgConnection, cart: CartId) -> Result<Vec<CartLine>, RepositoryError> {
    let mut lines: Vec<CartLine> = sqlx::query_as::<_, CartLineRow>(
        "DELETE FROM storefront.cart_line WHERE cart_id = $1
         RETURNING product_id, quantity, price",
    )
    .bind(cart)
    .fetch_all(conn)
    .await?
    .into_iter()
    .map(CartLine::from)
    .collect();

    lines.sort_by_key(|line| line.product_id);
    Ok(lines)
}

/// Repository for carts and their lines.
pub struct CartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CartRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn for_user(&self, user: UserId) -> Result<Option<Cart>, RepositoryError> {
        let row = sqlx::query_as::<_, CartRow>(
            "SELECT id, user_id FROM storefront.cart WHERE user_id = $1",
        )
        .bind(user)
        .fetch_optional(self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.with_lines(row).await?)),
            None => Ok(None),
        }
    }

    /// Idempotent: concurrent callers all get the same cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    pub async fn ensure(&self, user: UserId) -> Result<Cart, RepositoryError> {
        sqlx::query(
            "INSERT INTO storefront.cart (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING",
        )
        .bind(user)
        .execute(self.pool)
        .await
        .map_err(|e| match classify(e, "create cart") {
            RepositoryError::Conflict(_) => RepositoryError::NotFound,
            other => other,
        })?;

        self.for_user(user).await?.ok_or(RepositoryError::NotFound)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the cart or product vanished.
    pub async fn upsert_line(&self, cart: CartId, line: CartLine) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO storefront.cart_line (cart_id, product_id, quantity, price)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (cart_id, product_id)
             DO UPDATE SET quantity = EXCLUDED.quantity, price = EXCLUDED.price",
        )
        .bind(cart)
        .bind(line.product_id)
        .bind(line.quantity)
        .bind(line.price)
        .execute(self.pool)
        .await
        .map_err(|e| classify(e, "save cart line"))?;

        Ok(())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn delete_line(&self, cart: CartId, product: ProductId) -> Result<bool, RepositoryError> {
        let result =
            sqlx::query("DELETE FROM storefront.cart_line WHERE cart_id = $1 AND product_id = $2")
                .bind(cart)
                .bind(product)
                .execute(self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn clear(&self, cart: CartId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM storefront.cart_line WHERE cart_id = $1")
            .bind(cart)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    async fn with_lines(&self, row: CartRow) -> Result<Cart, RepositoryError> {
        let lines = sqlx::query_as::<_, CartLineRow>(
            "SELECT product_id, quantity, price FROM storefront.cart_line
             WHERE cart_id = $1 ORDER BY product_id",
        )
        .bind(row.id)
        .fetch_all(self.pool)
        .await?;

        Ok(Cart {
            id: row.id,
            user_id: row.user_id,
            lines: lines.into_iter().map(CartLine::from).collect(),
        })
    }
}
