//! Cart service.
//!
//! Stock checks here are advisory: they read current stock without reserving
//! it. The authoritative check happens when the order is placed.

use std::collections::HashMap;

use tracing::instrument;

use vidriera_core::{ProductId, UserId};

use super::ShopError;
use crate::db::{CartStore, CatalogStore, RepositoryError};
use crate::models::{Cart, CartLine, CartView, Product};

pub struct CartService<'a, S> {
    store: &'a S,
}

impl<'a, S: CartStore + CatalogStore + Sync> CartService<'a, S> {
    #[must_use]
    pub const fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// The user's cart with products resolved. No stock re-validation.
    ///
    /// # Errors
    ///
    /// Returns `ShopError::NotFound` if the user does not exist.
    pub async fn read(&self, user: UserId) -> Result<CartView, ShopError> {
        let cart = self.cart(user).await?;
        self.view(&cart).await
    }

    /// Add one unit of `product`, or create a line with quantity 1.
    ///
    /// The line price is re-captured at the product's current effective
    /// price either way.
    ///
    /// # Errors
    ///
    /// - `ShopError::NotFound` if the product does not exist
    /// - `ShopError::OutOfStock` if the product has no stock
    /// - `ShopError::InsufficientStock` if stock cannot cover one more unit
    #[instrument(skip(self))]
    pub async fn add_line(&self, user: UserId, product: ProductId) -> Result<CartView, ShopError> {
        let item = self.product(product).await?;
        if item.stock < 1 {
            return Err(ShopError::OutOfStock {
                product: item.display_name(),
            });
        }

        let cart = self.cart(user).await?;
        let quantity = cart.line(product).map_or(1, |line| line.quantity + 1);
        if item.stock < quantity {
            return Err(ShopError::InsufficientStock {
                product: item.display_name(),
                available: item.stock,
            });
        }

        self.save_line(&cart, &item, quantity).await?;
        tracing::debug!(quantity, "Cart line added");
        self.read(user).await
    }

    /// Set the quantity of an existing line and refresh its price.
    ///
    /// # Errors
    ///
    /// - `ShopError::InvalidQuantity` if `quantity < 1`
    /// - `ShopError::NotFound` if the cart has no line for `product`
    /// - `ShopError::InsufficientStock` if stock is below `quantity`
    #[instrument(skip(self))]
    pub async fn update_line_quantity(
        &self,
        user: UserId,
        product: ProductId,
        quantity: i32,
    ) -> Result<CartView, ShopError> {
        if quantity < 1 {
            return Err(ShopError::InvalidQuantity);
        }

        let cart = self.cart(user).await?;
        if cart.line(product).is_none() {
            return Err(ShopError::NotFound("cart line"));
        }
        let item = self.product(product).await?;
        if item.stock < quantity {
            return Err(ShopError::InsufficientStock {
                product: item.display_name(),
                available: item.stock,
            });
        }

        self.save_line(&cart, &item, quantity).await?;
        self.read(user).await
    }

    /// # Errors
    ///
    /// Returns `ShopError::NotFound` if the cart has no line for `product`.
    #[instrument(skip(self))]
    pub async fn remove_line(&self, user: UserId, product: ProductId) -> Result<CartView, ShopError> {
        let cart = self.cart(user).await?;
        if !self.store.delete_line(cart.id, product).await? {
            return Err(ShopError::NotFound("cart line"));
        }
        self.read(user).await
    }

    /// # Errors
    ///
    /// Returns `ShopError::NotFound` if the user does not exist.
    #[instrument(skip(self))]
    pub async fn clear(&self, user: UserId) -> Result<CartView, ShopError> {
        let cart = self.cart(user).await?;
        self.store.clear_lines(cart.id).await?;
        self.read(user).await
    }

    /// The user's cart, created on first use.
    async fn cart(&self, user: UserId) -> Result<Cart, ShopError> {
        match self.store.ensure_cart(user).await {
            Ok(cart) => Ok(cart),
            Err(RepositoryError::NotFound) => Err(ShopError::NotFound("user")),
            Err(e) => Err(e.into()),
        }
    }

    async fn product(&self, id: ProductId) -> Result<Product, ShopError> {
        self.store
            .get_product(id)
            .await?
            .ok_or(ShopError::NotFound("product"))
    }

    async fn save_line(&self, cart: &Cart, product: &Product, quantity: i32) -> Result<(), ShopError> {
        let line = CartLine {
            product_id: product.id,
            quantity,
            price: product.price(),
        };
        match self.store.upsert_line(cart.id, line).await {
            Ok(()) => Ok(()),
            // The product was deleted between the read and the write.
            Err(RepositoryError::Conflict(_)) => Err(ShopError::NotFound("product")),
            Err(e) => Err(e.into()),
        }
    }

    async fn view(&self, cart: &Cart) -> Result<CartView, ShopError> {
        let ids: Vec<ProductId> = cart.lines.iter().map(|line| line.product_id).collect();
        let products: HashMap<ProductId, Product> = self
            .store
            .get_products(&ids)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        Ok(CartView::build(cart, |id| products.get(&id).map(Product::summary)))
    }
}
