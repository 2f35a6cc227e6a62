//! Order placement and the order status history.
//!
//! # Placement
//!
//! Validation runs first and writes nothing: the cart must be non-empty,
//! every line must still be covered by stock, the shipping snapshot must be
//! complete and the payment method known. Then one unit of work decrements
//! stock with a guarded update per line, takes the next order number,
//! inserts the order with status `creado` and clears the cart. The cart is
//! taken back inside the unit and must still match what was validated, so a
//! cart is ordered at most once. If any guard fails inside the unit,
//! everything is rolled back and the caller gets a retryable
//! [`ShopError::Conflict`].

use std::collections::HashMap;

use chrono::Utc;
use serde::Deserialize;
use tracing::instrument;

use vidriera_core::{
    OrderId, OrderStatus, PaymentMethod, ProductId, ShippingInfo, StatusEntry, StatusPolicy, UserId,
};

use super::{Action, Resource, ShopError, authorize};
use crate::db::{RepositoryError, Store, UnitOfWork};
use crate::models::{CurrentUser, NewOrder, Order, OrderLine, OrderView, Product};

/// Checkout request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlaceOrder {
    /// Falls back to the user's saved shipping profile when absent.
    #[serde(default)]
    pub shipping_info: Option<ShippingInfo>,
    #[serde(default)]
    pub payment_method: Option<String>,
}

/// Admin status update.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusChange {
    pub status: String,
    #[serde(default)]
    pub tracking_number: Option<String>,
    #[serde(default)]
    pub shipping_company: Option<String>,
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

pub struct OrderService<'a, S> {
    store: &'a S,
    policy: StatusPolicy,
}

impl<'a, S: Store> OrderService<'a, S> {
    #[must_use]
    pub const fn new(store: &'a S, policy: StatusPolicy) -> Self {
        Self { store, policy }
    }

    /// Turn the actor's cart into an order.
    ///
    /// # Errors
    ///
    /// - `ShopError::EmptyCart` if there is nothing to order
    /// - `ShopError::InsufficientStock` if a line exceeds current stock
    /// - `ShopError::IncompleteShippingInfo` if required shipping fields are blank
    /// - `ShopError::InvalidPaymentMethod` if the method is missing or unknown
    /// - `ShopError::Conflict` if another order took the stock first, or the
    ///   cart was checked out or edited while this placement was running
    #[instrument(skip(self, actor, request), fields(user_id = %actor.id))]
    pub async fn place(&self, actor: &CurrentUser, request: PlaceOrder) -> Result<OrderView, ShopError> {
        let cart = self
            .store
            .cart_for_user(actor.id)
            .await?
            .filter(|cart| !cart.is_empty())
            .ok_or(ShopError::EmptyCart)?;

        let ids: Vec<ProductId> = cart.lines.iter().map(|l| l.product_id).collect();
        let products = self.products_for(ids).await?;
        let mut lines = Vec::with_capacity(cart.lines.len());
        for line in &cart.lines {
            let product = products
                .get(&line.product_id)
                .ok_or(ShopError::NotFound("product"))?;
            if product.stock < line.quantity {
                return Err(ShopError::InsufficientStock {
                    product: product.display_name(),
                    available: product.stock,
                });
            }
            lines.push(OrderLine {
                product_id: line.product_id,
                quantity: line.quantity,
                price_at_purchase: line.price,
            });
        }
        // Fixed lock order across concurrent placements.
        lines.sort_by_key(|line| line.product_id);

        let shipping = self.shipping_snapshot(actor.id, request.shipping_info).await?;
        let missing = shipping.missing_fields();
        if !missing.is_empty() {
            return Err(ShopError::IncompleteShippingInfo { missing });
        }

        let raw_method = request.payment_method.unwrap_or_default();
        let payment_method = raw_method
            .parse::<PaymentMethod>()
            .map_err(|_| ShopError::InvalidPaymentMethod(raw_method.clone()))?;

        let mut snapshot = cart.lines.clone();
        snapshot.sort_by_key(|line| line.product_id);

        let mut tx = self.store.begin().await?;
        // The cart is taken first: a second checkout of the same cart, or a
        // cart edit made since the snapshot, must not turn into an order.
        let taken = tx.take_cart_lines(cart.id).await?;
        if taken != snapshot {
            tx.rollback().await?;
            tracing::warn!(cart_id = %cart.id, "Cart changed while placing the order");
            return Err(ShopError::Conflict(if taken.is_empty() {
                "cart was already checked out".into()
            } else {
                "cart changed while placing the order".into()
            }));
        }

        for line in &lines {
            if !tx.reserve_stock(line.product_id, line.quantity).await? {
                tx.rollback().await?;
                let name = products
                    .get(&line.product_id)
                    .map_or_else(|| line.product_id.to_string(), Product::display_name);
                tracing::warn!(product_id = %line.product_id, "Stock taken by a concurrent order");
                return Err(ShopError::Conflict(format!("{name} sold out while placing the order")));
            }
        }

        let number = tx.next_order_number().await?;
        let new_order = NewOrder {
            number,
            user_id: actor.id,
            lines,
            shipping,
            payment_method,
            placed_at: Utc::now(),
        };
        let order = tx.insert_order(&new_order).await?;
        tx.commit().await?;

        tracing::info!(
            order_id = %order.id,
            order_number = %order.number,
            total = %order.total,
            "Order placed"
        );
        Ok(OrderView::build(order, |id| products.get(&id).map(Product::summary)))
    }

    /// # Errors
    ///
    /// Returns `ShopError::NotFound` if the order does not exist and
    /// `ShopError::Forbidden` if it belongs to someone else.
    pub async fn get(&self, actor: &CurrentUser, id: OrderId) -> Result<OrderView, ShopError> {
        let order = self.order(id).await?;
        authorize(actor, Action::View, Resource::Order { owner: order.user_id })?;
        self.view(order).await
    }

    /// A user's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `ShopError::Forbidden` if the actor may not see them.
    pub async fn list_for_user(&self, actor: &CurrentUser, user: UserId) -> Result<Vec<OrderView>, ShopError> {
        authorize(actor, Action::View, Resource::OrdersOf(user))?;
        let orders = self.store.orders_for_user(user).await?;
        self.views(orders).await
    }

    /// Every order, newest first.
    ///
    /// # Errors
    ///
    /// Returns `ShopError::Forbidden` for non-admins.
    pub async fn list_all(&self, actor: &CurrentUser) -> Result<Vec<OrderView>, ShopError> {
        authorize(actor, Action::View, Resource::AllOrders)?;
        let orders = self.store.all_orders().await?;
        self.views(orders).await
    }

    /// Append a status entry and overwrite tracking details.
    ///
    /// Prior entries are never modified. Blank tracking fields are ignored.
    ///
    /// # Errors
    ///
    /// - `ShopError::Forbidden` for non-admins
    /// - `ShopError::InvalidStatus` if `change.status` is not a known status
    /// - `ShopError::NotFound` if the order does not exist
    /// - `ShopError::InvalidTransition` if the configured policy refuses it
    #[instrument(skip(self, actor, change), fields(user_id = %actor.id, status = %change.status))]
    pub async fn transition(
        &self,
        actor: &CurrentUser,
        id: OrderId,
        change: StatusChange,
    ) -> Result<OrderView, ShopError> {
        authorize(actor, Action::Edit, Resource::OrderStatus)?;
        let next = change
            .status
            .parse::<OrderStatus>()
            .map_err(|_| ShopError::InvalidStatus(change.status.clone()))?;

        let current = self.order(id).await?.status();
        self.policy.check(current, next)?;
        if current.is_terminal() {
            tracing::warn!(from = %current, to = %next, "Order leaves a terminal status");
        }

        let entry = StatusEntry {
            status: next,
            timestamp: Utc::now(),
        };
        let order = match self
            .store
            .append_status(
                id,
                entry,
                non_blank(change.tracking_number.as_deref()),
                non_blank(change.shipping_company.as_deref()),
            )
            .await
        {
            Ok(order) => order,
            Err(RepositoryError::NotFound) => return Err(ShopError::NotFound("order")),
            Err(e) => return Err(e.into()),
        };

        tracing::info!(from = %current, to = %next, "Order status changed");
        self.view(order).await
    }

    async fn order(&self, id: OrderId) -> Result<Order, ShopError> {
        self.store
            .get_order(id)
            .await?
            .ok_or(ShopError::NotFound("order"))
    }

    /// The explicit request snapshot, or the user's saved profile.
    async fn shipping_snapshot(
        &self,
        user: UserId,
        requested: Option<ShippingInfo>,
    ) -> Result<ShippingInfo, ShopError> {
        let info = match requested {
            Some(info) => info,
            None => {
                self.store
                    .get_user(user)
                    .await?
                    .ok_or(ShopError::NotFound("user"))?
                    .shipping
            }
        };
        // Tracking details are set by admins after placement.
        Ok(ShippingInfo {
            tracking_number: None,
            shipping_company: None,
            ..info.trimmed()
        })
    }

    async fn products_for(&self, mut ids: Vec<ProductId>) -> Result<HashMap<ProductId, Product>, ShopError> {
        ids.sort_unstable();
        ids.dedup();
        Ok(self
            .store
            .get_products(&ids)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect())
    }

    async fn view(&self, order: Order) -> Result<OrderView, ShopError> {
        let mut views = self.views(vec![order]).await?;
        views.pop().ok_or(ShopError::NotFound("order"))
    }

    async fn views(&self, orders: Vec<Order>) -> Result<Vec<OrderView>, ShopError> {
        let ids: Vec<ProductId> = orders
            .iter()
            .flat_map(|o| o.lines.iter().map(|l| l.product_id))
            .collect();
        let products = self.products_for(ids).await?;
        Ok(orders
            .into_iter()
            .map(|order| OrderView::build(order, |id| products.get(&id).map(Product::summary)))
            .collect())
    }
}
