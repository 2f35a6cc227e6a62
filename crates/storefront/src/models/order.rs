//! Order types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use vidriera_core::{
    OrderId, OrderNumber, OrderStatus, PaymentMethod, ProductId, ShippingInfo, StatusEntry,
    UserId, line_total,
};

use super::ProductSummary;

/// A placed order.
///
/// Lines, total, payment method and most of the shipping snapshot are frozen
/// at placement. Only the status history (append-only) and the tracking
/// fields of `shipping` change afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub number: OrderNumber,
    pub user_id: UserId,
    pub lines: Vec<OrderLine>,
    pub shipping: ShippingInfo,
    pub total: Decimal,
    pub payment_method: PaymentMethod,
    /// Oldest first. Never empty: placement records `creado`.
    pub history: Vec<StatusEntry>,
    pub created_at: DateTime<Utc>,
}

impl Order {
    #[must_use]
    pub fn status(&self) -> OrderStatus {
        self.history
            .last()
            .map_or(OrderStatus::Created, |entry| entry.status)
    }
}

/// Line snapshot taken when the order was placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub quantity: i32,
    pub price_at_purchase: Decimal,
}

impl OrderLine {
    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        line_total(self.price_at_purchase, self.quantity)
    }
}

/// Everything needed to insert an order inside a unit of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub number: OrderNumber,
    pub user_id: UserId,
    pub lines: Vec<OrderLine>,
    pub shipping: ShippingInfo,
    pub payment_method: PaymentMethod,
    pub placed_at: DateTime<Utc>,
}

impl NewOrder {
    /// Σ quantity × price at purchase.
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.lines.iter().map(OrderLine::subtotal).sum()
    }
}

/// Order with line products resolved, as returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderView {
    pub id: OrderId,
    pub number: OrderNumber,
    /// `#0042`-style label.
    pub label: String,
    pub user_id: UserId,
    pub status: OrderStatus,
    pub lines: Vec<OrderLineView>,
    pub shipping: ShippingInfo,
    pub total: Decimal,
    pub payment_method: PaymentMethod,
    pub history: Vec<StatusEntry>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderLineView {
    pub product_id: ProductId,
    pub quantity: i32,
    pub price_at_purchase: Decimal,
    pub subtotal: Decimal,
    pub product: Option<ProductSummary>,
}

impl OrderView {
    pub fn build(order: Order, mut lookup: impl FnMut(ProductId) -> Option<ProductSummary>) -> Self {
        let status = order.status();
        let lines = order
            .lines
            .iter()
            .map(|line| OrderLineView {
                product_id: line.product_id,
                quantity: line.quantity,
                price_at_purchase: line.price_at_purchase,
                subtotal: line.subtotal(),
                product: lookup(line.product_id),
            })
            .collect();

        Self {
            id: order.id,
            number: order.number,
            label: order.number.to_string(),
            user_id: order.user_id,
            status,
            lines,
            shipping: order.shipping,
            total: order.total,
            payment_method: order.payment_method,
            history: order.history,
            created_at: order.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_sums_line_snapshots() {
        let order = NewOrder {
            number: OrderNumber::new(1),
            user_id: UserId::new(1),
            lines: vec![
                OrderLine {
                    product_id: ProductId::new(1),
                    quantity: 3,
                    price_at_purchase: Decimal::new(1_000, 0),
                },
                OrderLine {
                    product_id: ProductId::new(2),
                    quantity: 1,
                    price_at_purchase: Decimal::new(250, 0),
                },
            ],
            shipping: ShippingInfo::default(),
            payment_method: PaymentMethod::Transferencia,
            placed_at: Utc::now(),
        };
        assert_eq!(order.total(), Decimal::new(3_250, 0));
    }

    #[test]
    fn test_status_is_last_history_entry() {
        let now = Utc::now();
        let order = Order {
            id: OrderId::new(1),
            number: OrderNumber::new(1),
            user_id: UserId::new(1),
            lines: Vec::new(),
            shipping: ShippingInfo::default(),
            total: Decimal::ZERO,
            payment_method: PaymentMethod::Mercadopago,
            history: vec![
                StatusEntry {
                    status: OrderStatus::Created,
                    timestamp: now,
                },
                StatusEntry {
                    status: OrderStatus::Shipped,
                    timestamp: now,
                },
            ],
            created_at: now,
        };
        assert_eq!(order.status(), OrderStatus::Shipped);
        assert_eq!(OrderView::build(order, |_| None).label, "#0001");
    }
}
