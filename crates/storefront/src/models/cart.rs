//! Cart types.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use vidriera_core::{CartId, ProductId, UserId, line_total};

use super::ProductSummary;

/// A user's cart as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    pub id: CartId,
    pub user_id: UserId,
    /// At most one line per product, ordered by product id.
    pub lines: Vec<CartLine>,
}

impl Cart {
    #[must_use]
    pub fn line(&self, product: ProductId) -> Option<&CartLine> {
        self.lines.iter().find(|line| line.product_id == product)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// One product in a cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    /// Always at least 1.
    pub quantity: i32,
    /// Effective unit price captured the last time the line was added or
    /// updated. This is the price the order is placed at.
    pub price: Decimal,
}

/// Cart with product details resolved, as returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartView {
    pub id: CartId,
    pub lines: Vec<CartLineView>,
    pub total: Decimal,
}

/// Cart line with its product resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartLineView {
    pub product_id: ProductId,
    pub quantity: i32,
    pub price: Decimal,
    pub subtotal: Decimal,
    /// `None` when the product has been removed from the catalog.
    pub product: Option<ProductSummary>,
}

impl CartView {
    /// Build a view, resolving products with `lookup`.
    pub fn build(cart: &Cart, mut lookup: impl FnMut(ProductId) -> Option<ProductSummary>) -> Self {
        let lines: Vec<CartLineView> = cart
            .lines
            .iter()
            .map(|line| CartLineView {
                product_id: line.product_id,
                quantity: line.quantity,
                price: line.price,
                subtotal: line_total(line.price, line.quantity),
                product: lookup(line.product_id),
            })
            .collect();
        let total = lines.iter().map(|line| line.subtotal).sum();

        Self {
            id: cart.id,
            lines,
            total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_totals_lines() {
        let cart = Cart {
            id: CartId::new(1),
            user_id: UserId::new(1),
            lines: vec![
                CartLine {
                    product_id: ProductId::new(1),
                    quantity: 2,
                    price: Decimal::new(1_500, 0),
                },
                CartLine {
                    product_id: ProductId::new(2),
                    quantity: 1,
                    price: Decimal::new(999, 1),
                },
            ],
        };

        let view = CartView::build(&cart, |_| None);
        assert_eq!(view.lines.len(), 2);
        assert_eq!(view.total, Decimal::new(30_999, 1));
        assert!(view.lines.iter().all(|line| line.product.is_none()));
    }
}
