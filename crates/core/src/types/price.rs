//! Pricing rules.
//!
//! All amounts are [`Decimal`] in a single store currency (ARS). Nothing here
//! rounds: prices are stored with the precision the catalog was given.

use rust_decimal::Decimal;

/// The price a customer pays for one unit right now.
///
/// An offer price applies only while it is present and strictly below the
/// base price.
///
/// ```
/// use rust_decimal::Decimal;
/// use vidriera_core::effective_price;
///
/// let base = Decimal::new(10_000, 0);
/// assert_eq!(effective_price(base, Some(Decimal::new(8_500, 0))), Decimal::new(8_500, 0));
/// assert_eq!(effective_price(base, Some(Decimal::new(12_000, 0))), base);
/// assert_eq!(effective_price(base, None), base);
/// ```
#[must_use]
pub fn effective_price(base: Decimal, offer: Option<Decimal>) -> Decimal {
    match offer {
        Some(offer) if offer < base => offer,
        _ => base,
    }
}

/// Subtotal of a cart or order line.
#[must_use]
pub fn line_total(unit_price: Decimal, quantity: i32) -> Decimal {
    unit_price * Decimal::from(quantity)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offer_equal_to_base_is_ignored() {
        let base = Decimal::new(4_999, 2);
        assert_eq!(effective_price(base, Some(base)), base);
    }

    #[test]
    fn test_line_total_keeps_precision() {
        assert_eq!(line_total(Decimal::new(1_999, 2), 3), Decimal::new(5_997, 2));
        assert_eq!(line_total(Decimal::new(1_999, 2), 0), Decimal::ZERO);
    }
}
