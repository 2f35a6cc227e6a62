//! Catalog product types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use vidriera_core::{ProductId, effective_price};

/// A catalog product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub brand: String,
    pub model: String,
    pub category: String,
    /// Product measure (screen size, ring size, litres...).
    pub size: Decimal,
    pub base_price: Decimal,
    pub offer_price: Option<Decimal>,
    pub description: String,
    pub color: String,
    /// Units available. Never negative.
    pub stock: i32,
    pub images: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Unit price a buyer pays right now.
    #[must_use]
    pub fn price(&self) -> Decimal {
        effective_price(self.base_price, self.offer_price)
    }

    /// Human-readable name used in error messages and listings.
    #[must_use]
    pub fn display_name(&self) -> String {
        format!("{} {}", self.brand, self.model)
    }

    #[must_use]
    pub fn summary(&self) -> ProductSummary {
        ProductSummary {
            id: self.id,
            name: self.display_name(),
            price: self.price(),
            image: self.images.first().cloned(),
        }
    }

    /// Case-insensitive substring match over brand, model, description and
    /// category. `needle` must already be lowercase.
    #[must_use]
    pub fn matches_search(&self, needle: &str) -> bool {
        [&self.brand, &self.model, &self.description, &self.category]
            .iter()
            .any(|field| field.to_lowercase().contains(needle))
    }
}

/// Compact product details embedded in cart and order views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductSummary {
    pub id: ProductId,
    pub name: String,
    pub price: Decimal,
    pub image: Option<String>,
}

/// Fields an admin supplies to create or replace a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDraft {
    pub brand: String,
    pub model: String,
    pub category: String,
    #[serde(default)]
    pub size: Decimal,
    pub base_price: Decimal,
    #[serde(default)]
    pub offer_price: Option<Decimal>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub stock: i32,
    #[serde(default)]
    pub images: Vec<String>,
}

impl ProductDraft {
    /// Check the draft and return it with text fields trimmed.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validated(mut self) -> Result<Self, String> {
        for (field, value) in [
            ("brand", &mut self.brand),
            ("model", &mut self.model),
            ("category", &mut self.category),
        ] {
            *value = value.trim().to_owned();
            if value.is_empty() {
                return Err(format!("{field} is required"));
            }
        }
        self.description = self.description.trim().to_owned();
        self.color = self.color.trim().to_owned();

        if self.base_price.is_sign_negative() {
            return Err("base_price cannot be negative".to_owned());
        }
        if self.offer_price.is_some_and(|p| p.is_sign_negative()) {
            return Err("offer_price cannot be negative".to_owned());
        }
        if self.stock < 0 {
            return Err("stock cannot be negative".to_owned());
        }

        self.images.retain(|url| !url.trim().is_empty());
        if self.images.is_empty() {
            return Err("at least one image is required".to_owned());
        }

        Ok(self)
    }
}

/// Catalog listing filter.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductFilter {
    pub category: Option<String>,
    pub search: Option<String>,
}

impl ProductFilter {
    /// Trimmed, non-empty category.
    #[must_use]
    pub fn category(&self) -> Option<&str> {
        self.category.as_deref().map(str::trim).filter(|c| !c.is_empty())
    }

    /// Lowercased, trimmed, non-empty search term.
    #[must_use]
    pub fn search_term(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn draft() -> ProductDraft {
        ProductDraft {
            brand: " Samsung ".into(),
            model: "Galaxy A15".into(),
            category: "celulares".into(),
            size: Decimal::new(65, 1),
            base_price: Decimal::new(250_000, 0),
            offer_price: Some(Decimal::new(229_999, 0)),
            description: "128 GB".into(),
            color: "negro".into(),
            stock: 4,
            images: vec!["https://cdn.tienda.com.ar/a15.jpg".into()],
        }
    }

    #[test]
    fn test_valid_draft_is_trimmed() {
        let draft = draft().validated().unwrap();
        assert_eq!(draft.brand, "Samsung");
    }

    #[test]
    fn test_draft_requires_an_image() {
        let err = ProductDraft {
            images: vec!["  ".into()],
            ..draft()
        }
        .validated()
        .unwrap_err();
        assert!(err.contains("image"));
    }

    #[test]
    fn test_draft_rejects_negative_values() {
        assert!(ProductDraft { stock: -1, ..draft() }.validated().is_err());
        assert!(
            ProductDraft {
                base_price: Decimal::new(-1, 0),
                ..draft()
            }
            .validated()
            .is_err()
        );
        assert!(ProductDraft { model: String::new(), ..draft() }.validated().is_err());
    }

    #[test]
    fn test_filter_normalizes_terms() {
        let filter = ProductFilter {
            category: Some("  ".into()),
            search: Some(" GALAXY ".into()),
        };
        assert_eq!(filter.category(), None);
        assert_eq!(filter.search_term().as_deref(), Some("galaxy"));
    }
}
