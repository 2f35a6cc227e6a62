//! Seed the catalog from a YAML file.
//!
//! The file is a list of products in the same shape the admin API accepts:
//!
//! ```yaml
//! - brand: Motorola
//!   model: Moto G54
//!   category: celulares
//!   size: "6.5"
//!   base_price: "300000"
//!   offer_price: "280000"
//!   color: azul
//!   stock: 10
//!   images:
//!     - https://cdn.tienda.com.ar/g54.jpg
//! ```
//!
//! Every entry is validated before the database is touched.

use std::path::Path;

use tracing::{error, info};

use vidriera_storefront::db::{CatalogStore, PgStore};
use vidriera_storefront::models::ProductDraft;

/// Parse and validate a product list.
///
/// # Errors
///
/// Returns a message per invalid entry, or the YAML error.
pub fn parse_products(content: &str) -> Result<Vec<ProductDraft>, Box<dyn std::error::Error>> {
    let drafts: Vec<ProductDraft> = serde_yaml::from_str(content)?;

    let mut valid = Vec::with_capacity(drafts.len());
    let mut errors = Vec::new();
    for (index, draft) in drafts.into_iter().enumerate() {
        match draft.validated() {
            Ok(draft) => valid.push(draft),
            Err(reason) => errors.push(format!("entry {}: {reason}", index + 1)),
        }
    }

    if !errors.is_empty() {
        error!("Product file validation failed:");
        for err in &errors {
            error!("  - {err}");
        }
        return Err(format!("{} validation errors found", errors.len()).into());
    }
    Ok(valid)
}

/// Insert every product of the YAML file at `file_path`.
///
/// # Errors
///
/// Returns an error if the file cannot be read, fails validation, or an
/// insert fails.
pub async fn products(file_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let path = Path::new(file_path);
    if !path.exists() {
        return Err(format!("File not found: {file_path}").into());
    }

    info!(path = %file_path, "Loading products from file");

    // Read and validate YAML before connecting to database
    let content = tokio::fs::read_to_string(path).await?;
    let drafts = parse_products(&content)?;
    info!(products = drafts.len(), "Product file validated");

    let store = PgStore::new(super::connect().await?);
    for draft in &drafts {
        let product = store.create_product(draft).await?;
        info!(product_id = %product.id, name = %product.display_name(), "Inserted");
    }

    info!("Seeding complete! {} products inserted", drafts.len());
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    #[test]
    fn test_parse_products() {
        let yaml = r#"
- brand: " Motorola "
  model: Moto G54
  category: celulares
  size: "6.5"
  base_price: "300000"
  offer_price: "280000"
  color: azul
  stock: 10
  images:
    - https://cdn.tienda.com.ar/g54.jpg
"#;
        let drafts = parse_products(yaml).unwrap();
        assert_eq!(drafts.len(), 1);
        let draft = drafts.first().unwrap();
        assert_eq!(draft.brand, "Motorola");
        assert_eq!(draft.offer_price, Some(Decimal::new(280_000, 0)));
        assert_eq!(draft.stock, 10);
    }

    #[test]
    fn test_parse_products_rejects_invalid_entries() {
        let yaml = r#"
- brand: Motorola
  model: Moto G54
  category: celulares
  base_price: "300000"
  stock: -1
  images: []
"#;
        assert!(parse_products(yaml).is_err());
    }
}
