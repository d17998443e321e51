//! Seed the catalog from YAML files.
//!
//! ```yaml
//! products:
//!   - sku: MUG-001
//!     name: Enamel Mug
//!     price: 12000
//!   - sku: TEE-OLD
//!     name: Last Season Tee
//!     price: 9000
//!     is_active: false
//! ```
//!
//! Products are upserted by SKU, so re-running a seed updates names, prices
//! and availability in place.

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;
use tracing::info;

use bazaar_storefront::db::ProductRepository;
use bazaar_storefront::models::ProductSeed;

use super::CliError;

/// Top-level layout of a product seed file.
#[derive(Debug, Deserialize)]
struct ProductCatalog {
    products: Vec<ProductSeed>,
}

/// Parse and check a product seed file.
///
/// # Errors
///
/// Returns an error if the YAML is malformed, a price is negative, or a
/// SKU or name is blank or a SKU appears twice.
pub fn parse_products(content: &str) -> Result<Vec<ProductSeed>, CliError> {
    let catalog: ProductCatalog = serde_yaml::from_str(content)?;

    let mut seen = HashSet::new();
    for product in &catalog.products {
        if product.sku.trim().is_empty() {
            return Err(CliError::InvalidSeed("product with blank sku".to_string()));
        }
        if product.name.trim().is_empty() {
            return Err(CliError::InvalidSeed(format!(
                "product {} has a blank name",
                product.sku
            )));
        }
        if !seen.insert(product.sku.as_str()) {
            return Err(CliError::InvalidSeed(format!(
                "duplicate sku: {}",
                product.sku
            )));
        }
    }

    Ok(catalog.products)
}

/// Upsert catalog products from a YAML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, or a database
/// operation fails.
pub async fn products(file_path: &str) -> Result<(), CliError> {
    let path = Path::new(file_path);
    if !path.exists() {
        return Err(CliError::FileNotFound(file_path.to_string()));
    }

    info!(path = %file_path, "Loading products from file");

    // Read and validate before connecting to the database
    let content = tokio::fs::read_to_string(path).await?;
    let seeds = parse_products(&content)?;

    info!(products = seeds.len(), "Parsed seed file");

    let pool = super::connect().await?;
    let repo = ProductRepository::new(&pool);

    for seed in &seeds {
        let product = repo.upsert(seed).await?;
        info!(
            id = %product.id,
            sku = %product.sku,
            price = %product.price,
            active = product.is_active,
            "Upserted product"
        );
    }

    info!(count = seeds.len(), "Seeding complete");

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_products() {
        let yaml = r"
products:
  - sku: MUG-001
    name: Enamel Mug
    price: 12000
  - sku: TEE-OLD
    name: Last Season Tee
    price: 9000
    is_active: false
";
        let products = parse_products(yaml).unwrap();
        assert_eq!(products.len(), 2);
        assert_eq!(products[0].sku, "MUG-001");
        assert_eq!(products[0].price.units(), 12_000);
        assert!(products[0].is_active);
        assert!(!products[1].is_active);
    }

    #[test]
    fn test_parse_products_rejects_negative_price() {
        let yaml = r"
products:
  - sku: MUG-001
    name: Enamel Mug
    price: -1
";
        assert!(matches!(parse_products(yaml), Err(CliError::Yaml(_))));
    }

    #[test]
    fn test_parse_products_rejects_duplicate_sku() {
        let yaml = r"
products:
  - sku: MUG-001
    name: Enamel Mug
    price: 12000
  - sku: MUG-001
    name: Enamel Mug Again
    price: 11000
";
        let err = parse_products(yaml).unwrap_err();
        assert_eq!(err.to_string(), "invalid seed file: duplicate sku: MUG-001");
    }

    #[test]
    fn test_parse_products_rejects_blank_name() {
        let yaml = r#"
products:
  - sku: MUG-001
    name: "  "
    price: 12000
"#;
        assert!(matches!(parse_products(yaml), Err(CliError::InvalidSeed(_))));
    }
}
