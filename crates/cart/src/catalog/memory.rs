//! In-memory catalog for tests and development.

use std::collections::HashMap;

use async_trait::async_trait;

use verdant_core::ProductId;

use super::{Catalog, CatalogError, CatalogItem};

/// A fixed in-memory catalog.
///
/// Useful in tests and development environments where the real catalog
/// service is not running.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    items: HashMap<ProductId, CatalogItem>,
}

impl StaticCatalog {
    /// Create an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a product, replacing any existing entry with the same ID.
    pub fn insert(&mut self, item: CatalogItem) {
        self.items.insert(item.id, item);
    }

    /// Builder-style [`insert`](Self::insert).
    #[must_use]
    pub fn with(mut self, item: CatalogItem) -> Self {
        self.insert(item);
        self
    }
}

#[async_trait]
impl Catalog for StaticCatalog {
    async fn get_item(&self, product: ProductId) -> Result<CatalogItem, CatalogError> {
        self.items
            .get(&product)
            .cloned()
            .ok_or(CatalogError::UnknownProduct(product))
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use verdant_core::Price;

    use super::*;

    #[tokio::test]
    async fn test_lookup_and_miss() {
        let catalog = StaticCatalog::new().with(CatalogItem {
            id: ProductId::new(1),
            name: "Organic Cotton Tote".to_owned(),
            unit_price: Price::new(Decimal::new(1250, 2)),
            carbon_footprint: 0.8,
        });

        let found = catalog.get_item(ProductId::new(1)).await.expect("present");
        assert_eq!(found.name, "Organic Cotton Tote");

        assert!(matches!(
            catalog.get_item(ProductId::new(2)).await,
            Err(CatalogError::UnknownProduct(_))
        ));
    }
}
