//! Catalog collaborator interface.
//!
//! The catalog service owns product identity, unit price, and per-unit carbon
//! footprint. The cart engine only reads it - prices and footprints are looked
//! up live whenever totals are computed, never copied into cart state.

mod cache;
mod memory;

pub use cache::CachedCatalog;
pub use memory::StaticCatalog;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use verdant_core::{Price, ProductId};

/// Catalog data for one product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogItem {
    /// Product ID.
    pub id: ProductId,
    /// Product display name.
    pub name: String,
    /// Current unit price.
    pub unit_price: Price,
    /// Per-unit carbon footprint score.
    pub carbon_footprint: f64,
}

/// Errors from catalog lookups.
#[derive(Debug, Error, Clone)]
pub enum CatalogError {
    /// The product reference does not resolve.
    #[error("product {0} does not exist")]
    UnknownProduct(ProductId),

    /// The catalog service could not be reached.
    #[error("catalog unavailable: {0}")]
    Unavailable(String),
}

/// Read-only product lookup.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Look up one product.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::UnknownProduct` for references the catalog does
    /// not know, `CatalogError::Unavailable` when the service cannot answer.
    async fn get_item(&self, product: ProductId) -> Result<CatalogItem, CatalogError>;
}
