//! Read-through cache for catalog lookups.
//!
//! Totals require one catalog lookup per line item, which makes a busy cart
//! page chatty against the catalog service. This decorator bounds that with a
//! TTL cache. Checkout wants prices from the instant of checkout, so wire the
//! coordinator to the uncached catalog (or accept the TTL as the staleness
//! bound) - that choice belongs to the integrator, not this crate.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;

use verdant_core::ProductId;

use super::{Catalog, CatalogError, CatalogItem};

/// Maximum number of products kept in the cache.
const CACHE_CAPACITY: u64 = 10_000;

/// A TTL-bounded read-through cache over any [`Catalog`].
///
/// Lookup errors are never cached; an unknown product is re-checked on every
/// call so newly published products appear without waiting for expiry.
pub struct CachedCatalog<C> {
    inner: C,
    cache: Cache<ProductId, CatalogItem>,
}

impl<C: Catalog> CachedCatalog<C> {
    /// Wrap a catalog with a cache holding entries for `ttl`.
    #[must_use]
    pub fn new(inner: C, ttl: Duration) -> Self {
        Self {
            inner,
            cache: Cache::builder()
                .max_capacity(CACHE_CAPACITY)
                .time_to_live(ttl)
                .build(),
        }
    }
}

#[async_trait]
impl<C: Catalog> Catalog for CachedCatalog<C> {
    async fn get_item(&self, product: ProductId) -> Result<CatalogItem, CatalogError> {
        self.cache
            .try_get_with(product, self.inner.get_item(product))
            .await
            .map_err(|e: Arc<CatalogError>| (*e).clone())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use rust_decimal::Decimal;
    use verdant_core::Price;

    use super::*;

    /// Counts lookups so tests can observe cache hits.
    struct CountingCatalog {
        inner: super::super::StaticCatalog,
        lookups: AtomicUsize,
    }

    #[async_trait]
    impl Catalog for CountingCatalog {
        async fn get_item(&self, product: ProductId) -> Result<CatalogItem, CatalogError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            self.inner.get_item(product).await
        }
    }

    fn fixture() -> CountingCatalog {
        CountingCatalog {
            inner: super::super::StaticCatalog::new().with(CatalogItem {
                id: ProductId::new(1),
                name: "Beeswax Wrap".to_owned(),
                unit_price: Price::new(Decimal::new(900, 2)),
                carbon_footprint: 0.3,
            }),
            lookups: AtomicUsize::new(0),
        }
    }

    #[tokio::test]
    async fn test_second_lookup_hits_cache() {
        let cached = CachedCatalog::new(fixture(), Duration::from_secs(60));

        cached.get_item(ProductId::new(1)).await.expect("present");
        cached.get_item(ProductId::new(1)).await.expect("present");

        assert_eq!(cached.inner.lookups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_misses_are_not_cached() {
        let cached = CachedCatalog::new(fixture(), Duration::from_secs(60));

        assert!(cached.get_item(ProductId::new(9)).await.is_err());
        assert!(cached.get_item(ProductId::new(9)).await.is_err());

        // Both misses reached the inner catalog.
        assert_eq!(cached.inner.lookups.load(Ordering::SeqCst), 2);
    }
}
