//! Integration tests for the Verdant Grove cart engine.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p verdant-integration-tests
//! ```
//!
//! Tests run against the in-memory cart store with a fixed catalog and a
//! recording order gateway, exercising the engine exactly the way the
//! presentation layer does: through [`verdant_cart::CartService`].
//!
//! # Test Categories
//!
//! - `cart_lifecycle` - resolution and line item mutation
//! - `cart_merge` - guest-to-user merging at login
//! - `cart_checkout` - order creation and cart clearing
//! - `cart_concurrency` - lost-update protection on one cart

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rust_decimal::Decimal;
use uuid::Uuid;

use verdant_cart::catalog::{CachedCatalog, CatalogItem, StaticCatalog};
use verdant_cart::orders::{OrderDraft, OrderGateway, OrderReceipt, OrderRejected};
use verdant_cart::store::InMemoryCartStore;
use verdant_cart::{CartConfig, CartService, SessionHandoff};
use verdant_core::{OrderId, OrderStatus, Price, ProductId, SessionToken, UserId};

/// Bamboo Toothbrush: 10.00, footprint 1.5.
pub const TOOTHBRUSH: ProductId = ProductId::new(1);
/// Jute Twine: 5.00, footprint 0.2.
pub const TWINE: ProductId = ProductId::new(2);
/// Hemp Tote: 12.50, footprint 0.8.
pub const TOTE: ProductId = ProductId::new(3);

/// A price in the store currency from cents.
#[must_use]
pub fn usd(cents: i64) -> Price {
    Price::new(Decimal::new(cents, 2))
}

/// A fresh, unique session token.
#[must_use]
pub fn fresh_token() -> SessionToken {
    SessionToken::parse(&Uuid::new_v4().simple().to_string()).expect("uuid is a valid token")
}

/// The fixed catalog every test runs against.
#[must_use]
pub fn fixture_catalog() -> StaticCatalog {
    StaticCatalog::new()
        .with(CatalogItem {
            id: TOOTHBRUSH,
            name: "Bamboo Toothbrush".to_owned(),
            unit_price: usd(1000),
            carbon_footprint: 1.5,
        })
        .with(CatalogItem {
            id: TWINE,
            name: "Jute Twine".to_owned(),
            unit_price: usd(500),
            carbon_footprint: 0.2,
        })
        .with(CatalogItem {
            id: TOTE,
            name: "Hemp Tote".to_owned(),
            unit_price: usd(1250),
            carbon_footprint: 0.8,
        })
}

/// Order gateway double: records drafts, mints receipts, can be told to
/// reject the next draft.
#[derive(Debug, Default)]
pub struct RecordingGateway {
    calls: AtomicUsize,
    fail_next: AtomicBool,
    next_order_id: AtomicI32,
    last_draft: Mutex<Option<OrderDraft>>,
}

impl RecordingGateway {
    /// How many times `create_order` was invoked.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Reject the next draft with a payment error.
    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    /// The most recent draft the gateway accepted or rejected.
    ///
    /// # Panics
    ///
    /// Panics if the recording mutex is poisoned.
    #[must_use]
    pub fn last_draft(&self) -> Option<OrderDraft> {
        self.last_draft.lock().expect("draft mutex").clone()
    }
}

#[async_trait]
impl OrderGateway for RecordingGateway {
    async fn create_order(&self, draft: OrderDraft) -> Result<OrderReceipt, OrderRejected> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_draft.lock().expect("draft mutex") = Some(draft.clone());

        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(OrderRejected::new("payment declined"));
        }

        let id = self.next_order_id.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(OrderReceipt {
            order_id: OrderId::new(id),
            order_number: format!("VG-{id:05}"),
            total_amount: draft.total_price,
            total_carbon: draft.total_carbon,
            status: OrderStatus::Pending,
        })
    }
}

/// Session handoff double backed by a map.
#[derive(Debug, Default)]
pub struct MemoryHandoff {
    tokens: Mutex<HashMap<UserId, SessionToken>>,
}

impl MemoryHandoff {
    /// Remember `token` as the pre-login token for `user`.
    ///
    /// # Panics
    ///
    /// Panics if the token mutex is poisoned.
    pub fn remember(&self, user: UserId, token: SessionToken) {
        self.tokens.lock().expect("token mutex").insert(user, token);
    }
}

impl SessionHandoff for MemoryHandoff {
    fn prior_anonymous_token(&self, user: UserId) -> Option<SessionToken> {
        self.tokens
            .lock()
            .ok()
            .and_then(|tokens| tokens.get(&user).cloned())
    }
}

/// Everything a test needs: the service plus handles to its doubles.
pub struct TestContext {
    /// The engine under test.
    pub service: Arc<CartService>,
    /// Shared cart store (for direct state assertions).
    pub store: Arc<InMemoryCartStore>,
    /// Recording order gateway.
    pub orders: Arc<RecordingGateway>,
    /// The per-product cap the service was built with.
    pub cap: u32,
}

impl TestContext {
    /// Context with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_cap(CartConfig::default().max_per_item)
    }

    /// Context with a specific per-product cap.
    #[must_use]
    pub fn with_cap(cap: u32) -> Self {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();

        let config = CartConfig {
            max_per_item: cap,
            ..CartConfig::default()
        };
        let store = Arc::new(InMemoryCartStore::new());
        let orders = Arc::new(RecordingGateway::default());
        // Run through the cache decorator, exactly as production wires it.
        let catalog = CachedCatalog::new(fixture_catalog(), config.catalog_cache_ttl);

        let store_handle: Arc<dyn verdant_cart::CartStore> = store.clone();
        let orders_handle: Arc<dyn OrderGateway> = orders.clone();
        let service = Arc::new(CartService::new(
            store_handle,
            Arc::new(catalog),
            orders_handle,
            config,
        ));

        Self {
            service,
            store,
            orders,
            cap,
        }
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}
