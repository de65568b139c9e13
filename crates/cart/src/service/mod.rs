//! Cart service.
//!
//! The single entry point for the presentation layer: identity resolution,
//! line item mutation, guest-to-user merging, and checkout. Every mutating
//! operation holds the cart's exclusive lock for its full duration; display
//! reads run unlocked and may be momentarily stale relative to an in-flight
//! mutation.

mod locks;
mod merge;

pub use merge::MergeWarning;

use std::sync::Arc;

use tracing::{debug, instrument, warn};

use verdant_core::{LineItemId, ProductId, SessionToken, UserId};

use crate::catalog::{Catalog, CatalogError};
use crate::config::CartConfig;
use crate::error::CartError;
use crate::models::{
    Cart, CartContents, CartOwner, CartTotals, LineItem, PricedLine, RequestIdentity,
    SessionHandoff,
};
use crate::orders::{OrderDraft, OrderGateway, OrderLine, OrderReceipt, ShippingAddress};
use crate::store::{CartStore, StoreError};
use locks::CartLocks;

/// Cart lifecycle and merge engine.
///
/// Cheap to share behind an `Arc`; holds no cart state of its own - the store
/// is the single source of truth.
pub struct CartService {
    store: Arc<dyn CartStore>,
    catalog: Arc<dyn Catalog>,
    orders: Arc<dyn OrderGateway>,
    config: CartConfig,
    locks: CartLocks,
}

impl CartService {
    /// Create a new cart service over its collaborators.
    #[must_use]
    pub fn new(
        store: Arc<dyn CartStore>,
        catalog: Arc<dyn Catalog>,
        orders: Arc<dyn OrderGateway>,
        config: CartConfig,
    ) -> Self {
        let locks = CartLocks::new(config.lock_wait);
        Self {
            store,
            catalog,
            orders,
            config,
            locks,
        }
    }

    // =========================================================================
    // Resolution
    // =========================================================================

    /// Find or lazily create the cart the given identity owns.
    ///
    /// The user id wins when both credentials are present; the session token
    /// is ignored for lookup once authenticated. Idempotent: repeated calls
    /// return the same persisted cart.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Identity` when the request carries neither a user
    /// id nor a session token.
    #[instrument(skip(self))]
    pub async fn resolve(&self, identity: &RequestIdentity) -> Result<Cart, CartError> {
        let owner = identity.owner().ok_or(CartError::Identity)?;
        let cart = self.store.find_or_create_cart(&owner).await?;
        debug!(cart_id = %cart.id, owner = %cart.owner, "resolved cart");
        Ok(cart)
    }

    /// The identity's cart with priced lines and derived totals.
    ///
    /// Unlocked display read; see [`totals`](Self::totals).
    ///
    /// # Errors
    ///
    /// Returns `CartError::Identity` for an identity-less request and
    /// `CartError::NotFound` when a line references a product the catalog no
    /// longer knows.
    pub async fn contents(&self, identity: &RequestIdentity) -> Result<CartContents, CartError> {
        let cart = self.resolve(identity).await?;
        let items = self.store.items(cart.id).await?;
        let lines = self.price_lines(items).await?;
        let totals = CartTotals::from_lines(&lines);
        Ok(CartContents {
            cart,
            lines,
            totals,
        })
    }

    /// Derived totals over a cart's line items, from live catalog data.
    ///
    /// Takes no cart lock: a total rendered next to a button may lag an
    /// in-flight mutation by a moment, which is acceptable for display.
    ///
    /// # Errors
    ///
    /// Returns `CartError::NotFound` when a line references a product the
    /// catalog no longer knows.
    pub async fn totals(&self, cart: &Cart) -> Result<CartTotals, CartError> {
        let items = self.store.items(cart.id).await?;
        let lines = self.price_lines(items).await?;
        Ok(CartTotals::from_lines(&lines))
    }

    // =========================================================================
    // Line Item Mutation
    // =========================================================================

    /// Add `quantity` units of a product to the cart.
    ///
    /// Folds into the existing row when the cart already holds the product.
    /// Exceeding the per-product cap is an error, not a silent clamp - the
    /// caller chose an explicit amount to add.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Validation` for a zero quantity or an unknown
    /// product, `CartError::LimitExceeded` when `existing + quantity` would
    /// pass the cap.
    #[instrument(skip(self, cart), fields(cart_id = %cart.id))]
    pub async fn add_item(
        &self,
        cart: &Cart,
        product: ProductId,
        quantity: u32,
    ) -> Result<LineItem, CartError> {
        if quantity == 0 {
            return Err(CartError::Validation(
                "quantity must be a positive integer".to_owned(),
            ));
        }
        self.catalog
            .get_item(product)
            .await
            .map_err(unknown_product_as_validation)?;

        let _guard = self.locks.acquire(cart.id).await?;

        let existing = self.store.item_for_product(cart.id, product).await?;
        let current = existing.as_ref().map_or(0, |item| item.quantity);
        let combined = current.saturating_add(quantity);
        if combined > self.config.max_per_item {
            return Err(CartError::LimitExceeded {
                product,
                limit: self.config.max_per_item,
            });
        }

        match existing {
            Some(item) => self
                .store
                .set_item_quantity(cart.id, item.id, combined)
                .await?
                .ok_or_else(|| missing_item(item.id)),
            None => Ok(self.store.insert_item(cart.id, product, quantity).await?),
        }
    }

    /// Adjust a line item's quantity by a signed delta.
    ///
    /// A result of zero or less deletes the row and returns `Ok(None)` -
    /// removal by adjustment is intentional, not an error.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Validation` for a zero delta or one larger than
    /// the cap in magnitude, `CartError::NotFound` when the item does not
    /// belong to this cart, and `CartError::LimitExceeded` when the result
    /// would pass the cap (the row is left unchanged).
    #[instrument(skip(self, cart), fields(cart_id = %cart.id))]
    pub async fn adjust_item(
        &self,
        cart: &Cart,
        item: LineItemId,
        delta: i32,
    ) -> Result<Option<LineItem>, CartError> {
        if delta == 0 {
            return Err(CartError::Validation(
                "quantity delta cannot be 0".to_owned(),
            ));
        }
        if delta.unsigned_abs() > self.config.max_per_item {
            return Err(CartError::Validation(format!(
                "quantity delta cannot exceed {} in magnitude",
                self.config.max_per_item
            )));
        }

        let _guard = self.locks.acquire(cart.id).await?;

        let row = self
            .store
            .item(cart.id, item)
            .await?
            .ok_or_else(|| missing_item(item))?;

        let next = i64::from(row.quantity) + i64::from(delta);
        if next <= 0 {
            self.store.delete_item(cart.id, item).await?;
            return Ok(None);
        }

        let next = u32::try_from(next).unwrap_or(u32::MAX);
        if next > self.config.max_per_item {
            return Err(CartError::LimitExceeded {
                product: row.product_id,
                limit: self.config.max_per_item,
            });
        }

        let updated = self
            .store
            .set_item_quantity(cart.id, item, next)
            .await?
            .ok_or_else(|| missing_item(item))?;
        Ok(Some(updated))
    }

    /// Delete a line item unconditionally.
    ///
    /// # Errors
    ///
    /// Returns `CartError::NotFound` when the item does not belong to this
    /// cart, whether or not it exists elsewhere.
    #[instrument(skip(self, cart), fields(cart_id = %cart.id))]
    pub async fn remove_item(&self, cart: &Cart, item: LineItemId) -> Result<(), CartError> {
        let _guard = self.locks.acquire(cart.id).await?;

        if self.store.delete_item(cart.id, item).await? {
            Ok(())
        } else {
            Err(missing_item(item))
        }
    }

    /// Delete all line items. Clearing an already-empty cart succeeds.
    #[instrument(skip(self, cart), fields(cart_id = %cart.id))]
    pub async fn clear(&self, cart: &Cart) -> Result<(), CartError> {
        let _guard = self.locks.acquire(cart.id).await?;
        self.store.clear_items(cart.id).await?;
        Ok(())
    }

    // =========================================================================
    // Merge
    // =========================================================================

    /// Fold the anonymous cart behind `prior_session` into the user's cart.
    ///
    /// Runs once per login transition. An absent source cart is a no-op that
    /// returns the (possibly fresh) destination cart with no warnings.
    /// Conflicting products combine fail-soft: clamp at the cap and report
    /// the dropped amount, because merge runs implicitly on login and must
    /// not block the user. Atomic: the store applies the whole plan and
    /// deletes the source cart, or nothing changes.
    ///
    /// # Errors
    ///
    /// Infrastructure errors only; conflicts are warnings, not errors.
    #[instrument(skip(self, prior_session))]
    pub async fn merge(
        &self,
        user: UserId,
        prior_session: &SessionToken,
    ) -> Result<(Cart, Vec<MergeWarning>), CartError> {
        let owner = CartOwner::User(user);
        let dest = self.store.find_or_create_cart(&owner).await?;

        let Some(source) = self
            .store
            .find_cart(&CartOwner::Guest(prior_session.clone()))
            .await?
        else {
            debug!(user = %user, "no anonymous cart to merge");
            return Ok((dest, Vec::new()));
        };

        let _guards = self.locks.acquire_pair(source.id, dest.id).await?;

        let source_items = self.store.items(source.id).await?;
        let dest_items = self.store.items(dest.id).await?;
        let (ops, warnings) = merge::plan(&source_items, &dest_items, self.config.max_per_item);

        self.store.commit_merge(source.id, dest.id, &ops).await?;

        for warning in &warnings {
            warn!(user = %user, %warning, "merge clamped a line item");
        }

        // Re-read for the post-merge timestamps.
        let dest = self.store.find_cart(&owner).await?.ok_or_else(|| {
            CartError::Store(StoreError::DataCorruption(
                "destination cart vanished during merge".to_owned(),
            ))
        })?;
        Ok((dest, warnings))
    }

    /// Merge using the session provider's memory of the pre-login token.
    ///
    /// With no remembered token there is nothing to merge; the user's cart is
    /// resolved as usual.
    ///
    /// # Errors
    ///
    /// Same as [`merge`](Self::merge).
    pub async fn merge_on_login(
        &self,
        user: UserId,
        handoff: &dyn SessionHandoff,
    ) -> Result<(Cart, Vec<MergeWarning>), CartError> {
        match handoff.prior_anonymous_token(user) {
            Some(token) => self.merge(user, &token).await,
            None => {
                let cart = self
                    .store
                    .find_or_create_cart(&CartOwner::User(user))
                    .await?;
                Ok((cart, Vec::new()))
            }
        }
    }

    // =========================================================================
    // Checkout
    // =========================================================================

    /// Convert the cart into an order and clear it.
    ///
    /// Totals are computed from live catalog data at the instant of checkout
    /// and forwarded unchanged. The cart is cleared only after the order
    /// service durably accepts the draft; a rejection leaves the cart
    /// untouched.
    ///
    /// # Errors
    ///
    /// Returns `CartError::EmptyCart` for a cart with no line items (the
    /// order service is never invoked), `CartError::CheckoutFailed` carrying
    /// the order service's reason for a rejected draft.
    #[instrument(skip(self, cart, shipping_address), fields(cart_id = %cart.id))]
    pub async fn checkout(
        &self,
        cart: &Cart,
        shipping_address: ShippingAddress,
    ) -> Result<OrderReceipt, CartError> {
        let _guard = self.locks.acquire(cart.id).await?;

        let items = self.store.items(cart.id).await?;
        if items.is_empty() {
            return Err(CartError::EmptyCart);
        }

        let lines = self.price_lines(items).await?;
        let totals = CartTotals::from_lines(&lines);
        let draft = OrderDraft {
            owner: cart.owner.clone(),
            lines: lines
                .iter()
                .map(|line| OrderLine {
                    product_id: line.item.product_id,
                    quantity: line.item.quantity,
                    unit_price: line.unit_price,
                    carbon_footprint: line.carbon_footprint,
                })
                .collect(),
            total_price: totals.total_price,
            total_carbon: totals.total_carbon,
            shipping_address,
        };

        let receipt = self.orders.create_order(draft).await?;

        // The order exists; clearing is the only remaining step.
        self.store.clear_items(cart.id).await?;
        debug!(order = %receipt.order_number, "order created; cart cleared");
        Ok(receipt)
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    async fn price_lines(&self, items: Vec<LineItem>) -> Result<Vec<PricedLine>, CartError> {
        let mut lines = Vec::with_capacity(items.len());
        for item in items {
            let product = self
                .catalog
                .get_item(item.product_id)
                .await
                .map_err(unknown_product_as_not_found)?;
            lines.push(PricedLine {
                item,
                name: product.name,
                unit_price: product.unit_price,
                carbon_footprint: product.carbon_footprint,
            });
        }
        Ok(lines)
    }
}

fn missing_item(item: LineItemId) -> CartError {
    CartError::NotFound(format!("line item {item} is not in this cart"))
}

/// Unknown products are a validation failure when the caller names the
/// product directly (add); catalog outages stay infrastructure errors.
fn unknown_product_as_validation(e: CatalogError) -> CartError {
    match e {
        CatalogError::UnknownProduct(product) => {
            CartError::Validation(format!("product {product} does not exist"))
        }
        CatalogError::Unavailable(reason) => {
            CartError::Store(StoreError::Unavailable(format!("catalog: {reason}")))
        }
    }
}

/// Unknown products surface as not-found when an existing line references a
/// product the catalog no longer sells.
fn unknown_product_as_not_found(e: CatalogError) -> CartError {
    match e {
        CatalogError::UnknownProduct(product) => {
            CartError::NotFound(format!("product {product} is no longer in the catalog"))
        }
        CatalogError::Unavailable(reason) => {
            CartError::Store(StoreError::Unavailable(format!("catalog: {reason}")))
        }
    }
}
