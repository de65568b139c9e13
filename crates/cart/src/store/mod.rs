//! Durable keyed storage for carts and line items.
//!
//! The store owns the structural invariants of cart state:
//!
//! - one cart per owner identity (find-or-create is atomic)
//! - at most one line item per (cart, product) pair
//! - no line item with quantity zero
//! - deleting a cart deletes its line items
//!
//! Each trait method is atomic on its own; cross-call read-modify-write
//! sequences are serialized by the service's per-cart locks, not here.
//!
//! Two implementations ship with the crate: [`InMemoryCartStore`] for tests
//! and development, and `PgCartStore` (behind the `postgres` feature) backed
//! by `sqlx`.

mod memory;
#[cfg(feature = "postgres")]
mod postgres;

pub use memory::InMemoryCartStore;
#[cfg(feature = "postgres")]
pub use postgres::PgCartStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use verdant_core::{CartId, LineItemId, ProductId};

use crate::models::{Cart, CartOwner, LineItem};

/// Infrastructure failures from the cart store or the lock registry.
///
/// None of these are business errors; the boundary turns them into retries or
/// 5xx responses, never into user-facing business messages.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be reached or answered abnormally.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A cart's mutation lock could not be acquired within the bounded wait.
    #[error("cart is busy: lock wait timed out")]
    LockBusy,

    /// A write conflicted with the store's invariants or current state.
    #[error("conflicting write: {0}")]
    Conflict(String),

    /// Data in the store is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Database error from sqlx.
    #[cfg(feature = "postgres")]
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// One write in an atomic merge commit.
///
/// A merge plan covers every source line item exactly once; the store rejects
/// plans that would leave source rows behind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MergeOp {
    /// Re-parent a source row to the destination cart (no conflicting row
    /// exists there). The row keeps its quantity and added-at timestamp.
    Move {
        /// Source line item to re-parent.
        item: LineItemId,
    },
    /// Fold a source row into an existing destination row for the same
    /// product, leaving the destination row at `quantity`.
    Combine {
        /// Source line item, deleted by the commit.
        source: LineItemId,
        /// Destination line item receiving the combined quantity.
        dest: LineItemId,
        /// Resulting quantity on the destination row (cap already applied).
        quantity: u32,
    },
}

/// Durable cart storage.
#[async_trait]
pub trait CartStore: Send + Sync {
    /// Find the cart owned by `owner`, if one exists.
    async fn find_cart(&self, owner: &CartOwner) -> Result<Option<Cart>, StoreError>;

    /// Find the cart owned by `owner`, creating it if absent.
    ///
    /// Atomic: two concurrent calls for the same owner yield the same cart.
    async fn find_or_create_cart(&self, owner: &CartOwner) -> Result<Cart, StoreError>;

    /// All line items of a cart, in added order. Empty for unknown carts.
    async fn items(&self, cart: CartId) -> Result<Vec<LineItem>, StoreError>;

    /// One line item, scoped to the given cart.
    ///
    /// Rows belonging to other carts are invisible here; cross-cart access is
    /// rejected by construction.
    async fn item(
        &self,
        cart: CartId,
        item: LineItemId,
    ) -> Result<Option<LineItem>, StoreError>;

    /// The cart's line item for a product, if present.
    async fn item_for_product(
        &self,
        cart: CartId,
        product: ProductId,
    ) -> Result<Option<LineItem>, StoreError>;

    /// Insert a new line item.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Conflict` if the cart already has a row for this
    /// product or `quantity` is zero.
    async fn insert_item(
        &self,
        cart: CartId,
        product: ProductId,
        quantity: u32,
    ) -> Result<LineItem, StoreError>;

    /// Set a line item's quantity, returning the updated row.
    ///
    /// Returns `Ok(None)` when the row does not exist in this cart.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Conflict` if `quantity` is zero (delete the row
    /// instead of storing a zero).
    async fn set_item_quantity(
        &self,
        cart: CartId,
        item: LineItemId,
        quantity: u32,
    ) -> Result<Option<LineItem>, StoreError>;

    /// Delete a line item. Returns whether a row was deleted.
    async fn delete_item(&self, cart: CartId, item: LineItemId) -> Result<bool, StoreError>;

    /// Delete all line items of a cart. Idempotent.
    async fn clear_items(&self, cart: CartId) -> Result<(), StoreError>;

    /// Atomically apply a merge plan and delete the source cart.
    ///
    /// Either every op is applied and the source cart (with any bookkeeping)
    /// is gone, or nothing changes.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Conflict` if the plan no longer matches the
    /// stored state (missing rows, uncovered source rows, product mismatch);
    /// the store is left untouched in that case.
    async fn commit_merge(
        &self,
        source: CartId,
        dest: CartId,
        ops: &[MergeOp],
    ) -> Result<(), StoreError>;
}
