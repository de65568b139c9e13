//! Order service collaborator interface.
//!
//! Checkout hands a priced snapshot of the cart to the order service and gets
//! back a receipt. Payment, inventory reservation, and fulfillment all live
//! behind this boundary; the engine never retries a rejected order.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use verdant_core::{OrderId, OrderStatus, Price, ProductId};

use crate::models::CartOwner;

/// The shipping destination for an order.
///
/// Structure and field presence are validated by the caller before checkout;
/// the engine forwards the payload unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShippingAddress(pub serde_json::Value);

impl From<serde_json::Value> for ShippingAddress {
    fn from(value: serde_json::Value) -> Self {
        Self(value)
    }
}

/// One priced line in an order snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderLine {
    /// Product being purchased.
    pub product_id: ProductId,
    /// Units purchased.
    pub quantity: u32,
    /// Unit price at the instant of checkout.
    pub unit_price: Price,
    /// Per-unit carbon footprint at the instant of checkout.
    pub carbon_footprint: f64,
}

/// The snapshot handed to the order service at checkout.
#[derive(Debug, Clone, Serialize)]
pub struct OrderDraft {
    /// Identity the order is placed for.
    pub owner: CartOwner,
    /// Priced line items.
    pub lines: Vec<OrderLine>,
    /// Total price across all lines.
    pub total_price: Price,
    /// Total carbon footprint across all lines.
    pub total_carbon: f64,
    /// Opaque, caller-validated shipping destination.
    pub shipping_address: ShippingAddress,
}

/// Receipt returned by the order service for an accepted order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderReceipt {
    /// Persisted order ID.
    pub order_id: OrderId,
    /// Human-facing order number.
    pub order_number: String,
    /// Total amount the order was persisted with.
    pub total_amount: Price,
    /// Total carbon footprint the order was persisted with.
    pub total_carbon: f64,
    /// Initial order status.
    pub status: OrderStatus,
}

/// The order service refused to create the order.
///
/// Reasons (inventory, payment, validation) are opaque to the cart engine and
/// surfaced verbatim to the caller.
#[derive(Debug, Clone, Error)]
#[error("{reason}")]
pub struct OrderRejected {
    /// Human-readable rejection reason from the order service.
    pub reason: String,
}

impl OrderRejected {
    /// Build a rejection from any displayable reason.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Order creation boundary.
#[async_trait]
pub trait OrderGateway: Send + Sync {
    /// Persist an order from a cart snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`OrderRejected`] when the order service refuses the draft.
    async fn create_order(&self, draft: OrderDraft) -> Result<OrderReceipt, OrderRejected>;
}
