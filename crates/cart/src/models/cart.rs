//! Cart and line item domain types.
//!
//! These types represent persisted cart state separate from store row types.
//! Totals are always derived from current line items and current catalog
//! data - they are never stored, so they cannot drift.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use verdant_core::{CartId, LineItemId, Price, ProductId, SessionToken, UserId};

/// The single identity that owns a cart.
///
/// Exactly one of the two variants keys a persisted cart - never both, never
/// neither. Ownership is immutable after creation; the merge engine moves
/// *contents* between carts, never a cart's identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum CartOwner {
    /// Cart keyed to an authenticated user.
    User(UserId),
    /// Cart keyed to an anonymous session.
    Guest(SessionToken),
}

impl std::fmt::Display for CartOwner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User(id) => write!(f, "user {id}"),
            Self::Guest(token) => write!(f, "guest {token}"),
        }
    }
}

/// A persisted cart (domain type).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cart {
    /// Unique cart ID.
    pub id: CartId,
    /// Identity that owns this cart.
    pub owner: CartOwner,
    /// When the cart was created.
    pub created_at: DateTime<Utc>,
    /// When the cart was last mutated.
    pub updated_at: DateTime<Utc>,
}

impl Cart {
    /// Whether this cart belongs to an anonymous session.
    #[must_use]
    pub const fn is_guest(&self) -> bool {
        matches!(self.owner, CartOwner::Guest(_))
    }
}

/// One (product, quantity) pairing within a cart.
///
/// Invariants, enforced by the store and the mutator together:
/// - at most one line item per (cart, product) pair
/// - quantity is at least 1; a line item reaching 0 is deleted, not stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    /// Unique line item ID.
    pub id: LineItemId,
    /// Cart this row belongs to.
    pub cart_id: CartId,
    /// Catalog product this row references.
    pub product_id: ProductId,
    /// Units of the product in the cart.
    pub quantity: u32,
    /// When the product was first added to the cart.
    pub added_at: DateTime<Utc>,
}

/// A line item joined with live catalog data, ready for display.
#[derive(Debug, Clone, Serialize)]
pub struct PricedLine {
    /// The underlying line item.
    pub item: LineItem,
    /// Product display name.
    pub name: String,
    /// Current unit price from the catalog.
    pub unit_price: Price,
    /// Current per-unit carbon footprint from the catalog.
    pub carbon_footprint: f64,
}

impl PricedLine {
    /// Price of this line (unit price times quantity).
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.unit_price.times(self.item.quantity)
    }

    /// Carbon footprint of this line (per-unit footprint times quantity).
    #[must_use]
    pub fn line_carbon(&self) -> f64 {
        self.carbon_footprint * f64::from(self.item.quantity)
    }
}

/// Aggregates over a cart's line items, computed from live catalog data.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct CartTotals {
    /// Total units across all line items.
    pub item_count: u32,
    /// Total price of the cart.
    pub total_price: Price,
    /// Total carbon footprint of the cart.
    pub total_carbon: f64,
}

impl CartTotals {
    /// Fold priced lines into cart totals.
    #[must_use]
    pub fn from_lines(lines: &[PricedLine]) -> Self {
        lines.iter().fold(Self::default(), |mut totals, line| {
            totals.item_count += line.item.quantity;
            totals.total_price += line.line_total();
            totals.total_carbon += line.line_carbon();
            totals
        })
    }
}

/// A cart with its priced line items and derived totals.
#[derive(Debug, Clone, Serialize)]
pub struct CartContents {
    /// The cart itself.
    pub cart: Cart,
    /// Line items joined with live catalog data, in added order.
    pub lines: Vec<PricedLine>,
    /// Derived totals over `lines`.
    pub totals: CartTotals,
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    fn line(quantity: u32, cents: i64, carbon: f64) -> PricedLine {
        PricedLine {
            item: LineItem {
                id: LineItemId::new(1),
                cart_id: CartId::new(1),
                product_id: ProductId::new(1),
                quantity,
                added_at: Utc::now(),
            },
            name: "Bamboo Toothbrush".to_owned(),
            unit_price: Price::new(Decimal::new(cents, 2)),
            carbon_footprint: carbon,
        }
    }

    #[test]
    fn test_line_totals() {
        let l = line(2, 1000, 1.5);
        assert_eq!(l.line_total(), Price::new(Decimal::new(2000, 2)));
        assert!((l.line_carbon() - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_cart_totals_fold() {
        let totals = CartTotals::from_lines(&[line(2, 1000, 1.5), line(1, 500, 0.2)]);
        assert_eq!(totals.item_count, 3);
        assert_eq!(totals.total_price, Price::new(Decimal::new(2500, 2)));
        assert!((totals.total_carbon - 3.2).abs() < 1e-9);
    }

    #[test]
    fn test_empty_totals_are_zero() {
        let totals = CartTotals::from_lines(&[]);
        assert_eq!(totals.item_count, 0);
        assert_eq!(totals.total_price, Price::zero());
        assert!(totals.total_carbon.abs() < f64::EPSILON);
    }
}
