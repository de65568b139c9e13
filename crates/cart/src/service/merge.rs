//! Merge planning.
//!
//! Planning is pure: given the source and destination item lists and the
//! per-product cap, produce the store ops and the warnings for anything
//! clamped. The store applies the plan atomically; this module never touches
//! storage.

use std::fmt;

use serde::Serialize;

use verdant_core::ProductId;

use crate::models::LineItem;
use crate::store::MergeOp;

/// A conflict resolved by clamping during a merge.
///
/// Merge runs implicitly on login and must not block the user, so quantity
/// overflow is resolved fail-soft: clamp to the cap and report what was
/// dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeWarning {
    /// Product whose combined quantity exceeded the cap.
    pub product: ProductId,
    /// Quantity kept on the destination row (the cap).
    pub kept: u32,
    /// Quantity that could not be carried over.
    pub dropped: u32,
}

impl fmt::Display for MergeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "quantity for product {} capped at {}; {} dropped",
            self.product, self.kept, self.dropped
        )
    }
}

/// Plan the merge of `source` items into `dest` items.
///
/// Every source item yields exactly one op: a verbatim move when the
/// destination has no row for the product, otherwise a combine at
/// `min(source + dest, cap)` with a warning for any clamped excess.
/// Warnings come out in source-item added order.
pub(crate) fn plan(
    source: &[LineItem],
    dest: &[LineItem],
    cap: u32,
) -> (Vec<MergeOp>, Vec<MergeWarning>) {
    let mut ops = Vec::with_capacity(source.len());
    let mut warnings = Vec::new();

    for item in source {
        match dest.iter().find(|d| d.product_id == item.product_id) {
            None => ops.push(MergeOp::Move { item: item.id }),
            Some(existing) => {
                let combined = existing.quantity.saturating_add(item.quantity);
                let quantity = combined.min(cap);
                if combined > cap {
                    warnings.push(MergeWarning {
                        product: item.product_id,
                        kept: quantity,
                        dropped: combined - cap,
                    });
                }
                ops.push(MergeOp::Combine {
                    source: item.id,
                    dest: existing.id,
                    quantity,
                });
            }
        }
    }

    (ops, warnings)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use verdant_core::{CartId, LineItemId};

    use super::*;

    fn item(id: i32, cart: i32, product: i32, quantity: u32) -> LineItem {
        LineItem {
            id: LineItemId::new(id),
            cart_id: CartId::new(cart),
            product_id: ProductId::new(product),
            quantity,
            added_at: Utc::now(),
        }
    }

    #[test]
    fn test_disjoint_products_move_verbatim() {
        let source = vec![item(1, 1, 100, 2), item(2, 1, 101, 3)];
        let dest = vec![item(3, 2, 102, 1)];

        let (ops, warnings) = plan(&source, &dest, 5);
        assert_eq!(
            ops,
            vec![
                MergeOp::Move {
                    item: LineItemId::new(1)
                },
                MergeOp::Move {
                    item: LineItemId::new(2)
                },
            ]
        );
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_overlap_combines_within_cap() {
        let source = vec![item(1, 1, 100, 2)];
        let dest = vec![item(3, 2, 100, 2)];

        let (ops, warnings) = plan(&source, &dest, 5);
        assert_eq!(
            ops,
            vec![MergeOp::Combine {
                source: LineItemId::new(1),
                dest: LineItemId::new(3),
                quantity: 4,
            }]
        );
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_overflow_clamps_and_warns() {
        // 3 in the destination, 4 arriving, cap 5: keep 5, drop 2.
        let source = vec![item(1, 1, 100, 4)];
        let dest = vec![item(3, 2, 100, 3)];

        let (ops, warnings) = plan(&source, &dest, 5);
        assert_eq!(
            ops,
            vec![MergeOp::Combine {
                source: LineItemId::new(1),
                dest: LineItemId::new(3),
                quantity: 5,
            }]
        );
        assert_eq!(
            warnings,
            vec![MergeWarning {
                product: ProductId::new(100),
                kept: 5,
                dropped: 2,
            }]
        );
    }

    #[test]
    fn test_empty_source_plans_nothing() {
        let (ops, warnings) = plan(&[], &[item(3, 2, 100, 3)], 5);
        assert!(ops.is_empty());
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_warning_is_human_readable() {
        let warning = MergeWarning {
            product: ProductId::new(100),
            kept: 5,
            dropped: 2,
        };
        assert_eq!(
            warning.to_string(),
            "quantity for product 100 capped at 5; 2 dropped"
        );
    }
}
