//! Cart engine error types.
//!
//! Two distinct layers, kept apart on purpose:
//!
//! - [`CartError`] - recoverable, caller-surfaced business errors. The
//!   presentation layer renders these verbatim as rejected operations; the
//!   cart is always left unchanged.
//! - [`StoreError`](crate::store::StoreError) - infrastructure failures
//!   (store unavailable, lock wait exhausted). These are not business-rule
//!   messages and are expected to become a retry or a 5xx at the boundary.

use thiserror::Error;

use verdant_core::ProductId;

use crate::orders::OrderRejected;
use crate::store::StoreError;

/// Errors surfaced by cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// Neither a session token nor a user id was supplied with the request.
    #[error("no session token or user id supplied with the request")]
    Identity,

    /// Malformed input (non-positive quantity, zero delta, unknown product).
    #[error("invalid request: {0}")]
    Validation(String),

    /// The per-product quantity cap was violated.
    #[error("cannot hold more than {limit} units of product {product} in one cart")]
    LimitExceeded {
        /// Product whose cap was hit.
        product: ProductId,
        /// Configured per-product cap.
        limit: u32,
    },

    /// The referenced entity does not exist or does not belong to this cart.
    #[error("not found: {0}")]
    NotFound(String),

    /// Checkout was attempted on a cart with no line items.
    #[error("cart is empty")]
    EmptyCart,

    /// The order service refused to create the order.
    #[error("checkout failed: {0}")]
    CheckoutFailed(#[from] OrderRejected),

    /// Infrastructure failure from the cart store or lock registry.
    #[error("infrastructure error: {0}")]
    Store(#[from] StoreError),
}

impl CartError {
    /// Stable machine-readable discriminant for the presentation layer.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Identity => "identity",
            Self::Validation(_) => "validation",
            Self::LimitExceeded { .. } => "limit_exceeded",
            Self::NotFound(_) => "not_found",
            Self::EmptyCart => "empty_cart",
            Self::CheckoutFailed(_) => "checkout_failed",
            Self::Store(_) => "infrastructure",
        }
    }

    /// Whether this error is a business rejection rather than an
    /// infrastructure fault.
    #[must_use]
    pub const fn is_business(&self) -> bool {
        !matches!(self, Self::Store(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_is_stable() {
        assert_eq!(CartError::Identity.kind(), "identity");
        assert_eq!(CartError::EmptyCart.kind(), "empty_cart");
        assert_eq!(
            CartError::LimitExceeded {
                product: ProductId::new(1),
                limit: 10
            }
            .kind(),
            "limit_exceeded"
        );
    }

    #[test]
    fn test_store_errors_are_not_business() {
        let err = CartError::Store(StoreError::LockBusy);
        assert!(!err.is_business());
        assert_eq!(err.kind(), "infrastructure");
        assert!(CartError::EmptyCart.is_business());
    }

    #[test]
    fn test_limit_message_names_product_and_cap() {
        let err = CartError::LimitExceeded {
            product: ProductId::new(7),
            limit: 5,
        };
        assert_eq!(
            err.to_string(),
            "cannot hold more than 5 units of product 7 in one cart"
        );
    }
}
