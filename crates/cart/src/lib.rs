//! Verdant Cart - cart lifecycle and merge engine.
//!
//! This crate owns per-identity cart state for the storefront: resolving the
//! cart a request identity owns, mutating line items under per-cart locks,
//! folding a guest cart into a user cart at login, and converting a cart into
//! an order at checkout.
//!
//! # Architecture
//!
//! The engine is consumed in-process by a presentation layer; it exposes no
//! wire protocol of its own. External collaborators are modelled as traits:
//!
//! - [`store::CartStore`] - durable keyed storage for carts and line items
//! - [`catalog::Catalog`] - read-only product lookup (price, carbon footprint)
//! - [`orders::OrderGateway`] - order creation at checkout
//! - [`models::SessionHandoff`] - the session provider's memory of the
//!   pre-login anonymous token
//!
//! [`service::CartService`] ties these together and is the only entry point
//! the presentation layer should touch.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod catalog;
pub mod config;
pub mod error;
pub mod models;
pub mod orders;
pub mod service;
pub mod store;

pub use config::{CartConfig, ConfigError};
pub use error::CartError;
pub use models::{
    Cart, CartContents, CartOwner, CartTotals, LineItem, PricedLine, RequestIdentity,
    SessionHandoff,
};
pub use service::{CartService, MergeWarning};
pub use store::{CartStore, StoreError};
