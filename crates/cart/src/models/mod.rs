//! Domain types for the cart engine.

pub mod cart;
pub mod identity;

pub use cart::{Cart, CartContents, CartOwner, CartTotals, LineItem, PricedLine};
pub use identity::{RequestIdentity, SessionHandoff};
