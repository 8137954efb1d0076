//! Core types for Shopfront.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod cart;
pub mod id;
pub mod price;
pub mod summary;

pub use cart::{CartLine, CartSnapshot, ProductSnapshot};
pub use id::*;
pub use price::{CurrencyCode, CurrencyError, Price};
pub use summary::{CheckoutRates, OrderSummary};
