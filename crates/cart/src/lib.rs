//! Shopfront Cart - cart reconciliation against the hosted data service.
//!
//! Keeps a session's in-memory cart consistent with the authoritative
//! `cart_items` rows and exposes the totals views render from.
//!
//! # Architecture
//!
//! - [`reconciler::CartReconciler`] owns local cart state and is its only writer
//! - [`store::CartStore`] is the remote boundary, with REST, `PostgreSQL` and
//!   in-memory backends
//! - [`config::CartConfig`] loads backend and checkout settings from the
//!   environment
//!
//! Every mutation is followed by a full reload, so local state always equals
//! some server fetch.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod error;
pub mod reconciler;
pub mod store;

pub use config::{CartConfig, ConfigError, StoreConfig};
pub use error::{CartError, Result};
pub use reconciler::CartReconciler;
pub use store::{CartStore, MemoryCartStore, StoreError};
