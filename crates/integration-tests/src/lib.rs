//! Integration tests for Shopfront.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p shopfront-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `cart_reconciliation` - End-to-end cart scenarios against the in-memory store
//! - `cart_properties` - Randomized operation sequences checked against a model
//!
//! The in-memory store enforces the same row rules as the `PostgreSQL`
//! schema, so no database is needed.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::sync::Arc;

use rust_decimal::Decimal;
use shopfront_cart::{CartReconciler, MemoryCartStore};
use shopfront_core::{ProductId, ProductSnapshot};

/// Reconciler over a shared in-memory store.
pub type TestCart = CartReconciler<Arc<MemoryCartStore>>;

/// Product with a price given in cents.
#[must_use]
pub fn product(name: &str, price_cents: i64, stock_quantity: i32) -> ProductSnapshot {
    ProductSnapshot {
        id: ProductId::generate(),
        name: name.to_string(),
        price: Decimal::new(price_cents, 2),
        stock_quantity,
        images: vec![format!("https://cdn.shopfront.test/{name}.jpg")],
    }
}

/// A small catalog plus a store seeded with it.
pub struct TestContext {
    pub catalog: Vec<ProductSnapshot>,
    pub store: Arc<MemoryCartStore>,
}

impl TestContext {
    /// Store seeded with `catalog`.
    #[must_use]
    pub fn with_catalog(catalog: Vec<ProductSnapshot>) -> Self {
        let store = Arc::new(MemoryCartStore::with_products(catalog.iter().cloned()));
        Self { catalog, store }
    }

    /// A fresh session cart over the shared store.
    #[must_use]
    pub fn session(&self) -> TestCart {
        CartReconciler::new(Arc::clone(&self.store))
    }
}
