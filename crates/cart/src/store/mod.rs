//! Cart persistence: the `cart_items` collection joined with `products`.
//!
//! # Backends
//!
//! - [`RestCartStore`] - the hosted data service's REST API (default)
//! - [`PgCartStore`] - direct `PostgreSQL` access to the same schema
//! - [`MemoryCartStore`] - in-process store for tests and local runs
//!
//! All backends enforce the same row rules as the schema in
//! `crates/cart/migrations/`: one row per `(user_id, product_id)` and a
//! strictly positive quantity.

mod memory;
mod postgres;
mod rest;

use std::sync::Arc;

use async_trait::async_trait;
use shopfront_core::{CartLine, ProductId, UserId};
use thiserror::Error;

use crate::config::StoreConfig;

pub use memory::MemoryCartStore;
pub use postgres::{PgCartStore, create_pool, run_migrations};
pub use rest::RestCartStore;

/// Errors that can occur when talking to a cart store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Response body could not be parsed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Request URL could not be built.
    #[error("invalid endpoint: {0}")]
    Endpoint(#[from] url::ParseError),

    /// Data service answered with a non-success status.
    #[error("data service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Rate limited by the data service.
    #[error("rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// A row rule was violated (unknown product, non-positive quantity).
    #[error("constraint violation: {0}")]
    Constraint(String),

    /// Store is unreachable or refused the operation.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Remote operations the cart needs, scoped by user.
///
/// Every method filters on `user_id`; no call can touch another user's rows.
#[async_trait]
pub trait CartStore: Send + Sync {
    /// All lines for a user, each joined with its product, oldest first.
    async fn fetch_lines(&self, user_id: UserId) -> Result<Vec<CartLine>, StoreError>;

    /// Add `delta` units atomically: inserts the line or accumulates onto it.
    async fn increment_line(
        &self,
        user_id: UserId,
        product_id: ProductId,
        delta: i32,
    ) -> Result<(), StoreError>;

    /// Set an existing line's quantity. Missing lines are left alone.
    async fn update_quantity(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<(), StoreError>;

    /// Delete one line. Deleting a missing line succeeds.
    async fn delete_line(&self, user_id: UserId, product_id: ProductId)
    -> Result<(), StoreError>;

    /// Delete every line for a user.
    async fn delete_all(&self, user_id: UserId) -> Result<(), StoreError>;
}

#[async_trait]
impl<S: CartStore + ?Sized> CartStore for Arc<S> {
    async fn fetch_lines(&self, user_id: UserId) -> Result<Vec<CartLine>, StoreError> {
        (**self).fetch_lines(user_id).await
    }

    async fn increment_line(
        &self,
        user_id: UserId,
        product_id: ProductId,
        delta: i32,
    ) -> Result<(), StoreError> {
        (**self).increment_line(user_id, product_id, delta).await
    }

    async fn update_quantity(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<(), StoreError> {
        (**self).update_quantity(user_id, product_id, quantity).await
    }

    async fn delete_line(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<(), StoreError> {
        (**self).delete_line(user_id, product_id).await
    }

    async fn delete_all(&self, user_id: UserId) -> Result<(), StoreError> {
        (**self).delete_all(user_id).await
    }
}

/// Open the store selected by configuration.
///
/// # Errors
///
/// Returns `StoreError::Http` if the HTTP client cannot be built, or
/// `StoreError::Database` if the `PostgreSQL` pool cannot connect.
pub async fn open(config: &StoreConfig) -> Result<Arc<dyn CartStore>, StoreError> {
    match config {
        StoreConfig::Rest(rest) => {
            tracing::info!(base_url = %rest.base_url, "Using data service REST backend");
            Ok(Arc::new(RestCartStore::new(rest)?))
        }
        StoreConfig::Postgres(pg) => {
            let pool = create_pool(&pg.database_url, pg.max_connections).await?;
            tracing::info!("Using direct PostgreSQL backend");
            Ok(Arc::new(PgCartStore::new(pool)))
        }
    }
}
