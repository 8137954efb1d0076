//! Direct `PostgreSQL` access to the cart schema.
//!
//! Uses the same tables and `increment_cart_item` function the REST API
//! exposes, so both backends behave identically.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/cart/migrations/` and run via:
//! ```bash
//! cargo run -p shopfront-cli -- migrate
//! ```

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use shopfront_core::{CartLine, CartLineId, ProductId, ProductSnapshot, UserId};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::instrument;

use super::{CartStore, StoreError};

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
/// * `max_connections` - Upper bound on pooled connections
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(
    database_url: &secrecy::SecretString,
    max_connections: u32,
) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Apply the bundled schema migrations.
///
/// # Errors
///
/// Returns `sqlx::migrate::MigrateError` if a migration fails or the
/// applied history does not match the bundled files.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

/// Joined `cart_items` + `products` row.
#[derive(sqlx::FromRow)]
struct CartLineRow {
    id: CartLineId,
    user_id: UserId,
    product_id: ProductId,
    quantity: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    product_name: String,
    product_price: Decimal,
    product_stock_quantity: i32,
    product_images: Vec<String>,
}

impl From<CartLineRow> for CartLine {
    fn from(row: CartLineRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            product_id: row.product_id,
            quantity: row.quantity,
            created_at: row.created_at,
            updated_at: row.updated_at,
            product: ProductSnapshot {
                id: row.product_id,
                name: row.product_name,
                price: row.product_price,
                stock_quantity: row.product_stock_quantity,
                images: row.product_images,
            },
        }
    }
}

/// Cart store backed by a `PostgreSQL` pool.
#[derive(Clone)]
pub struct PgCartStore {
    pool: PgPool,
}

impl PgCartStore {
    /// Create a new store over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Foreign key and check violations are row rule violations, not outages.
fn map_db_error(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = e
        && (db_err.is_foreign_key_violation() || db_err.is_check_violation())
    {
        return StoreError::Constraint(db_err.message().to_owned());
    }
    StoreError::Database(e)
}

#[async_trait]
impl CartStore for PgCartStore {
    #[instrument(skip(self))]
    async fn fetch_lines(&self, user_id: UserId) -> Result<Vec<CartLine>, StoreError> {
        let rows = sqlx::query_as::<_, CartLineRow>(
            r"
            SELECT ci.id, ci.user_id, ci.product_id, ci.quantity,
                   ci.created_at, ci.updated_at,
                   p.name AS product_name,
                   p.price AS product_price,
                   p.stock_quantity AS product_stock_quantity,
                   p.images AS product_images
            FROM cart_items ci
            JOIN products p ON p.id = ci.product_id
            WHERE ci.user_id = $1
            ORDER BY ci.created_at, ci.id
            ",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(CartLine::from).collect())
    }

    #[instrument(skip(self))]
    async fn increment_line(
        &self,
        user_id: UserId,
        product_id: ProductId,
        delta: i32,
    ) -> Result<(), StoreError> {
        sqlx::query("SELECT increment_cart_item($1, $2, $3)")
            .bind(user_id)
            .bind(product_id)
            .bind(delta)
            .execute(&self.pool)
            .await
            .map_err(map_db_error)?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn update_quantity(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE cart_items SET quantity = $3 WHERE user_id = $1 AND product_id = $2",
        )
        .bind(user_id)
        .bind(product_id)
        .bind(quantity)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        if result.rows_affected() == 0 {
            tracing::debug!("No cart line to update");
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_line(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM cart_items WHERE user_id = $1 AND product_id = $2")
            .bind(user_id)
            .bind(product_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_all(&self, user_id: UserId) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        tracing::debug!(deleted = result.rows_affected(), "Cleared cart rows");
        Ok(())
    }
}
