//! Database migration commands.
//!
//! # Usage
//!
//! ```bash
//! shop-cli migrate
//! ```
//!
//! # Environment Variables
//!
//! - `SHOPFRONT_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `SHOPFRONT_DB_MAX_CONNECTIONS` - Pool size (default: 10)
//!
//! # Migration Files
//!
//! Cart migrations live in `crates/cart/migrations/`:
//! ```text
//! migrations/
//! ├── 20250301000001_create_products.sql
//! ├── 20250301000002_create_cart_items.sql
//! └── 20250301000003_increment_cart_item.sql
//! ```

use shopfront_cart::config::PostgresConfig;
use shopfront_cart::{ConfigError, store};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Run the cart schema migrations.
///
/// # Errors
///
/// Returns `MigrationError` if configuration is missing, the database is
/// unreachable, or a migration fails.
pub async fn run() -> Result<(), MigrationError> {
    let config = PostgresConfig::from_env()?;

    tracing::info!("Connecting to database...");
    let pool = store::create_pool(&config.database_url, config.max_connections).await?;

    tracing::info!("Running cart migrations...");
    store::run_migrations(&pool).await?;

    tracing::info!("Cart migrations complete!");
    Ok(())
}
