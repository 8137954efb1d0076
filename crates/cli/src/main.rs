//! Shopfront CLI - Database migrations and cart tools.
//!
//! # Usage
//!
//! ```bash
//! # Run cart database migrations
//! shop-cli migrate
//!
//! # Show a user's reconciled cart with checkout totals
//! shop-cli cart show --user 7d9f1c2a-1b3c-4d5e-8f70-112233445566
//!
//! # Add two units of a product
//! shop-cli cart add --user <uuid> --product <uuid> --quantity 2
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `cart` - Inspect and change a user's cart

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use sentry::integrations::tracing as sentry_tracing;
use shopfront_cart::{CartConfig, ConfigError};
use shopfront_core::{ProductId, UserId};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use commands::cart::CartChange;

mod commands;

#[derive(Parser)]
#[command(name = "shop-cli")]
#[command(author, version, about = "Shopfront CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Inspect and change a user's cart
    Cart {
        /// Cart owner
        #[arg(short, long, global = true)]
        user: Option<UserId>,

        #[command(subcommand)]
        action: CartAction,
    },
}

#[derive(Subcommand)]
enum CartAction {
    /// Print the cart and its order summary
    Show,
    /// Add units of a product, accumulating onto an existing line
    Add {
        #[arg(short, long)]
        product: ProductId,

        #[arg(short, long, default_value_t = 1)]
        quantity: i32,
    },
    /// Set a line's quantity (0 or less removes it)
    Set {
        #[arg(short, long)]
        product: ProductId,

        #[arg(short, long, allow_negative_numbers = true)]
        quantity: i32,
    },
    /// Remove a product's line
    Remove {
        #[arg(short, long)]
        product: ProductId,
    },
    /// Remove every line
    Clear,
}

impl From<CartAction> for CartChange {
    fn from(action: CartAction) -> Self {
        match action {
            CartAction::Show => Self::Show,
            CartAction::Add { product, quantity } => Self::Add {
                product_id: product,
                quantity,
            },
            CartAction::Set { product, quantity } => Self::Set {
                product_id: product,
                quantity,
            },
            CartAction::Remove { product } => Self::Remove {
                product_id: product,
            },
            CartAction::Clear => Self::Clear,
        }
    }
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &CartConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Migrations only need the database URL; cart commands need the full config
    let config = CartConfig::from_env();

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = config.as_ref().ok().and_then(init_sentry);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "shopfront_cart=info,shopfront_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli, config).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(
    cli: Cli,
    config: Result<CartConfig, ConfigError>,
) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Cart { user, action } => {
            let config = config?;
            let user_id = user.ok_or("--user is required for cart commands")?;
            commands::cart::apply(&config, user_id, action.into()).await?;
        }
    }
    Ok(())
}
