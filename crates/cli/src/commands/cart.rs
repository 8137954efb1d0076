//! Cart inspection and maintenance commands.
//!
//! Each command loads the user's cart through the same reconciler the
//! storefront uses, applies the change, and prints the reconciled result.
//!
//! # Usage
//!
//! ```bash
//! shop-cli cart show   --user <uuid>
//! shop-cli cart add    --user <uuid> --product <uuid> [--quantity 1]
//! shop-cli cart set    --user <uuid> --product <uuid> --quantity 3
//! shop-cli cart remove --user <uuid> --product <uuid>
//! shop-cli cart clear  --user <uuid>
//! ```

use std::sync::Arc;

use shopfront_cart::{CartConfig, CartReconciler, CartStore, store};
use shopfront_core::{Price, ProductId, UserId};

/// A single cart change requested from the command line.
#[derive(Debug, Clone, Copy)]
pub enum CartChange {
    Show,
    Add { product_id: ProductId, quantity: i32 },
    Set { product_id: ProductId, quantity: i32 },
    Remove { product_id: ProductId },
    Clear,
}

/// Apply a change to a user's cart and print the result.
///
/// # Errors
///
/// Returns an error if configuration is invalid, the store cannot be opened,
/// or the cart operation fails.
pub async fn apply(
    config: &CartConfig,
    user_id: UserId,
    change: CartChange,
) -> Result<(), Box<dyn std::error::Error>> {
    let store: Arc<dyn CartStore> = store::open(&config.store).await?;
    let cart = CartReconciler::new(store);
    let user = Some(&user_id);

    cart.set_user(Some(user_id)).await?;

    match change {
        CartChange::Show => {}
        CartChange::Add {
            product_id,
            quantity,
        } => cart.add_item(user, product_id, quantity).await?,
        CartChange::Set {
            product_id,
            quantity,
        } => {
            // Views clamp to stock before asking for a quantity; do the same here
            let quantity = cart
                .snapshot()
                .line_for(product_id)
                .map_or(quantity, |line| {
                    if quantity > 0 {
                        line.clamp_to_stock(quantity)
                    } else {
                        quantity
                    }
                });
            cart.update_quantity(user, product_id, quantity).await?;
        }
        CartChange::Remove { product_id } => cart.remove_item(user, product_id).await?,
        CartChange::Clear => cart.clear_cart(user).await?,
    }

    print_cart(&cart, config);
    Ok(())
}

#[allow(clippy::print_stdout)]
fn print_cart<S: CartStore>(cart: &CartReconciler<S>, config: &CartConfig) {
    let currency = config.currency;
    let snapshot = cart.snapshot();

    if snapshot.is_empty() {
        println!("Cart is empty");
        return;
    }

    for line in &snapshot.lines {
        let stock_note = if line.can_increment() {
            String::new()
        } else {
            format!(" (max {} in stock)", line.product.stock_quantity)
        };
        println!(
            "{:>3} x {:<32} {:>10} {:>10}{stock_note}",
            line.quantity,
            line.product.name,
            Price::new(line.product.price, currency).display(),
            Price::new(line.line_total(), currency).display(),
        );
    }

    let summary = cart.summary(&config.checkout);
    println!();
    println!("Items:    {}", cart.item_count());
    println!("Subtotal: {}", Price::new(summary.subtotal, currency).display());
    println!("Shipping: {}", Price::new(summary.shipping, currency).display());
    println!("Tax:      {}", Price::new(summary.tax, currency).display());
    println!("Total:    {}", Price::new(summary.total, currency).display());
}
