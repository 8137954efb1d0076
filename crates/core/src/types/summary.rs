//! Checkout order summary derived from a cart.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use super::cart::CartSnapshot;

/// Flat shipping and tax rate applied at checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutRates {
    /// Flat shipping charge per order.
    pub shipping_flat: Decimal,
    /// Tax as a fraction of the subtotal (0.20 = 20%).
    pub tax_rate: Decimal,
}

impl Default for CheckoutRates {
    fn default() -> Self {
        Self {
            shipping_flat: Decimal::new(599, 2),
            tax_rate: Decimal::new(20, 2),
        }
    }
}

/// Subtotal, shipping, tax and grand total for a checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSummary {
    pub subtotal: Decimal,
    pub shipping: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

impl OrderSummary {
    /// Summary for a known subtotal. Shipping is always charged.
    #[must_use]
    pub fn from_subtotal(subtotal: Decimal, rates: &CheckoutRates) -> Self {
        let tax = (subtotal * rates.tax_rate)
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        let shipping = rates.shipping_flat;
        Self {
            subtotal,
            shipping,
            tax,
            total: subtotal + shipping + tax,
        }
    }

    /// Summary for a cart. An empty cart owes nothing, not even shipping.
    #[must_use]
    pub fn for_cart(cart: &CartSnapshot, rates: &CheckoutRates) -> Self {
        if cart.is_empty() {
            return Self {
                subtotal: Decimal::ZERO,
                shipping: Decimal::ZERO,
                tax: Decimal::ZERO,
                total: Decimal::ZERO,
            };
        }
        Self::from_subtotal(cart.total(), rates)
    }
}
