//! Cart line and snapshot types.
//!
//! A [`CartLine`] is one `(user, product)` pairing as stored in the
//! `cart_items` collection, hydrated with a denormalised [`ProductSnapshot`]
//! from `products`. Aggregates (`total`, `item_count`) are never stored; they
//! are recomputed from the lines on every read.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::{CartLineId, ProductId, UserId};

/// Product fields joined into every cart line.
///
/// Read-only from the cart's perspective. Extra columns returned by the data
/// service (slug, description, ratings, ...) are ignored on deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    pub id: ProductId,
    pub name: String,
    pub price: Decimal,
    pub stock_quantity: i32,
    #[serde(default)]
    pub images: Vec<String>,
}

impl ProductSnapshot {
    /// First image, used as the thumbnail in cart listings.
    #[must_use]
    pub fn primary_image(&self) -> Option<&str> {
        self.images.first().map(String::as_str)
    }
}

/// One row of a user's cart.
///
/// While a line exists its quantity is at least 1; a line that would drop to
/// zero is deleted instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub id: CartLineId,
    pub user_id: UserId,
    pub product_id: ProductId,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub product: ProductSnapshot,
}

impl CartLine {
    /// `price × quantity` for this line.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.product.price * Decimal::from(self.quantity)
    }

    /// Whether another unit can be added without exceeding stock.
    #[must_use]
    pub const fn can_increment(&self) -> bool {
        self.quantity < self.product.stock_quantity
    }

    /// Clamp a requested quantity to `1..=stock_quantity`.
    ///
    /// Products with no stock still clamp to 1; callers decide whether an
    /// out-of-stock line may be kept at all.
    #[must_use]
    pub fn clamp_to_stock(&self, requested: i32) -> i32 {
        requested.min(self.product.stock_quantity).max(1)
    }
}

/// Immutable view of a cart handed to readers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartSnapshot {
    pub lines: Vec<CartLine>,
}

impl CartSnapshot {
    /// An empty cart.
    #[must_use]
    pub const fn empty() -> Self {
        Self { lines: Vec::new() }
    }

    /// Wrap a list of lines.
    #[must_use]
    pub const fn new(lines: Vec<CartLine>) -> Self {
        Self { lines }
    }

    /// `Σ(price × quantity)` over all lines.
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.lines.iter().map(CartLine::line_total).sum()
    }

    /// `Σ(quantity)` over all lines.
    #[must_use]
    pub fn item_count(&self) -> i64 {
        self.lines.iter().map(|line| i64::from(line.quantity)).sum()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// The line for a product, if present.
    #[must_use]
    pub fn line_for(&self, product_id: ProductId) -> Option<&CartLine> {
        self.lines.iter().find(|line| line.product_id == product_id)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn line(price: Decimal, quantity: i32, stock: i32) -> CartLine {
        let now = Utc::now();
        let product_id = ProductId::generate();
        CartLine {
            id: CartLineId::generate(),
            user_id: UserId::generate(),
            product_id,
            quantity,
            created_at: now,
            updated_at: now,
            product: ProductSnapshot {
                id: product_id,
                name: "Test product".to_string(),
                price,
                stock_quantity: stock,
                images: vec![],
            },
        }
    }

    #[test]
    fn test_aggregates_match_scenario() {
        let cart = CartSnapshot::new(vec![
            line(Decimal::new(1000, 2), 1, 10),
            line(Decimal::new(550, 2), 3, 10),
        ]);
        assert_eq!(cart.total(), Decimal::new(2650, 2));
        assert_eq!(cart.item_count(), 4);
    }

    #[test]
    fn test_empty_aggregates() {
        let cart = CartSnapshot::empty();
        assert!(cart.is_empty());
        assert_eq!(cart.total(), Decimal::ZERO);
        assert_eq!(cart.item_count(), 0);
    }

    #[test]
    fn test_stock_helpers() {
        let l = line(Decimal::ONE, 3, 3);
        assert!(!l.can_increment());
        assert_eq!(l.clamp_to_stock(10), 3);
        assert_eq!(l.clamp_to_stock(0), 1);
        assert_eq!(l.clamp_to_stock(2), 2);
    }

    #[test]
    fn test_deserialize_joined_row_ignores_extra_product_columns() {
        let json = r#"{
            "id": "0b6b1a4e-8f0e-4c3e-9a57-2f1a0d6c4e11",
            "user_id": "7d9f1c2a-1b3c-4d5e-8f70-112233445566",
            "product_id": "c3a1e2f4-5b6c-4d7e-8f90-aabbccddeeff",
            "quantity": 2,
            "created_at": "2025-01-01T10:00:00+00:00",
            "updated_at": "2025-01-01T10:00:00+00:00",
            "product": {
                "id": "c3a1e2f4-5b6c-4d7e-8f90-aabbccddeeff",
                "name": "Linen Throw",
                "slug": "linen-throw",
                "price": 49.9,
                "stock_quantity": 12,
                "is_featured": true,
                "images": ["https://cdn.example.com/throw.jpg"]
            }
        }"#;

        let line: CartLine = serde_json::from_str(json).unwrap();
        assert_eq!(line.quantity, 2);
        assert_eq!(line.product.price, Decimal::new(499, 1));
        assert_eq!(
            line.product.primary_image(),
            Some("https://cdn.example.com/throw.jpg")
        );
        assert_eq!(line.line_total(), Decimal::new(998, 1));
    }
}
