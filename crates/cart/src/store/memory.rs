//! In-process cart store.
//!
//! Mirrors the schema rules (one row per user/product, positive quantities,
//! product must exist) so tests exercise the same behavior as the hosted
//! service. Counts remote calls and can be told to fail the next one.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use shopfront_core::{CartLine, CartLineId, ProductId, ProductSnapshot, UserId};

use super::{CartStore, StoreError};

#[derive(Debug, Clone)]
struct Row {
    id: CartLineId,
    user_id: UserId,
    product_id: ProductId,
    quantity: i32,
    created_at: chrono::DateTime<Utc>,
    updated_at: chrono::DateTime<Utc>,
}

#[derive(Default)]
struct MemoryState {
    products: HashMap<ProductId, ProductSnapshot>,
    rows: Vec<Row>,
    calls: usize,
    fail_next: Option<String>,
    sequence: i64,
}

impl MemoryState {
    /// Count the call and consume a pending injected failure.
    fn begin_call(&mut self) -> Result<(), StoreError> {
        self.calls += 1;
        match self.fail_next.take() {
            Some(reason) => Err(StoreError::Unavailable(reason)),
            None => Ok(()),
        }
    }

    /// Strictly increasing timestamps so fetch order is insertion order.
    fn next_timestamp(&mut self) -> chrono::DateTime<Utc> {
        self.sequence += 1;
        Utc::now() + Duration::microseconds(self.sequence)
    }
}

/// Cart store held entirely in memory.
#[derive(Default)]
pub struct MemoryCartStore {
    state: Mutex<MemoryState>,
}

impl MemoryCartStore {
    /// Empty store with no products.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with a product catalog.
    #[must_use]
    pub fn with_products(products: impl IntoIterator<Item = ProductSnapshot>) -> Self {
        let store = Self::new();
        for product in products {
            store.add_product(product);
        }
        store
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add or replace a catalog product.
    pub fn add_product(&self, product: ProductSnapshot) {
        self.lock().products.insert(product.id, product);
    }

    /// Number of store operations issued so far.
    #[must_use]
    pub fn remote_calls(&self) -> usize {
        self.lock().calls
    }

    /// Make the next store operation fail with `StoreError::Unavailable`.
    pub fn fail_next(&self, reason: impl Into<String>) {
        self.lock().fail_next = Some(reason.into());
    }

    /// `(product_id, quantity)` pairs stored for a user, without counting a call.
    #[must_use]
    pub fn quantities(&self, user_id: UserId) -> Vec<(ProductId, i32)> {
        self.lock()
            .rows
            .iter()
            .filter(|row| row.user_id == user_id)
            .map(|row| (row.product_id, row.quantity))
            .collect()
    }
}

#[async_trait]
impl CartStore for MemoryCartStore {
    async fn fetch_lines(&self, user_id: UserId) -> Result<Vec<CartLine>, StoreError> {
        let mut state = self.lock();
        state.begin_call()?;

        let mut rows: Vec<&Row> = state
            .rows
            .iter()
            .filter(|row| row.user_id == user_id)
            .collect();
        rows.sort_by_key(|row| row.created_at);

        rows.into_iter()
            .map(|row| {
                let product = state.products.get(&row.product_id).cloned().ok_or_else(|| {
                    StoreError::Constraint(format!("product {} missing", row.product_id))
                })?;
                Ok(CartLine {
                    id: row.id,
                    user_id: row.user_id,
                    product_id: row.product_id,
                    quantity: row.quantity,
                    created_at: row.created_at,
                    updated_at: row.updated_at,
                    product,
                })
            })
            .collect()
    }

    async fn increment_line(
        &self,
        user_id: UserId,
        product_id: ProductId,
        delta: i32,
    ) -> Result<(), StoreError> {
        let mut state = self.lock();
        state.begin_call()?;

        if !state.products.contains_key(&product_id) {
            return Err(StoreError::Constraint(format!(
                "product {product_id} does not exist"
            )));
        }

        let now = state.next_timestamp();
        let existing = state
            .rows
            .iter_mut()
            .find(|row| row.user_id == user_id && row.product_id == product_id);
        if let Some(row) = existing {
            row.quantity = row
                .quantity
                .checked_add(delta)
                .filter(|q| *q > 0)
                .ok_or_else(|| StoreError::Constraint("quantity must be positive".into()))?;
            row.updated_at = now;
            return Ok(());
        }

        if delta <= 0 {
            return Err(StoreError::Constraint("quantity must be positive".into()));
        }
        state.rows.push(Row {
            id: CartLineId::generate(),
            user_id,
            product_id,
            quantity: delta,
            created_at: now,
            updated_at: now,
        });
        Ok(())
    }

    async fn update_quantity(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<(), StoreError> {
        let mut state = self.lock();
        state.begin_call()?;

        if quantity <= 0 {
            return Err(StoreError::Constraint("quantity must be positive".into()));
        }
        let now = state.next_timestamp();
        if let Some(row) = state
            .rows
            .iter_mut()
            .find(|row| row.user_id == user_id && row.product_id == product_id)
        {
            row.quantity = quantity;
            row.updated_at = now;
        }
        Ok(())
    }

    async fn delete_line(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<(), StoreError> {
        let mut state = self.lock();
        state.begin_call()?;
        state
            .rows
            .retain(|row| !(row.user_id == user_id && row.product_id == product_id));
        Ok(())
    }

    async fn delete_all(&self, user_id: UserId) -> Result<(), StoreError> {
        let mut state = self.lock();
        state.begin_call()?;
        state.rows.retain(|row| row.user_id != user_id);
        Ok(())
    }
}
