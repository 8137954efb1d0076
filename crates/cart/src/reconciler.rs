//! Cart reconciliation: the session's view of "this user's cart".
//!
//! [`CartReconciler`] owns the in-memory cart for one session and is the only
//! writer of it. Views read snapshots and derived aggregates and request
//! changes through the mutation methods; they never touch the lines directly.
//!
//! # Consistency
//!
//! Read-after-write via full reload. Every mutation except
//! [`CartReconciler::clear_cart`] ends by re-fetching the whole cart and
//! replacing local state, so local state always equals some server fetch.
//! There is no optimistic patching: a view sees a change only after its
//! reload lands.
//!
//! # Identity
//!
//! The acting user is passed explicitly to every operation. `None` means
//! anonymous: mutations are no-ops that make no remote call. Switching to a
//! different user (or to `None`) resets local state immediately and starts a
//! new session epoch; reloads that started under an older epoch are dropped
//! when they land.
//!
//! # State machine
//!
//! ```text
//! Anonymous --sign-in--> Loading --> Ready
//! Ready --mutation--> Loading --> Ready
//! Ready/Loading --sign-out--> Anonymous (empty)
//! ```
//!
//! A failed operation leaves the last `Ready` state in place and returns the
//! error; there is no error state.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rust_decimal::Decimal;
use shopfront_core::{CartLine, CartSnapshot, CheckoutRates, OrderSummary, ProductId, UserId};
use tracing::{debug, instrument};

use crate::error::{self, CartError, Result};
use crate::store::{CartStore, StoreError};

#[derive(Debug, Default)]
struct CartState {
    owner: Option<UserId>,
    epoch: u64,
    lines: Vec<CartLine>,
    loads_in_flight: usize,
}

impl CartState {
    /// Drop everything and start a new epoch for `owner`.
    fn reset(&mut self, owner: Option<UserId>) {
        self.owner = owner;
        self.epoch += 1;
        self.lines.clear();
        self.loads_in_flight = 0;
    }
}

fn lock(state: &Mutex<CartState>) -> MutexGuard<'_, CartState> {
    // Poison is ignored: every update is a plain field assignment.
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Marks a reload in flight; unmarks it on drop, even if the future is cancelled.
struct LoadingGuard<'a> {
    state: &'a Mutex<CartState>,
    epoch: u64,
}

impl<'a> LoadingGuard<'a> {
    fn start(state: &'a Mutex<CartState>, epoch: u64) -> Self {
        let mut current = lock(state);
        if current.epoch == epoch {
            current.loads_in_flight += 1;
        }
        Self { state, epoch }
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        let mut current = lock(self.state);
        if current.epoch == self.epoch {
            current.loads_in_flight = current.loads_in_flight.saturating_sub(1);
        }
    }
}

/// Session cart mirrored to a [`CartStore`].
///
/// Cheaply cloneable; clones share the same state and store.
pub struct CartReconciler<S> {
    inner: Arc<Inner<S>>,
}

struct Inner<S> {
    store: S,
    state: Mutex<CartState>,
}

impl<S> Clone for CartReconciler<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: CartStore> CartReconciler<S> {
    /// Create an anonymous, empty cart over `store`.
    #[must_use]
    pub fn new(store: S) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                state: Mutex::new(CartState::default()),
            }),
        }
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.inner.store
    }

    fn state(&self) -> MutexGuard<'_, CartState> {
        lock(&self.inner.state)
    }

    // =========================================================================
    // Read surface
    // =========================================================================

    /// Copy of the current lines.
    #[must_use]
    pub fn snapshot(&self) -> CartSnapshot {
        CartSnapshot::new(self.state().lines.clone())
    }

    /// `Σ(price × quantity)` over the current lines.
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.state().lines.iter().map(CartLine::line_total).sum()
    }

    /// `Σ(quantity)` over the current lines.
    #[must_use]
    pub fn item_count(&self) -> i64 {
        self.state()
            .lines
            .iter()
            .map(|line| i64::from(line.quantity))
            .sum()
    }

    /// True while at least one reload for the current session is in flight.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.state().loads_in_flight > 0
    }

    /// User whose cart is currently held, if any.
    #[must_use]
    pub fn owner(&self) -> Option<UserId> {
        self.state().owner
    }

    /// Checkout summary for the current lines.
    #[must_use]
    pub fn summary(&self, rates: &CheckoutRates) -> OrderSummary {
        OrderSummary::for_cart(&self.snapshot(), rates)
    }

    // =========================================================================
    // Session
    // =========================================================================

    /// React to an authentication change.
    ///
    /// `None` (sign-out) empties the cart immediately. A new or different
    /// user resets the cart and loads theirs. The current owner is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Store` if the initial load fails; the cart then
    /// stays empty but owned by the new user.
    #[instrument(skip(self))]
    pub async fn set_user(&self, user: Option<UserId>) -> Result<()> {
        match user {
            None => {
                let was_signed_in = {
                    let mut state = self.state();
                    let had_owner = state.owner.is_some();
                    state.reset(None);
                    had_owner
                };
                if was_signed_in {
                    error::clear_sentry_user();
                    debug!("Signed out, cart cleared");
                }
                Ok(())
            }
            Some(user_id) => {
                if self.owner() == Some(user_id) {
                    return Ok(());
                }
                error::set_sentry_user(&user_id, None);
                let epoch = self.adopt(user_id);
                self.reload(user_id, epoch).await
            }
        }
    }

    /// Make `user_id` the owner, resetting state if it changed. Returns the epoch.
    fn adopt(&self, user_id: UserId) -> u64 {
        let mut state = self.state();
        if state.owner != Some(user_id) {
            state.reset(Some(user_id));
        }
        state.epoch
    }

    /// Fetch the user's cart and replace local state wholesale.
    async fn reload(&self, user_id: UserId, epoch: u64) -> Result<()> {
        let _loading = LoadingGuard::start(&self.inner.state, epoch);

        let lines = self
            .inner
            .store
            .fetch_lines(user_id)
            .await
            .map_err(|e| log_failure("load cart", user_id, None, e))?;

        let mut state = self.state();
        if state.epoch == epoch {
            debug!(lines = lines.len(), "Cart reloaded");
            state.lines = lines;
        } else {
            debug!("Discarding cart reload from a previous session");
        }
        Ok(())
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Replace local state with the user's cart from the store.
    ///
    /// With no user the cart is emptied and nothing is fetched. On failure the
    /// previous lines are kept.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Store` if the fetch fails.
    #[instrument(skip(self))]
    pub async fn load_cart(&self, user: Option<&UserId>) -> Result<()> {
        let Some(&user_id) = user else {
            self.state().reset(None);
            return Ok(());
        };
        let epoch = self.adopt(user_id);
        self.reload(user_id, epoch).await
    }

    /// Add `quantity` units of a product, accumulating onto any existing line.
    ///
    /// The increment happens atomically in the store, so concurrent adds of
    /// the same product from several sessions all count.
    ///
    /// # Errors
    ///
    /// Returns `CartError::InvalidQuantity` for a non-positive `quantity`
    /// (no remote call is made), or `CartError::Store` if the store rejects
    /// the increment or the reload fails.
    #[instrument(skip(self))]
    pub async fn add_item(
        &self,
        user: Option<&UserId>,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<()> {
        let Some(&user_id) = user else {
            debug!("No authenticated user, ignoring add_item");
            return Ok(());
        };
        if quantity <= 0 {
            return Err(CartError::InvalidQuantity(quantity));
        }

        let epoch = self.adopt(user_id);
        let product = product_id.to_string();
        error::add_breadcrumb("cart", "Added item", Some(&[("product_id", &product)]));

        self.inner
            .store
            .increment_line(user_id, product_id, quantity)
            .await
            .map_err(|e| log_failure("add item", user_id, Some(product_id), e))?;
        self.reload(user_id, epoch).await
    }

    /// Set a line's quantity. Zero or negative removes the line.
    ///
    /// No stock ceiling is applied here; views clamp with
    /// [`CartLine::clamp_to_stock`] before calling.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Store` if the update/removal or the reload fails.
    #[instrument(skip(self))]
    pub async fn update_quantity(
        &self,
        user: Option<&UserId>,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<()> {
        let Some(&user_id) = user else {
            debug!("No authenticated user, ignoring update_quantity");
            return Ok(());
        };
        if quantity <= 0 {
            return self.remove_item(user, product_id).await;
        }

        let epoch = self.adopt(user_id);
        let product = product_id.to_string();
        let quantity_str = quantity.to_string();
        error::add_breadcrumb(
            "cart",
            "Updated quantity",
            Some(&[("product_id", &product), ("quantity", &quantity_str)]),
        );

        self.inner
            .store
            .update_quantity(user_id, product_id, quantity)
            .await
            .map_err(|e| log_failure("update quantity", user_id, Some(product_id), e))?;
        self.reload(user_id, epoch).await
    }

    /// Remove a product's line. Removing a missing line is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Store` if the delete or the reload fails.
    #[instrument(skip(self))]
    pub async fn remove_item(&self, user: Option<&UserId>, product_id: ProductId) -> Result<()> {
        let Some(&user_id) = user else {
            debug!("No authenticated user, ignoring remove_item");
            return Ok(());
        };

        let epoch = self.adopt(user_id);
        let product = product_id.to_string();
        error::add_breadcrumb("cart", "Removed item", Some(&[("product_id", &product)]));

        self.inner
            .store
            .delete_line(user_id, product_id)
            .await
            .map_err(|e| log_failure("remove item", user_id, Some(product_id), e))?;
        self.reload(user_id, epoch).await
    }

    /// Delete every line for the user.
    ///
    /// The result is known to be empty, so local state is cleared directly
    /// without a reload.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Store` if the delete fails; local lines are kept.
    #[instrument(skip(self))]
    pub async fn clear_cart(&self, user: Option<&UserId>) -> Result<()> {
        let Some(&user_id) = user else {
            debug!("No authenticated user, ignoring clear_cart");
            return Ok(());
        };

        let epoch = self.adopt(user_id);
        error::add_breadcrumb("cart", "Cleared cart", None);

        self.inner
            .store
            .delete_all(user_id)
            .await
            .map_err(|e| log_failure("clear cart", user_id, None, e))?;

        let mut state = self.state();
        if state.epoch == epoch {
            state.lines.clear();
        }
        Ok(())
    }
}

/// Log a store failure with its context and convert it for the caller.
fn log_failure(
    operation: &'static str,
    user_id: UserId,
    product_id: Option<ProductId>,
    err: StoreError,
) -> CartError {
    match product_id {
        Some(product_id) => tracing::error!(
            %user_id,
            %product_id,
            error = %err,
            "Failed to {operation}"
        ),
        None => tracing::error!(%user_id, error = %err, "Failed to {operation}"),
    }
    CartError::Store(err)
}
