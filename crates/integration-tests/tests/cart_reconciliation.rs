//! Integration tests for cart reconciliation.
//!
//! These tests drive `CartReconciler` sessions against a shared in-memory
//! store, covering the storefront's cart flows end to end.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use rust_decimal::Decimal;
use shopfront_cart::{CartError, StoreError};
use shopfront_core::{CheckoutRates, OrderSummary, UserId};
use shopfront_integration_tests::{TestContext, product};

fn lamp_and_candle() -> TestContext {
    TestContext::with_catalog(vec![
        product("lamp", 1000, 10),
        product("candle", 550, 40),
    ])
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn test_two_products_total_and_count() {
    let ctx = lamp_and_candle();
    let (lamp, candle) = (ctx.catalog[0].id, ctx.catalog[1].id);
    let cart = ctx.session();
    let user = UserId::generate();

    cart.set_user(Some(user)).await.unwrap();
    cart.add_item(Some(&user), lamp, 1).await.unwrap();
    cart.add_item(Some(&user), candle, 3).await.unwrap();

    assert_eq!(cart.total(), Decimal::new(2650, 2));
    assert_eq!(cart.item_count(), 4);
    assert!(!cart.is_loading());
}

#[tokio::test]
async fn test_checkout_summary_for_scenario_cart() {
    let ctx = lamp_and_candle();
    let (lamp, candle) = (ctx.catalog[0].id, ctx.catalog[1].id);
    let cart = ctx.session();
    let user = UserId::generate();

    cart.add_item(Some(&user), lamp, 1).await.unwrap();
    cart.add_item(Some(&user), candle, 3).await.unwrap();

    let summary = cart.summary(&CheckoutRates::default());
    assert_eq!(
        summary,
        OrderSummary {
            subtotal: Decimal::new(2650, 2),
            shipping: Decimal::new(599, 2),
            tax: Decimal::new(530, 2),
            total: Decimal::new(3779, 2),
        }
    );
}

#[tokio::test]
async fn test_anonymous_mutation_changes_nothing() {
    let ctx = lamp_and_candle();
    let lamp = ctx.catalog[0].id;
    let cart = ctx.session();

    cart.add_item(None, lamp, 2).await.unwrap();
    cart.update_quantity(None, lamp, 5).await.unwrap();
    cart.remove_item(None, lamp).await.unwrap();
    cart.clear_cart(None).await.unwrap();

    assert!(cart.snapshot().is_empty());
    assert_eq!(ctx.store.remote_calls(), 0);
}

// =============================================================================
// Quantity Rules
// =============================================================================

#[tokio::test]
async fn test_add_accumulates_instead_of_overwriting() {
    let ctx = lamp_and_candle();
    let lamp = ctx.catalog[0].id;
    let cart = ctx.session();
    let user = UserId::generate();

    cart.add_item(Some(&user), lamp, 2).await.unwrap();
    cart.add_item(Some(&user), lamp, 3).await.unwrap();

    let snapshot = cart.snapshot();
    assert_eq!(snapshot.lines.len(), 1);
    assert_eq!(snapshot.line_for(lamp).unwrap().quantity, 5);
}

#[tokio::test]
async fn test_update_to_zero_and_negative_remove_line() {
    let ctx = lamp_and_candle();
    let (lamp, candle) = (ctx.catalog[0].id, ctx.catalog[1].id);
    let cart = ctx.session();
    let user = UserId::generate();

    cart.add_item(Some(&user), lamp, 2).await.unwrap();
    cart.add_item(Some(&user), candle, 2).await.unwrap();

    cart.update_quantity(Some(&user), lamp, 0).await.unwrap();
    cart.update_quantity(Some(&user), candle, -1).await.unwrap();

    assert!(cart.snapshot().line_for(lamp).is_none());
    assert!(cart.snapshot().line_for(candle).is_none());
    assert!(ctx.store.quantities(user).is_empty());
}

#[tokio::test]
async fn test_update_does_not_enforce_stock() {
    let ctx = TestContext::with_catalog(vec![product("rug", 8900, 2)]);
    let rug = ctx.catalog[0].id;
    let cart = ctx.session();
    let user = UserId::generate();

    cart.add_item(Some(&user), rug, 1).await.unwrap();
    cart.update_quantity(Some(&user), rug, 6).await.unwrap();

    let line = cart.snapshot().line_for(rug).cloned().unwrap();
    assert_eq!(line.quantity, 6);
    assert!(!line.can_increment());
    assert_eq!(line.clamp_to_stock(6), 2);
}

#[tokio::test]
async fn test_remove_absent_line_leaves_cart_unchanged() {
    let ctx = lamp_and_candle();
    let (lamp, candle) = (ctx.catalog[0].id, ctx.catalog[1].id);
    let cart = ctx.session();
    let user = UserId::generate();

    cart.add_item(Some(&user), lamp, 1).await.unwrap();
    let before = cart.snapshot();

    cart.remove_item(Some(&user), candle).await.unwrap();
    cart.remove_item(Some(&user), candle).await.unwrap();

    assert_eq!(cart.snapshot(), before);
}

#[tokio::test]
async fn test_clear_cart_always_empties() {
    let ctx = lamp_and_candle();
    let (lamp, candle) = (ctx.catalog[0].id, ctx.catalog[1].id);
    let cart = ctx.session();
    let user = UserId::generate();

    cart.clear_cart(Some(&user)).await.unwrap();
    assert!(cart.snapshot().is_empty());

    cart.add_item(Some(&user), lamp, 3).await.unwrap();
    cart.add_item(Some(&user), candle, 1).await.unwrap();
    cart.clear_cart(Some(&user)).await.unwrap();

    assert!(cart.snapshot().is_empty());
    assert_eq!(cart.total(), Decimal::ZERO);
    assert_eq!(cart.item_count(), 0);
    assert_eq!(cart.summary(&CheckoutRates::default()).total, Decimal::ZERO);
}

// =============================================================================
// Sessions
// =============================================================================

#[tokio::test]
async fn test_sign_in_loads_existing_cart() {
    let ctx = lamp_and_candle();
    let lamp = ctx.catalog[0].id;
    let user = UserId::generate();

    let first = ctx.session();
    first.add_item(Some(&user), lamp, 2).await.unwrap();

    let second = ctx.session();
    second.set_user(Some(user)).await.unwrap();
    assert_eq!(second.snapshot(), first.snapshot());
}

#[tokio::test]
async fn test_sign_out_empties_cart() {
    let ctx = lamp_and_candle();
    let lamp = ctx.catalog[0].id;
    let cart = ctx.session();
    let user = UserId::generate();

    cart.set_user(Some(user)).await.unwrap();
    cart.add_item(Some(&user), lamp, 2).await.unwrap();
    cart.set_user(None).await.unwrap();

    assert!(cart.snapshot().is_empty());
    assert!(cart.owner().is_none());
    // Remote rows survive sign-out
    assert_eq!(ctx.store.quantities(user), vec![(lamp, 2)]);
}

#[tokio::test]
async fn test_concurrent_adds_from_two_sessions_all_count() {
    let ctx = lamp_and_candle();
    let lamp = ctx.catalog[0].id;
    let user = UserId::generate();
    let tab_a = ctx.session();
    let tab_b = ctx.session();

    let mut handles = Vec::new();
    for (tab, quantity) in [(tab_a.clone(), 2), (tab_b.clone(), 3), (tab_a.clone(), 4)] {
        handles.push(tokio::spawn(async move {
            tab.add_item(Some(&user), lamp, quantity).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(ctx.store.quantities(user), vec![(lamp, 9)]);

    tab_a.load_cart(Some(&user)).await.unwrap();
    tab_b.load_cart(Some(&user)).await.unwrap();
    assert_eq!(tab_a.item_count(), 9);
    assert_eq!(tab_b.item_count(), 9);
}

#[tokio::test]
async fn test_users_do_not_see_each_other() {
    let ctx = lamp_and_candle();
    let (lamp, candle) = (ctx.catalog[0].id, ctx.catalog[1].id);
    let alice = UserId::generate();
    let bob = UserId::generate();
    let cart = ctx.session();

    cart.add_item(Some(&alice), lamp, 1).await.unwrap();
    cart.add_item(Some(&bob), candle, 2).await.unwrap();

    assert_eq!(cart.owner(), Some(bob));
    assert_eq!(cart.snapshot().lines.len(), 1);
    assert!(cart.snapshot().line_for(lamp).is_none());

    cart.clear_cart(Some(&bob)).await.unwrap();
    assert_eq!(ctx.store.quantities(alice), vec![(lamp, 1)]);
}

// =============================================================================
// Failures
// =============================================================================

#[tokio::test]
async fn test_failed_fetch_keeps_state_and_clears_loading() {
    let ctx = lamp_and_candle();
    let lamp = ctx.catalog[0].id;
    let cart = ctx.session();
    let user = UserId::generate();

    cart.add_item(Some(&user), lamp, 3).await.unwrap();
    let before = cart.snapshot();

    ctx.store.fail_next("upstream timeout");
    let err = cart.load_cart(Some(&user)).await.unwrap_err();

    assert!(matches!(err, CartError::Store(StoreError::Unavailable(_))));
    assert_eq!(cart.snapshot(), before);
    assert!(!cart.is_loading());
}

#[tokio::test]
async fn test_failed_mutation_is_reported() {
    let ctx = lamp_and_candle();
    let (lamp, candle) = (ctx.catalog[0].id, ctx.catalog[1].id);
    let cart = ctx.session();
    let user = UserId::generate();

    cart.add_item(Some(&user), lamp, 1).await.unwrap();

    ctx.store.fail_next("connection reset");
    assert!(cart.add_item(Some(&user), candle, 1).await.is_err());
    assert_eq!(cart.item_count(), 1);

    ctx.store.fail_next("connection reset");
    assert!(cart.clear_cart(Some(&user)).await.is_err());
    assert_eq!(cart.item_count(), 1);
}

#[tokio::test]
async fn test_unknown_product_is_a_constraint_error() {
    let ctx = lamp_and_candle();
    let cart = ctx.session();
    let user = UserId::generate();
    let missing = product("ghost", 100, 1);

    let err = cart
        .add_item(Some(&user), missing.id, 1)
        .await
        .unwrap_err();
    assert!(matches!(err, CartError::Store(StoreError::Constraint(_))));
    assert!(cart.snapshot().is_empty());
}

#[tokio::test]
async fn test_non_positive_add_is_rejected() {
    let ctx = lamp_and_candle();
    let lamp = ctx.catalog[0].id;
    let cart = ctx.session();
    let user = UserId::generate();

    let err = cart.add_item(Some(&user), lamp, -2).await.unwrap_err();
    assert!(matches!(err, CartError::InvalidQuantity(-2)));
    assert_eq!(ctx.store.remote_calls(), 0);
}
