//! Order placement and status history against the in-memory store.
//!
//! These cover the concurrency and atomicity guarantees that unit tests in
//! the storefront crate cannot exercise from a single task.

#![allow(clippy::unwrap_used)]

use std::collections::HashSet;

use rust_decimal::Decimal;

use vidriera_core::{OrderNumber, OrderStatus, Role, StatusPolicy};
use vidriera_integration_tests::{GatedStore, draft, seed_product, seed_user, shipping};
use vidriera_storefront::db::{CartStore, CatalogStore, MemoryStore, OrderStore, Store, UnitOfWork};
use vidriera_storefront::models::CurrentUser;
use vidriera_storefront::services::{CartService, CatalogService, OrderService, PlaceOrder, ShopError, StatusChange};

fn checkout() -> PlaceOrder {
    PlaceOrder {
        shipping_info: Some(shipping()),
        payment_method: Some("mercadopago".into()),
    }
}

fn change(status: &str) -> StatusChange {
    StatusChange {
        status: status.into(),
        tracking_number: None,
        shipping_company: None,
    }
}

async fn place<S: Store>(store: S, actor: CurrentUser) -> Result<OrderNumber, ShopError> {
    OrderService::new(&store, StatusPolicy::Permissive)
        .place(&actor, checkout())
        .await
        .map(|order| order.number)
}

// =============================================================================
// Last unit in stock
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_last_unit_is_sold_once() {
    let store = MemoryStore::new();
    let phone = seed_product(&store, "A15", 1, 250_000).await;
    let ana = seed_user(&store, "ana@tienda.com.ar", Role::User).await;
    let beto = seed_user(&store, "beto@tienda.com.ar", Role::User).await;

    // Cart checks are advisory, so both carts hold the last unit.
    let carts = CartService::new(&store);
    carts.add_line(ana.id, phone.id).await.unwrap();
    carts.add_line(beto.id, phone.id).await.unwrap();

    let first = tokio::spawn(place(store.clone(), ana.clone()));
    let second = tokio::spawn(place(store.clone(), beto.clone()));
    let results = [first.await.unwrap(), second.await.unwrap()];

    let winners = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1);
    for result in &results {
        if let Err(err) = result {
            assert!(
                matches!(err, ShopError::InsufficientStock { .. } | ShopError::Conflict(_)),
                "unexpected error: {err:?}"
            );
        }
    }

    assert_eq!(store.get_product(phone.id).await.unwrap().unwrap().stock, 0);
    assert_eq!(store.all_orders().await.unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_placements_get_distinct_numbers() {
    const BUYERS: usize = 8;

    let store = MemoryStore::new();
    let phone = seed_product(&store, "A15", 100, 250_000).await;

    let mut buyers = Vec::with_capacity(BUYERS);
    for i in 0..BUYERS {
        let buyer = seed_user(&store, &format!("buyer{i}@tienda.com.ar"), Role::User).await;
        CartService::new(&store).add_line(buyer.id, phone.id).await.unwrap();
        buyers.push(buyer);
    }

    let handles: Vec<_> = buyers
        .into_iter()
        .map(|buyer| tokio::spawn(place(store.clone(), buyer)))
        .collect();

    let mut numbers = HashSet::new();
    for handle in handles {
        numbers.insert(handle.await.unwrap().unwrap());
    }

    assert_eq!(numbers.len(), BUYERS);
    let expected: HashSet<_> = (1..=8).map(OrderNumber::new).collect();
    assert_eq!(numbers, expected);
    assert_eq!(store.get_product(phone.id).await.unwrap().unwrap().stock, 92);
}

// =============================================================================
// Cart taken by the placement
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_same_cart_placed_twice_makes_one_order() {
    let store = GatedStore::new();
    let phone = seed_product(&store.inner, "A15", 10, 250_000).await;
    let ana = seed_user(&store.inner, "ana@tienda.com.ar", Role::User).await;
    CartService::new(&store.inner).add_line(ana.id, phone.id).await.unwrap();

    // Both read the same one-line cart before either opens a unit of work.
    let first = tokio::spawn(place(store.clone(), ana.clone()));
    let second = tokio::spawn(place(store.clone(), ana.clone()));
    store.wait_for_begin(2).await;
    store.open(2);
    let results = [first.await.unwrap(), second.await.unwrap()];

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    let loser = results.iter().find_map(|r| r.as_ref().err()).unwrap();
    assert!(
        matches!(loser, ShopError::Conflict(_) | ShopError::EmptyCart),
        "unexpected error: {loser:?}"
    );

    assert_eq!(store.inner.all_orders().await.unwrap().len(), 1);
    assert_eq!(store.inner.get_product(phone.id).await.unwrap().unwrap().stock, 9);
    assert!(store.inner.cart_for_user(ana.id).await.unwrap().unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cart_edited_during_placement_is_kept() {
    let store = GatedStore::new();
    let a15 = seed_product(&store.inner, "A15", 5, 250_000).await;
    let a25 = seed_product(&store.inner, "A25", 5, 320_000).await;
    let ana = seed_user(&store.inner, "ana@tienda.com.ar", Role::User).await;
    let carts = CartService::new(&store.inner);
    carts.add_line(ana.id, a15.id).await.unwrap();

    let placing = tokio::spawn(place(store.clone(), ana.clone()));
    store.wait_for_begin(1).await;
    carts.add_line(ana.id, a25.id).await.unwrap();
    store.open(1);

    let result = placing.await.unwrap();
    assert!(matches!(result, Err(ShopError::Conflict(_))), "unexpected result: {result:?}");

    assert!(store.inner.all_orders().await.unwrap().is_empty());
    assert_eq!(store.inner.get_product(a15.id).await.unwrap().unwrap().stock, 5);
    assert_eq!(store.inner.get_product(a25.id).await.unwrap().unwrap().stock, 5);
    let cart = store.inner.cart_for_user(ana.id).await.unwrap().unwrap();
    assert_eq!(cart.lines.len(), 2);

    // Checking out again sees the edited cart.
    let number = place(store.clone(), ana.clone());
    store.open(1);
    assert_eq!(number.await.unwrap(), OrderNumber::new(1));
    assert_eq!(store.inner.get_product(a25.id).await.unwrap().unwrap().stock, 4);
}

// =============================================================================
// Atomicity
// =============================================================================

#[tokio::test]
async fn test_empty_cart_places_nothing() {
    let store = MemoryStore::new();
    let phone = seed_product(&store, "A15", 3, 250_000).await;
    let ana = seed_user(&store, "ana@tienda.com.ar", Role::User).await;

    let result = OrderService::new(&store, StatusPolicy::Permissive)
        .place(&ana, checkout())
        .await;

    assert!(matches!(result, Err(ShopError::EmptyCart)));
    assert_eq!(store.get_product(phone.id).await.unwrap().unwrap().stock, 3);
    assert!(store.all_orders().await.unwrap().is_empty());

    // The counter was not consumed either.
    CartService::new(&store).add_line(ana.id, phone.id).await.unwrap();
    let order = OrderService::new(&store, StatusPolicy::Permissive)
        .place(&ana, checkout())
        .await
        .unwrap();
    assert_eq!(order.number, OrderNumber::new(1));
}

#[tokio::test]
async fn test_failed_reservation_rolls_back_earlier_lines() {
    let store = MemoryStore::new();
    let plenty = seed_product(&store, "A15", 5, 250_000).await;
    let scarce = seed_product(&store, "A25", 1, 320_000).await;

    let mut tx = store.begin().await.unwrap();
    assert!(tx.reserve_stock(plenty.id, 2).await.unwrap());
    assert!(!tx.reserve_stock(scarce.id, 2).await.unwrap());
    tx.rollback().await.unwrap();

    assert_eq!(store.get_product(plenty.id).await.unwrap().unwrap().stock, 5);
    assert_eq!(store.get_product(scarce.id).await.unwrap().unwrap().stock, 1);
}

#[tokio::test]
async fn test_multi_line_order_totals_and_clears_cart() {
    let store = MemoryStore::new();
    let a15 = seed_product(&store, "A15", 5, 250_000).await;
    let a25 = seed_product(&store, "A25", 5, 320_000).await;
    let ana = seed_user(&store, "ana@tienda.com.ar", Role::User).await;

    let carts = CartService::new(&store);
    carts.add_line(ana.id, a25.id).await.unwrap();
    carts.add_line(ana.id, a15.id).await.unwrap();
    carts.update_line_quantity(ana.id, a15.id, 3).await.unwrap();

    let order = OrderService::new(&store, StatusPolicy::Permissive)
        .place(&ana, checkout())
        .await
        .unwrap();

    assert_eq!(order.lines.len(), 2);
    assert_eq!(order.total, Decimal::new(3 * 250_000 + 320_000, 0));
    assert_eq!(store.get_product(a15.id).await.unwrap().unwrap().stock, 2);
    assert_eq!(store.get_product(a25.id).await.unwrap().unwrap().stock, 4);
    assert!(store.cart_for_user(ana.id).await.unwrap().unwrap().is_empty());
}

// =============================================================================
// Price snapshot
// =============================================================================

#[tokio::test]
async fn test_price_at_purchase_survives_catalog_edits() {
    let store = MemoryStore::new();
    let phone = seed_product(&store, "A15", 5, 250_000).await;
    let ana = seed_user(&store, "ana@tienda.com.ar", Role::User).await;
    let admin = seed_user(&store, "admin@tienda.com.ar", Role::Admin).await;

    CartService::new(&store).add_line(ana.id, phone.id).await.unwrap();
    let orders = OrderService::new(&store, StatusPolicy::Permissive);
    let placed = orders.place(&ana, checkout()).await.unwrap();

    let mut repriced = draft("A15", 4, 400_000);
    repriced.offer_price = Some(Decimal::new(199_999, 0));
    CatalogService::new(&store).update(&admin, phone.id, repriced).await.unwrap();

    let reread = orders.get(&ana, placed.id).await.unwrap();
    let line = reread.lines.first().unwrap();
    assert_eq!(line.price_at_purchase, Decimal::new(250_000, 0));
    assert_eq!(line.subtotal, Decimal::new(250_000, 0));
    assert_eq!(reread.total, placed.total);
    // The embedded summary follows the catalog.
    assert_eq!(line.product.as_ref().unwrap().price, Decimal::new(199_999, 0));
}

// =============================================================================
// Status history
// =============================================================================

#[tokio::test]
async fn test_history_is_append_only() {
    let store = MemoryStore::new();
    let phone = seed_product(&store, "A15", 5, 250_000).await;
    let ana = seed_user(&store, "ana@tienda.com.ar", Role::User).await;
    let admin = seed_user(&store, "admin@tienda.com.ar", Role::Admin).await;

    CartService::new(&store).add_line(ana.id, phone.id).await.unwrap();
    let orders = OrderService::new(&store, StatusPolicy::Permissive);
    let placed = orders.place(&ana, checkout()).await.unwrap();

    // Reads are stable until a transition.
    assert_eq!(orders.get(&ana, placed.id).await.unwrap(), placed);

    let mut previous = placed.history.clone();
    for status in ["pago aprobado", "preparando paquete", "enviado"] {
        let next = orders.transition(&admin, placed.id, change(status)).await.unwrap();
        assert_eq!(next.history.len(), previous.len() + 1);
        assert_eq!(next.history.get(..previous.len()).unwrap(), previous.as_slice());
        previous = next.history;
    }

    let statuses: Vec<_> = previous.iter().map(|e| e.status).collect();
    assert_eq!(
        statuses,
        vec![
            OrderStatus::Created,
            OrderStatus::PaymentApproved,
            OrderStatus::Preparing,
            OrderStatus::Shipped,
        ]
    );
}

// =============================================================================
// Leaving a terminal status
// =============================================================================

#[tokio::test]
async fn test_delivered_order_can_be_reopened_when_permissive() {
    let store = MemoryStore::new();
    let phone = seed_product(&store, "A15", 5, 250_000).await;
    let ana = seed_user(&store, "ana@tienda.com.ar", Role::User).await;
    let admin = seed_user(&store, "admin@tienda.com.ar", Role::Admin).await;

    CartService::new(&store).add_line(ana.id, phone.id).await.unwrap();
    let orders = OrderService::new(&store, StatusPolicy::Permissive);
    let placed = orders.place(&ana, checkout()).await.unwrap();

    orders.transition(&admin, placed.id, change("entregado")).await.unwrap();
    let reopened = orders.transition(&admin, placed.id, change("creado")).await.unwrap();

    assert_eq!(reopened.status, OrderStatus::Created);
    assert_eq!(reopened.history.len(), 3);
}

#[tokio::test]
async fn test_delivered_order_is_final_when_forward_only() {
    let store = MemoryStore::new();
    let phone = seed_product(&store, "A15", 5, 250_000).await;
    let ana = seed_user(&store, "ana@tienda.com.ar", Role::User).await;
    let admin = seed_user(&store, "admin@tienda.com.ar", Role::Admin).await;

    CartService::new(&store).add_line(ana.id, phone.id).await.unwrap();
    let orders = OrderService::new(&store, StatusPolicy::ForwardOnly);
    let placed = orders.place(&ana, checkout()).await.unwrap();

    assert!(matches!(
        orders.transition(&admin, placed.id, change("creado")).await,
        Err(ShopError::InvalidTransition(_))
    ));
    orders.transition(&admin, placed.id, change("entregado")).await.unwrap();
    assert!(matches!(
        orders.transition(&admin, placed.id, change("creado")).await,
        Err(ShopError::InvalidTransition(_))
    ));

    let reread = orders.get(&admin, placed.id).await.unwrap();
    assert_eq!(reread.status, OrderStatus::Delivered);
    assert_eq!(reread.history.len(), 2);
}
