//! The storefront router end to end over in-memory storage.

#![allow(clippy::unwrap_used)]

use axum::http::{Method, StatusCode, header};
use rust_decimal::Decimal;
use serde_json::{Value, json};

use vidriera_core::{Role, StatusPolicy};
use vidriera_integration_tests::{TestApp, cookie_from, decimal, draft, seed_product, seed_user, shipping};
use vidriera_storefront::db::CatalogStore;

fn checkout() -> Value {
    json!({
        "shipping_info": shipping(),
        "payment_method": "mercadopago",
    })
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health_endpoints() {
    let app = TestApp::new(StatusPolicy::Permissive);

    let (status, headers, _) = app.send_raw(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(headers.contains_key("x-request-id"));

    let (status, _) = app.send(Method::GET, "/health/ready", None, None).await;
    assert_eq!(status, StatusCode::OK);
}

// =============================================================================
// Auth
// =============================================================================

#[tokio::test]
async fn test_protected_routes_require_sign_in() {
    let app = TestApp::new(StatusPolicy::Permissive);

    for (method, uri) in [
        (Method::GET, "/api/cart"),
        (Method::POST, "/api/orders"),
        (Method::GET, "/api/users"),
        (Method::GET, "/auth/login/success"),
    ] {
        let (status, body) = app.send(method, uri, None, Some(json!({}))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
        assert!(body["error"].is_string(), "{uri}");
    }
}

#[tokio::test]
async fn test_google_login_redirects_to_consent_screen() {
    let app = TestApp::new(StatusPolicy::Permissive);

    let (status, headers, _) = app.send_raw(Method::GET, "/auth/google", None, None).await;

    assert_eq!(status, StatusCode::SEE_OTHER);
    let location = headers.get(header::LOCATION).unwrap().to_str().unwrap();
    assert!(location.starts_with("https://accounts.google.com/"));
    assert!(location.contains("client_id=1234.apps.googleusercontent.com"));
    assert!(cookie_from(&headers).is_some());
}

#[tokio::test]
async fn test_callback_rejects_mismatched_state() {
    let app = TestApp::new(StatusPolicy::Permissive);

    let (_, headers, _) = app.send_raw(Method::GET, "/auth/google", None, None).await;
    let cookie = cookie_from(&headers).unwrap();

    let (status, body) = app
        .send(
            Method::GET,
            "/auth/google/callback?code=abc&state=forged",
            Some(&cookie),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].is_string());

    // Without a session there is no state to match.
    let (status, _) = app
        .send(Method::GET, "/auth/google/callback?code=abc&state=forged", None, None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_callback_with_provider_error_returns_to_client() {
    let app = TestApp::new(StatusPolicy::Permissive);

    let (status, headers, _) = app
        .send_raw(Method::GET, "/auth/google/callback?error=access_denied", None, None)
        .await;

    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(
        headers.get(header::LOCATION).unwrap(),
        "http://localhost:5173/?login=failed"
    );
}

#[tokio::test]
async fn test_login_failed_is_unauthorized() {
    let app = TestApp::new(StatusPolicy::Permissive);

    let (status, body) = app.send(Method::GET, "/auth/login/failed", None, None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Fallo en el inicio de sesión");
}

#[tokio::test]
async fn test_login_success_and_logout() {
    let app = TestApp::new(StatusPolicy::Permissive);
    let ana = seed_user(&app.store, "ana@tienda.com.ar", Role::User).await;
    let cookie = app.sign_in(&ana).await;

    let (status, body) = app.send(Method::GET, "/auth/login/success", Some(&cookie), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "ana@tienda.com.ar");

    let (status, _) = app.send(Method::POST, "/auth/logout", Some(&cookie), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.send(Method::GET, "/auth/login/success", Some(&cookie), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// =============================================================================
// Catalog
// =============================================================================

#[tokio::test]
async fn test_only_admins_manage_products() {
    let app = TestApp::new(StatusPolicy::Permissive);
    let ana = seed_user(&app.store, "ana@tienda.com.ar", Role::User).await;
    let admin = seed_user(&app.store, "admin@tienda.com.ar", Role::Admin).await;
    let user_cookie = app.sign_in(&ana).await;
    let admin_cookie = app.sign_in(&admin).await;
    let body = serde_json::to_value(draft("A15", 4, 250_000)).unwrap();

    let (status, _) = app
        .send(Method::POST, "/api/products", Some(&user_cookie), Some(body.clone()))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, created) = app
        .send(Method::POST, "/api/products", Some(&admin_cookie), Some(body))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["stock"], 4);

    let uri = format!("/api/products/{}", created["id"]);
    let (status, fetched) = app.send(Method::GET, &uri, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched, created);

    let (status, _) = app.send(Method::DELETE, &uri, Some(&admin_cookie), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.send(Method::GET, &uri, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_product_listing_filters_by_category() {
    let app = TestApp::new(StatusPolicy::Permissive);
    seed_product(&app.store, "A15", 4, 250_000).await;
    let mut tablet = draft("Tab S9", 2, 900_000);
    tablet.category = "tablets".into();
    app.store.create_product(&tablet).await.unwrap();

    let (status, all) = app.send(Method::GET, "/api/products", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(all.as_array().unwrap().len(), 2);

    let (_, tablets) = app.send(Method::GET, "/api/products?category=tablets", None, None).await;
    let tablets = tablets.as_array().unwrap();
    assert_eq!(tablets.len(), 1);
    assert_eq!(tablets.first().unwrap()["model"], "Tab S9");
}

// =============================================================================
// Cart
// =============================================================================

#[tokio::test]
async fn test_cart_quantity_is_capped_by_stock() {
    let app = TestApp::new(StatusPolicy::Permissive);
    let phone = seed_product(&app.store, "A15", 2, 250_000).await;
    let ana = seed_user(&app.store, "ana@tienda.com.ar", Role::User).await;
    let cookie = app.sign_in(&ana).await;

    let (status, cart) = app
        .send(
            Method::POST,
            "/api/cart/items",
            Some(&cookie),
            Some(json!({ "product_id": phone.id })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cart["lines"][0]["quantity"], 1);

    let uri = format!("/api/cart/items/{}", phone.id);
    let (status, body) = app
        .send(Method::PUT, &uri, Some(&cookie), Some(json!({ "quantity": 3 })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, cart) = app
        .send(Method::PUT, &uri, Some(&cookie), Some(json!({ "quantity": 2 })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cart["lines"][0]["quantity"], 2);
    assert_eq!(decimal(&cart["total"]), Decimal::new(500_000, 0));

    let (status, cart) = app.send(Method::DELETE, "/api/cart", Some(&cookie), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(cart["lines"].as_array().unwrap().is_empty());
}

// =============================================================================
// Orders
// =============================================================================

#[tokio::test]
async fn test_checkout_requires_complete_shipping() {
    let app = TestApp::new(StatusPolicy::Permissive);
    let phone = seed_product(&app.store, "A15", 2, 250_000).await;
    let ana = seed_user(&app.store, "ana@tienda.com.ar", Role::User).await;
    let cookie = app.sign_in(&ana).await;
    app.send(
        Method::POST,
        "/api/cart/items",
        Some(&cookie),
        Some(json!({ "product_id": phone.id })),
    )
    .await;

    // No request snapshot and an empty saved profile.
    let (status, body) = app
        .send(
            Method::POST,
            "/api/orders",
            Some(&cookie),
            Some(json!({ "payment_method": "mercadopago" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let missing = body["missing_fields"].as_array().unwrap();
    assert!(missing.contains(&json!("postal_code")));

    let (status, order) = app
        .send(Method::POST, "/api/orders", Some(&cookie), Some(checkout()))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(order["label"], "#0001");
    assert_eq!(order["status"], "creado");
    assert_eq!(decimal(&order["total"]), Decimal::new(250_000, 0));
    assert_eq!(app.store.get_product(phone.id).await.unwrap().unwrap().stock, 1);
}

#[tokio::test]
async fn test_order_visibility() {
    let app = TestApp::new(StatusPolicy::Permissive);
    let phone = seed_product(&app.store, "A15", 2, 250_000).await;
    let ana = seed_user(&app.store, "ana@tienda.com.ar", Role::User).await;
    let beto = seed_user(&app.store, "beto@tienda.com.ar", Role::User).await;
    let admin = seed_user(&app.store, "admin@tienda.com.ar", Role::Admin).await;
    let ana_cookie = app.sign_in(&ana).await;
    let beto_cookie = app.sign_in(&beto).await;
    let admin_cookie = app.sign_in(&admin).await;

    app.send(
        Method::POST,
        "/api/cart/items",
        Some(&ana_cookie),
        Some(json!({ "product_id": phone.id })),
    )
    .await;
    let (_, order) = app
        .send(Method::POST, "/api/orders", Some(&ana_cookie), Some(checkout()))
        .await;
    let uri = format!("/api/orders/{}", order["id"]);

    let (status, fetched) = app.send(Method::GET, &uri, Some(&ana_cookie), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched, order);

    let (status, _) = app.send(Method::GET, &uri, Some(&beto_cookie), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.send(Method::GET, &uri, Some(&admin_cookie), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.send(Method::GET, "/api/orders", Some(&ana_cookie), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, all) = app.send(Method::GET, "/api/orders", Some(&admin_cookie), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(all.as_array().unwrap().len(), 1);

    let history = format!("/api/users/{}/orders", ana.id);
    let (status, mine) = app.send(Method::GET, &history, Some(&ana_cookie), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(mine.as_array().unwrap().len(), 1);
    let (status, _) = app.send(Method::GET, &history, Some(&beto_cookie), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_admin_updates_order_status() {
    let app = TestApp::new(StatusPolicy::Permissive);
    let phone = seed_product(&app.store, "A15", 2, 250_000).await;
    let ana = seed_user(&app.store, "ana@tienda.com.ar", Role::User).await;
    let admin = seed_user(&app.store, "admin@tienda.com.ar", Role::Admin).await;
    let ana_cookie = app.sign_in(&ana).await;
    let admin_cookie = app.sign_in(&admin).await;

    app.send(
        Method::POST,
        "/api/cart/items",
        Some(&ana_cookie),
        Some(json!({ "product_id": phone.id })),
    )
    .await;
    let (_, order) = app
        .send(Method::POST, "/api/orders", Some(&ana_cookie), Some(checkout()))
        .await;
    let uri = format!("/api/orders/{}/status", order["id"]);

    let (status, _) = app
        .send(Method::PATCH, &uri, Some(&ana_cookie), Some(json!({ "status": "enviado" })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, updated) = app
        .send(
            Method::PATCH,
            &uri,
            Some(&admin_cookie),
            Some(json!({
                "status": "enviado",
                "tracking_number": "AR123456789",
                "shipping_company": "Correo Argentino",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["status"], "enviado");
    assert_eq!(updated["history"].as_array().unwrap().len(), 2);
    assert_eq!(updated["shipping"]["tracking_number"], "AR123456789");

    let (status, body) = app
        .send(Method::PATCH, &uri, Some(&admin_cookie), Some(json!({ "status": "perdido" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_forward_only_policy_is_enforced_over_http() {
    let app = TestApp::new(StatusPolicy::ForwardOnly);
    let phone = seed_product(&app.store, "A15", 2, 250_000).await;
    let ana = seed_user(&app.store, "ana@tienda.com.ar", Role::User).await;
    let admin = seed_user(&app.store, "admin@tienda.com.ar", Role::Admin).await;
    let ana_cookie = app.sign_in(&ana).await;
    let admin_cookie = app.sign_in(&admin).await;

    app.send(
        Method::POST,
        "/api/cart/items",
        Some(&ana_cookie),
        Some(json!({ "product_id": phone.id })),
    )
    .await;
    let (_, order) = app
        .send(Method::POST, "/api/orders", Some(&ana_cookie), Some(checkout()))
        .await;
    let uri = format!("/api/orders/{}/status", order["id"]);

    let (status, _) = app
        .send(Method::PATCH, &uri, Some(&admin_cookie), Some(json!({ "status": "entregado" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app
        .send(Method::PATCH, &uri, Some(&admin_cookie), Some(json!({ "status": "creado" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// =============================================================================
// Users
// =============================================================================

#[tokio::test]
async fn test_shipping_profile_must_be_complete() {
    let app = TestApp::new(StatusPolicy::Permissive);
    let ana = seed_user(&app.store, "ana@tienda.com.ar", Role::User).await;
    let cookie = app.sign_in(&ana).await;

    let (status, body) = app
        .send(
            Method::PUT,
            "/api/users/me/shipping",
            Some(&cookie),
            Some(json!({ "name": "Ana", "city": "Rosario" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["missing_fields"].as_array().unwrap().contains(&json!("street")));

    let (status, user) = app
        .send(
            Method::PUT,
            "/api/users/me/shipping",
            Some(&cookie),
            Some(serde_json::to_value(shipping()).unwrap()),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(user["shipping"]["city"], "Rosario");
}

#[tokio::test]
async fn test_user_directory_is_admin_only() {
    let app = TestApp::new(StatusPolicy::Permissive);
    let ana = seed_user(&app.store, "ana@tienda.com.ar", Role::User).await;
    let admin = seed_user(&app.store, "admin@tienda.com.ar", Role::Admin).await;
    let ana_cookie = app.sign_in(&ana).await;
    let admin_cookie = app.sign_in(&admin).await;

    let (status, _) = app.send(Method::GET, "/api/users", Some(&ana_cookie), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, users) = app.send(Method::GET, "/api/users", Some(&admin_cookie), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(users.as_array().unwrap().len(), 2);

    let uri = format!("/api/users/{}", ana.id);
    let (status, _) = app.send(Method::DELETE, &uri, Some(&ana_cookie), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.send(Method::DELETE, &uri, Some(&admin_cookie), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.send(Method::GET, &uri, Some(&admin_cookie), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
