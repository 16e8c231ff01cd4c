mod common;

use axum::http::{Method, StatusCode};
use chrono::{Duration, Utc};
use common::{decimal, read_json, TestApp};
use rust_decimal_macros::dec;
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn adding_first_product_creates_cart_with_its_price() {
    let app = TestApp::new().await;
    let customer = app.seed_customer("Ada", "ada@example.com", None).await;
    let product = app
        .seed_product("Keyboard", dec!(100.00), dec!(0.00), 5)
        .await;
    let token = app.customer_token(customer.id);

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/cart/{}", product.id),
            None,
            Some(&token),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["status"], "success");
    assert_eq!(body["message"], "Item added to cart");
    assert_eq!(decimal(&body["data"]["cart"]["total_price"]), dec!(100));
    assert_eq!(body["data"]["items"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"]["items"][0]["quantity"], 1);
}

#[tokio::test]
async fn adding_same_product_twice_increments_the_line() {
    let app = TestApp::new().await;
    let customer = app.seed_customer("Ada", "ada@example.com", None).await;
    let product = app
        .seed_product("Keyboard", dec!(100.00), dec!(0.00), 5)
        .await;
    let token = app.customer_token(customer.id);
    let uri = format!("/api/v1/cart/{}", product.id);

    app.request(Method::POST, &uri, None, Some(&token)).await;
    let response = app.request(Method::POST, &uri, None, Some(&token)).await;

    let body = read_json(response).await;
    let items = body["data"]["items"].as_array().unwrap();
    assert_eq!(items.len(), 1, "same product must not create a second line");
    assert_eq!(items[0]["quantity"], 2);
    assert_eq!(decimal(&body["data"]["cart"]["total_price"]), dec!(200));
}

#[tokio::test]
async fn adding_missing_product_is_not_found() {
    let app = TestApp::new().await;
    let customer = app.seed_customer("Ada", "ada@example.com", None).await;
    let token = app.customer_token(customer.id);

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/cart/{}", Uuid::new_v4()),
            None,
            Some(&token),
        )
        .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn adding_out_of_stock_product_is_not_found() {
    let app = TestApp::new().await;
    let customer = app.seed_customer("Ada", "ada@example.com", None).await;
    let product = app
        .seed_product("Sold out", dec!(50.00), dec!(0.00), 0)
        .await;
    let token = app.customer_token(customer.id);

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/cart/{}", product.id),
            None,
            Some(&token),
        )
        .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn discount_track_nets_against_full_price() {
    let app = TestApp::new().await;
    let customer = app.seed_customer("Ada", "ada@example.com", None).await;
    // price 100, discount track 20: the line contributes 100 - 20 = 80.
    let product = app
        .seed_product("Discounted", dec!(100.00), dec!(20.00), 5)
        .await;
    let token = app.customer_token(customer.id);

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/cart/{}", product.id),
            None,
            Some(&token),
        )
        .await;

    let body = read_json(response).await;
    assert_eq!(decimal(&body["data"]["cart"]["total_price"]), dec!(80));
}

#[tokio::test]
async fn updating_quantity_recomputes_the_total() {
    let app = TestApp::new().await;
    let customer = app.seed_customer("Ada", "ada@example.com", None).await;
    let product = app
        .seed_product("Keyboard", dec!(100.00), dec!(0.00), 10)
        .await;
    let token = app.customer_token(customer.id);
    let uri = format!("/api/v1/cart/{}", product.id);

    app.request(Method::POST, &uri, None, Some(&token)).await;
    let response = app
        .request(
            Method::PATCH,
            &uri,
            Some(json!({"quantity": 3, "color": "black"})),
            Some(&token),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["data"]["items"][0]["quantity"], 3);
    assert_eq!(body["data"]["items"][0]["color"], "black");
    assert_eq!(decimal(&body["data"]["cart"]["total_price"]), dec!(300));
}

#[tokio::test]
async fn zero_quantity_update_is_rejected() {
    let app = TestApp::new().await;
    let customer = app.seed_customer("Ada", "ada@example.com", None).await;
    let product = app
        .seed_product("Keyboard", dec!(100.00), dec!(0.00), 5)
        .await;
    let token = app.customer_token(customer.id);
    let uri = format!("/api/v1/cart/{}", product.id);

    app.request(Method::POST, &uri, None, Some(&token)).await;
    let response = app
        .request(Method::PATCH, &uri, Some(json!({"quantity": 0})), Some(&token))
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn updating_a_line_that_is_not_in_the_cart_is_not_found() {
    let app = TestApp::new().await;
    let customer = app.seed_customer("Ada", "ada@example.com", None).await;
    let carted = app
        .seed_product("Keyboard", dec!(100.00), dec!(0.00), 5)
        .await;
    let other = app.seed_product("Mouse", dec!(30.00), dec!(0.00), 5).await;
    let token = app.customer_token(customer.id);

    app.request(
        Method::POST,
        &format!("/api/v1/cart/{}", carted.id),
        None,
        Some(&token),
    )
    .await;
    // The line does not exist; there is no silent fallback to add.
    let response = app
        .request(
            Method::PATCH,
            &format!("/api/v1/cart/{}", other.id),
            Some(json!({"quantity": 2})),
            Some(&token),
        )
        .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn removing_the_last_item_zeroes_the_total() {
    let app = TestApp::new().await;
    let customer = app.seed_customer("Ada", "ada@example.com", None).await;
    let product = app
        .seed_product("Keyboard", dec!(100.00), dec!(0.00), 5)
        .await;
    let token = app.customer_token(customer.id);
    let uri = format!("/api/v1/cart/{}", product.id);

    app.request(Method::POST, &uri, None, Some(&token)).await;
    let response = app.request(Method::DELETE, &uri, None, Some(&token)).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert!(body["data"]["items"].as_array().unwrap().is_empty());
    assert_eq!(decimal(&body["data"]["cart"]["total_price"]), dec!(0));
}

#[tokio::test]
async fn two_products_sum_into_one_total() {
    let app = TestApp::new().await;
    let customer = app.seed_customer("Ada", "ada@example.com", None).await;
    let keyboard = app
        .seed_product("Keyboard", dec!(100.00), dec!(0.00), 5)
        .await;
    let mouse = app.seed_product("Mouse", dec!(30.00), dec!(5.00), 5).await;
    let token = app.customer_token(customer.id);

    let keyboard_uri = format!("/api/v1/cart/{}", keyboard.id);
    let mouse_uri = format!("/api/v1/cart/{}", mouse.id);
    let add_keyboard = app.request(Method::POST, &keyboard_uri, None, Some(&token));
    let add_mouse = app.request(Method::POST, &mouse_uri, None, Some(&token));
    tokio::join!(add_keyboard, add_mouse);

    let response = app
        .request(Method::GET, "/api/v1/cart", None, Some(&token))
        .await;
    let body = read_json(response).await;
    assert_eq!(body["data"]["items"].as_array().unwrap().len(), 2);
    // 100 + (30 - 5)
    assert_eq!(decimal(&body["data"]["cart"]["total_price"]), dec!(125));
}

#[tokio::test]
async fn getting_a_cart_before_any_add_is_not_found() {
    let app = TestApp::new().await;
    let customer = app.seed_customer("Ada", "ada@example.com", None).await;
    let token = app.customer_token(customer.id);

    let response = app
        .request(Method::GET, "/api/v1/cart", None, Some(&token))
        .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn requests_without_a_token_are_unauthorized() {
    let app = TestApp::new().await;

    let response = app.request(Method::GET, "/api/v1/cart", None, None).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_tokens_are_rejected_on_customer_routes() {
    let app = TestApp::new().await;
    let product = app
        .seed_product("Keyboard", dec!(100.00), dec!(0.00), 5)
        .await;
    let admin = app.admin_token();

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/cart/{}", product.id),
            None,
            Some(&admin),
        )
        .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn admin_can_view_any_customers_cart() {
    let app = TestApp::new().await;
    let customer = app.seed_customer("Ada", "ada@example.com", None).await;
    let product = app
        .seed_product("Keyboard", dec!(100.00), dec!(0.00), 5)
        .await;
    let token = app.customer_token(customer.id);
    app.request(
        Method::POST,
        &format!("/api/v1/cart/{}", product.id),
        None,
        Some(&token),
    )
    .await;

    let admin = app.admin_token();
    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/cart/admin/{}", customer.id),
            None,
            Some(&admin),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(decimal(&body["data"]["cart"]["total_price"]), dec!(100));
}

#[tokio::test]
async fn customer_tokens_are_rejected_on_admin_routes() {
    let app = TestApp::new().await;
    let customer = app.seed_customer("Ada", "ada@example.com", None).await;
    let token = app.customer_token(customer.id);

    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/cart/admin/{}", customer.id),
            None,
            Some(&token),
        )
        .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

// Coupons

#[tokio::test]
async fn valid_coupon_reduces_the_total_by_its_discount() {
    let app = TestApp::new().await;
    let customer = app.seed_customer("Ada", "ada@example.com", None).await;
    let product = app
        .seed_product("Keyboard", dec!(100.00), dec!(0.00), 5)
        .await;
    app.seed_coupon("WELCOME15", dec!(15.00), Utc::now() + Duration::days(7))
        .await;
    let token = app.customer_token(customer.id);

    app.request(
        Method::POST,
        &format!("/api/v1/cart/{}", product.id),
        None,
        Some(&token),
    )
    .await;
    let response = app
        .request(
            Method::POST,
            "/api/v1/cart/coupon/WELCOME15",
            None,
            Some(&token),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(decimal(&body["data"]["cart"]["total_price"]), dec!(85));
    assert_eq!(body["data"]["coupons"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn applying_the_same_coupon_twice_is_rejected() {
    let app = TestApp::new().await;
    let customer = app.seed_customer("Ada", "ada@example.com", None).await;
    let product = app
        .seed_product("Keyboard", dec!(100.00), dec!(0.00), 5)
        .await;
    app.seed_coupon("WELCOME15", dec!(15.00), Utc::now() + Duration::days(7))
        .await;
    let token = app.customer_token(customer.id);

    app.request(
        Method::POST,
        &format!("/api/v1/cart/{}", product.id),
        None,
        Some(&token),
    )
    .await;
    app.request(
        Method::POST,
        "/api/v1/cart/coupon/WELCOME15",
        None,
        Some(&token),
    )
    .await;
    let second = app
        .request(
            Method::POST,
            "/api/v1/cart/coupon/WELCOME15",
            None,
            Some(&token),
        )
        .await;

    assert_eq!(second.status(), StatusCode::BAD_REQUEST);

    // The rejection must not have changed the total.
    let cart = app
        .request(Method::GET, "/api/v1/cart", None, Some(&token))
        .await;
    let body = read_json(cart).await;
    assert_eq!(decimal(&body["data"]["cart"]["total_price"]), dec!(85));
}

#[tokio::test]
async fn expired_coupon_is_rejected() {
    let app = TestApp::new().await;
    let customer = app.seed_customer("Ada", "ada@example.com", None).await;
    let product = app
        .seed_product("Keyboard", dec!(100.00), dec!(0.00), 5)
        .await;
    app.seed_coupon("BYGONE", dec!(15.00), Utc::now() - Duration::days(1))
        .await;
    let token = app.customer_token(customer.id);

    app.request(
        Method::POST,
        &format!("/api/v1/cart/{}", product.id),
        None,
        Some(&token),
    )
    .await;
    let response = app
        .request(
            Method::POST,
            "/api/v1/cart/coupon/BYGONE",
            None,
            Some(&token),
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_coupon_is_rejected() {
    let app = TestApp::new().await;
    let customer = app.seed_customer("Ada", "ada@example.com", None).await;
    let product = app
        .seed_product("Keyboard", dec!(100.00), dec!(0.00), 5)
        .await;
    let token = app.customer_token(customer.id);

    app.request(
        Method::POST,
        &format!("/api/v1/cart/{}", product.id),
        None,
        Some(&token),
    )
    .await;
    let response = app
        .request(
            Method::POST,
            "/api/v1/cart/coupon/NO_SUCH_CODE",
            None,
            Some(&token),
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn coupon_on_a_fully_discounted_cart_is_rejected() {
    let app = TestApp::new().await;
    let customer = app.seed_customer("Ada", "ada@example.com", None).await;
    // discount track equals the price, so the cart total is zero.
    let product = app
        .seed_product("Freebie", dec!(40.00), dec!(40.00), 5)
        .await;
    app.seed_coupon("WELCOME15", dec!(15.00), Utc::now() + Duration::days(7))
        .await;
    let token = app.customer_token(customer.id);

    app.request(
        Method::POST,
        &format!("/api/v1/cart/{}", product.id),
        None,
        Some(&token),
    )
    .await;
    let response = app
        .request(
            Method::POST,
            "/api/v1/cart/coupon/WELCOME15",
            None,
            Some(&token),
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
