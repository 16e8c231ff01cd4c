//! Storefront API: cart aggregate maintenance and cart-to-order checkout.

pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod openapi;
pub mod services;

use std::sync::Arc;

use axum::{
    routing::{get, patch, post},
    Router,
};
use sea_orm::DatabaseConnection;

use crate::events::EventSender;
use crate::handlers::AppServices;

/// Shared application state injected into every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: Arc<EventSender>,
    pub services: AppServices,
}

/// All v1 routes, mounted under `/api/v1` by the binary.
pub fn api_v1_routes() -> Router<AppState> {
    Router::new()
        // Cart
        .route("/cart", get(handlers::carts::get_cart))
        .route(
            "/cart/:product_id",
            post(handlers::carts::add_item)
                .patch(handlers::carts::update_item)
                .delete(handlers::carts::remove_item),
        )
        .route(
            "/cart/coupon/:coupon_name",
            post(handlers::carts::apply_coupon),
        )
        .route("/cart/admin/:user_id", get(handlers::carts::admin_get_cart))
        // Checkout; both routes share the parameter name matchit requires.
        .route(
            "/cart/checkout/:target",
            post(handlers::checkout::checkout),
        )
        .route(
            "/cart/checkout/:target/cash",
            patch(handlers::checkout::settle_cash),
        )
        // Payment provider webhook
        .route("/cart/session", post(handlers::webhooks::payment_webhook))
        // Orders
        .route("/order/user", get(handlers::orders::my_orders))
        .route("/order/admin/:user_id", get(handlers::orders::admin_orders))
        // Tax configuration
        .route(
            "/tax",
            get(handlers::tax::get_config)
                .post(handlers::tax::upsert_config)
                .delete(handlers::tax::reset_config),
        )
}
