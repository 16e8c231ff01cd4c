//! HTTP handlers: thin adapters from routes to the service layer.

pub mod carts;
pub mod checkout;
pub mod common;
pub mod orders;
pub mod tax;
pub mod webhooks;

use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::{
    config::PaymentConfig,
    events::EventSender,
    services::{
        carts::CartService, checkout::CheckoutService, notifications::OrderNotifier,
        payments::PaymentGateway,
    },
};

/// Aggregated services shared by all handlers through [`crate::AppState`].
#[derive(Clone)]
pub struct AppServices {
    pub carts: CartService,
    pub checkout: CheckoutService,
}

impl AppServices {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        gateway: Arc<dyn PaymentGateway>,
        notifier: OrderNotifier,
        payment: PaymentConfig,
    ) -> Self {
        Self {
            carts: CartService::new(db.clone(), event_sender.clone()),
            checkout: CheckoutService::new(db, event_sender, gateway, notifier, payment),
        }
    }
}
