mod common;

use std::sync::Arc;

use chrono::Utc;
use common::TestGateway;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, Set};
use storefront_api::{
    config::PaymentConfig,
    db::{self, DbConfig},
    entities::{customer, product, PaymentMethod},
    events::{Event, EventSender},
    services::{
        carts::CartService,
        checkout::{CheckoutInput, CheckoutOutcome, CheckoutService},
        notifications::OrderNotifier,
    },
};
use tokio::sync::mpsc;
use uuid::Uuid;

fn payment_config() -> PaymentConfig {
    PaymentConfig {
        gateway_url: "http://gateway.invalid".into(),
        gateway_api_key: "sk_test_key".into(),
        webhook_secret: "whsec_test".into(),
        webhook_tolerance_secs: 300,
        gateway_timeout_secs: 2,
        success_url: "http://localhost:3000/orders".into(),
        cancel_url: "http://localhost:3000/cart".into(),
    }
}

// Drives the services directly with a captured event channel, so the
// settlement side effects show up as observable domain events.
#[tokio::test]
async fn settlement_emits_stock_reserved_and_cart_reset_events() {
    let pool = db::establish_connection_with_config(&DbConfig {
        url: "sqlite::memory:".into(),
        max_connections: 1,
        min_connections: 1,
        ..Default::default()
    })
    .await
    .unwrap();
    db::ensure_schema(&pool).await.unwrap();
    let db = Arc::new(pool);

    let (event_tx, mut event_rx) = mpsc::channel(64);
    let event_sender = Arc::new(EventSender::new(event_tx));
    let (notifier, _confirmations) = OrderNotifier::channel(4);

    let carts = CartService::new(db.clone(), event_sender.clone());
    let checkout = CheckoutService::new(
        db.clone(),
        event_sender.clone(),
        Arc::new(TestGateway::new()),
        notifier,
        payment_config(),
    );

    let customer = customer::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set("Ada".into()),
        email: Set("ada@example.com".into()),
        address: Set(Some("1 Analytical Way".into())),
        created_at: Set(Utc::now()),
        updated_at: Set(Utc::now()),
    }
    .insert(&*db)
    .await
    .unwrap();

    let product = product::ActiveModel {
        id: Set(Uuid::new_v4()),
        title: Set("Keyboard".into()),
        description: Set("Keyboard".into()),
        image_cover: Set(None),
        price: Set(dec!(100.00)),
        price_after_discount: Set(dec!(0.00)),
        quantity: Set(5),
        sold: Set(0),
        created_at: Set(Utc::now()),
        updated_at: Set(Utc::now()),
    }
    .insert(&*db)
    .await
    .unwrap();

    carts.add_item(customer.id, product.id).await.unwrap();

    let outcome = checkout
        .create_order(
            customer.id,
            PaymentMethod::Cash,
            CheckoutInput::default(),
            None,
            None,
        )
        .await
        .unwrap();
    let order_id = match outcome {
        CheckoutOutcome::Cash(details) => details.order.id,
        CheckoutOutcome::Card(_) => panic!("cash checkout returned a card outcome"),
    };

    assert!(checkout.finalize_paid(order_id, false).await.unwrap());

    let mut saw_stock_reserved = false;
    let mut saw_cart_reset = false;
    while let Ok(event) = event_rx.try_recv() {
        match event {
            Event::StockReserved {
                product_id,
                quantity,
            } => {
                assert_eq!(product_id, product.id);
                assert_eq!(quantity, 1);
                saw_stock_reserved = true;
            }
            Event::CartReset { customer_id, .. } => {
                assert_eq!(customer_id, customer.id);
                saw_cart_reset = true;
            }
            _ => {}
        }
    }
    assert!(saw_stock_reserved, "settlement must announce the reservation");
    assert!(saw_cart_reset, "settlement must announce the cart reset");
}
