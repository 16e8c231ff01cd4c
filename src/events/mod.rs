//! In-process domain events. Services publish fire-and-forget events onto a
//! bounded channel; a background task drains and logs them. Event delivery
//! never participates in the transaction that produced the event.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Events emitted by the cart and checkout services.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Cart events
    CartUpdated {
        cart_id: Uuid,
        customer_id: Uuid,
    },
    CartReset {
        cart_id: Uuid,
        customer_id: Uuid,
    },
    CouponApplied {
        cart_id: Uuid,
        coupon_id: Uuid,
    },

    // Order events
    OrderCreated {
        order_id: Uuid,
        customer_id: Uuid,
        payment_method: String,
    },
    OrderPaid {
        order_id: Uuid,
        paid_at: DateTime<Utc>,
    },
    CashSettled {
        order_id: Uuid,
    },

    // Payment events
    PaymentSessionCreated {
        order_id: Uuid,
        session_id: String,
    },
    WebhookProcessed {
        event_id: String,
        session_id: String,
    },
    WebhookDuplicate {
        event_id: String,
    },

    // Inventory events
    StockReserved {
        product_id: Uuid,
        quantity: i32,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event, logging instead of failing when the channel is closed
    /// or full. Used where event loss must not abort the calling operation.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!("Event dropped: {}", e);
        }
    }
}

/// Drains the event channel, logging each event. Runs until every sender has
/// been dropped.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    info!("Event processor started");
    while let Some(event) = receiver.recv().await {
        match &event {
            Event::OrderCreated {
                order_id,
                customer_id,
                payment_method,
            } => {
                info!(%order_id, %customer_id, payment_method, "Order created");
            }
            Event::OrderPaid { order_id, paid_at } => {
                info!(%order_id, %paid_at, "Order paid");
            }
            Event::CashSettled { order_id } => {
                info!(%order_id, "Cash order settled");
            }
            Event::WebhookProcessed {
                event_id,
                session_id,
            } => {
                info!(event_id, session_id, "Payment webhook processed");
            }
            Event::WebhookDuplicate { event_id } => {
                debug!(event_id, "Duplicate payment webhook ignored");
            }
            other => {
                debug!(event = ?other, "Event processed");
            }
        }
    }
    info!("Event processor stopped");
}
