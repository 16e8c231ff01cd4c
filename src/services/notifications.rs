//! Order-confirmation notifications. A detached queue with a retrying worker:
//! enqueueing never blocks a request, and delivery failure never affects
//! order state.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

const MAX_DELIVERY_ATTEMPTS: u32 = 3;
const RETRY_BASE_DELAY_MS: u64 = 200;

/// Confirmation message for one paid order.
#[derive(Debug, Clone)]
pub struct OrderConfirmation {
    pub order_id: Uuid,
    pub customer_email: String,
    pub customer_name: String,
    pub total_order_price: Decimal,
}

/// Delivery transport. The real mail/SMS channel lives in a collaborator
/// service; this process logs the handoff.
#[async_trait]
pub trait ConfirmationTransport: Send + Sync {
    async fn deliver(&self, confirmation: &OrderConfirmation) -> Result<(), String>;
}

/// Default transport: structured log of the confirmation handoff.
pub struct LoggingTransport;

#[async_trait]
impl ConfirmationTransport for LoggingTransport {
    async fn deliver(&self, confirmation: &OrderConfirmation) -> Result<(), String> {
        info!(
            order_id = %confirmation.order_id,
            email = %confirmation.customer_email,
            total = %confirmation.total_order_price,
            "Order confirmation dispatched"
        );
        Ok(())
    }
}

/// Handle used by the checkout service to enqueue confirmations.
#[derive(Clone)]
pub struct OrderNotifier {
    sender: mpsc::Sender<OrderConfirmation>,
}

impl OrderNotifier {
    /// Creates the notifier and its worker half. The caller spawns
    /// [`run_worker`] with the returned receiver.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<OrderConfirmation>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self { sender }, receiver)
    }

    /// Enqueues a confirmation without blocking. A full or closed queue is
    /// logged and swallowed: the order is already paid and must not fail.
    pub fn enqueue(&self, confirmation: OrderConfirmation) {
        if let Err(e) = self.sender.try_send(confirmation) {
            warn!("Order confirmation dropped: {}", e);
        }
    }
}

/// Drains the confirmation queue, retrying each delivery with backoff before
/// giving up on it.
pub async fn run_worker(
    mut receiver: mpsc::Receiver<OrderConfirmation>,
    transport: Arc<dyn ConfirmationTransport>,
) {
    info!("Order notification worker started");
    while let Some(confirmation) = receiver.recv().await {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match transport.deliver(&confirmation).await {
                Ok(()) => break,
                Err(e) if attempt < MAX_DELIVERY_ATTEMPTS => {
                    warn!(
                        order_id = %confirmation.order_id,
                        attempt,
                        "Confirmation delivery failed, retrying: {}",
                        e
                    );
                    let delay = RETRY_BASE_DELAY_MS * 2u64.pow(attempt - 1);
                    tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
                }
                Err(e) => {
                    warn!(
                        order_id = %confirmation.order_id,
                        "Confirmation delivery abandoned after {} attempts: {}",
                        attempt,
                        e
                    );
                    break;
                }
            }
        }
    }
    info!("Order notification worker stopped");
}
