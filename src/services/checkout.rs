use crate::{
    config::PaymentConfig,
    entities::{
        order, order_item, webhook_event, Customer, Order, OrderItem, OrderItemModel, OrderModel,
        PaymentMethod, WebhookEvent,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::{
        carts::{self, ResolvedCartItem},
        inventory,
        notifications::{OrderConfirmation, OrderNotifier},
        payments::{CreateSessionRequest, PaymentGateway, SessionLineItem},
        tax,
    },
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Checkout orchestrator.
///
/// Converts a cart into an order through one of two paths: cash settles
/// through an admin confirmation, card defers to an external payment session
/// confirmed by webhook. Both paths converge on the idempotent Finalize-Paid
/// procedure, which is the only place stock is reserved and the cart reset.
#[derive(Clone)]
pub struct CheckoutService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    gateway: Arc<dyn PaymentGateway>,
    notifier: OrderNotifier,
    payment: PaymentConfig,
}

/// Checkout request body.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct CheckoutInput {
    #[validate(length(min = 1))]
    pub shipping_address: Option<String>,
}

/// Admin cash-settlement body.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct SettleCashInput {
    pub is_paid: Option<bool>,
    pub is_delivered: Option<bool>,
}

/// An order with its snapshot lines.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrderDetails {
    pub order: OrderModel,
    pub items: Vec<OrderItemModel>,
}

/// Card-checkout response: where to send the shopper, plus the pending order.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CardCheckoutDetails {
    pub url: String,
    pub session_id: String,
    pub total_price: Decimal,
    pub expires_at: Option<DateTime<Utc>>,
    pub data: OrderDetails,
}

/// Result of a checkout, by payment path.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(untagged)]
pub enum CheckoutOutcome {
    Cash(OrderDetails),
    Card(CardCheckoutDetails),
}

impl CheckoutService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        gateway: Arc<dyn PaymentGateway>,
        notifier: OrderNotifier,
        payment: PaymentConfig,
    ) -> Self {
        Self {
            db,
            event_sender,
            gateway,
            notifier,
            payment,
        }
    }

    /// Creates an order from the customer's cart.
    ///
    /// Cash: the order row is created immediately; a fully discounted (zero)
    /// total is finalized on the spot, anything else awaits admin settlement.
    /// Card: a hosted payment session is requested first — on gateway failure
    /// no order row is created — then a pending order stores the session id.
    #[instrument(skip(self, input))]
    pub async fn create_order(
        &self,
        customer_id: Uuid,
        method: PaymentMethod,
        input: CheckoutInput,
        success_url: Option<String>,
        cancel_url: Option<String>,
    ) -> Result<CheckoutOutcome, ServiceError> {
        input.validate()?;

        let customer = Customer::find_by_id(customer_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Customer {} not found", customer_id))
            })?;

        // The profile address wins; the request body only fills the gap for
        // customers without one on file.
        let shipping_address = customer
            .address
            .clone()
            .or(input.shipping_address)
            .ok_or_else(|| ServiceError::NotFound("No shipping address found".into()))?;

        let cart = self.cart_service().get_cart(customer_id).await?;
        if cart.items.is_empty() {
            return Err(ServiceError::InvalidOperation("Cart is empty".into()));
        }

        let (tax_price, shipping_price) = tax::rates(&*self.db).await?;
        let total_order_price = cart.cart.total_price + tax_price + shipping_price;

        match method {
            PaymentMethod::Cash => {
                let details = self
                    .insert_order(
                        customer_id,
                        PaymentMethod::Cash,
                        tax_price,
                        shipping_price,
                        total_order_price,
                        &shipping_address,
                        None,
                        &cart.items,
                    )
                    .await?;

                self.event_sender
                    .send_or_log(Event::OrderCreated {
                        order_id: details.order.id,
                        customer_id,
                        payment_method: "cash".into(),
                    })
                    .await;

                // A fully discounted order needs no settlement step.
                if total_order_price <= Decimal::ZERO {
                    self.finalize_paid(details.order.id, false).await?;
                    return Ok(CheckoutOutcome::Cash(
                        self.load_order_details(details.order.id).await?,
                    ));
                }

                info!(order_id = %details.order.id, "Cash order created, awaiting settlement");
                Ok(CheckoutOutcome::Cash(details))
            }
            PaymentMethod::Card => {
                let line_items = cart
                    .items
                    .iter()
                    .map(|line| SessionLineItem {
                        name: line.title.clone(),
                        description: format!("{} x{}", line.title, line.quantity),
                        image: None,
                        color: line.color.clone(),
                        unit_amount: line.price,
                        quantity: line.quantity,
                    })
                    .collect();

                let session = self
                    .gateway
                    .create_session(CreateSessionRequest {
                        client_reference_id: customer_id.to_string(),
                        customer_email: customer.email.clone(),
                        amount_total: total_order_price,
                        line_items,
                        success_url: success_url
                            .unwrap_or_else(|| self.payment.success_url.clone()),
                        cancel_url: cancel_url.unwrap_or_else(|| self.payment.cancel_url.clone()),
                    })
                    .await?;

                let details = self
                    .insert_order(
                        customer_id,
                        PaymentMethod::Card,
                        tax_price,
                        shipping_price,
                        total_order_price,
                        &shipping_address,
                        Some(session.id.clone()),
                        &cart.items,
                    )
                    .await?;

                self.event_sender
                    .send_or_log(Event::OrderCreated {
                        order_id: details.order.id,
                        customer_id,
                        payment_method: "card".into(),
                    })
                    .await;
                self.event_sender
                    .send_or_log(Event::PaymentSessionCreated {
                        order_id: details.order.id,
                        session_id: session.id.clone(),
                    })
                    .await;

                info!(order_id = %details.order.id, session_id = %session.id, "Card order pending payment");
                Ok(CheckoutOutcome::Card(CardCheckoutDetails {
                    url: session.url,
                    session_id: session.id,
                    total_price: total_order_price,
                    expires_at: session.expires_at,
                    data: details,
                }))
            }
        }
    }

    /// Finalize-Paid: the single settlement procedure shared by the cash and
    /// webhook paths.
    ///
    /// The conditional `is_paid = true WHERE is_paid = false` update is the
    /// idempotency guard; a caller that loses the claim returns `false` and
    /// performs no side effects, so repeated or concurrent invocations
    /// reserve stock exactly once. Reservation failures on individual lines
    /// are logged and skipped: the payment already happened and is the record
    /// of truth.
    #[instrument(skip(self))]
    pub async fn finalize_paid(
        &self,
        order_id: Uuid,
        mark_delivered: bool,
    ) -> Result<bool, ServiceError> {
        let now = Utc::now();

        let mut claim = Order::update_many()
            .col_expr(order::Column::IsPaid, Expr::value(true))
            .col_expr(order::Column::PaidAt, Expr::value(now))
            .col_expr(order::Column::UpdatedAt, Expr::value(now));
        if mark_delivered {
            claim = claim
                .col_expr(order::Column::IsDelivered, Expr::value(true))
                .col_expr(order::Column::DeliveredAt, Expr::value(now));
        }
        let result = claim
            .filter(order::Column::Id.eq(order_id))
            .filter(order::Column::IsPaid.eq(false))
            .exec(&*self.db)
            .await?;

        if result.rows_affected == 0 {
            debug!(%order_id, "Order already paid, settlement is a no-op");
            return Ok(false);
        }

        let details = self.load_order_details(order_id).await?;

        // Reserve against the order snapshot, not the live cart.
        for item in &details.items {
            match inventory::reserve(&*self.db, item.product_id, item.quantity).await {
                Ok(()) => {
                    self.event_sender
                        .send_or_log(Event::StockReserved {
                            product_id: item.product_id,
                            quantity: item.quantity,
                        })
                        .await;
                }
                Err(e) => {
                    warn!(
                        order_id = %order_id,
                        product_id = %item.product_id,
                        "Skipping failed reservation during settlement: {}",
                        e
                    );
                }
            }
        }

        let txn = self.db.begin().await?;
        let reset_cart_id = carts::reset_cart(&txn, details.order.customer_id).await?;
        txn.commit().await?;

        if let Some(cart_id) = reset_cart_id {
            self.event_sender
                .send_or_log(Event::CartReset {
                    cart_id,
                    customer_id: details.order.customer_id,
                })
                .await;
        }

        if let Some(customer) = Customer::find_by_id(details.order.customer_id)
            .one(&*self.db)
            .await?
        {
            self.notifier.enqueue(OrderConfirmation {
                order_id,
                customer_email: customer.email,
                customer_name: customer.name,
                total_order_price: details.order.total_order_price,
            });
        }

        self.event_sender
            .send_or_log(Event::OrderPaid {
                order_id,
                paid_at: now,
            })
            .await;

        info!(%order_id, "Order finalized as paid");
        Ok(true)
    }

    /// Admin settlement of a cash order.
    #[instrument(skip(self, input))]
    pub async fn settle_cash(
        &self,
        order_id: Uuid,
        input: SettleCashInput,
    ) -> Result<OrderDetails, ServiceError> {
        let order = Order::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        if order.payment_method != PaymentMethod::Cash {
            return Err(ServiceError::InvalidOperation(
                "Only cash orders can be settled here".into(),
            ));
        }
        if order.is_paid {
            return Err(ServiceError::InvalidOperation(
                "Order is already paid".into(),
            ));
        }

        if input.is_paid == Some(true) {
            self.finalize_paid(order_id, false).await?;
            self.event_sender
                .send_or_log(Event::CashSettled { order_id })
                .await;
        }

        if input.is_delivered == Some(true) {
            Order::update_many()
                .col_expr(order::Column::IsDelivered, Expr::value(true))
                .col_expr(order::Column::DeliveredAt, Expr::value(Utc::now()))
                .col_expr(order::Column::UpdatedAt, Expr::value(Utc::now()))
                .filter(order::Column::Id.eq(order_id))
                .exec(&*self.db)
                .await?;
        }

        self.load_order_details(order_id).await
    }

    /// Applies a verified "checkout completed" provider event.
    ///
    /// A known event id is a no-op, so at-least-once delivery cannot settle
    /// twice even across distinct events for the same order. The id is only
    /// recorded after settlement succeeds: a failure (or a delivery that
    /// arrives before the order row is visible) leaves the id unrecorded, so
    /// the provider's redelivery gets another attempt. Concurrent duplicates
    /// are absorbed by the conditional paid-claim in Finalize-Paid.
    #[instrument(skip(self))]
    pub async fn confirm_session(
        &self,
        event_id: &str,
        session_id: &str,
    ) -> Result<(), ServiceError> {
        if self.event_seen(event_id).await? {
            self.event_sender
                .send_or_log(Event::WebhookDuplicate {
                    event_id: event_id.to_string(),
                })
                .await;
            return Ok(());
        }

        let order = Order::find()
            .filter(order::Column::SessionId.eq(session_id))
            .one(&*self.db)
            .await?;

        let Some(order) = order else {
            warn!(session_id, "No order for payment session, ignoring event");
            return Ok(());
        };

        let finalized = self.finalize_paid(order.id, true).await?;
        self.record_event(event_id, session_id).await?;

        if finalized {
            self.event_sender
                .send_or_log(Event::WebhookProcessed {
                    event_id: event_id.to_string(),
                    session_id: session_id.to_string(),
                })
                .await;
        } else {
            debug!(order_id = %order.id, "Order already paid, duplicate confirmation");
        }
        Ok(())
    }

    /// Own orders, newest first.
    #[instrument(skip(self))]
    pub async fn list_orders(&self, customer_id: Uuid) -> Result<Vec<OrderDetails>, ServiceError> {
        let orders = Order::find()
            .filter(order::Column::CustomerId.eq(customer_id))
            .order_by_desc(order::Column::CreatedAt)
            .find_with_related(OrderItem)
            .all(&*self.db)
            .await?;

        Ok(orders
            .into_iter()
            .map(|(order, items)| OrderDetails { order, items })
            .collect())
    }

    async fn event_seen(&self, event_id: &str) -> Result<bool, ServiceError> {
        Ok(WebhookEvent::find_by_id(event_id.to_string())
            .one(&*self.db)
            .await?
            .is_some())
    }

    /// Records a processed provider event id. A primary-key collision means a
    /// concurrent delivery got there first and is not an error.
    async fn record_event(&self, event_id: &str, session_id: &str) -> Result<(), ServiceError> {
        let row = webhook_event::ActiveModel {
            id: Set(event_id.to_string()),
            session_id: Set(session_id.to_string()),
            received_at: Set(Utc::now()),
        };

        match row.insert(&*self.db).await {
            Ok(_) => Ok(()),
            Err(e) => {
                if self.event_seen(event_id).await? {
                    Ok(())
                } else {
                    Err(e.into())
                }
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn insert_order(
        &self,
        customer_id: Uuid,
        method: PaymentMethod,
        tax_price: Decimal,
        shipping_price: Decimal,
        total_order_price: Decimal,
        shipping_address: &str,
        session_id: Option<String>,
        lines: &[ResolvedCartItem],
    ) -> Result<OrderDetails, ServiceError> {
        let txn = self.db.begin().await?;
        let order_id = Uuid::new_v4();

        let order = order::ActiveModel {
            id: Set(order_id),
            customer_id: Set(customer_id),
            payment_method: Set(method),
            tax_price: Set(tax_price),
            shipping_price: Set(shipping_price),
            total_order_price: Set(total_order_price),
            shipping_address: Set(shipping_address.to_string()),
            is_paid: Set(false),
            paid_at: Set(None),
            is_delivered: Set(false),
            delivered_at: Set(None),
            session_id: Set(session_id),
            created_at: Set(Utc::now()),
            updated_at: Set(Utc::now()),
        }
        .insert(&txn)
        .await?;

        let mut items = Vec::with_capacity(lines.len());
        for line in lines {
            let item = order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                product_id: Set(line.product_id),
                title: Set(line.title.clone()),
                color: Set(line.color.clone()),
                quantity: Set(line.quantity),
                unit_price: Set(line.price),
                discounted_unit_price: Set(line.price_after_discount),
            }
            .insert(&txn)
            .await?;
            items.push(item);
        }

        txn.commit().await?;
        Ok(OrderDetails { order, items })
    }

    async fn load_order_details(&self, order_id: Uuid) -> Result<OrderDetails, ServiceError> {
        let order = Order::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let items = OrderItem::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(&*self.db)
            .await?;

        Ok(OrderDetails { order, items })
    }

    fn cart_service(&self) -> carts::CartService {
        carts::CartService::new(self.db.clone(), self.event_sender.clone())
    }
}
