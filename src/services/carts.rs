use crate::{
    entities::{
        cart, cart_coupon, cart_item, Cart, CartCoupon, CartCouponModel, CartItem, CartModel,
        Product,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::{coupons, inventory},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, QueryFilter, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Retries for optimistic-concurrency conflicts on a single cart. Only the
/// owning customer's own concurrent requests contend here, so conflicts are
/// rare and short-lived.
const MAX_RETRIES: u32 = 3;

/// Cart aggregate manager.
///
/// Owns one cart per customer. `total_price` is derived: it is recomputed
/// from current product prices and applied coupons after every mutation and
/// is never settable by a client. Writes go through a conditional update on
/// the cart's `version` column; a lost race retries the whole operation.
#[derive(Clone)]
pub struct CartService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

/// Partial update for one cart line.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct UpdateItemInput {
    #[validate(range(min = 1))]
    pub quantity: Option<i32>,
    pub color: Option<String>,
}

/// One cart line with its product's price fields resolved at read time.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ResolvedCartItem {
    pub id: Uuid,
    pub product_id: Uuid,
    pub title: String,
    pub color: Option<String>,
    pub quantity: i32,
    pub price: Decimal,
    pub price_after_discount: Decimal,
}

/// Full cart view returned by every cart operation.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CartDetails {
    pub cart: CartModel,
    pub items: Vec<ResolvedCartItem>,
    pub coupons: Vec<CartCouponModel>,
}

impl CartService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Adds one unit of a product to the customer's cart, creating the cart
    /// lazily inside the same transaction. An existing line for the product
    /// is incremented; products with no available stock are rejected.
    #[instrument(skip(self))]
    pub async fn add_item(
        &self,
        customer_id: Uuid,
        product_id: Uuid,
    ) -> Result<CartDetails, ServiceError> {
        for attempt in 0..MAX_RETRIES {
            match self.try_add_item(customer_id, product_id).await {
                Err(ServiceError::Conflict(_)) => {
                    debug!(attempt, "Cart version conflict, retrying add");
                }
                Err(e) => return Err(e),
                Ok(cart_id) => {
                    self.event_sender
                        .send_or_log(Event::CartUpdated {
                            cart_id,
                            customer_id,
                        })
                        .await;
                    info!(%cart_id, %product_id, "Added item to cart");
                    return self.get_cart(customer_id).await;
                }
            }
        }
        Err(ServiceError::Conflict(
            "Cart is being modified concurrently".into(),
        ))
    }

    async fn try_add_item(
        &self,
        customer_id: Uuid,
        product_id: Uuid,
    ) -> Result<Uuid, ServiceError> {
        let txn = self.db.begin().await?;

        let product = Product::find_by_id(product_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        if !inventory::is_in_stock(&product) {
            return Err(ServiceError::NotFound(format!(
                "Product {} is out of stock",
                product_id
            )));
        }

        let cart = get_or_create_cart(&txn, customer_id).await?;

        let existing = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .filter(cart_item::Column::ProductId.eq(product_id))
            .one(&txn)
            .await?;

        match existing {
            Some(item) => {
                let quantity = item.quantity;
                let mut item: cart_item::ActiveModel = item.into();
                item.quantity = Set(quantity + 1);
                item.updated_at = Set(Utc::now());
                item.update(&txn).await?;
            }
            None => {
                cart_item::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    cart_id: Set(cart.id),
                    product_id: Set(product_id),
                    color: Set(None),
                    quantity: Set(1),
                    created_at: Set(Utc::now()),
                    updated_at: Set(Utc::now()),
                }
                .insert(&txn)
                .await?;
            }
        }

        let total = recompute_total(&txn, cart.id).await?;
        commit_total(&txn, &cart, total).await?;
        txn.commit().await?;
        Ok(cart.id)
    }

    /// Updates quantity and/or color of one line. Absent cart or line is
    /// NotFound; there is no silent fallback to add.
    #[instrument(skip(self, input))]
    pub async fn update_item(
        &self,
        customer_id: Uuid,
        product_id: Uuid,
        input: UpdateItemInput,
    ) -> Result<CartDetails, ServiceError> {
        input.validate()?;
        for attempt in 0..MAX_RETRIES {
            match self.try_update_item(customer_id, product_id, &input).await {
                Err(ServiceError::Conflict(_)) => {
                    debug!(attempt, "Cart version conflict, retrying update");
                }
                Err(e) => return Err(e),
                Ok(cart_id) => {
                    self.event_sender
                        .send_or_log(Event::CartUpdated {
                            cart_id,
                            customer_id,
                        })
                        .await;
                    return self.get_cart(customer_id).await;
                }
            }
        }
        Err(ServiceError::Conflict(
            "Cart is being modified concurrently".into(),
        ))
    }

    async fn try_update_item(
        &self,
        customer_id: Uuid,
        product_id: Uuid,
        input: &UpdateItemInput,
    ) -> Result<Uuid, ServiceError> {
        let txn = self.db.begin().await?;

        let cart = find_cart(&txn, customer_id).await?;
        let item = find_line(&txn, cart.id, product_id).await?;

        let mut active: cart_item::ActiveModel = item.into();
        if let Some(quantity) = input.quantity {
            active.quantity = Set(quantity);
        }
        if let Some(color) = &input.color {
            active.color = Set(Some(color.clone()));
        }
        active.updated_at = Set(Utc::now());
        active.update(&txn).await?;

        let total = recompute_total(&txn, cart.id).await?;
        commit_total(&txn, &cart, total).await?;
        txn.commit().await?;
        Ok(cart.id)
    }

    /// Removes one line and recomputes the total.
    #[instrument(skip(self))]
    pub async fn remove_item(
        &self,
        customer_id: Uuid,
        product_id: Uuid,
    ) -> Result<CartDetails, ServiceError> {
        for attempt in 0..MAX_RETRIES {
            match self.try_remove_item(customer_id, product_id).await {
                Err(ServiceError::Conflict(_)) => {
                    debug!(attempt, "Cart version conflict, retrying remove");
                }
                Err(e) => return Err(e),
                Ok(cart_id) => {
                    self.event_sender
                        .send_or_log(Event::CartUpdated {
                            cart_id,
                            customer_id,
                        })
                        .await;
                    return self.get_cart(customer_id).await;
                }
            }
        }
        Err(ServiceError::Conflict(
            "Cart is being modified concurrently".into(),
        ))
    }

    async fn try_remove_item(
        &self,
        customer_id: Uuid,
        product_id: Uuid,
    ) -> Result<Uuid, ServiceError> {
        let txn = self.db.begin().await?;

        let cart = find_cart(&txn, customer_id).await?;
        let item = find_line(&txn, cart.id, product_id).await?;

        CartItem::delete_by_id(item.id).exec(&txn).await?;

        let total = recompute_total(&txn, cart.id).await?;
        commit_total(&txn, &cart, total).await?;
        txn.commit().await?;
        Ok(cart.id)
    }

    /// Applies a coupon once. Unknown, expired and already-applied coupons
    /// are rejected; so is a cart whose total is already fully discounted.
    /// Applications are not reversible.
    #[instrument(skip(self))]
    pub async fn apply_coupon(
        &self,
        customer_id: Uuid,
        coupon_name: &str,
    ) -> Result<CartDetails, ServiceError> {
        for attempt in 0..MAX_RETRIES {
            match self.try_apply_coupon(customer_id, coupon_name).await {
                Err(ServiceError::Conflict(_)) => {
                    debug!(attempt, "Cart version conflict, retrying coupon");
                }
                Err(e) => return Err(e),
                Ok((cart_id, coupon_id)) => {
                    self.event_sender
                        .send_or_log(Event::CouponApplied { cart_id, coupon_id })
                        .await;
                    info!(%cart_id, coupon_name, "Applied coupon");
                    return self.get_cart(customer_id).await;
                }
            }
        }
        Err(ServiceError::Conflict(
            "Cart is being modified concurrently".into(),
        ))
    }

    async fn try_apply_coupon(
        &self,
        customer_id: Uuid,
        coupon_name: &str,
    ) -> Result<(Uuid, Uuid), ServiceError> {
        let txn = self.db.begin().await?;

        let cart = find_cart(&txn, customer_id).await?;
        let coupon = coupons::find_valid(&txn, coupon_name, Utc::now()).await?;

        if coupons::is_applied(&txn, cart.id, coupon_name).await? {
            return Err(ServiceError::InvalidCoupon(format!(
                "Coupon '{}' was already applied to this cart",
                coupon_name
            )));
        }

        if cart.total_price <= Decimal::ZERO {
            return Err(ServiceError::InvalidOperation(
                "Cart total is already fully discounted".into(),
            ));
        }

        cart_coupon::ActiveModel {
            id: Set(Uuid::new_v4()),
            cart_id: Set(cart.id),
            coupon_id: Set(coupon.id),
            name: Set(coupon.name.clone()),
            discount: Set(coupon.discount),
            applied_at: Set(Utc::now()),
        }
        .insert(&txn)
        .await?;

        let total = recompute_total(&txn, cart.id).await?;
        commit_total(&txn, &cart, total).await?;
        txn.commit().await?;
        Ok((cart.id, coupon.id))
    }

    /// Returns the customer's cart with line items resolved against current
    /// product price fields.
    #[instrument(skip(self))]
    pub async fn get_cart(&self, customer_id: Uuid) -> Result<CartDetails, ServiceError> {
        let cart = find_cart(&*self.db, customer_id).await?;
        load_details(&*self.db, cart).await
    }
}

/// Clears items, applied coupons and the derived total, returning the id of
/// the cart that was reset. Used only by the Finalize-Paid procedure; a
/// missing cart is a no-op. The version bump makes any in-flight cart
/// mutation lose its conditional write and retry against the reset cart.
pub async fn reset_cart<C: ConnectionTrait>(
    conn: &C,
    customer_id: Uuid,
) -> Result<Option<Uuid>, ServiceError> {
    let Some(cart) = Cart::find()
        .filter(cart::Column::CustomerId.eq(customer_id))
        .one(conn)
        .await?
    else {
        return Ok(None);
    };

    CartItem::delete_many()
        .filter(cart_item::Column::CartId.eq(cart.id))
        .exec(conn)
        .await?;
    CartCoupon::delete_many()
        .filter(cart_coupon::Column::CartId.eq(cart.id))
        .exec(conn)
        .await?;

    Cart::update_many()
        .col_expr(cart::Column::TotalPrice, Expr::value(Decimal::ZERO))
        .col_expr(
            cart::Column::Version,
            Expr::col(cart::Column::Version).add(1),
        )
        .col_expr(cart::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(cart::Column::Id.eq(cart.id))
        .exec(conn)
        .await?;

    info!(cart_id = %cart.id, "Cart reset");
    Ok(Some(cart.id))
}

/// Total-price recomputation: gross price track minus discounted price track
/// minus applied coupon discounts. The two price tracks are summed in
/// parallel and netted, not substituted.
pub async fn recompute_total<C: ConnectionTrait>(
    conn: &C,
    cart_id: Uuid,
) -> Result<Decimal, ServiceError> {
    let lines = CartItem::find()
        .filter(cart_item::Column::CartId.eq(cart_id))
        .find_also_related(Product)
        .all(conn)
        .await?;

    let mut gross = Decimal::ZERO;
    let mut discounted = Decimal::ZERO;
    for (item, product) in lines {
        // A product deleted after being carted contributes nothing.
        let Some(product) = product else { continue };
        let quantity = Decimal::from(item.quantity);
        gross += quantity * product.price;
        discounted += quantity * product.price_after_discount;
    }

    let coupon_total: Decimal = CartCoupon::find()
        .filter(cart_coupon::Column::CartId.eq(cart_id))
        .all(conn)
        .await?
        .iter()
        .map(|c| c.discount)
        .sum();

    Ok(gross - discounted - coupon_total)
}

/// Conditional write of the derived total, keyed on the version observed at
/// the start of the operation. Zero rows affected means another writer got
/// there first.
async fn commit_total<C: ConnectionTrait>(
    conn: &C,
    cart: &CartModel,
    total: Decimal,
) -> Result<(), ServiceError> {
    let result = Cart::update_many()
        .col_expr(cart::Column::TotalPrice, Expr::value(total))
        .col_expr(
            cart::Column::Version,
            Expr::col(cart::Column::Version).add(1),
        )
        .col_expr(cart::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(cart::Column::Id.eq(cart.id))
        .filter(cart::Column::Version.eq(cart.version))
        .exec(conn)
        .await?;

    if result.rows_affected == 0 {
        return Err(ServiceError::Conflict(format!(
            "Cart {} was modified concurrently",
            cart.id
        )));
    }
    Ok(())
}

async fn find_cart<C: ConnectionTrait>(
    conn: &C,
    customer_id: Uuid,
) -> Result<CartModel, ServiceError> {
    Cart::find()
        .filter(cart::Column::CustomerId.eq(customer_id))
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Cart not found".into()))
}

async fn find_line<C: ConnectionTrait>(
    conn: &C,
    cart_id: Uuid,
    product_id: Uuid,
) -> Result<crate::entities::CartItemModel, ServiceError> {
    CartItem::find()
        .filter(cart_item::Column::CartId.eq(cart_id))
        .filter(cart_item::Column::ProductId.eq(product_id))
        .one(conn)
        .await?
        .ok_or_else(|| {
            ServiceError::NotFound(format!("Product {} is not in the cart", product_id))
        })
}

/// Lazy creation inside the caller's transaction: one logical operation, no
/// create-then-retry round trip. A unique race on `customer_id` is reported
/// as a conflict so the whole operation retries and finds the winner's cart.
async fn get_or_create_cart<C: ConnectionTrait>(
    conn: &C,
    customer_id: Uuid,
) -> Result<CartModel, ServiceError> {
    if let Some(cart) = Cart::find()
        .filter(cart::Column::CustomerId.eq(customer_id))
        .one(conn)
        .await?
    {
        return Ok(cart);
    }

    let fresh = cart::ActiveModel {
        id: Set(Uuid::new_v4()),
        customer_id: Set(customer_id),
        total_price: Set(Decimal::ZERO),
        version: Set(0),
        created_at: Set(Utc::now()),
        updated_at: Set(Utc::now()),
    };

    match fresh.insert(conn).await {
        Ok(cart) => Ok(cart),
        Err(_) => Err(ServiceError::Conflict(
            "Cart was created concurrently".into(),
        )),
    }
}

async fn load_details<C: ConnectionTrait>(
    conn: &C,
    cart: CartModel,
) -> Result<CartDetails, ServiceError> {
    let lines = CartItem::find()
        .filter(cart_item::Column::CartId.eq(cart.id))
        .find_also_related(Product)
        .all(conn)
        .await?;

    let items = lines
        .into_iter()
        .filter_map(|(item, product)| {
            product.map(|p| ResolvedCartItem {
                id: item.id,
                product_id: item.product_id,
                title: p.title,
                color: item.color,
                quantity: item.quantity,
                price: p.price,
                price_after_discount: p.price_after_discount,
            })
        })
        .collect();

    let applied = CartCoupon::find()
        .filter(cart_coupon::Column::CartId.eq(cart.id))
        .all(conn)
        .await?;

    Ok(CartDetails {
        cart,
        items,
        coupons: applied,
    })
}
