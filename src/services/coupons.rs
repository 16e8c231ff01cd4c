//! Coupon lookup and validity checks. Coupons are owned by the promotions
//! module; this subsystem only reads them and records applications on carts.

use chrono::{DateTime, Utc};
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};

use crate::entities::{coupon, CartCoupon, Coupon, CouponModel};
use crate::errors::ServiceError;

/// Looks up a coupon by name and checks its expiry. Unknown and expired
/// coupons both surface as InvalidCoupon so clients cannot probe which
/// codes exist.
pub async fn find_valid<C: ConnectionTrait>(
    conn: &C,
    name: &str,
    now: DateTime<Utc>,
) -> Result<CouponModel, ServiceError> {
    let coupon = Coupon::find()
        .filter(coupon::Column::Name.eq(name))
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::InvalidCoupon(format!("Coupon '{}' is invalid", name)))?;

    if coupon.is_expired(now) {
        return Err(ServiceError::InvalidCoupon(format!(
            "Coupon '{}' has expired",
            name
        )));
    }

    Ok(coupon)
}

/// Returns true when the named coupon has already been applied to the cart.
pub async fn is_applied<C: ConnectionTrait>(
    conn: &C,
    cart_id: uuid::Uuid,
    name: &str,
) -> Result<bool, ServiceError> {
    use crate::entities::cart_coupon;

    let existing = CartCoupon::find()
        .filter(cart_coupon::Column::CartId.eq(cart_id))
        .filter(cart_coupon::Column::Name.eq(name))
        .one(conn)
        .await?;

    Ok(existing.is_some())
}
