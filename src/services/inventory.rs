//! Inventory ledger. Owns the available-quantity and cumulative-sold counters
//! on products and exposes the atomic decrement-on-reserve used at payment
//! settlement.

use chrono::Utc;
use sea_orm::{sea_query::Expr, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};
use tracing::info;
use uuid::Uuid;

use crate::entities::{product, Product, ProductModel};
use crate::errors::ServiceError;

/// Whether the product currently has any units available.
pub fn is_in_stock(product: &ProductModel) -> bool {
    product.quantity > 0
}

/// Atomically reserves `quantity` units: `quantity -= n, sold += n`, guarded
/// by `quantity >= n` in the same statement. Never a read-then-write pair, so
/// concurrent settlements cannot oversell.
pub async fn reserve<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    quantity: i32,
) -> Result<(), ServiceError> {
    if quantity <= 0 {
        return Err(ServiceError::ValidationError(
            "Reservation quantity must be positive".into(),
        ));
    }

    let result = Product::update_many()
        .col_expr(
            product::Column::Quantity,
            Expr::col(product::Column::Quantity).sub(quantity),
        )
        .col_expr(
            product::Column::Sold,
            Expr::col(product::Column::Sold).add(quantity),
        )
        .col_expr(product::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(product::Column::Id.eq(product_id))
        .filter(product::Column::Quantity.gte(quantity))
        .exec(conn)
        .await?;

    if result.rows_affected == 0 {
        // The guard failed: either the product is gone or stock ran out.
        let exists = Product::find_by_id(product_id).one(conn).await?.is_some();
        if exists {
            return Err(ServiceError::InsufficientStock(format!(
                "Product {} has fewer than {} units available",
                product_id, quantity
            )));
        }
        return Err(ServiceError::NotFound(format!(
            "Product {} not found",
            product_id
        )));
    }

    info!(%product_id, quantity, "Reserved inventory");
    Ok(())
}
