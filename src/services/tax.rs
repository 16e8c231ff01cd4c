//! Flat tax and shipping configuration. A single row with a fixed id; read on
//! every checkout and settable by admins.

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ConnectionTrait, EntityTrait, Set};

use crate::entities::{tax_config, TaxConfig, TaxConfigModel};
use crate::errors::ServiceError;

/// Returns the configuration row, if one has been set.
pub async fn get_config<C: ConnectionTrait>(
    conn: &C,
) -> Result<Option<TaxConfigModel>, ServiceError> {
    Ok(TaxConfig::find_by_id(tax_config::SINGLETON_ID)
        .one(conn)
        .await?)
}

/// Current `(tax_price, shipping_price)`, both zero when no row exists.
pub async fn rates<C: ConnectionTrait>(conn: &C) -> Result<(Decimal, Decimal), ServiceError> {
    Ok(get_config(conn)
        .await?
        .map(|cfg| (cfg.tax_price, cfg.shipping_price))
        .unwrap_or((Decimal::ZERO, Decimal::ZERO)))
}

/// Creates or replaces the configuration row.
pub async fn upsert_config<C: ConnectionTrait>(
    conn: &C,
    tax_price: Decimal,
    shipping_price: Decimal,
) -> Result<TaxConfigModel, ServiceError> {
    let existing = get_config(conn).await?;

    let updated = match existing {
        Some(cfg) => {
            let mut active: tax_config::ActiveModel = cfg.into();
            active.tax_price = Set(tax_price);
            active.shipping_price = Set(shipping_price);
            active.updated_at = Set(Utc::now());
            active.update(conn).await?
        }
        None => {
            tax_config::ActiveModel {
                id: Set(tax_config::SINGLETON_ID),
                tax_price: Set(tax_price),
                shipping_price: Set(shipping_price),
                updated_at: Set(Utc::now()),
            }
            .insert(conn)
            .await?
        }
    };

    Ok(updated)
}

/// Removes the configuration row; checkout falls back to zero rates.
pub async fn reset_config<C: ConnectionTrait>(conn: &C) -> Result<(), ServiceError> {
    TaxConfig::delete_by_id(tax_config::SINGLETON_ID)
        .exec(conn)
        .await?;
    Ok(())
}
