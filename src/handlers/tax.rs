use axum::{extract::State, response::Response, Json};
use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::ToSchema;

use crate::{
    auth::AuthUser,
    errors::{ApiError, ServiceError},
    handlers::common::{map_service_error, success_response},
    services::tax,
    AppState,
};

/// Flat tax and shipping amounts applied to every checkout.
#[derive(Debug, Deserialize, ToSchema)]
pub struct TaxInput {
    pub tax_price: Decimal,
    pub shipping_price: Decimal,
}

/// Current tax/shipping configuration (zeros when unset).
#[utoipa::path(
    get,
    path = "/api/v1/tax",
    responses((status = 200, description = "Current configuration")),
    security(("bearer_auth" = [])),
    tag = "Tax"
)]
pub async fn get_config(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Response, ApiError> {
    user.require_admin()?;
    let config = tax::get_config(&*state.db)
        .await
        .map_err(map_service_error)?;
    Ok(success_response("Tax configuration retrieved", config))
}

/// Create or replace the configuration row.
#[utoipa::path(
    post,
    path = "/api/v1/tax",
    request_body = TaxInput,
    responses(
        (status = 200, description = "Stored configuration"),
        (status = 400, description = "Negative amount", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Tax"
)]
pub async fn upsert_config(
    State(state): State<AppState>,
    user: AuthUser,
    Json(input): Json<TaxInput>,
) -> Result<Response, ApiError> {
    user.require_admin()?;

    if input.tax_price < Decimal::ZERO || input.shipping_price < Decimal::ZERO {
        return Err(ApiError::ServiceError(ServiceError::ValidationError(
            "Tax and shipping amounts must not be negative".into(),
        )));
    }

    let config = tax::upsert_config(&*state.db, input.tax_price, input.shipping_price)
        .await
        .map_err(map_service_error)?;
    Ok(success_response("Tax configuration updated", config))
}

/// Remove the configuration row; checkouts fall back to zero rates.
#[utoipa::path(
    delete,
    path = "/api/v1/tax",
    responses((status = 200, description = "Configuration cleared")),
    security(("bearer_auth" = [])),
    tag = "Tax"
)]
pub async fn reset_config(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Response, ApiError> {
    user.require_admin()?;
    tax::reset_config(&*state.db)
        .await
        .map_err(map_service_error)?;
    Ok(success_response("Tax configuration cleared", ()))
}
