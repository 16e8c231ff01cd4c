use axum::{
    extract::{Path, Query, State},
    response::Response,
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    entities::PaymentMethod,
    errors::{ApiError, ServiceError},
    handlers::common::{created_response, map_service_error, success_response, validate_input},
    services::checkout::{CheckoutInput, SettleCashInput},
    AppState,
};

/// Redirect targets for the hosted card session.
#[derive(Debug, Deserialize, IntoParams)]
pub struct CheckoutQuery {
    pub success_url: Option<String>,
    pub cancel_url: Option<String>,
}

/// Checkout the caller's cart with the chosen payment method.
#[utoipa::path(
    post,
    path = "/api/v1/cart/checkout/{payment_method}",
    params(
        ("payment_method" = String, Path, description = "cash or card"),
        CheckoutQuery
    ),
    request_body = CheckoutInput,
    responses(
        (status = 201, description = "Order created (cash) or payment session (card)"),
        (status = 404, description = "Unknown payment method, no cart, or no shipping address", body = crate::errors::ErrorResponse),
        (status = 502, description = "Payment provider unavailable", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Checkout"
)]
pub async fn checkout(
    State(state): State<AppState>,
    user: AuthUser,
    Path(payment_method): Path<String>,
    Query(query): Query<CheckoutQuery>,
    body: Option<Json<CheckoutInput>>,
) -> Result<Response, ApiError> {
    user.require_customer()?;

    // Unknown method is NotFound: the path segment names a checkout flow,
    // not an enum value.
    let method: PaymentMethod = payment_method.parse().map_err(|_| {
        ApiError::NotFound(format!("Unknown payment method '{}'", payment_method))
    })?;

    let input = body.map(|Json(input)| input).unwrap_or_default();
    validate_input(&input)?;

    let outcome = state
        .services
        .checkout
        .create_order(user.id, method, input, query.success_url, query.cancel_url)
        .await
        .map_err(map_service_error)?;

    Ok(created_response("Order created", outcome))
}

/// Admin settlement of a cash order: confirm payment receipt and/or delivery.
#[utoipa::path(
    patch,
    path = "/api/v1/cart/checkout/{order_id}/cash",
    params(("order_id" = Uuid, Path, description = "Cash order to settle")),
    request_body = SettleCashInput,
    responses(
        (status = 200, description = "Updated order"),
        (status = 400, description = "Not a cash order or already paid", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Checkout"
)]
pub async fn settle_cash(
    State(state): State<AppState>,
    user: AuthUser,
    Path(order_id): Path<Uuid>,
    Json(input): Json<SettleCashInput>,
) -> Result<Response, ApiError> {
    user.require_admin()?;

    if input.is_paid.is_none() && input.is_delivered.is_none() {
        return Err(ApiError::ServiceError(ServiceError::ValidationError(
            "Provide is_paid and/or is_delivered".into(),
        )));
    }

    let order = state
        .services
        .checkout
        .settle_cash(order_id, input)
        .await
        .map_err(map_service_error)?;

    Ok(success_response("Order settled", order))
}
