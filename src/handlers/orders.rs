use axum::{
    extract::{Path, State},
    response::Response,
};
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    errors::ApiError,
    handlers::common::{list_response, map_service_error},
    AppState,
};

/// The caller's own orders, newest first.
#[utoipa::path(
    get,
    path = "/api/v1/order/user",
    responses((status = 200, description = "Orders with snapshot lines")),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn my_orders(State(state): State<AppState>, user: AuthUser) -> Result<Response, ApiError> {
    user.require_customer()?;
    let orders = state
        .services
        .checkout
        .list_orders(user.id)
        .await
        .map_err(map_service_error)?;
    Ok(list_response("Orders retrieved", orders))
}

/// Admin view of any customer's orders.
#[utoipa::path(
    get,
    path = "/api/v1/order/admin/{user_id}",
    params(("user_id" = Uuid, Path, description = "Order owner")),
    responses((status = 200, description = "Orders with snapshot lines")),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn admin_orders(
    State(state): State<AppState>,
    user: AuthUser,
    Path(user_id): Path<Uuid>,
) -> Result<Response, ApiError> {
    user.require_admin()?;
    let orders = state
        .services
        .checkout
        .list_orders(user_id)
        .await
        .map_err(map_service_error)?;
    Ok(list_response("Orders retrieved", orders))
}
