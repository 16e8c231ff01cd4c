use axum::{
    extract::{Path, State},
    response::Response,
    Json,
};
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    errors::ApiError,
    handlers::common::{map_service_error, success_response, validate_input},
    services::carts::UpdateItemInput,
    AppState,
};

/// Add one unit of a product to the caller's cart.
#[utoipa::path(
    post,
    path = "/api/v1/cart/{product_id}",
    params(("product_id" = Uuid, Path, description = "Product to add")),
    responses(
        (status = 200, description = "Updated cart"),
        (status = 404, description = "Product missing or out of stock", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn add_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path(product_id): Path<Uuid>,
) -> Result<Response, ApiError> {
    user.require_customer()?;
    let cart = state
        .services
        .carts
        .add_item(user.id, product_id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response("Item added to cart", cart))
}

/// Get the caller's cart.
#[utoipa::path(
    get,
    path = "/api/v1/cart",
    responses(
        (status = 200, description = "Cart with resolved line items"),
        (status = 404, description = "No cart yet", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn get_cart(State(state): State<AppState>, user: AuthUser) -> Result<Response, ApiError> {
    user.require_customer()?;
    let cart = state
        .services
        .carts
        .get_cart(user.id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response("Cart retrieved", cart))
}

/// Update quantity and/or color of one cart line.
#[utoipa::path(
    patch,
    path = "/api/v1/cart/{product_id}",
    params(("product_id" = Uuid, Path, description = "Product whose line to update")),
    request_body = UpdateItemInput,
    responses(
        (status = 200, description = "Updated cart"),
        (status = 404, description = "Cart or line absent", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn update_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path(product_id): Path<Uuid>,
    Json(input): Json<UpdateItemInput>,
) -> Result<Response, ApiError> {
    user.require_customer()?;
    validate_input(&input)?;
    let cart = state
        .services
        .carts
        .update_item(user.id, product_id, input)
        .await
        .map_err(map_service_error)?;
    Ok(success_response("Cart item updated", cart))
}

/// Remove one cart line.
#[utoipa::path(
    delete,
    path = "/api/v1/cart/{product_id}",
    params(("product_id" = Uuid, Path, description = "Product whose line to remove")),
    responses(
        (status = 200, description = "Updated cart"),
        (status = 404, description = "Cart or line absent", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn remove_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path(product_id): Path<Uuid>,
) -> Result<Response, ApiError> {
    user.require_customer()?;
    let cart = state
        .services
        .carts
        .remove_item(user.id, product_id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response("Item removed from cart", cart))
}

/// Apply a coupon by name. Irreversible.
#[utoipa::path(
    post,
    path = "/api/v1/cart/coupon/{coupon_name}",
    params(("coupon_name" = String, Path, description = "Coupon code")),
    responses(
        (status = 200, description = "Updated cart"),
        (status = 400, description = "Invalid, expired or already applied coupon", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn apply_coupon(
    State(state): State<AppState>,
    user: AuthUser,
    Path(coupon_name): Path<String>,
) -> Result<Response, ApiError> {
    user.require_customer()?;
    let cart = state
        .services
        .carts
        .apply_coupon(user.id, &coupon_name)
        .await
        .map_err(map_service_error)?;
    Ok(success_response("Coupon applied", cart))
}

/// Admin view of any customer's cart.
#[utoipa::path(
    get,
    path = "/api/v1/cart/admin/{user_id}",
    params(("user_id" = Uuid, Path, description = "Cart owner")),
    responses(
        (status = 200, description = "Cart with resolved line items"),
        (status = 404, description = "No cart for this customer", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn admin_get_cart(
    State(state): State<AppState>,
    user: AuthUser,
    Path(user_id): Path<Uuid>,
) -> Result<Response, ApiError> {
    user.require_admin()?;
    let cart = state
        .services
        .carts
        .get_cart(user_id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response("Cart retrieved", cart))
}
