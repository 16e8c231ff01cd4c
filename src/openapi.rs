use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Storefront API",
        version = "1.0.0",
        description = r#"
# Storefront Cart & Checkout API

Maintains a per-customer shopping cart as a derived-total aggregate and
converts it into orders through a cash-immediate or card-deferred checkout.

## Authentication

All endpoints except the payment webhook require a bearer token:

```
Authorization: Bearer <your-jwt-token>
```

Customer routes require the `user` role; admin routes require `admin`.

## Responses

Success responses carry `{status, message, data}`; list responses add
`length`. Errors carry `{error, message, timestamp}`.
        "#
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "Cart", description = "Cart aggregate operations"),
        (name = "Checkout", description = "Cart-to-order checkout and settlement"),
        (name = "Orders", description = "Order read endpoints"),
        (name = "Tax", description = "Flat tax/shipping configuration"),
        (name = "Webhooks", description = "Payment provider callbacks")
    ),
    paths(
        crate::handlers::carts::add_item,
        crate::handlers::carts::get_cart,
        crate::handlers::carts::update_item,
        crate::handlers::carts::remove_item,
        crate::handlers::carts::apply_coupon,
        crate::handlers::carts::admin_get_cart,
        crate::handlers::checkout::checkout,
        crate::handlers::checkout::settle_cash,
        crate::handlers::orders::my_orders,
        crate::handlers::orders::admin_orders,
        crate::handlers::tax::get_config,
        crate::handlers::tax::upsert_config,
        crate::handlers::tax::reset_config,
        crate::handlers::webhooks::payment_webhook,
    ),
    components(
        schemas(
            crate::services::carts::CartDetails,
            crate::services::carts::ResolvedCartItem,
            crate::services::carts::UpdateItemInput,
            crate::services::checkout::CheckoutInput,
            crate::services::checkout::SettleCashInput,
            crate::services::checkout::OrderDetails,
            crate::services::checkout::CardCheckoutDetails,
            crate::services::checkout::CheckoutOutcome,
            crate::handlers::tax::TaxInput,
            crate::entities::cart::Model,
            crate::entities::cart_coupon::Model,
            crate::entities::order::Model,
            crate::entities::order_item::Model,
            crate::entities::tax_config::Model,
            crate::entities::order::PaymentMethod,
            crate::errors::ErrorResponse
        )
    )
)]
pub struct ApiDocV1;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDocV1::openapi())
}
