//! Persistent entities for the cart and checkout subsystem.

pub mod cart;
pub mod cart_coupon;
pub mod cart_item;
pub mod coupon;
pub mod customer;
pub mod order;
pub mod order_item;
pub mod product;
pub mod tax_config;
pub mod webhook_event;

// Re-export entities
pub use cart::{Entity as Cart, Model as CartModel};
pub use cart_coupon::{Entity as CartCoupon, Model as CartCouponModel};
pub use cart_item::{Entity as CartItem, Model as CartItemModel};
pub use coupon::{Entity as Coupon, Model as CouponModel};
pub use customer::{Entity as Customer, Model as CustomerModel};
pub use order::{Entity as Order, Model as OrderModel, PaymentMethod};
pub use order_item::{Entity as OrderItem, Model as OrderItemModel};
pub use product::{Entity as Product, Model as ProductModel};
pub use tax_config::{Entity as TaxConfig, Model as TaxConfigModel};
pub use webhook_event::{Entity as WebhookEvent, Model as WebhookEventModel};
