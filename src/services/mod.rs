//! Service layer: business logic over the entities, consumed by the HTTP
//! handlers.

pub mod carts;
pub mod checkout;
pub mod coupons;
pub mod inventory;
pub mod notifications;
pub mod payments;
pub mod tax;
