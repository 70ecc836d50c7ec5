//! Back-office route handlers.
//!
//! Every handler here takes [`RequireAdmin`](crate::middleware::RequireAdmin).

pub mod banners;
pub mod categories;
pub mod orders;
pub mod products;
pub mod users;
