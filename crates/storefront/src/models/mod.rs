//! Domain models for the storefront.
//!
//! Row types loaded by the repositories in [`crate::db`], the views returned
//! by handlers, and the request payloads with their validation.

pub mod address;
pub mod cart;
pub mod catalog;
pub mod order;
pub mod user;

pub use address::{Address, AddressInput, ShippingAddress};
pub use cart::{AddToCart, CartLine, CartView, UpdateCartItem};
pub use catalog::{
    Banner, BannerInput, Category, CategoryInput, Product, ProductDetail, ProductInput,
    ProductQuery, ProductSort, VariantInput,
};
pub use order::{Order, OrderDetail, OrderItem, Payment, ReviewInput};
pub use user::{CurrentUser, User};
