//! Athleon Core - Shared domain library.
//!
//! This crate provides the types and rules used across the Athleon components:
//! - `storefront` - JSON API server (customer and back-office routes)
//! - `cli` - Command-line tools for migrations, seeding and user management
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP clients. Everything here can be tested without a server.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, money, emails, and statuses
//! - [`variant`] - Variant grouping and selection validation
//! - [`cart`] - Line and cart pricing
//! - [`checkout`] - Checkout flow state machine
//! - [`envelope`] - The `{status_code, message, data}` response envelope

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod checkout;
pub mod envelope;
pub mod types;
pub mod variant;

pub use types::*;
