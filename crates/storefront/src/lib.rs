//! Athleon storefront library.
//!
//! The JSON API behind the Athleon sportswear shop: catalog, cart,
//! server-side checkout with Biteship rates and Midtrans Snap payment,
//! orders with courier tracking, and the back-office under `/api/admin`.
//!
//! The binary in `main.rs` only wires configuration, telemetry and the
//! server loop around [`routes::app`].

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod response;
pub mod routes;
pub mod services;
pub mod state;
pub mod tasks;
