//! HTTP route handlers for the storefront API.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                                 - Liveness
//! GET  /health/ready                           - Readiness (database)
//!
//! # Auth (rate limited)
//! POST /api/auth/register | login | logout
//! GET  /api/auth/me
//!
//! # Catalog
//! GET  /api/produk                             - Product listing
//! GET  /api/produk/{id}                        - Product detail with variants
//! GET  /api/produk/{id}/recommended            - Related products
//! GET  /api/kategori                           - Categories
//! GET  /api/banners                            - Active banners
//!
//! # Customer (bearer token)
//! /api/customer/keranjang                      - Cart
//! /api/customer/alamat                         - Address book
//! /api/customer/checkout                       - Checkout sessions
//! /api/customer/payment                        - Snap token, status check
//! /api/customer/pesanan                        - Orders, review, tracking
//!
//! # Public lookups
//! GET  /api/tracking?courier&awb               - Shipment tracking
//! GET  /api/wilayah/...                        - Region lists
//! POST /api/payment/notification              - Midtrans notification
//!
//! # Back-office (admin)
//! /api/admin/{produk,kategori,banners,pesanan,users}
//! ```

pub mod addresses;
pub mod admin;
pub mod auth;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod orders;
pub mod payment;
pub mod wilayah;

use axum::{
    Router,
    body::Body,
    extract::State,
    http::{HeaderValue, Method, Request, StatusCode, header},
    middleware,
    routing::{get, post, put},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::error::AppError;
use crate::middleware::{api_rate_limiter, auth_rate_limiter, request_id_middleware};
use crate::state::AppState;

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .layer(auth_rate_limiter())
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
}

/// Create the public catalog routes router.
pub fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route("/produk", get(catalog::index))
        .route("/produk/{id}", get(catalog::show))
        .route("/produk/{id}/recommended", get(catalog::recommended))
        .route("/kategori", get(catalog::categories))
        .route("/banners", get(catalog::banners))
}

/// Create the customer routes router.
pub fn customer_routes() -> Router<AppState> {
    Router::new()
        // Cart
        .route("/keranjang", get(cart::show).post(cart::add))
        .route("/keranjang/count", get(cart::count))
        .route("/keranjang/{id}", put(cart::update).delete(cart::remove))
        // Addresses
        .route("/alamat", get(addresses::index).post(addresses::create))
        .route(
            "/alamat/{id}",
            put(addresses::update).delete(addresses::delete),
        )
        .route("/alamat/{id}/default", post(addresses::set_default))
        // Checkout
        .route("/checkout", post(checkout::start))
        .route("/checkout/{id}/summary", get(checkout::summary))
        .route("/checkout/{id}/address", put(checkout::select_address))
        .route("/checkout/{id}/shipping-rates", get(checkout::shipping_rates))
        .route("/checkout/{id}/shipping", put(checkout::select_shipping))
        .route("/checkout/{id}/payment-method", put(checkout::select_payment))
        .route("/checkout/{id}/process", post(checkout::process))
        // Payment
        .route("/payment/create-token", post(payment::create_token))
        .route("/payment/check-status", post(payment::check_status))
        // Orders
        .route("/pesanan", get(orders::index))
        .route("/pesanan/{id}", get(orders::show))
        .route("/pesanan/{id}/cancel", post(orders::cancel))
        .route("/pesanan/{id}/complete", post(orders::complete))
        .route("/pesanan/{id}/review", post(orders::review))
        .route("/pesanan/{id}/tracking", get(orders::tracking))
}

/// Create the region lookup routes router.
pub fn wilayah_routes() -> Router<AppState> {
    Router::new()
        .route("/provinces", get(wilayah::provinces))
        .route("/cities/{province}", get(wilayah::cities))
        .route("/districts/{city}", get(wilayah::districts))
        .route("/villages/{district}", get(wilayah::villages))
}

/// Create the back-office routes router.
pub fn admin_routes() -> Router<AppState> {
    use admin::{banners, categories, orders, products, users};

    Router::new()
        .route("/produk", get(products::index).post(products::create))
        .route(
            "/produk/{id}",
            get(products::show)
                .put(products::update)
                .delete(products::delete),
        )
        .route("/kategori", get(categories::index).post(categories::create))
        .route(
            "/kategori/{id}",
            put(categories::update).delete(categories::delete),
        )
        .route("/banners", get(banners::index).post(banners::create))
        .route(
            "/banners/{id}",
            put(banners::update).delete(banners::delete),
        )
        .route("/pesanan", get(orders::index))
        .route("/pesanan/{id}", get(orders::show))
        .route("/pesanan/{id}/status", put(orders::update_status))
        .route("/users", get(users::index))
        .route("/users/{id}/role", put(users::set_role))
}

/// Create all `/api` routes.
///
/// The Midtrans notification is added after the rate limiter so gateway
/// retries are never throttled.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth_routes())
        .merge(catalog_routes())
        .nest("/customer", customer_routes())
        .route("/tracking", get(orders::track))
        .nest("/wilayah", wilayah_routes())
        .nest("/admin", admin_routes())
        .fallback(not_found)
        .layer(api_rate_limiter())
        .route("/payment/notification", post(payment::notification))
}

/// Build the complete application with its middleware stack.
///
/// Sentry layers are added by the binary, outside this router.
pub fn app(state: AppState) -> Router {
    let cors = cors_layer(&state.config().cors_origins);

    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .nest("/api", api_routes())
        .fallback(not_found)
        .layer(cors)
        .layer(middleware::from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = tracing::field::Empty,
                    user_id = tracing::field::Empty,
                )
            }),
        )
        .with_state(state)
}

/// CORS for the configured frontend origins.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the database is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match sqlx::query("SELECT 1").fetch_one(state.pool()).await {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

async fn not_found() -> AppError {
    AppError::NotFound("Route not found".to_owned())
}
