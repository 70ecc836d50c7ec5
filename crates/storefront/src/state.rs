//! Application state shared across handlers.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use sqlx::PgPool;
use thiserror::Error;

use crate::config::StorefrontConfig;
use crate::models::catalog::Category;
use crate::services::binderbyte::{BinderByteClient, TrackingError};
use crate::services::biteship::{BiteshipClient, BiteshipError};
use crate::services::checkout::CheckoutSessions;
use crate::services::midtrans::{MidtransClient, MidtransError};
use crate::services::wilayah::{WilayahClient, WilayahError};

/// Categories change rarely and are listed on every page.
const CATEGORY_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

/// Error building the HTTP clients held in state.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("midtrans client: {0}")]
    Midtrans(#[from] MidtransError),
    #[error("biteship client: {0}")]
    Biteship(#[from] BiteshipError),
    #[error("binderbyte client: {0}")]
    BinderByte(#[from] TrackingError),
    #[error("wilayah client: {0}")]
    Wilayah(#[from] WilayahError),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: PgPool,
    midtrans: MidtransClient,
    biteship: BiteshipClient,
    binderbyte: BinderByteClient,
    wilayah: WilayahClient,
    checkout_sessions: CheckoutSessions,
    categories: Cache<(), Arc<Vec<Category>>>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `config` - Storefront configuration
    /// * `pool` - `PostgreSQL` connection pool
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client cannot be built.
    pub fn new(config: StorefrontConfig, pool: PgPool) -> Result<Self, StateError> {
        let midtrans = MidtransClient::new(&config.midtrans)?;
        let biteship = BiteshipClient::new(&config.biteship)?;
        let binderbyte = BinderByteClient::new(&config.binderbyte)?;
        let wilayah = WilayahClient::new(&config.wilayah_base_url)?;

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                midtrans,
                biteship,
                binderbyte,
                wilayah,
                checkout_sessions: CheckoutSessions::new(),
                categories: Cache::builder()
                    .max_capacity(1)
                    .time_to_live(CATEGORY_CACHE_TTL)
                    .build(),
            }),
        })
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Get a reference to the Midtrans client.
    #[must_use]
    pub fn midtrans(&self) -> &MidtransClient {
        &self.inner.midtrans
    }

    /// Get a reference to the Biteship client.
    #[must_use]
    pub fn biteship(&self) -> &BiteshipClient {
        &self.inner.biteship
    }

    /// Get a reference to the courier tracking client.
    #[must_use]
    pub fn binderbyte(&self) -> &BinderByteClient {
        &self.inner.binderbyte
    }

    /// Get a reference to the region client.
    #[must_use]
    pub fn wilayah(&self) -> &WilayahClient {
        &self.inner.wilayah
    }

    /// Get a reference to the checkout session store.
    #[must_use]
    pub fn checkout_sessions(&self) -> &CheckoutSessions {
        &self.inner.checkout_sessions
    }

    /// Get a reference to the category list cache.
    ///
    /// Admin category writes invalidate it.
    #[must_use]
    pub fn categories(&self) -> &Cache<(), Arc<Vec<Category>>> {
        &self.inner.categories
    }
}
