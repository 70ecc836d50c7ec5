//! Server-side checkout sessions.
//!
//! A session is the only way into checkout: it is created from cart lines the
//! caller owns or from a buy-now selection, is bound to the caller, and is
//! dropped after 30 minutes without activity. Each session sits behind its
//! own mutex so concurrent requests against one checkout run one at a time.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use serde::Serialize;
use tokio::sync::Mutex;
use uuid::Uuid;

use athleon_core::checkout::CheckoutFlow;
use athleon_core::{CartItemId, Money, ProductId, UserId, VariantId};

use crate::models::address::Address;

/// Idle time after which a checkout is forgotten.
pub const SESSION_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Where the items of a checkout came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CheckoutSource {
    /// These cart lines are removed when the order is written.
    Cart { item_ids: Vec<CartItemId> },
    BuyNow,
}

/// One priced line of a checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutLine {
    pub product_id: ProductId,
    pub product_name: String,
    pub image: Option<String>,
    pub variant_ids: Vec<VariantId>,
    pub variant_labels: Vec<String>,
    pub unit_price: Money,
    pub quantity: u32,
    pub line_total: Money,
    /// Per unit, for the shipping quote.
    pub weight_grams: i32,
}

/// A checkout in progress.
#[derive(Debug, Clone)]
pub struct CheckoutSession {
    pub id: Uuid,
    pub user_id: UserId,
    pub source: CheckoutSource,
    pub lines: Vec<CheckoutLine>,
    pub flow: CheckoutFlow,
    /// The chosen address, kept whole for the order snapshot.
    pub address: Option<Address>,
    /// Number of the order being written by the current submit.
    pub pending_order_number: Option<String>,
}

impl CheckoutSession {
    /// Start a session for priced lines.
    #[must_use]
    pub fn new(user_id: UserId, source: CheckoutSource, lines: Vec<CheckoutLine>) -> Self {
        let subtotal = lines.iter().map(|l| l.line_total).sum();
        Self {
            id: Uuid::new_v4(),
            user_id,
            source,
            lines,
            flow: CheckoutFlow::new(subtotal),
            address: None,
            pending_order_number: None,
        }
    }

    /// Cart lines consumed by submitting this checkout.
    #[must_use]
    pub fn cart_item_ids(&self) -> &[CartItemId] {
        match &self.source {
            CheckoutSource::Cart { item_ids } => item_ids,
            CheckoutSource::BuyNow => &[],
        }
    }
}

/// A session handle; lock it for the duration of a request.
pub type SessionHandle = Arc<Mutex<CheckoutSession>>;

/// Store of live checkout sessions.
#[derive(Clone)]
pub struct CheckoutSessions {
    cache: Cache<Uuid, (UserId, SessionHandle)>,
}

impl Default for CheckoutSessions {
    fn default() -> Self {
        Self::new()
    }
}

impl CheckoutSessions {
    #[must_use]
    pub fn new() -> Self {
        Self::with_idle_timeout(SESSION_IDLE_TIMEOUT)
    }

    /// A store with a custom idle timeout.
    #[must_use]
    pub fn with_idle_timeout(idle: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(50_000)
            .time_to_idle(idle)
            .build();
        Self { cache }
    }

    /// Keep a new session and return its handle.
    pub async fn insert(&self, session: CheckoutSession) -> SessionHandle {
        let id = session.id;
        let user_id = session.user_id;
        let handle = Arc::new(Mutex::new(session));
        self.cache
            .insert(id, (user_id, Arc::clone(&handle)))
            .await;
        handle
    }

    /// The caller's session, or `None` if it expired or belongs to someone else.
    pub async fn get(&self, id: Uuid, user_id: UserId) -> Option<SessionHandle> {
        self.cache
            .get(&id)
            .await
            .filter(|(owner, _)| *owner == user_id)
            .map(|(_, handle)| handle)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn line(price: i64, quantity: u32) -> CheckoutLine {
        let unit_price = Money::from_rupiah(price);
        CheckoutLine {
            product_id: ProductId::new(1),
            product_name: "Training Shorts".to_owned(),
            image: None,
            variant_ids: vec![],
            variant_labels: vec![],
            unit_price,
            quantity,
            line_total: unit_price.times(quantity),
            weight_grams: 300,
        }
    }

    #[test]
    fn test_new_session_subtotal() {
        let session = CheckoutSession::new(
            UserId::new(7),
            CheckoutSource::BuyNow,
            vec![line(100_000, 2), line(50_000, 1)],
        );
        assert_eq!(session.flow.totals().subtotal, Money::from_rupiah(250_000));
        assert!(session.cart_item_ids().is_empty());
    }

    #[test]
    fn test_cart_source_item_ids() {
        let ids = vec![CartItemId::new(3), CartItemId::new(4)];
        let session = CheckoutSession::new(
            UserId::new(7),
            CheckoutSource::Cart {
                item_ids: ids.clone(),
            },
            vec![line(100_000, 1)],
        );
        assert_eq!(session.cart_item_ids(), ids.as_slice());
    }

    #[tokio::test]
    async fn test_sessions_are_bound_to_their_user() {
        let sessions = CheckoutSessions::new();
        let session = CheckoutSession::new(UserId::new(7), CheckoutSource::BuyNow, vec![]);
        let id = session.id;
        sessions.insert(session).await;

        assert!(sessions.get(id, UserId::new(7)).await.is_some());
        assert!(sessions.get(id, UserId::new(8)).await.is_none());
        assert!(sessions.get(Uuid::new_v4(), UserId::new(7)).await.is_none());
    }

    #[tokio::test]
    async fn test_idle_sessions_expire() {
        let sessions = CheckoutSessions::with_idle_timeout(Duration::from_millis(50));
        let session = CheckoutSession::new(UserId::new(7), CheckoutSource::BuyNow, vec![]);
        let id = session.id;
        sessions.insert(session).await;
        assert!(sessions.get(id, UserId::new(7)).await.is_some());

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(sessions.get(id, UserId::new(7)).await.is_none());
    }

    #[tokio::test]
    async fn test_handle_is_shared() {
        let sessions = CheckoutSessions::new();
        let session = CheckoutSession::new(UserId::new(7), CheckoutSource::BuyNow, vec![]);
        let id = session.id;
        let handle = sessions.insert(session).await;

        handle.lock().await.address = None;
        let again = sessions.get(id, UserId::new(7)).await.unwrap();
        assert!(Arc::ptr_eq(&handle, &again));
    }
}
