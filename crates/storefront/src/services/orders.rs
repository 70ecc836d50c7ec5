//! Order lifecycle actions.
//!
//! The database validates that a transition exists at all; this module
//! decides who may take it.

use serde::Deserialize;
use sqlx::PgPool;
use tracing::{info, instrument};

use athleon_core::envelope::Page;
use athleon_core::{OrderId, OrderStatus, UserId};

use super::binderbyte::{BinderByteClient, Tracking};
use crate::db::OrderRepository;
use crate::error::{AppError, Result};
use crate::models::order::{OrderDetail, OrderQuery, ReviewInput};

/// Who is moving an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    Customer,
    Admin,
}

impl Actor {
    /// Whether this actor may move an order from `from` to `to`.
    #[must_use]
    pub const fn may(self, from: OrderStatus, to: OrderStatus) -> bool {
        match self {
            Self::Customer => matches!(
                (from, to),
                (OrderStatus::BelumDibayar, OrderStatus::Dibatalkan)
                    | (OrderStatus::Dikirim, OrderStatus::Selesai)
            ),
            Self::Admin => matches!(
                (from, to),
                (OrderStatus::Dikemas, OrderStatus::Dikirim)
                    | (
                        OrderStatus::BelumDibayar | OrderStatus::Dikemas,
                        OrderStatus::Dibatalkan
                    )
            ),
        }
    }
}

/// `PUT /api/admin/pesanan/{id}/status`.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusUpdate {
    pub status: OrderStatus,
    pub airway_bill: Option<String>,
}

/// `GET /api/admin/pesanan` filters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdminOrderQuery {
    pub status: Option<OrderStatus>,
    pub q: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// Order operations.
pub struct OrderService<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// The caller's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    pub async fn list_for_customer(
        &self,
        user_id: UserId,
        query: &OrderQuery,
    ) -> Result<Page<OrderDetail>> {
        Ok(OrderRepository::new(self.pool)
            .list(Some(user_id), query.status, None, query.page, query.per_page)
            .await?)
    }

    /// Every order, for the back-office.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    pub async fn list_all(&self, query: &AdminOrderQuery) -> Result<Page<OrderDetail>> {
        let search = query.q.as_deref().map(str::trim).filter(|q| !q.is_empty());
        Ok(OrderRepository::new(self.pool)
            .list(None, query.status, search, query.page, query.per_page)
            .await?)
    }

    /// One order; `owner` restricts it to that customer.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the order does not exist or is not the owner's.
    pub async fn detail(&self, owner: Option<UserId>, id: OrderId) -> Result<OrderDetail> {
        let orders = OrderRepository::new(self.pool);
        let order = match owner {
            Some(user_id) => orders.get_for_user(user_id, id).await?,
            None => orders.get(id).await?,
        }
        .ok_or_else(|| AppError::NotFound("Order not found".to_owned()))?;
        Ok(orders.detail(order).await?)
    }

    /// Move an order on behalf of `actor`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Forbidden` if the actor may not take this step,
    /// `AppError::Validation` when shipping without an airway bill, and a
    /// conflict if the order moved in the meantime.
    #[instrument(skip(self, airway_bill))]
    pub async fn change_status(
        &self,
        actor: Actor,
        owner: Option<UserId>,
        id: OrderId,
        next: OrderStatus,
        airway_bill: Option<&str>,
    ) -> Result<OrderDetail> {
        let current = self.detail(owner, id).await?.order.status;

        current.transition(next)?;
        if !actor.may(current, next) {
            return Err(AppError::Forbidden(format!(
                "Orders cannot be moved from {} to {} here",
                current.label(),
                next.label()
            )));
        }

        let airway_bill = airway_bill.map(str::trim).filter(|a| !a.is_empty());
        if next == OrderStatus::Dikirim && airway_bill.is_none() {
            return Err(AppError::invalid(
                "airway_bill",
                "airway bill is required to ship an order",
            ));
        }

        let orders = OrderRepository::new(self.pool);
        let order = orders
            .transition(id, next, airway_bill.filter(|_| next == OrderStatus::Dikirim))
            .await?;
        info!(order_number = %order.order_number, status = %order.status, "Order status changed");
        Ok(orders.detail(order).await?)
    }

    /// Rate and review a completed order, once.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Validation` for a bad rating, a conflict if the order
    /// is not completed or already reviewed.
    #[instrument(skip(self, input))]
    pub async fn review(&self, user_id: UserId, id: OrderId, input: ReviewInput) -> Result<OrderDetail> {
        let input = input.normalize().map_err(AppError::Validation)?;
        // Ownership first, so another customer's order reads as missing.
        self.detail(Some(user_id), id).await?;

        let orders = OrderRepository::new(self.pool);
        let order = orders
            .save_review(id, input.rating, input.review.as_deref())
            .await?;
        info!(order_number = %order.order_number, rating = input.rating, "Order reviewed");
        Ok(orders.detail(order).await?)
    }

    /// Courier tracking for a shipped order.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` if the order has no airway bill yet, or
    /// the tracking error from the courier aggregator.
    pub async fn tracking(
        &self,
        tracker: &BinderByteClient,
        user_id: UserId,
        id: OrderId,
    ) -> Result<Tracking> {
        let order = self.detail(Some(user_id), id).await?.order;
        let awb = order
            .airway_bill
            .as_deref()
            .ok_or_else(|| AppError::BadRequest("This order has not been shipped yet".to_owned()))?;
        Ok(tracker.track(&order.courier_code, awb).await?)
    }
}
