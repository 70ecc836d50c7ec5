//! Payment service: Snap tokens, status checks and gateway notifications.
//!
//! Midtrans is the source of truth for whether an order was paid. We learn
//! about it three ways: the HTTP notification, an on-demand status check
//! when the customer returns from the payment page, and a periodic sweep of
//! stale unpaid orders. All three funnel into
//! [`OrderRepository::apply_payment`], which is idempotent.

use std::str::FromStr;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, instrument, warn};

use athleon_core::{OrderId, OrderStatus, PaymentMethod, PaymentStatus};

use super::midtrans::{
    Callbacks, CustomerDetails, ItemDetail, MidtransError, Notification, SnapRequest,
    SnapTransaction, TransactionDetails,
};
use crate::db::OrderRepository;
use crate::db::orders::PaymentUpdate;
use crate::error::{AppError, Result, add_breadcrumb};
use crate::models::order::{Order, OrderDetail};
use crate::models::user::CurrentUser;
use crate::state::AppState;

/// What the client needs to open the Snap payment page.
#[derive(Debug, Clone, Serialize)]
pub struct SnapToken {
    pub order_id: OrderId,
    pub order_number: String,
    pub snap_token: String,
    pub redirect_url: String,
    pub client_key: String,
}

/// Payment operations.
pub struct PaymentService<'a> {
    state: &'a AppState,
}

impl<'a> PaymentService<'a> {
    #[must_use]
    pub const fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    fn orders(&self) -> OrderRepository<'a> {
        OrderRepository::new(self.state.pool())
    }

    /// Create a Snap transaction for an order and store its token.
    ///
    /// # Errors
    ///
    /// Returns error if the total cannot be expressed in whole rupiah, or the
    /// gateway or database call fails.
    #[instrument(skip_all, fields(order_number = %detail.order.order_number))]
    pub async fn start_snap(
        &self,
        detail: &OrderDetail,
        customer: &CurrentUser,
    ) -> Result<SnapTransaction> {
        let request = snap_request(detail, customer, &self.state.config().base_url)
            .ok_or_else(|| AppError::Internal("order total out of range".to_owned()))?;

        let transaction = self.state.midtrans().create_transaction(&request).await?;
        self.orders()
            .set_snap_token(detail.order.id, &transaction.token, &transaction.redirect_url)
            .await?;

        info!("Snap transaction created");
        Ok(transaction)
    }

    /// The Snap token of an unpaid online order, creating one if needed.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the order is not the caller's,
    /// `AppError::Conflict` if it does not await online payment.
    #[instrument(skip(self, customer), fields(user_id = %customer.id))]
    pub async fn create_token(&self, customer: &CurrentUser, order_id: OrderId) -> Result<SnapToken> {
        let orders = self.orders();
        let order = orders
            .get_for_user(customer.id, order_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Order not found".to_owned()))?;

        if order.payment_method != PaymentMethod::Midtrans {
            return Err(AppError::Conflict(
                "this order is not paid online".to_owned(),
            ));
        }
        if order.status != OrderStatus::BelumDibayar {
            return Err(AppError::Conflict(
                "this order is no longer awaiting payment".to_owned(),
            ));
        }

        let detail = orders.detail(order).await?;
        let stored = detail
            .payment
            .as_ref()
            .and_then(|p| Some((p.snap_token.clone()?, p.redirect_url.clone()?)));

        let (snap_token, redirect_url) = match stored {
            Some(pair) => pair,
            None => {
                let transaction = self.start_snap(&detail, customer).await?;
                (transaction.token, transaction.redirect_url)
            }
        };

        Ok(SnapToken {
            order_id: detail.order.id,
            order_number: detail.order.order_number,
            snap_token,
            redirect_url,
            client_key: self.state.config().midtrans.client_key.clone(),
        })
    }

    /// Ask the gateway for the order's payment status and apply it.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the order is not the caller's, or an
    /// upstream error if the gateway cannot be reached.
    #[instrument(skip(self, customer), fields(user_id = %customer.id))]
    pub async fn check_status(
        &self,
        customer: &CurrentUser,
        order_id: OrderId,
    ) -> Result<OrderDetail> {
        let orders = self.orders();
        let mut order = orders
            .get_for_user(customer.id, order_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Order not found".to_owned()))?;

        if order.payment_method == PaymentMethod::Midtrans
            && order.status == OrderStatus::BelumDibayar
        {
            match self.state.midtrans().status(&order.order_number).await {
                Ok(status) => {
                    if let Some(update) = status.payment_status().map(|s| PaymentUpdate {
                        status: s,
                        transaction_id: status.transaction_id.clone(),
                        payment_type: status.payment_type.clone(),
                        raw: serde_json::to_value(&status).unwrap_or_default(),
                    }) {
                        order = orders.apply_payment(order.id, &update).await?;
                    }
                }
                // Snap page never opened: nothing to apply yet
                Err(MidtransError::NotFound) => {}
                Err(e) => return Err(e.into()),
            }
        }

        Ok(orders.detail(order).await?)
    }

    /// Handle a Midtrans HTTP notification.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Forbidden` for a bad signature, `AppError::BadRequest`
    /// for a malformed body or an amount that does not match the order.
    #[instrument(skip_all)]
    pub async fn handle_notification(&self, raw: serde_json::Value) -> Result<Option<Order>> {
        let notification: Notification = serde_json::from_value(raw.clone())
            .map_err(|e| AppError::BadRequest(format!("invalid notification: {e}")))?;

        if !self.state.midtrans().verify_signature(&notification) {
            warn!(order_number = %notification.order_id, "Rejected notification with bad signature");
            return Err(AppError::Forbidden("invalid signature".to_owned()));
        }

        add_breadcrumb(
            "payment",
            "Midtrans notification",
            Some(&[
                ("order_number", notification.order_id.as_str()),
                ("transaction_status", notification.transaction_status.as_str()),
            ]),
        );

        let orders = self.orders();
        let order = orders
            .get_by_number(&notification.order_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Order not found".to_owned()))?;

        if !amount_matches(&notification.gross_amount, &order) {
            warn!(
                order_number = %order.order_number,
                gross_amount = %notification.gross_amount,
                total = %order.total,
                "Notification amount does not match order total"
            );
            return Err(AppError::BadRequest("gross_amount does not match".to_owned()));
        }

        let Some(status) = notification.payment_status() else {
            info!(
                order_number = %order.order_number,
                transaction_status = %notification.transaction_status,
                "Ignoring notification status"
            );
            return Ok(None);
        };

        let update = PaymentUpdate {
            status,
            transaction_id: notification.transaction_id.clone(),
            payment_type: notification.payment_type.clone(),
            raw,
        };
        let order = orders.apply_payment(order.id, &update).await?;
        info!(
            order_number = %order.order_number,
            payment_status = ?status,
            order_status = %order.status,
            "Applied payment notification"
        );
        Ok(Some(order))
    }

    /// Settle unpaid online orders older than `older_than`.
    ///
    /// Orders the gateway reports as paid or failed are moved accordingly;
    /// orders whose payment page was never opened are cancelled. Orders still
    /// pending at the gateway are left for its own expiry notification.
    ///
    /// # Errors
    ///
    /// Returns error if the stale orders cannot be listed. Failures on
    /// individual orders are logged and skipped.
    #[instrument(skip(self))]
    pub async fn expire_stale(&self, older_than: Duration) -> Result<usize> {
        let orders = self.orders();
        let stale = orders.stale_unpaid(Utc::now() - older_than).await?;
        let mut settled = 0;

        for order in stale {
            let update = match self.state.midtrans().status(&order.order_number).await {
                Ok(status) => match status.payment_status() {
                    Some(s @ (PaymentStatus::Paid | PaymentStatus::Failed)) => PaymentUpdate {
                        status: s,
                        transaction_id: status.transaction_id.clone(),
                        payment_type: status.payment_type.clone(),
                        raw: serde_json::to_value(&status).unwrap_or_default(),
                    },
                    _ => continue,
                },
                Err(MidtransError::NotFound) => PaymentUpdate {
                    status: PaymentStatus::Failed,
                    transaction_id: None,
                    payment_type: None,
                    raw: serde_json::json!({ "reason": "expired without payment attempt" }),
                },
                Err(e) => {
                    warn!(error = %e, order_number = %order.order_number, "Status check failed");
                    continue;
                }
            };

            match orders.apply_payment(order.id, &update).await {
                Ok(_) => settled += 1,
                Err(e) => {
                    warn!(error = %e, order_number = %order.order_number, "Failed to settle order");
                }
            }
        }

        if settled > 0 {
            info!(settled, "Settled stale unpaid orders");
        }
        Ok(settled)
    }
}

/// Build the Snap request for an order.
///
/// Returns `None` if an amount does not fit the gateway's integer rupiah.
#[must_use]
pub fn snap_request(
    detail: &OrderDetail,
    customer: &CurrentUser,
    base_url: &str,
) -> Option<SnapRequest> {
    let order = &detail.order;
    let gross_amount = order.total.to_gross_amount()?;

    let mut items = Vec::with_capacity(detail.items.len() + 1);
    for item in &detail.items {
        let name = if item.variant_labels.is_empty() {
            item.product_name.clone()
        } else {
            format!("{} ({})", item.product_name, item.variant_labels.join(", "))
        };
        let id = item
            .product_id
            .map_or_else(|| format!("item-{}", item.id), |id| id.to_string());
        items.push(ItemDetail::new(
            id,
            item.unit_price.to_gross_amount()?,
            u32::try_from(item.quantity).ok()?,
            &name,
        ));
    }
    items.push(ItemDetail::new(
        "shipping",
        order.shipping_cost.to_gross_amount()?,
        1,
        &format!("Ongkir {} {}", order.courier_name, order.service_name),
    ));

    let request = SnapRequest {
        transaction_details: TransactionDetails {
            order_id: order.order_number.clone(),
            gross_amount,
        },
        customer_details: CustomerDetails {
            first_name: customer.name.clone(),
            email: customer.email.as_str().to_owned(),
            phone: Some(order.shipping_address.receiver_phone.clone()),
        },
        item_details: items,
        callbacks: Callbacks {
            finish: format!(
                "{}/pesanan/{}",
                base_url.trim_end_matches('/'),
                order.id
            ),
        },
    };
    Some(request.reconcile_items())
}

/// Whether a notification's `gross_amount` equals what Snap was asked to
/// charge, i.e. the order total in whole rupiah.
fn amount_matches(gross_amount: &str, order: &Order) -> bool {
    let Some(charged) = order.total.to_gross_amount() else {
        return false;
    };
    Decimal::from_str(gross_amount.trim()).is_ok_and(|amount| amount == Decimal::from(charged))
}
