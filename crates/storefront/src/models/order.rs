//! Orders, order items and payments.

use chrono::{DateTime, Utc};
use rand::Rng;
use rand::distr::Alphanumeric;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;

use athleon_core::envelope::FieldErrors;
use athleon_core::{
    Money, OrderId, OrderStatus, PaymentId, PaymentMethod, PaymentStatus, ProductId, UserId,
    VariantId,
};

use super::address::ShippingAddress;

/// Prefix of every order number.
pub const ORDER_NUMBER_PREFIX: &str = "ATH";

/// Longest review text accepted.
pub const MAX_REVIEW_LENGTH: usize = 1000;

/// An order header.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Order {
    pub id: OrderId,
    pub order_number: String,
    pub user_id: UserId,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub subtotal: Money,
    pub shipping_cost: Money,
    pub total: Money,
    pub courier_code: String,
    pub courier_name: String,
    pub service_code: String,
    pub service_name: String,
    pub shipping_etd: String,
    pub shipping_address: Json<ShippingAddress>,
    pub airway_bill: Option<String>,
    pub rating: Option<i16>,
    pub review: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Human-readable status label.
    #[must_use]
    pub const fn status_label(&self) -> &'static str {
        self.status.label()
    }
}

/// A line of an order, frozen at creation time.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct OrderItem {
    pub id: i32,
    pub order_id: OrderId,
    pub product_id: Option<ProductId>,
    pub variant_ids: Vec<VariantId>,
    pub product_name: String,
    pub product_image: Option<String>,
    pub variant_labels: Vec<String>,
    pub unit_price: Money,
    pub quantity: i32,
    pub line_total: Money,
}

/// The gateway payment of an order.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Payment {
    pub id: PaymentId,
    pub order_id: OrderId,
    pub gateway: String,
    pub status: PaymentStatus,
    pub amount: Money,
    pub snap_token: Option<String>,
    pub redirect_url: Option<String>,
    pub transaction_id: Option<String>,
    pub payment_type: Option<String>,
    #[serde(skip)]
    pub last_notification: Option<Json<serde_json::Value>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An order with its items and payment.
#[derive(Debug, Clone, Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub status_label: &'static str,
    pub items: Vec<OrderItem>,
    pub payment: Option<Payment>,
}

impl OrderDetail {
    #[must_use]
    pub fn new(order: Order, items: Vec<OrderItem>, payment: Option<Payment>) -> Self {
        Self {
            status_label: order.status_label(),
            order,
            items,
            payment,
        }
    }
}

/// `?status=` filter on order listings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderQuery {
    pub status: Option<OrderStatus>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// `POST /api/customer/pesanan/{id}/review`.
#[derive(Debug, Clone, Deserialize)]
pub struct ReviewInput {
    pub rating: i16,
    pub review: Option<String>,
}

impl ReviewInput {
    /// Validate the rating and trim the text.
    ///
    /// # Errors
    ///
    /// Returns the field errors found.
    pub fn normalize(mut self) -> Result<Self, FieldErrors> {
        let mut errors = FieldErrors::new();
        errors.check(
            !(1..=5).contains(&self.rating),
            "rating",
            "rating must be between 1 and 5",
        );
        self.review = self
            .review
            .map(|r| r.trim().to_owned())
            .filter(|r| !r.is_empty());
        errors.check(
            self.review
                .as_deref()
                .is_some_and(|r| r.chars().count() > MAX_REVIEW_LENGTH),
            "review",
            "review is too long",
        );
        errors.into_result().map(|()| self)
    }
}

/// Generate an order number like `ATH-20260315-7KQ2ZD`.
#[must_use]
pub fn generate_order_number(now: DateTime<Utc>) -> String {
    let suffix: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(|b| char::from(b).to_ascii_uppercase())
        .collect();
    format!("{ORDER_NUMBER_PREFIX}-{}-{suffix}", now.format("%Y%m%d"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_order_number_format() {
        let now = Utc.with_ymd_and_hms(2026, 3, 15, 8, 30, 0).unwrap();
        let number = generate_order_number(now);

        assert!(number.starts_with("ATH-20260315-"));
        assert_eq!(number.len(), "ATH-20260315-".len() + 6);
        let suffix = number.rsplit('-').next().unwrap();
        assert!(
            suffix
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        );
    }

    #[test]
    fn test_review_validation() {
        let review = ReviewInput {
            rating: 5,
            review: Some("  Nyaman dipakai lari  ".to_owned()),
        }
        .normalize()
        .unwrap();
        assert_eq!(review.review.as_deref(), Some("Nyaman dipakai lari"));

        let errors = ReviewInput {
            rating: 0,
            review: Some("x".repeat(MAX_REVIEW_LENGTH + 1)),
        }
        .normalize()
        .unwrap_err();
        assert!(errors.get("rating").is_some());
        assert!(errors.get("review").is_some());
    }
}
