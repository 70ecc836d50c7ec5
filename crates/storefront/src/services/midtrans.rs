//! Midtrans payment gateway client.
//!
//! Snap creates a hosted payment page for an order; the Core API reports the
//! transaction status. Both authenticate with HTTP Basic using the server key
//! as the username and an empty password.
//!
//! Midtrans `order_id` is our order number, not the numeric primary key.

use base64::{Engine, engine::general_purpose::STANDARD};
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512};
use thiserror::Error;

use athleon_core::PaymentStatus;

use super::truncate;
use crate::config::MidtransConfig;

/// Errors that can occur when interacting with Midtrans.
#[derive(Debug, Error)]
pub enum MidtransError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Failed to parse response.
    #[error("Parse error: {0}")]
    Parse(String),

    /// The gateway has no transaction for the order.
    #[error("transaction not found")]
    NotFound,
}

/// Midtrans API client.
#[derive(Clone)]
pub struct MidtransClient {
    client: reqwest::Client,
    server_key: SecretString,
    snap_base_url: String,
    core_base_url: String,
}

impl MidtransClient {
    /// Create a new Midtrans client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &MidtransConfig) -> Result<Self, MidtransError> {
        Self::with_base_urls(config, config.snap_base_url(), config.core_base_url())
    }

    /// Create a client against explicit endpoints.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn with_base_urls(
        config: &MidtransConfig,
        snap_base_url: &str,
        core_base_url: &str,
    ) -> Result<Self, MidtransError> {
        let mut headers = HeaderMap::new();

        let credentials = STANDARD.encode(format!("{}:", config.server_key.expose_secret()));
        let mut auth = HeaderValue::from_str(&format!("Basic {credentials}"))
            .map_err(|e| MidtransError::Parse(format!("Invalid server key format: {e}")))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(15))
            .build()?;

        Ok(Self {
            client,
            server_key: config.server_key.clone(),
            snap_base_url: snap_base_url.trim_end_matches('/').to_owned(),
            core_base_url: core_base_url.trim_end_matches('/').to_owned(),
        })
    }

    /// Create a Snap transaction and return its token and hosted page URL.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails.
    pub async fn create_transaction(
        &self,
        request: &SnapRequest,
    ) -> Result<SnapTransaction, MidtransError> {
        let url = format!("{}/transactions", self.snap_base_url);

        let response = self.client.post(&url).json(request).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            tracing::warn!(
                status = status.as_u16(),
                order_number = %request.transaction_details.order_id,
                body = %truncate(&body, 500),
                "Midtrans Snap request failed"
            );
            return Err(MidtransError::Api {
                status: status.as_u16(),
                message: truncate(&body, 500).to_owned(),
            });
        }

        serde_json::from_str(&body).map_err(|e| MidtransError::Parse(e.to_string()))
    }

    /// Fetch the current transaction status for an order number.
    ///
    /// # Errors
    ///
    /// Returns `MidtransError::NotFound` if the customer never opened the
    /// payment page, or another error if the request fails.
    pub async fn status(&self, order_number: &str) -> Result<TransactionStatus, MidtransError> {
        let url = format!("{}/{order_number}/status", self.core_base_url);

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if status.as_u16() == 404 {
            return Err(MidtransError::NotFound);
        }
        if !status.is_success() {
            return Err(MidtransError::Api {
                status: status.as_u16(),
                message: truncate(&body, 500).to_owned(),
            });
        }

        let parsed: TransactionStatus =
            serde_json::from_str(&body).map_err(|e| MidtransError::Parse(e.to_string()))?;

        // The Core API answers some failures with HTTP 200 and the real code in the body.
        if parsed.status_code.as_deref() == Some("404") {
            return Err(MidtransError::NotFound);
        }
        Ok(parsed)
    }

    /// Check a notification's `signature_key`.
    ///
    /// The signature is `SHA512(order_id + status_code + gross_amount + server_key)`.
    #[must_use]
    pub fn verify_signature(&self, notification: &Notification) -> bool {
        let expected = signature(
            &notification.order_id,
            &notification.status_code,
            &notification.gross_amount,
            self.server_key.expose_secret(),
        );
        constant_time_eq(
            expected.as_bytes(),
            notification.signature_key.to_ascii_lowercase().as_bytes(),
        )
    }
}

/// Hex SHA-512 notification signature.
#[must_use]
pub fn signature(order_id: &str, status_code: &str, gross_amount: &str, server_key: &str) -> String {
    let mut hasher = Sha512::new();
    hasher.update(order_id.as_bytes());
    hasher.update(status_code.as_bytes());
    hasher.update(gross_amount.as_bytes());
    hasher.update(server_key.as_bytes());
    hex::encode(hasher.finalize())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

// =============================================================================
// Snap request
// =============================================================================

/// Body of `POST /snap/v1/transactions`.
#[derive(Debug, Clone, Serialize)]
pub struct SnapRequest {
    pub transaction_details: TransactionDetails,
    pub customer_details: CustomerDetails,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub item_details: Vec<ItemDetail>,
    pub callbacks: Callbacks,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransactionDetails {
    pub order_id: String,
    pub gross_amount: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CustomerDetails {
    pub first_name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemDetail {
    pub id: String,
    pub price: i64,
    pub quantity: u32,
    /// Midtrans rejects names longer than 50 characters.
    pub name: String,
}

impl ItemDetail {
    #[must_use]
    pub fn new(id: impl Into<String>, price: i64, quantity: u32, name: &str) -> Self {
        Self {
            id: id.into(),
            price,
            quantity,
            name: name.chars().take(50).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Callbacks {
    pub finish: String,
}

impl SnapRequest {
    /// Drop the itemized lines when they do not add up to the gross amount.
    ///
    /// Midtrans rejects requests whose items disagree with `gross_amount`;
    /// the order total is what we charge, so the breakdown is the part to lose.
    #[must_use]
    pub fn reconcile_items(mut self) -> Self {
        let sum: i64 = self
            .item_details
            .iter()
            .map(|i| i.price * i64::from(i.quantity))
            .sum();
        if sum != self.transaction_details.gross_amount {
            tracing::debug!(
                sum,
                gross_amount = self.transaction_details.gross_amount,
                "Dropping item details that do not match gross amount"
            );
            self.item_details.clear();
        }
        self
    }
}

/// Response of `POST /snap/v1/transactions`.
#[derive(Debug, Clone, Deserialize)]
pub struct SnapTransaction {
    pub token: String,
    pub redirect_url: String,
}

// =============================================================================
// Status and notifications
// =============================================================================

/// Response of `GET /v2/{order_id}/status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionStatus {
    #[serde(default)]
    pub status_code: Option<String>,
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub transaction_status: Option<String>,
    #[serde(default)]
    pub fraud_status: Option<String>,
    #[serde(default)]
    pub payment_type: Option<String>,
    #[serde(default)]
    pub gross_amount: Option<String>,
}

impl TransactionStatus {
    /// Map onto our payment status, `None` for statuses we ignore.
    #[must_use]
    pub fn payment_status(&self) -> Option<PaymentStatus> {
        map_status(
            self.transaction_status.as_deref()?,
            self.fraud_status.as_deref(),
        )
    }
}

/// HTTP notification posted by Midtrans on every status change.
#[derive(Debug, Clone, Deserialize)]
pub struct Notification {
    pub order_id: String,
    pub status_code: String,
    pub gross_amount: String,
    pub signature_key: String,
    pub transaction_status: String,
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub fraud_status: Option<String>,
    #[serde(default)]
    pub payment_type: Option<String>,
}

impl Notification {
    /// Map onto our payment status, `None` for statuses we ignore.
    #[must_use]
    pub fn payment_status(&self) -> Option<PaymentStatus> {
        map_status(&self.transaction_status, self.fraud_status.as_deref())
    }
}

/// Translate a Midtrans `transaction_status` and `fraud_status`.
///
/// `capture` is card-only and is settled unless fraud screening challenged or
/// denied it. `refund`, `partial_refund` and `authorize` are left alone.
#[must_use]
pub fn map_status(transaction_status: &str, fraud_status: Option<&str>) -> Option<PaymentStatus> {
    match transaction_status {
        "capture" => match fraud_status {
            None | Some("accept") => Some(PaymentStatus::Paid),
            Some("challenge") => Some(PaymentStatus::Pending),
            Some(_) => Some(PaymentStatus::Failed),
        },
        "settlement" => Some(PaymentStatus::Paid),
        "pending" => Some(PaymentStatus::Pending),
        "deny" | "cancel" | "expire" | "failure" => Some(PaymentStatus::Failed),
        _ => None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn config() -> MidtransConfig {
        MidtransConfig {
            server_key: SecretString::from("SB-Mid-server-k3Yq9VbT2uXw7pLr"),
            client_key: "SB-Mid-client-aQ2".to_string(),
            production: false,
        }
    }

    fn notification(status: &str, fraud: Option<&str>) -> Notification {
        let order_id = "ATH-20240101-ABC123";
        Notification {
            order_id: order_id.to_string(),
            status_code: "200".to_string(),
            gross_amount: "150000.00".to_string(),
            signature_key: signature(
                order_id,
                "200",
                "150000.00",
                "SB-Mid-server-k3Yq9VbT2uXw7pLr",
            ),
            transaction_status: status.to_string(),
            transaction_id: Some("b3a1".to_string()),
            fraud_status: fraud.map(String::from),
            payment_type: Some("bank_transfer".to_string()),
        }
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(map_status("settlement", None), Some(PaymentStatus::Paid));
        assert_eq!(map_status("capture", Some("accept")), Some(PaymentStatus::Paid));
        assert_eq!(map_status("capture", None), Some(PaymentStatus::Paid));
        assert_eq!(
            map_status("capture", Some("challenge")),
            Some(PaymentStatus::Pending)
        );
        assert_eq!(map_status("capture", Some("deny")), Some(PaymentStatus::Failed));
        assert_eq!(map_status("pending", None), Some(PaymentStatus::Pending));
        for failed in ["deny", "cancel", "expire", "failure"] {
            assert_eq!(map_status(failed, None), Some(PaymentStatus::Failed));
        }
        assert_eq!(map_status("refund", None), None);
    }

    #[test]
    fn test_verify_signature() {
        let client = MidtransClient::new(&config()).unwrap();
        let mut n = notification("settlement", None);
        assert!(client.verify_signature(&n));

        n.gross_amount = "1.00".to_string();
        assert!(!client.verify_signature(&n));
    }

    #[test]
    fn test_signature_is_hex_sha512() {
        let sig = signature("a", "200", "1.00", "key");
        assert_eq!(sig.len(), 128);
        assert!(sig.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_parse_notification() {
        let body = r#"{
            "transaction_time": "2024-01-01 10:00:00",
            "transaction_status": "capture",
            "transaction_id": "513f1f01",
            "status_code": "200",
            "signature_key": "abc",
            "payment_type": "credit_card",
            "order_id": "ATH-20240101-ABC123",
            "gross_amount": "150000.00",
            "fraud_status": "accept",
            "currency": "IDR"
        }"#;
        let n: Notification = serde_json::from_str(body).unwrap();
        assert_eq!(n.payment_status(), Some(PaymentStatus::Paid));
        assert_eq!(n.payment_type.as_deref(), Some("credit_card"));
    }

    #[test]
    fn test_parse_status_response() {
        let body = r#"{
            "status_code": "201",
            "transaction_id": "e48a",
            "transaction_status": "pending",
            "payment_type": "bank_transfer",
            "gross_amount": "150000.00"
        }"#;
        let s: TransactionStatus = serde_json::from_str(body).unwrap();
        assert_eq!(s.payment_status(), Some(PaymentStatus::Pending));
    }

    #[test]
    fn test_reconcile_items() {
        let request = SnapRequest {
            transaction_details: TransactionDetails {
                order_id: "ATH-1".to_string(),
                gross_amount: 120_000,
            },
            customer_details: CustomerDetails {
                first_name: "Rina".to_string(),
                email: "rina@example.com".to_string(),
                phone: None,
            },
            item_details: vec![
                ItemDetail::new("1", 50_000, 2, "Sepatu Lari"),
                ItemDetail::new("shipping", 20_000, 1, "JNE REG"),
            ],
            callbacks: Callbacks {
                finish: "http://localhost/orders/1".to_string(),
            },
        };
        assert_eq!(request.clone().reconcile_items().item_details.len(), 2);

        let mut mismatched = request;
        mismatched.transaction_details.gross_amount = 130_000;
        assert!(mismatched.reconcile_items().item_details.is_empty());
    }

    #[test]
    fn test_item_name_truncated() {
        let item = ItemDetail::new("1", 1, 1, &"x".repeat(80));
        assert_eq!(item.name.chars().count(), 50);
    }
}
