//! Integration tests for the Athleon storefront API.
//!
//! The tests talk to a running server over HTTP and are `#[ignore]`d by
//! default.
//!
//! # Running Tests
//!
//! ```bash
//! athleon-cli migrate
//! athleon-cli seed --file seed/catalog.yaml
//! cargo run -p athleon-storefront &
//! cargo test -p athleon-integration-tests -- --ignored
//! ```
//!
//! `ATHLEON_BASE_URL` overrides the default `http://localhost:8000`.

#![allow(clippy::missing_panics_doc, clippy::unwrap_used)]

use athleon_core::envelope::Envelope;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use uuid::Uuid;

/// Base URL of the server under test.
#[must_use]
pub fn base_url() -> String {
    std::env::var("ATHLEON_BASE_URL").unwrap_or_else(|_| "http://localhost:8000".to_owned())
}

/// URL of an `/api` path.
#[must_use]
pub fn api(path: &str) -> String {
    format!("{}/api{path}", base_url())
}

/// A unique throwaway email address.
#[must_use]
pub fn unique_email() -> String {
    format!("it-{}@example.com", Uuid::new_v4().simple())
}

/// Read a response envelope, asserting its status.
pub async fn expect_envelope<T: DeserializeOwned>(
    resp: Response,
    status: StatusCode,
) -> Envelope<T> {
    let actual = resp.status();
    let body: Envelope<T> = resp.json().await.unwrap();
    assert_eq!(actual, status, "unexpected status, message: {}", body.message);
    assert_eq!(body.status_code, status.as_u16());
    body
}

/// A client carrying a customer's bearer token.
pub struct Session {
    pub client: Client,
    pub token: String,
    pub email: String,
}

impl Session {
    /// Register a fresh customer and keep its token.
    pub async fn register() -> Self {
        let client = Client::new();
        let email = unique_email();
        let resp = client
            .post(api("/auth/register"))
            .json(&json!({
                "name": "Integration Test",
                "email": email,
                "phone": "081234567890",
                "password": "correct-horse-battery",
            }))
            .send()
            .await
            .unwrap();
        let body: Envelope<Value> = expect_envelope(resp, StatusCode::CREATED).await;
        let token = body.data.unwrap()["token"].as_str().unwrap().to_owned();
        Self {
            client,
            token,
            email,
        }
    }

    #[must_use]
    pub fn get(&self, path: &str) -> RequestBuilder {
        self.client.get(api(path)).bearer_auth(&self.token)
    }

    #[must_use]
    pub fn post(&self, path: &str) -> RequestBuilder {
        self.client.post(api(path)).bearer_auth(&self.token)
    }

    #[must_use]
    pub fn put(&self, path: &str) -> RequestBuilder {
        self.client.put(api(path)).bearer_auth(&self.token)
    }

    #[must_use]
    pub fn delete(&self, path: &str) -> RequestBuilder {
        self.client.delete(api(path)).bearer_auth(&self.token)
    }
}

/// The first active product in the catalog, as raw JSON.
pub async fn first_product(client: &Client) -> Value {
    let resp = client.get(api("/produk")).send().await.unwrap();
    let body: Envelope<Value> = expect_envelope(resp, StatusCode::OK).await;
    let page = body.data.unwrap();
    page["items"]
        .as_array()
        .and_then(|items| items.first())
        .cloned()
        .expect("catalog is empty; run `athleon-cli seed` first")
}

/// Full detail of a product, including its variant groups.
pub async fn product_detail(client: &Client, id: &Value) -> Value {
    let resp = client.get(api(&format!("/produk/{id}"))).send().await.unwrap();
    let body: Envelope<Value> = expect_envelope(resp, StatusCode::OK).await;
    body.data.unwrap()
}

/// One in-stock variant id per dimension of `detail`.
#[must_use]
pub fn pick_variants(detail: &Value) -> Vec<Value> {
    detail["variant_groups"]
        .as_array()
        .map(|groups| {
            groups
                .iter()
                .filter_map(|group| {
                    group["options"]
                        .as_array()?
                        .iter()
                        .find(|v| v["stock"].as_i64().unwrap_or(0) > 0)
                        .map(|v| v["id"].clone())
                })
                .collect()
        })
        .unwrap_or_default()
}
