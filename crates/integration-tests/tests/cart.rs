//! Cart and checkout gating for a fresh customer.
//!
//! Requires a running storefront server with the sample catalog seeded.

use athleon_core::envelope::Envelope;
use athleon_integration_tests::{
    Session, expect_envelope, first_product, pick_variants, product_detail,
};
use reqwest::StatusCode;
use serde_json::{Value, json};

async fn add_first_product(session: &Session) -> Value {
    let product = first_product(&session.client).await;
    let id = &product["id"];
    let detail = product_detail(&session.client, id).await;

    let resp = session
        .post("/customer/keranjang")
        .json(&json!({
            "product_id": id,
            "variant_ids": pick_variants(&detail),
            "quantity": 1,
        }))
        .send()
        .await
        .unwrap();
    let body: Envelope<Value> = expect_envelope(resp, StatusCode::CREATED).await;
    body.data.unwrap()
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_cart_requires_login() {
    let resp = reqwest::Client::new()
        .get(athleon_integration_tests::api("/customer/keranjang"))
        .send()
        .await
        .unwrap();
    let _: Envelope<Value> = expect_envelope(resp, StatusCode::UNAUTHORIZED).await;
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_add_update_remove() {
    let session = Session::register().await;

    let added = add_first_product(&session).await;
    assert_eq!(added["count"], 1);
    let line_id = added["cart_item_id"].as_i64().unwrap();

    // Same selection again merges into one line.
    let again = add_first_product(&session).await;
    assert_eq!(again["cart_item_id"], line_id);

    let resp = session
        .put(&format!("/customer/keranjang/{line_id}"))
        .json(&json!({ "quantity": 1 }))
        .send()
        .await
        .unwrap();
    let _: Envelope<Value> = expect_envelope(resp, StatusCode::OK).await;

    let resp = session.get("/customer/keranjang").send().await.unwrap();
    let body: Envelope<Value> = expect_envelope(resp, StatusCode::OK).await;
    let cart = body.data.unwrap();
    assert_eq!(cart["items"].as_array().unwrap().len(), 1);
    assert_eq!(cart["item_count"], 1);

    let resp = session
        .delete(&format!("/customer/keranjang/{line_id}"))
        .send()
        .await
        .unwrap();
    let _: Envelope<Value> = expect_envelope(resp, StatusCode::OK).await;

    let resp = session.get("/customer/keranjang/count").send().await.unwrap();
    let body: Envelope<Value> = expect_envelope(resp, StatusCode::OK).await;
    assert_eq!(body.data.unwrap()["count"], 0);
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_zero_quantity_rejected() {
    let session = Session::register().await;
    let product = first_product(&session.client).await;

    let resp = session
        .post("/customer/keranjang")
        .json(&json!({ "product_id": product["id"], "quantity": 0 }))
        .send()
        .await
        .unwrap();
    let _: Envelope<Value> = expect_envelope(resp, StatusCode::UNPROCESSABLE_ENTITY).await;
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_checkout_without_address_cannot_submit() {
    let session = Session::register().await;
    let added = add_first_product(&session).await;

    let resp = session
        .post("/customer/checkout")
        .json(&json!({ "source": "cart", "cart_item_ids": [added["cart_item_id"]] }))
        .send()
        .await
        .unwrap();
    let body: Envelope<Value> = expect_envelope(resp, StatusCode::CREATED).await;
    let checkout = body.data.unwrap();
    assert_eq!(checkout["stage"], "selecting_address");
    assert!(checkout["address"].is_null());
    let id = checkout["id"].as_str().unwrap();

    let resp = session
        .post(&format!("/customer/checkout/{id}/process"))
        .send()
        .await
        .unwrap();
    let _: Envelope<Value> = expect_envelope(resp, StatusCode::UNPROCESSABLE_ENTITY).await;

    // Nothing was ordered.
    let resp = session.get("/customer/pesanan").send().await.unwrap();
    let body: Envelope<Value> = expect_envelope(resp, StatusCode::OK).await;
    assert_eq!(body.data.unwrap()["total"], 0);
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_other_customers_checkout_is_hidden() {
    let owner = Session::register().await;
    let added = add_first_product(&owner).await;
    let resp = owner
        .post("/customer/checkout")
        .json(&json!({ "source": "cart", "cart_item_ids": [added["cart_item_id"]] }))
        .send()
        .await
        .unwrap();
    let body: Envelope<Value> = expect_envelope(resp, StatusCode::CREATED).await;
    let id = body.data.unwrap()["id"].as_str().unwrap().to_owned();

    let stranger = Session::register().await;
    let resp = stranger
        .get(&format!("/customer/checkout/{id}/summary"))
        .send()
        .await
        .unwrap();
    let _: Envelope<Value> = expect_envelope(resp, StatusCode::NOT_FOUND).await;
}
