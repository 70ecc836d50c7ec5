//! Public catalog browsing.
//!
//! Requires a running storefront server with the sample catalog seeded.

use athleon_core::envelope::Envelope;
use athleon_integration_tests::{api, expect_envelope, first_product, product_detail};
use reqwest::{Client, StatusCode};
use serde_json::Value;

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_product_list_is_paginated() {
    let resp = Client::new()
        .get(api("/produk"))
        .query(&[("per_page", "2"), ("page", "1")])
        .send()
        .await
        .unwrap();
    let body: Envelope<Value> = expect_envelope(resp, StatusCode::OK).await;
    let page = body.data.unwrap();
    assert_eq!(page["per_page"], 2);
    assert!(page["items"].as_array().unwrap().len() <= 2);
    assert!(page["total"].as_u64().is_some());
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_product_detail_groups_variants() {
    let client = Client::new();
    let product = first_product(&client).await;
    let detail = product_detail(&client, &product["id"]).await;

    assert_eq!(detail["id"], product["id"]);
    for group in detail["variant_groups"].as_array().unwrap() {
        let dimension = group["dimension"].as_str().unwrap();
        for option in group["options"].as_array().unwrap() {
            assert_eq!(option["dimension"], dimension);
        }
    }
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_unknown_product_is_404() {
    let resp = Client::new()
        .get(api("/produk/999999999"))
        .send()
        .await
        .unwrap();
    let _: Envelope<Value> = expect_envelope(resp, StatusCode::NOT_FOUND).await;
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_recommended_excludes_product() {
    let client = Client::new();
    let product = first_product(&client).await;
    let id = &product["id"];

    let resp = client
        .get(api(&format!("/produk/{id}/recommended")))
        .send()
        .await
        .unwrap();
    let body: Envelope<Vec<Value>> = expect_envelope(resp, StatusCode::OK).await;
    assert!(body.data.unwrap().iter().all(|p| p["id"] != *id));
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_categories_and_banners() {
    let client = Client::new();

    let resp = client.get(api("/kategori")).send().await.unwrap();
    let body: Envelope<Vec<Value>> = expect_envelope(resp, StatusCode::OK).await;
    assert!(body.data.unwrap().iter().all(|c| c["slug"].is_string()));

    let resp = client.get(api("/banners")).send().await.unwrap();
    let body: Envelope<Vec<Value>> = expect_envelope(resp, StatusCode::OK).await;
    assert!(body.data.unwrap().iter().all(|b| b["is_active"] == true));
}
