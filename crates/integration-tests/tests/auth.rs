//! Registration, login and bearer token lifecycle.
//!
//! Requires a migrated database and a running storefront server.

use athleon_core::envelope::Envelope;
use athleon_integration_tests::{Session, api, expect_envelope, unique_email};
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_register_then_me() {
    let session = Session::register().await;

    let resp = session.get("/auth/me").send().await.unwrap();
    let body: Envelope<Value> = expect_envelope(resp, StatusCode::OK).await;
    let user = body.data.unwrap();
    assert_eq!(user["email"], session.email);
    assert_eq!(user["role"], "customer");
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_duplicate_registration_rejected() {
    let session = Session::register().await;

    let resp = Client::new()
        .post(api("/auth/register"))
        .json(&json!({
            "name": "Second",
            "email": session.email.to_uppercase(),
            "password": "another-password",
        }))
        .send()
        .await
        .unwrap();
    let _: Envelope<Value> = expect_envelope(resp, StatusCode::UNPROCESSABLE_ENTITY).await;
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_registration_validation_errors() {
    let resp = Client::new()
        .post(api("/auth/register"))
        .json(&json!({ "name": "", "email": "not-an-email", "password": "short" }))
        .send()
        .await
        .unwrap();
    let body: Envelope<Value> = expect_envelope(resp, StatusCode::UNPROCESSABLE_ENTITY).await;
    assert!(body.errors.get("email").is_some());
    assert!(body.errors.get("password").is_some());
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_login_wrong_password() {
    let session = Session::register().await;

    let resp = Client::new()
        .post(api("/auth/login"))
        .json(&json!({ "email": session.email, "password": "wrong-password" }))
        .send()
        .await
        .unwrap();
    let _: Envelope<Value> = expect_envelope(resp, StatusCode::UNAUTHORIZED).await;
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_logout_revokes_token() {
    let session = Session::register().await;

    let resp = session.post("/auth/logout").send().await.unwrap();
    let _: Envelope<Value> = expect_envelope(resp, StatusCode::OK).await;

    let resp = session.get("/auth/me").send().await.unwrap();
    let _: Envelope<Value> = expect_envelope(resp, StatusCode::UNAUTHORIZED).await;
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_login_issues_working_token() {
    let email = unique_email();
    let client = Client::new();
    let resp = client
        .post(api("/auth/register"))
        .json(&json!({ "name": "Login", "email": email, "password": "correct-horse-battery" }))
        .send()
        .await
        .unwrap();
    let _: Envelope<Value> = expect_envelope(resp, StatusCode::CREATED).await;

    let resp = client
        .post(api("/auth/login"))
        .json(&json!({ "email": email, "password": "correct-horse-battery" }))
        .send()
        .await
        .unwrap();
    let body: Envelope<Value> = expect_envelope(resp, StatusCode::OK).await;
    let session = body.data.unwrap();
    assert_eq!(session["token_type"], "Bearer");

    let resp = client
        .get(api("/auth/me"))
        .bearer_auth(session["token"].as_str().unwrap())
        .send()
        .await
        .unwrap();
    let _: Envelope<Value> = expect_envelope(resp, StatusCode::OK).await;
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_customer_cannot_reach_admin() {
    let session = Session::register().await;

    let resp = session.get("/admin/pesanan").send().await.unwrap();
    let _: Envelope<Value> = expect_envelope(resp, StatusCode::FORBIDDEN).await;
}
