//! Payment callback and payment lookup integration tests.

mod common;

use axum::http::StatusCode;
use chrono::Months;
use common::TestHarness;
use serde_json::json;

use inkpass_service::handlers::payments::SIGNATURE_HEADER;

fn notification(harness: &TestHarness, order_id: &str, package_id: &str, status: &str) -> String {
    json!({
        "order_id": order_id,
        "user_id": harness.test_user_id.to_string(),
        "package_id": package_id,
        "status": status,
    })
    .to_string()
}

async fn snapshot(harness: &TestHarness) -> serde_json::Value {
    harness
        .server
        .get("/v1/entitlements/me")
        .add_header("authorization", harness.user_auth_header())
        .await
        .json()
}

#[tokio::test]
async fn signed_coin_purchase_credits_bonus_coins() {
    let harness = TestHarness::with_webhook_secret("whsec_test");
    let body = notification(&harness, "order-1", "coins_500", "success");

    let response = harness
        .server
        .post("/webhooks/payment")
        .add_header(SIGNATURE_HEADER, harness.sign(&body))
        .content_type("application/json")
        .text(body)
        .await;

    response.assert_status_ok();
    let result: serde_json::Value = response.json();
    assert_eq!(result["received"], true);
    assert_eq!(result["outcome"], "appended");

    let state = snapshot(&harness).await;
    assert_eq!(state["coin_balance"], 550);
    assert_eq!(state["lifetime_coins_purchased"], 550);
}

#[tokio::test]
async fn unsigned_or_forged_callbacks_are_rejected() {
    let harness = TestHarness::with_webhook_secret("whsec_test");
    let body = notification(&harness, "order-1", "coins_100", "success");

    harness
        .server
        .post("/webhooks/payment")
        .content_type("application/json")
        .text(body.clone())
        .await
        .assert_status_bad_request();

    harness
        .server
        .post("/webhooks/payment")
        .add_header(SIGNATURE_HEADER, "00".repeat(32))
        .content_type("application/json")
        .text(body)
        .await
        .assert_status_bad_request();

    assert_eq!(snapshot(&harness).await["coin_balance"], 0);
}

#[tokio::test]
async fn replayed_success_grants_once() {
    let harness = TestHarness::new();
    let body = notification(&harness, "order-1", "coins_100", "success");

    for expected in ["appended", "duplicate", "duplicate"] {
        let result: serde_json::Value = harness
            .server
            .post("/webhooks/payment")
            .content_type("application/json")
            .text(body.clone())
            .await
            .json();
        assert_eq!(result["outcome"], expected);
    }

    assert_eq!(snapshot(&harness).await["coin_balance"], 100);
}

#[tokio::test]
async fn pending_then_success_settles_in_place() {
    let harness = TestHarness::new();

    let result: serde_json::Value = harness
        .server
        .post("/webhooks/payment")
        .content_type("application/json")
        .text(notification(&harness, "order-9", "premium_3m", "pending"))
        .await
        .json();
    assert_eq!(result["outcome"], "appended");
    assert_eq!(snapshot(&harness).await["premium_active"], false);

    let result: serde_json::Value = harness
        .server
        .post("/webhooks/payment")
        .content_type("application/json")
        .text(notification(&harness, "order-9", "premium_3m", "success"))
        .await
        .json();
    assert_eq!(result["outcome"], "settled");

    let state = snapshot(&harness).await;
    assert_eq!(state["premium_active"], true);
    let expected = common::start_time() + Months::new(3);
    let expires_at: chrono::DateTime<chrono::Utc> =
        serde_json::from_value(state["premium_expires_at"].clone()).unwrap();
    assert_eq!(expires_at, expected);

    let history: serde_json::Value = harness
        .server
        .get("/v1/entitlements/me/transactions")
        .add_header("authorization", harness.user_auth_header())
        .await
        .json();
    let transactions = history["transactions"].as_array().unwrap();
    assert_eq!(transactions.len(), 1);
    assert_eq!(transactions[0]["status"], "success");
    assert_eq!(transactions[0]["type"], "premium");
    assert_eq!(transactions[0]["months"], 3);
}

#[tokio::test]
async fn success_after_failure_is_a_conflict() {
    let harness = TestHarness::new();

    harness
        .server
        .post("/webhooks/payment")
        .content_type("application/json")
        .text(notification(&harness, "order-2", "coins_100", "failed"))
        .await
        .assert_status_ok();

    harness
        .server
        .post("/webhooks/payment")
        .content_type("application/json")
        .text(notification(&harness, "order-2", "coins_100", "success"))
        .await
        .assert_status(StatusCode::CONFLICT);

    assert_eq!(snapshot(&harness).await["coin_balance"], 0);
}

#[tokio::test]
async fn settlement_naming_another_package_is_a_conflict() {
    let harness = TestHarness::new();

    harness
        .server
        .post("/webhooks/payment")
        .content_type("application/json")
        .text(notification(&harness, "order-4", "coins_100", "pending"))
        .await
        .assert_status_ok();

    harness
        .server
        .post("/webhooks/payment")
        .content_type("application/json")
        .text(notification(&harness, "order-4", "coins_2000", "success"))
        .await
        .assert_status(StatusCode::CONFLICT);
    assert_eq!(snapshot(&harness).await["coin_balance"], 0);

    let result: serde_json::Value = harness
        .server
        .post("/webhooks/payment")
        .content_type("application/json")
        .text(notification(&harness, "order-4", "coins_100", "success"))
        .await
        .json();
    assert_eq!(result["outcome"], "settled");

    let state = snapshot(&harness).await;
    assert_eq!(state["coin_balance"], 100);
    assert_eq!(state["lifetime_coins_purchased"], 100);
}

#[tokio::test]
async fn late_pending_after_success_is_acknowledged() {
    let harness = TestHarness::new();

    harness
        .server
        .post("/webhooks/payment")
        .content_type("application/json")
        .text(notification(&harness, "order-5", "coins_100", "success"))
        .await
        .assert_status_ok();

    let result: serde_json::Value = harness
        .server
        .post("/webhooks/payment")
        .content_type("application/json")
        .text(notification(&harness, "order-5", "coins_100", "pending"))
        .await
        .json();
    assert_eq!(result["outcome"], "duplicate");
    assert_eq!(snapshot(&harness).await["coin_balance"], 100);
}

#[tokio::test]
async fn closed_checkout_records_nothing() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post("/webhooks/payment")
        .content_type("application/json")
        .text(notification(&harness, "order-3", "coins_100", "closed"))
        .await;

    response.assert_status_ok();
    let result: serde_json::Value = response.json();
    assert_eq!(result["received"], true);
    assert!(result.get("outcome").is_none());

    let history: serde_json::Value = harness
        .server
        .get("/v1/entitlements/me/transactions")
        .add_header("authorization", harness.user_auth_header())
        .await
        .json();
    assert_eq!(history["transactions"], json!([]));
}

#[tokio::test]
async fn mismatched_amount_and_unknown_package_are_rejected() {
    let harness = TestHarness::new();

    harness
        .server
        .post("/webhooks/payment")
        .json(&json!({
            "order_id": "order-4",
            "user_id": harness.test_user_id.to_string(),
            "package_id": "coins_1000",
            "status": "success",
            "gross_amount": 1,
        }))
        .await
        .assert_status_bad_request();

    harness
        .server
        .post("/webhooks/payment")
        .content_type("application/json")
        .text(notification(&harness, "order-5", "coins_9999", "success"))
        .await
        .assert_status_bad_request();

    assert_eq!(snapshot(&harness).await["coin_balance"], 0);
}

#[tokio::test]
async fn order_id_cannot_move_between_users() {
    let harness = TestHarness::new();

    harness
        .server
        .post("/webhooks/payment")
        .content_type("application/json")
        .text(notification(&harness, "order-6", "coins_100", "success"))
        .await
        .assert_status_ok();

    let other = inkpass_core::UserId::generate();
    harness
        .server
        .post("/webhooks/payment")
        .json(&json!({
            "order_id": "order-6",
            "user_id": other.to_string(),
            "package_id": "coins_100",
            "status": "success",
        }))
        .await
        .assert_status(StatusCode::CONFLICT);
}

#[tokio::test]
async fn payment_lookup_is_owner_only() {
    let harness = TestHarness::new();

    harness
        .server
        .post("/webhooks/payment")
        .content_type("application/json")
        .text(notification(&harness, "order-7", "premium_1m", "success"))
        .await
        .assert_status_ok();

    let response = harness
        .server
        .get("/v1/payments/order-7")
        .add_header("authorization", harness.user_auth_header())
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["id"], "order-7");
    assert_eq!(body["amount"], 49_000);
    assert_eq!(body["package"], "1 Month Premium");

    let other = inkpass_core::UserId::generate();
    harness
        .server
        .get("/v1/payments/order-7")
        .add_header("authorization", common::auth_header_for(&other))
        .await
        .assert_status_not_found();

    harness
        .server
        .get("/v1/payments/order-unknown")
        .add_header("authorization", harness.user_auth_header())
        .await
        .assert_status_not_found();
}
