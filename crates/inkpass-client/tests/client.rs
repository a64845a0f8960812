//! Client and cache tests against a mocked service.

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use inkpass_client::{ClientError, ClientOptions, EntitlementCache, InkpassClient};
use inkpass_core::{ManualClock, TransactionKind};

const USER_ID: &str = "6f1c3a52-6f0e-4a53-9d55-6a9b8a1c2e11";

fn client(server: &MockServer) -> InkpassClient {
    InkpassClient::with_options(
        server.uri(),
        "service-key",
        ClientOptions::with_service_name("reader"),
    )
    .unwrap()
}

fn snapshot_body(premium_expires_at: Option<&str>, coins: i64) -> serde_json::Value {
    json!({
        "user_id": USER_ID,
        "coin_balance": coins,
        "premium_active": premium_expires_at.is_some(),
        "premium_expires_at": premium_expires_at,
        "unlocked_chapters": ["ch-1"],
        "writer_limits": {
            "maxNovels": 1,
            "maxChapters": 5,
            "canPublish": false,
            "canEarnRevenue": false,
            "canUseAdvancedEditor": false,
            "canAccessAnalytics": false
        },
        "lifetime_coins_purchased": 0,
        "lifetime_coins_spent": 0
    })
}

#[tokio::test]
async fn service_calls_carry_the_api_key() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!(
            "/v1/internal/users/{USER_ID}/chapters/ch-9/access"
        )))
        .and(header("x-api-key", "service-key"))
        .and(header("x-service-name", "reader"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({
                "chapter_id": "ch-9",
                "unlocked": true
            })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let access = client(&server)
        .check_chapter_access(USER_ID, "ch-9")
        .await
        .unwrap();

    assert!(access.unlocked);
    assert_eq!(access.chapter_id, "ch-9");
}

#[tokio::test]
async fn unlock_for_user_sends_the_cost() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!(
            "/v1/internal/users/{USER_ID}/chapters/ch-2/unlock"
        )))
        .and(body_json(json!({ "cost": 25 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "chapter_id": "ch-2",
            "unlocked": true,
            "already_unlocked": false,
            "coin_balance": 5
        })))
        .mount(&server)
        .await;

    let result = client(&server)
        .unlock_chapter_for_user(USER_ID, "ch-2", Some(25))
        .await
        .unwrap();

    assert_eq!(result.coin_balance, 5);
    assert!(!result.already_unlocked);
}

#[tokio::test]
async fn payment_required_maps_to_insufficient_coins() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chapters/ch-3/unlock"))
        .and(header("authorization", "Bearer reader-token"))
        .respond_with(ResponseTemplate::new(402).set_body_json(json!({
            "error": {
                "code": "insufficient_coins",
                "message": "Insufficient coins",
                "details": { "balance": 4, "required": 10 }
            }
        })))
        .mount(&server)
        .await;

    let err = client(&server)
        .unlock_chapter("reader-token", "ch-3")
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ClientError::InsufficientCoins {
            balance: 4,
            required: 10
        }
    ));
}

#[tokio::test]
async fn other_errors_keep_code_and_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/payments/order-x"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": { "code": "not_found", "message": "Payment not found: order-x" }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/v1/internal/users/{USER_ID}/premium")))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream down"))
        .mount(&server)
        .await;

    let client = client(&server);

    let err = client.get_payment("reader-token", "order-x").await.unwrap_err();
    assert!(err.is_not_found());

    let err = client.is_premium_active(USER_ID).await.unwrap_err();
    match err {
        ClientError::Api { code, status, .. } => {
            assert_eq!(code, "unknown");
            assert_eq!(status, 503);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn transactions_are_paged_with_query_parameters() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/entitlements/me/transactions"))
        .and(query_param("limit", "10"))
        .and(query_param("offset", "20"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "transactions": [{
                "id": "order-1",
                "type": "coins",
                "coins": 550,
                "amount": 45000,
                "status": "success",
                "package": "500 Coins + 50 Bonus",
                "created_at": "2026-01-15T12:00:00+00:00"
            }],
            "has_more": false
        })))
        .mount(&server)
        .await;

    let page = client(&server)
        .list_transactions("reader-token", 10, 20)
        .await
        .unwrap();

    assert!(!page.has_more);
    assert_eq!(
        page.transactions[0].kind,
        TransactionKind::CoinPurchase { coins: 550 }
    );
}

#[tokio::test]
async fn cache_serves_fresh_snapshots_without_refetching() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/entitlements/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(snapshot_body(None, 30)))
        .expect(2)
        .mount(&server)
        .await;

    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2026, 1, 15, 12, 0, 0).unwrap(),
    ));
    let cache = EntitlementCache::new(client(&server), "reader-token")
        .with_ttl(Duration::seconds(30))
        .with_clock(clock.clone());

    assert_eq!(cache.coin_balance().await.unwrap(), 30);
    assert!(cache.is_chapter_unlocked("ch-1").await.unwrap());
    assert!(!cache.is_chapter_unlocked("ch-2").await.unwrap());

    // Past the TTL the next read goes back to the service
    clock.advance(Duration::seconds(31));
    assert_eq!(cache.coin_balance().await.unwrap(), 30);
}

#[tokio::test]
async fn cached_premium_lapses_on_the_local_clock() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/entitlements/me"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(snapshot_body(Some("2026-01-15T12:10:00Z"), 0)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2026, 1, 15, 12, 0, 0).unwrap(),
    ));
    let cache = EntitlementCache::new(client(&server), "reader-token")
        .with_ttl(Duration::hours(1))
        .with_clock(clock.clone());

    assert!(cache.is_premium_active().await.unwrap());
    assert!(cache.is_chapter_unlocked("ch-99").await.unwrap());
    assert_eq!(cache.writer_limits().await.unwrap().max_novels, -1);

    // Still within the TTL, but the premium window has closed
    clock.advance(Duration::minutes(10));
    assert!(!cache.is_premium_active().await.unwrap());
    assert!(!cache.is_chapter_unlocked("ch-99").await.unwrap());
    assert_eq!(cache.writer_limits().await.unwrap().max_novels, 1);
}

#[tokio::test]
async fn unlocking_invalidates_the_cached_snapshot() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/entitlements/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(snapshot_body(None, 30)))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chapters/ch-2/unlock"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "chapter_id": "ch-2",
            "unlocked": true,
            "already_unlocked": false,
            "coin_balance": 20
        })))
        .mount(&server)
        .await;

    let cache = EntitlementCache::new(client(&server), "reader-token");

    cache.snapshot().await.unwrap();
    let result = cache.unlock_chapter("ch-2").await.unwrap();
    assert_eq!(result.coin_balance, 20);

    // Refetched after the unlock
    cache.snapshot().await.unwrap();
}
