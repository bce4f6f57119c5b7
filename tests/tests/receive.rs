//! Receiver tests: POST /messages validation and enqueueing.

use axum::http::StatusCode;
use inbox_core::{ItemStatus, Payload};
use integration_tests::{
    fixtures,
    setup::{TestContext, TestOptions},
};

#[tokio::test]
async fn test_text_message_is_enqueued_pending() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let response = server
        .post("/messages")
        .json(&fixtures::text_message("hello world"))
        .await;

    response.assert_status(StatusCode::ACCEPTED);
    let body: serde_json::Value = response.json();
    assert_eq!(body["accepted"], true);
    assert_eq!(body["status"], "pending");
    assert!(body["timestamp"].as_i64().unwrap() > 0);

    let id = inbox_core::ItemId(body["id"].as_i64().unwrap());
    let item = ctx.item(id).await;
    assert_eq!(item.status, ItemStatus::Pending);
    assert_eq!(item.attempt_count, 0);
    assert_eq!(item.metadata.sender.id, fixtures::SENDER_ID);
    assert!(matches!(item.payload, Payload::Text { ref text, .. } if text == "hello world"));
}

#[tokio::test]
async fn test_ids_increase_in_arrival_order() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let first = ctx.receive(&server, fixtures::text_message("one")).await;
    let second = ctx.receive(&server, fixtures::text_message("two")).await;
    assert!(second > first);

    let pending = ctx.store.fetch_pending(10).await.unwrap();
    let ids: Vec<_> = pending.iter().map(|i| i.id).collect();
    assert_eq!(ids, vec![first, second]);
}

#[tokio::test]
async fn test_malformed_body_rejected() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let response = server
        .post("/messages")
        .content_type("application/json")
        .bytes("{not json".into())
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "VALID_001");
    assert_eq!(ctx.store.counts().await.unwrap().total(), 0);
}

#[tokio::test]
async fn test_empty_text_rejected() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let response = server
        .post("/messages")
        .json(&fixtures::text_message("   "))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "VALID_003");
}

#[tokio::test]
async fn test_empty_file_reference_rejected() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let response = server
        .post("/messages")
        .json(&fixtures::photo_message("", None))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_entity_out_of_range_rejected() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let response = server
        .post("/messages")
        .json(&fixtures::text_link_message(
            "ab",
            1,
            usize::MAX,
            "https://x.example",
        ))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(ctx.store.counts().await.unwrap().total(), 0);

    // Nothing was queued, so a processor run has nothing to trip on.
    let summary = ctx.process_all().await;
    assert_eq!(summary.claimed, 0);
}

#[tokio::test]
async fn test_oversized_body_rejected() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let huge = "x".repeat(300 * 1024);
    let response = server
        .post("/messages")
        .json(&fixtures::text_message(&huge))
        .await;

    response.assert_status(StatusCode::PAYLOAD_TOO_LARGE);
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "VALID_002");
}

#[tokio::test]
async fn test_unknown_sender_forbidden() {
    let ctx = TestContext::with_options(TestOptions {
        allowed_users: vec![fixtures::SENDER_ID],
        ..TestOptions::default()
    });
    let server = ctx.server();

    ctx.receive(&server, fixtures::text_message("from a friend"))
        .await;

    let response = server
        .post("/messages")
        .json(&fixtures::text_message_from(666, "from a stranger"))
        .await;

    response.assert_status(StatusCode::FORBIDDEN);
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "AUTH_005");
    assert_eq!(ctx.store.counts().await.unwrap().total(), 1);
}

#[tokio::test]
async fn test_receiver_does_not_process() {
    let ctx = TestContext::new();
    let server = ctx.server();

    ctx.receive(&server, fixtures::text_message("later")).await;

    assert!(ctx.mocks.analyzer.prompts().is_empty());
    assert!(ctx.mocks.notifier.replies().is_empty());
    assert_eq!(ctx.store.counts().await.unwrap().pending, 1);
}
