//! API endpoint integration tests

use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use secrecy::SecretString;
use serde_json::{Value, json};
use tower::ServiceExt;

use nudge_gateway::api::{ApiServerBuilder, Collaborators};
use nudge_gateway::api::webhooks::telegram::SECRET_HEADER;

mod common;
use common::{Harness, ScriptedGenerator};

/// Build a test API router over a harness
fn build_test_router(h: &Harness, secret: Option<&str>, llm: Option<&'static str>) -> axum::Router {
    ApiServerBuilder::new(std::sync::Arc::clone(&h.runner), 0)
        .webhook_secret(secret.map(|s| SecretString::from(s.to_string())))
        .collaborators(Collaborators {
            llm,
            channel: "mock",
            inflection: false,
        })
        .build()
        .router()
}

fn update(update_id: i64, chat_id: i64, text: &str) -> Value {
    json!({
        "update_id": update_id,
        "message": {
            "message_id": 10,
            "date": 1_700_000_000,
            "chat": { "id": chat_id, "type": "private" },
            "from": { "id": chat_id, "is_bot": false, "first_name": "Alex" },
            "text": text
        }
    })
}

fn webhook(body: impl Into<Body>, secret: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/webhooks/telegram")
        .header("content-type", "application/json");
    if let Some(secret) = secret {
        builder = builder.header(SECRET_HEADER, secret);
    }
    builder.body(body.into()).unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

/// Wait until the background handler has delivered `count` messages
async fn wait_for_sent(h: &Harness, count: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while h.channel.sent().len() < count {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("background handler never replied");
}

#[tokio::test]
async fn test_health_endpoint() {
    let h = Harness::new(ScriptedGenerator::always("ok"));
    let app = build_test_router(&h, None, Some("scripted"));

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_ready_endpoint() {
    let h = Harness::new(ScriptedGenerator::always("ok"));
    h.say(1, "hi").await;
    let app = build_test_router(&h, None, Some("scripted"));

    let response = app
        .oneshot(Request::builder().uri("/ready").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["sessions"], 1);
    assert_eq!(json["checks"]["llm"]["status"], "ok");
    assert_eq!(json["checks"]["channel"]["message"], "mock");
    assert_eq!(json["checks"]["inflection"]["status"], "unavailable");
}

#[tokio::test]
async fn test_ready_degraded_without_llm() {
    let h = Harness::new(ScriptedGenerator::failing());
    let app = build_test_router(&h, None, None);

    let response = app
        .oneshot(Request::builder().uri("/ready").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let json = json_body(response).await;
    assert_eq!(json["status"], "degraded");
    assert_eq!(json["checks"]["llm"]["status"], "fail");
}

#[tokio::test]
async fn test_malformed_update_is_acknowledged() {
    let h = Harness::new(ScriptedGenerator::always("ok"));
    let app = build_test_router(&h, None, Some("scripted"));

    let response = app.oneshot(webhook("{not json", None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!({ "ok": true }));
    assert!(h.store.is_empty().await);
}

#[tokio::test]
async fn test_update_without_text_is_acknowledged() {
    let h = Harness::new(ScriptedGenerator::always("ok"));
    let app = build_test_router(&h, None, Some("scripted"));

    let sticker = json!({
        "update_id": 1,
        "message": { "message_id": 1, "chat": { "id": 4 }, "sticker": {} }
    });
    let response = app.oneshot(webhook(sticker.to_string(), None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(h.store.is_empty().await);
}

#[tokio::test]
async fn test_text_update_is_answered() {
    let h = Harness::new(ScriptedGenerator::always("hello Alex"));
    let app = build_test_router(&h, None, Some("scripted"));

    let response = app
        .oneshot(webhook(update(100, 42, "hi there").to_string(), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!({ "ok": true }));

    wait_for_sent(&h, 1).await;
    assert_eq!(h.channel.sent_to(42), vec!["hello Alex".to_string()]);
}

#[tokio::test]
async fn test_envelope_with_only_chat_and_text_is_answered() {
    let h = Harness::new(ScriptedGenerator::always("hi back"));
    let app = build_test_router(&h, None, Some("scripted"));
    let bare = json!({ "message": { "chat": { "id": 77 }, "text": "hello" } });

    let response = app.oneshot(webhook(bare.to_string(), None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    wait_for_sent(&h, 1).await;
    assert_eq!(h.channel.sent_to(77), vec!["hi back".to_string()]);
    assert_eq!(h.store.len().await, 1);
}

#[tokio::test]
async fn test_envelopes_without_update_id_are_not_deduplicated() {
    let h = Harness::new(ScriptedGenerator::always("again"));
    let app = build_test_router(&h, None, Some("scripted"));
    let bare = json!({ "message": { "chat": { "id": 78 }, "text": "ping" } }).to_string();

    app.clone().oneshot(webhook(bare.clone(), None)).await.unwrap();
    wait_for_sent(&h, 1).await;
    app.oneshot(webhook(bare, None)).await.unwrap();
    wait_for_sent(&h, 2).await;
    assert_eq!(h.channel.sent_to(78).len(), 2);
}

#[tokio::test]
async fn test_duplicate_update_is_handled_once() {
    let h = Harness::new(ScriptedGenerator::always("once"));
    let app = build_test_router(&h, None, Some("scripted"));
    let body = update(7, 42, "hello").to_string();

    let first = app.clone().oneshot(webhook(body.clone(), None)).await.unwrap();
    let second = app.oneshot(webhook(body, None)).await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(second.status(), StatusCode::OK);

    wait_for_sent(&h, 1).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(h.channel.sent_to(42).len(), 1);
}

#[tokio::test]
async fn test_webhook_secret_is_enforced() {
    let h = Harness::new(ScriptedGenerator::always("ok"));
    let app = build_test_router(&h, Some("s3cret"), Some("scripted"));
    let body = update(1, 42, "hello").to_string();

    let missing = app.clone().oneshot(webhook(body.clone(), None)).await.unwrap();
    assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(missing).await, json!({ "ok": false }));

    let wrong = app
        .clone()
        .oneshot(webhook(body.clone(), Some("guess")))
        .await
        .unwrap();
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

    let right = app.oneshot(webhook(body, Some("s3cret"))).await.unwrap();
    assert_eq!(right.status(), StatusCode::OK);
    wait_for_sent(&h, 1).await;
}
