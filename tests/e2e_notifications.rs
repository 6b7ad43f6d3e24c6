//! E2E tests for subscriptions, admin broadcast, read state and the
//! realtime stream

mod common;

use std::time::Duration;

use common::{ADMIN_TOKEN, RecordingPush, TestServer};
use serde_json::{Value, json};

const ENDPOINT_A: &str = "https://push.example.com/a";
const ENDPOINT_B: &str = "https://push.example.com/b";
const ENDPOINT_GONE: &str = "https://push.example.com/gone";

async fn send(server: &TestServer, body: Value) -> reqwest::Response {
    server
        .client
        .post(server.url("/api/notifications/send"))
        .bearer_auth(ADMIN_TOKEN)
        .json(&body)
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_subscribe_is_idempotent_per_browser() {
    let server = TestServer::new().await;

    let response = server.subscribe("browser-1", ENDPOINT_A).await;
    assert_eq!(response.status(), 201);
    let first: Value = response.json().await.unwrap();
    assert_eq!(first["created"], true);

    let response = server.subscribe("browser-1", ENDPOINT_B).await;
    assert_eq!(response.status(), 200);
    let second: Value = response.json().await.unwrap();
    assert_eq!(second["created"], false);
    assert_eq!(second["subscriptionId"], first["subscriptionId"]);
}

#[tokio::test]
async fn test_subscribe_names_missing_fields() {
    let server = TestServer::new().await;

    let response = server
        .client
        .post(server.url("/api/notifications/subscribe"))
        .json(&json!({ "endpoint": ENDPOINT_A, "keys": { "auth": "x" } }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Missing required fields: keys.p256dh, browserId");
}

#[tokio::test]
async fn test_send_requires_admin_token() {
    let server = TestServer::new().await;

    let response = server
        .client
        .post(server.url("/api/notifications/send"))
        .json(&json!({ "title": "Hi", "message": "There" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);

    let response = server
        .client
        .post(server.url("/api/notifications/clear"))
        .bearer_auth("wrong-token")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn test_send_fans_out_and_prunes_expired_subscriptions() {
    let server = TestServer::with_push(RecordingPush::with_expired(&[ENDPOINT_GONE])).await;
    server.subscribe("browser-a", ENDPOINT_A).await;
    server.subscribe("browser-b", ENDPOINT_B).await;
    server.subscribe("browser-gone", ENDPOINT_GONE).await;

    let response = send(
        &server,
        json!({ "title": "New movie", "message": "Heat is up", "url": "/movies/1" }),
    )
    .await;
    assert_eq!(response.status(), 201);
    let body: Value = response.json().await.unwrap();
    assert_eq!(
        body["delivery"],
        json!({ "attempted": 3, "delivered": 2, "failed": 0, "expired": 1 })
    );

    assert_eq!(server.push.endpoints(), vec![ENDPOINT_A, ENDPOINT_B]);
    let sent = server.push.sent.lock().unwrap().clone();
    assert_eq!(sent[0].1["title"], "New movie");
    assert_eq!(sent[0].1["url"], "/movies/1");

    // The expired subscription is gone; a second send only reaches two
    let response = send(&server, json!({ "title": "Again", "message": "Hello" })).await;
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["delivery"]["attempted"], 2);
}

#[tokio::test]
async fn test_send_without_url_uses_default_in_payload() {
    let server = TestServer::new().await;
    server.subscribe("browser-a", ENDPOINT_A).await;

    let response = send(&server, json!({ "title": "Hi", "message": "There" })).await;
    assert_eq!(response.status(), 201);

    let sent = server.push.sent.lock().unwrap().clone();
    assert_eq!(sent[0].1["url"], "/movies");
}

#[tokio::test]
async fn test_read_state_is_per_browser() {
    let server = TestServer::new().await;
    server.subscribe("browser-a", ENDPOINT_A).await;
    server.subscribe("browser-b", ENDPOINT_B).await;

    let body: Value = send(&server, json!({ "title": "One", "message": "1" }))
        .await
        .json()
        .await
        .unwrap();
    let first_id = body["notification"]["id"].as_i64().unwrap();
    send(&server, json!({ "title": "Two", "message": "2" })).await;

    let response = server
        .client
        .post(server.url(&format!("/api/notifications/{first_id}/read")))
        .json(&json!({ "browserId": "browser-a" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let list = server
        .get_json("/api/notifications?browserId=browser-a")
        .await;
    assert_eq!(list[0]["title"], "Two");
    assert_eq!(list[0]["isRead"], false);
    assert_eq!(list[1]["isRead"], true);

    let count = server
        .get_json("/api/notifications/unread_count?browserId=browser-a")
        .await;
    assert_eq!(count["count"], 1);
    let count = server
        .get_json("/api/notifications/unread_count?browserId=browser-b")
        .await;
    assert_eq!(count["count"], 2);
    let count = server.get_json("/api/notifications/unread_count").await;
    assert_eq!(count["count"], 2);
}

#[tokio::test]
async fn test_mark_read_unknown_browser_is_404() {
    let server = TestServer::new().await;
    let body: Value = send(&server, json!({ "title": "One", "message": "1" }))
        .await
        .json()
        .await
        .unwrap();
    let id = body["notification"]["id"].as_i64().unwrap();

    let response = server
        .client
        .post(server.url(&format!("/api/notifications/{id}/read")))
        .json(&json!({ "browserId": "nobody" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn test_clear_removes_notifications() {
    let server = TestServer::new().await;
    send(&server, json!({ "title": "One", "message": "1" })).await;

    let response = server
        .client
        .post(server.url("/api/notifications/clear"))
        .bearer_auth(ADMIN_TOKEN)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    assert_eq!(server.get_json("/api/notifications").await, json!([]));
}

#[tokio::test]
async fn test_unsubscribe_stops_delivery() {
    let server = TestServer::new().await;
    server.subscribe("browser-a", ENDPOINT_A).await;

    let response = server
        .client
        .post(server.url("/api/notifications/unsubscribe"))
        .json(&json!({ "endpoint": ENDPOINT_A }))
        .send()
        .await
        .unwrap();
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["removed"], 1);

    send(&server, json!({ "title": "Hi", "message": "There" })).await;
    assert!(server.push.endpoints().is_empty());
}

#[tokio::test]
async fn test_stream_receives_new_notifications() {
    let server = TestServer::new().await;

    let mut stream = server
        .client
        .get(server.url("/api/notifications/stream"))
        .send()
        .await
        .unwrap();
    assert_eq!(stream.status(), 200);
    assert_eq!(
        stream.headers()["content-type"].to_str().unwrap(),
        "text/event-stream"
    );

    send(&server, json!({ "title": "Live", "message": "Now" })).await;

    let mut received = String::new();
    while !received.contains("\"title\":\"Live\"") {
        let chunk = tokio::time::timeout(Duration::from_secs(5), stream.chunk())
            .await
            .expect("event arrives")
            .unwrap()
            .expect("stream stays open");
        received.push_str(&String::from_utf8_lossy(&chunk));
    }
    assert!(received.contains("event: new-notification"));
}
