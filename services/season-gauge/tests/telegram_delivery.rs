//! Integration tests for Telegram delivery against a mock Bot API.

use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

use season_common::config::NotificationConfig;
use season_gauge::error::DeliveryError;
use season_gauge::notification::{Notifier, TelegramNotifier, MAX_MESSAGE_LEN};

const TOKEN: &str = "123456:test-token";
const SEND_PATH: &str = "/bot123456:test-token/sendMessage";

fn notifier(server: &MockServer) -> TelegramNotifier {
    let config = NotificationConfig {
        bot_token: Some(TOKEN.to_string()),
        chat_id: Some("987654".to_string()),
        api_base: server.uri(),
        timeout_secs: 5,
    };
    TelegramNotifier::new(&config)
}

fn ok_response() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "ok": true, "result": { "message_id": 1 } }))
}

fn without_parse_mode(request: &Request) -> bool {
    !String::from_utf8_lossy(&request.body).contains("parse_mode")
}

#[tokio::test]
async fn test_send_markdown_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(SEND_PATH))
        .and(body_partial_json(json!({
            "chat_id": "987654",
            "text": "👑 *Season Gauge Report*",
            "parse_mode": "Markdown"
        })))
        .respond_with(ok_response())
        .expect(1)
        .mount(&server)
        .await;

    notifier(&server)
        .send("👑 *Season Gauge Report*")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_markdown_parse_failure_falls_back_to_plain_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(SEND_PATH))
        .and(body_partial_json(json!({ "parse_mode": "Markdown" })))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "ok": false,
            "error_code": 400,
            "description": "Bad Request: can't parse entities: Can't find end of the entity starting at byte offset 12"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(SEND_PATH))
        .and(without_parse_mode)
        .and(body_partial_json(json!({ "text": "❌ Analysis failed: credit_spread" })))
        .respond_with(ok_response())
        .expect(1)
        .mount(&server)
        .await;

    notifier(&server)
        .send("❌ *Analysis failed: credit\\_spread")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_other_rejections_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(SEND_PATH))
        .respond_with(ResponseTemplate::new(403).set_body_string(
            r#"{"ok":false,"error_code":403,"description":"Forbidden: bot was blocked by the user"}"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    let err = notifier(&server).send("hello").await.unwrap_err();
    match err {
        DeliveryError::Rejected { status, body } => {
            assert_eq!(status, 403);
            assert!(body.contains("blocked"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_long_message_is_split() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(SEND_PATH))
        .respond_with(ok_response())
        .expect(2)
        .mount(&server)
        .await;

    let line = "- a trigger line that repeats\n";
    let text = line.repeat(MAX_MESSAGE_LEN / line.len() + 10);
    notifier(&server).send(&text).await.unwrap();
}

#[tokio::test]
async fn test_unreachable_api_is_transport_error() {
    let config = NotificationConfig {
        bot_token: Some(TOKEN.to_string()),
        chat_id: Some("987654".to_string()),
        // Port 9 (discard) is closed on test hosts.
        api_base: "http://127.0.0.1:9".to_string(),
        timeout_secs: 2,
    };
    let err = TelegramNotifier::new(&config).send("hello").await.unwrap_err();
    match err {
        DeliveryError::Transport(message) => assert!(!message.contains(TOKEN)),
        other => panic!("unexpected error: {other:?}"),
    }
}
