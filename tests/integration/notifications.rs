//! Notification delivery over HTTP and gateway error isolation

use std::sync::Arc;
use std::time::{Duration, Instant};

use assert_matches::assert_matches;
use chrono::Utc;
use guardia_uptime::check::CheckOutcome;
use guardia_uptime::config::{Discord, TargetInfo, Webhook};
use guardia_uptime::notify::{
    DiscordNotifier, Notification, NotificationGateway, Notifier, NotifyError, WebhookNotifier,
};
use serde_json::{Value, json};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::helpers::RecordingNotifier;

fn target() -> TargetInfo {
    TargetInfo {
        name: "api".to_string(),
        url: "https://api.example.com/health".to_string(),
        category: "core".to_string(),
    }
}

fn down() -> Notification {
    Notification::Down {
        target: target(),
        outcome: CheckOutcome::failure(Utc::now(), "connection refused"),
    }
}

fn webhook(server: &MockServer) -> WebhookNotifier {
    WebhookNotifier::new(
        reqwest::Client::new(),
        Webhook {
            url: format!("{}/hook", server.uri()),
        },
    )
}

#[tokio::test]
async fn test_webhook_posts_down_payload() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .and(body_partial_json(json!({
            "event": "down",
            "service": "api",
            "status": "down",
            "error": "connection refused",
            "recipients": ["ops@example.com"],
        })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = CheckOutcome::failure(Utc::now(), "connection refused");
    webhook(&server)
        .notify_down(&target(), &outcome, &["ops@example.com".to_string()])
        .await
        .unwrap();
}

#[tokio::test]
async fn test_webhook_rejection_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let outcome = CheckOutcome::failure(Utc::now(), "timeout");
    let result = webhook(&server).notify_down(&target(), &outcome, &[]).await;

    assert_matches!(result, Err(NotifyError::Rejected { status: 500, body }) if body == "boom");
}

#[tokio::test]
async fn test_discord_sends_embed_with_mentions() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/discord"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let notifier = DiscordNotifier::new(
        reqwest::Client::new(),
        Discord {
            url: format!("{}/discord", server.uri()),
            user_id: Some("42".to_string()),
        },
    );
    let outcome = CheckOutcome::failure(Utc::now(), "connection refused");
    notifier.notify_down(&target(), &outcome, &[]).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert!(body["content"].as_str().unwrap().contains("<@42>"));
    assert_eq!(body["embeds"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_gateway_isolates_failing_channel() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let recording = RecordingNotifier::new();
    let gateway = NotificationGateway::new(
        vec![
            Arc::new(webhook(&server)) as Arc<dyn Notifier>,
            recording.clone() as Arc<dyn Notifier>,
        ],
        vec!["ops@example.com".to_string()],
        Duration::from_secs(5),
    );

    gateway.dispatch(down()).await.unwrap();

    assert_eq!(recording.kinds(), vec!["down"]);
    assert_eq!(
        recording.sent()[0].recipients,
        vec!["ops@example.com".to_string()]
    );
}

#[tokio::test]
async fn test_gateway_bounds_slow_channels() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(10)))
        .mount(&server)
        .await;

    let gateway = NotificationGateway::new(
        vec![Arc::new(webhook(&server)) as Arc<dyn Notifier>],
        vec![],
        Duration::from_millis(200),
    );

    let started = Instant::now();
    gateway.deliver(&down()).await;
    assert!(started.elapsed() < Duration::from_secs(5));
}
