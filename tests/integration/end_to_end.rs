//! Full pipeline on paused time: timers, retries, state machine, incidents
//! and notifications

use std::time::Duration;

use guardia_uptime::check::ServiceStatus;
use guardia_uptime::hub::Hub;
use pretty_assertions::assert_eq;

use crate::helpers::{
    FakeTransport, RecordingNotifier, fake_services, paused_clock, parse_config, refused, settle,
};

const A_URL: &str = "http://a.test/health";

fn config(retry_count: u32, cooldown: u64) -> String {
    format!(
        r#"{{
            "title": "Test Status",
            "settings": {{ "default_interval": 60 }},
            "alerts": {{
                "retry_count": {retry_count},
                "retry_delay": 10,
                "cooldown_period": {cooldown},
                "recipients": ["ops@example.com"]
            }},
            "storage": {{ "backend": "none" }},
            "targets": [{{ "name": "A", "url": "{A_URL}" }}]
        }}"#
    )
}

#[tokio::test(start_paused = true)]
async fn test_down_then_recovery_with_single_attempt() {
    let transport = FakeTransport::new();
    transport.script(A_URL, vec![refused(), refused(), crate::helpers::ok_response(200)]);
    let notifier = RecordingNotifier::new();
    let config = parse_config(&config(1, 300));

    let hub = Hub::start(
        &config,
        fake_services(transport.clone(), notifier.clone(), paused_clock()),
    )
    .await
    .unwrap();

    // ticks at 0s, 60s and 120s
    tokio::time::sleep(Duration::from_secs(150)).await;
    settle().await;

    assert_eq!(transport.calls(A_URL), 3);

    let history: Vec<bool> = hub
        .storage()
        .recent("A", 10)
        .await
        .unwrap()
        .iter()
        .map(|check| check.success)
        .collect();
    assert_eq!(history, vec![false, false, true]);

    assert_eq!(notifier.kinds(), vec!["down", "recovered"]);
    assert!(
        notifier
            .sent()
            .iter()
            .all(|sent| sent.recipients == vec!["ops@example.com".to_string()])
    );

    let incidents = hub.monitor().incidents().await.unwrap();
    assert_eq!(incidents.len(), 1);
    assert_eq!(incidents[0].target, "A");
    assert!(incidents[0].resolved);
    assert!(incidents[0].error.contains("connection refused"));

    let state = hub.monitor().get_state("A").await.unwrap();
    assert_eq!(state.status, ServiceStatus::Up);

    let snapshot = hub.status().latest().await.unwrap();
    assert_eq!(snapshot.title, "Test Status");
    assert_eq!(snapshot.services.len(), 1);
    assert_eq!(snapshot.services[0].status, ServiceStatus::Up);

    hub.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_failed_attempt_mid_cycle_does_not_flip_status() {
    let transport = FakeTransport::new();
    transport.script(A_URL, vec![refused(), refused()]);
    let notifier = RecordingNotifier::new();
    let config = parse_config(&config(3, 300));

    let hub = Hub::start(
        &config,
        fake_services(transport.clone(), notifier.clone(), paused_clock()),
    )
    .await
    .unwrap();

    // attempts at 0s, 10s and 20s; the third succeeds
    tokio::time::sleep(Duration::from_secs(25)).await;
    settle().await;

    assert_eq!(transport.calls(A_URL), 3);
    let history = hub.storage().recent("A", 10).await.unwrap();
    assert_eq!(history.len(), 1);
    assert!(history[0].success);
    assert!(notifier.sent().is_empty());
    assert!(hub.monitor().incidents().await.unwrap().is_empty());

    hub.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_flapping_inside_cooldown_alerts_once() {
    let transport = FakeTransport::new();
    transport.script(
        A_URL,
        vec![
            refused(),
            crate::helpers::ok_response(200),
            refused(),
            crate::helpers::ok_response(200),
        ],
    );
    let notifier = RecordingNotifier::new();
    let config = parse_config(&config(1, 300));

    let hub = Hub::start(
        &config,
        fake_services(transport.clone(), notifier.clone(), paused_clock()),
    )
    .await
    .unwrap();

    // down at 0s, up at 60s, down at 120s (inside cooldown), up at 180s
    tokio::time::sleep(Duration::from_secs(200)).await;
    settle().await;

    assert_eq!(
        notifier.kinds(),
        vec!["down", "recovered", "recovered"],
        "the second down falls inside the cooldown"
    );

    let history: Vec<bool> = hub
        .storage()
        .recent("A", 10)
        .await
        .unwrap()
        .iter()
        .map(|check| check.success)
        .collect();
    assert_eq!(history, vec![false, true, false, true]);

    let incidents = hub.monitor().incidents().await.unwrap();
    assert_eq!(incidents.len(), 1);
    assert!(incidents[0].resolved);

    hub.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_slow_target_does_not_block_others() {
    const SLOW_URL: &str = "http://slow.test/";
    let transport = FakeTransport::new();
    transport.script(SLOW_URL, vec![refused(), refused(), refused()]);
    let notifier = RecordingNotifier::new();
    let config = parse_config(&format!(
        r#"{{
            "alerts": {{ "retry_count": 3, "retry_delay": 50 }},
            "storage": {{ "backend": "none" }},
            "targets": [
                {{ "name": "slow", "url": "{SLOW_URL}", "interval": 300 }},
                {{ "name": "A", "url": "{A_URL}", "interval": 30 }}
            ]
        }}"#
    ));

    let hub = Hub::start(
        &config,
        fake_services(transport.clone(), notifier.clone(), paused_clock()),
    )
    .await
    .unwrap();

    // the slow cycle spans 0s..100s while A keeps its 30s schedule
    tokio::time::sleep(Duration::from_secs(95)).await;
    settle().await;

    assert_eq!(transport.calls(A_URL), 4);
    assert_eq!(transport.calls(SLOW_URL), 2);
    assert!(hub.storage().recent("slow", 10).await.unwrap().is_empty());
    assert_eq!(hub.storage().recent("A", 10).await.unwrap().len(), 4);

    hub.shutdown().await;
}
