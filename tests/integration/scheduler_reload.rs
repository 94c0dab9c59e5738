//! Diff-based reload of the timer set

use std::time::Duration;

use guardia_uptime::check::ServiceStatus;
use guardia_uptime::hub::Hub;
use guardia_uptime::scheduler::ReloadSummary;
use pretty_assertions::assert_eq;

use crate::helpers::{
    FakeTransport, RecordingNotifier, fake_services, paused_clock, parse_config, refused, settle,
};

fn config(targets: &[(&str, u64)]) -> String {
    let targets: Vec<String> = targets
        .iter()
        .map(|(name, interval)| {
            format!(r#"{{ "name": "{name}", "url": "http://{name}.test/", "interval": {interval} }}"#)
        })
        .collect();
    format!(
        r#"{{
            "alerts": {{ "retry_count": 1, "cooldown_period": 3600 }},
            "storage": {{ "backend": "none" }},
            "targets": [{}]
        }}"#,
        targets.join(",")
    )
}

#[tokio::test(start_paused = true)]
async fn test_reload_diffs_target_set() {
    let transport = FakeTransport::new();
    let notifier = RecordingNotifier::new();
    let mut hub = Hub::start(
        &parse_config(&config(&[("a", 60), ("b", 60)])),
        fake_services(transport.clone(), notifier.clone(), paused_clock()),
    )
    .await
    .unwrap();
    settle().await;
    assert_eq!(hub.scheduler().targets(), vec!["a", "b"]);

    let summary = hub
        .reload(&parse_config(&config(&[("a", 60), ("c", 60)])))
        .await
        .unwrap();
    assert_eq!(
        summary,
        ReloadSummary {
            added: vec!["c".to_string()],
            removed: vec!["b".to_string()],
            restarted: vec![],
            unchanged: vec!["a".to_string()],
        }
    );
    assert_eq!(hub.scheduler().targets(), vec!["a", "c"]);

    let summary = hub
        .reload(&parse_config(&config(&[("a", 120), ("c", 60)])))
        .await
        .unwrap();
    assert_eq!(summary.restarted, vec!["a".to_string()]);
    assert_eq!(summary.unchanged, vec!["c".to_string()]);

    hub.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_reload_queues_immediate_check_for_unchanged_targets() {
    let transport = FakeTransport::new();
    let notifier = RecordingNotifier::new();
    let config = parse_config(&config(&[("a", 600)]));
    let mut hub = Hub::start(
        &config,
        fake_services(transport.clone(), notifier.clone(), paused_clock()),
    )
    .await
    .unwrap();
    settle().await;
    assert_eq!(transport.calls("http://a.test/"), 1);

    hub.reload(&config).await.unwrap();
    settle().await;
    assert_eq!(transport.calls("http://a.test/"), 2);

    hub.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_reload_preserves_state_and_cooldown() {
    let transport = FakeTransport::new();
    transport.script("http://a.test/", vec![refused(), refused(), refused()]);
    let notifier = RecordingNotifier::new();
    let mut hub = Hub::start(
        &parse_config(&config(&[("a", 60), ("b", 60)])),
        fake_services(transport.clone(), notifier.clone(), paused_clock()),
    )
    .await
    .unwrap();
    settle().await;

    let before = hub.monitor().get_state("a").await.unwrap();
    assert_eq!(before.status, ServiceStatus::Down);
    assert_eq!(notifier.kinds(), vec!["down"]);

    // unrelated edit: b goes away, a keeps failing
    hub.reload(&parse_config(&config(&[("a", 60)])))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_secs(30)).await;
    settle().await;

    let after = hub.monitor().get_state("a").await.unwrap();
    assert_eq!(after.status, ServiceStatus::Down);
    assert_eq!(after.since, before.since);
    assert_eq!(notifier.kinds(), vec!["down"]);

    assert!(hub.monitor().get_state("b").await.is_none());
    let snapshot = hub.status().latest().await.unwrap();
    let names: Vec<&str> = snapshot.services.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["a"]);

    hub.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_snapshot_follows_configuration_order() {
    let transport = FakeTransport::new();
    let notifier = RecordingNotifier::new();
    let hub = Hub::start(
        &parse_config(&config(&[("zeta", 60), ("alpha", 60), ("mid", 60)])),
        fake_services(transport.clone(), notifier.clone(), paused_clock()),
    )
    .await
    .unwrap();
    settle().await;

    let snapshot = hub.status().latest().await.unwrap();
    let names: Vec<&str> = snapshot.services.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["zeta", "alpha", "mid"]);

    hub.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_repeated_check_now_queues_one_cycle() {
    const URL: &str = "http://s.test/";
    let transport = FakeTransport::new();
    transport.script(URL, vec![refused(), refused()]);
    let notifier = RecordingNotifier::new();
    let config = parse_config(&format!(
        r#"{{
            "alerts": {{ "retry_count": 2, "retry_delay": 50 }},
            "storage": {{ "backend": "none" }},
            "targets": [{{ "name": "s", "url": "{URL}", "interval": 600 }}]
        }}"#
    ));
    let hub = Hub::start(
        &config,
        fake_services(transport.clone(), notifier.clone(), paused_clock()),
    )
    .await
    .unwrap();
    settle().await;
    assert_eq!(transport.calls(URL), 1);

    // first cycle is waiting out its retry delay
    for _ in 0..3 {
        assert!(hub.scheduler().check_now("s"));
    }

    tokio::time::sleep(Duration::from_secs(120)).await;
    settle().await;

    assert_eq!(transport.calls(URL), 3);
    assert_eq!(hub.storage().recent("s", 10).await.unwrap().len(), 2);

    hub.shutdown().await;
}
