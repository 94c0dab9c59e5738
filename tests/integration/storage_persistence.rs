//! History and incidents survive a restart on SQLite

use std::time::Duration;

use guardia_uptime::hub::{Hub, HubServices};
use guardia_uptime::notify::Notifier;
use guardia_uptime::storage::sqlite::SqliteBackend;
use std::sync::Arc;
use tempfile::tempdir;

use crate::helpers::{FakeTransport, RecordingNotifier, parse_config, refused};

const URL: &str = "http://a.test/";

async fn wait_until<F, Fut>(mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..250 {
        if condition().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("condition not met in time");
}

async fn start(
    db: &std::path::Path,
    transport: Arc<FakeTransport>,
    notifier: Arc<RecordingNotifier>,
) -> Hub {
    let config = parse_config(&format!(
        r#"{{
            "alerts": {{ "retry_count": 1 }},
            "targets": [{{ "name": "A", "url": "{URL}", "interval": 3600 }}]
        }}"#
    ));
    let services = HubServices {
        transport,
        notifiers: vec![notifier as Arc<dyn Notifier>],
        clock: Arc::new(guardia_uptime::clock::SystemClock),
        backend: Box::new(SqliteBackend::new(db).await.unwrap()),
        projections: vec![],
    };
    Hub::start(&config, services).await.unwrap()
}

#[tokio::test]
async fn test_history_and_incidents_survive_restart() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("uptime.db");

    let transport = FakeTransport::new();
    transport.script(URL, vec![refused()]);
    let notifier = RecordingNotifier::new();
    let hub = start(&db, transport, notifier.clone()).await;

    let monitor = hub.monitor();
    wait_until(|| {
        let monitor = monitor.clone();
        async move { !monitor.incidents().await.unwrap().is_empty() }
    })
    .await;
    hub.shutdown().await;
    tokio::time::sleep(Duration::from_millis(200)).await;

    // second run: the target is healthy again
    let notifier = RecordingNotifier::new();
    let hub = start(&db, FakeTransport::new(), notifier.clone()).await;

    let storage = hub.storage();
    wait_until(|| {
        let storage = storage.clone();
        async move { storage.recent("A", 10).await.unwrap().len() == 2 }
    })
    .await;

    let history: Vec<bool> = storage
        .recent("A", 10)
        .await
        .unwrap()
        .iter()
        .map(|check| check.success)
        .collect();
    assert_eq!(history, vec![false, true]);

    let incidents = hub.monitor().incidents().await.unwrap();
    assert_eq!(incidents.len(), 1);
    assert!(incidents[0].resolved, "first healthy check closes it");
    assert!(notifier.sent().is_empty());

    hub.shutdown().await;
}

#[tokio::test]
async fn test_outage_continuing_across_restart_is_not_realerted() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("uptime.db");

    let transport = FakeTransport::new();
    transport.script(URL, vec![refused()]);
    let hub = start(&db, transport, RecordingNotifier::new()).await;
    let monitor = hub.monitor();
    wait_until(|| {
        let monitor = monitor.clone();
        async move { !monitor.incidents().await.unwrap().is_empty() }
    })
    .await;
    hub.shutdown().await;
    tokio::time::sleep(Duration::from_millis(200)).await;

    let transport = FakeTransport::new();
    transport.script(URL, vec![refused()]);
    let notifier = RecordingNotifier::new();
    let hub = start(&db, transport, notifier.clone()).await;
    let monitor = hub.monitor();
    wait_until(|| {
        let monitor = monitor.clone();
        async move { monitor.get_state("A").await.is_some() }
    })
    .await;

    let incidents = hub.monitor().incidents().await.unwrap();
    assert_eq!(incidents.len(), 1);
    assert!(!incidents[0].resolved);
    assert!(notifier.sent().is_empty());

    hub.shutdown().await;
}
