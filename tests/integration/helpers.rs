//! Fakes and builders shared by the integration tests

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use guardia_uptime::check::{CheckOutcome, SslInfo};
use guardia_uptime::clock::{MonotonicClock, SharedClock};
use guardia_uptime::config::{Config, TargetInfo};
use guardia_uptime::hub::HubServices;
use guardia_uptime::notify::{Notifier, NotifyError};
use guardia_uptime::probe::{ProbeError, ProbeRequest, ProbeResponse, Transport};
use guardia_uptime::storage::MemoryBackend;

pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

/// Clock that follows tokio's (possibly paused) clock
pub fn paused_clock() -> SharedClock {
    Arc::new(MonotonicClock::starting_at(base_time()))
}

pub fn parse_config(json: &str) -> Config {
    Config::parse(json, Path::new("config.json")).unwrap()
}

pub fn ok_response(status_code: u16) -> Result<ProbeResponse, ProbeError> {
    Ok(ProbeResponse {
        status_code,
        response_time: Duration::from_millis(25),
        body: "ok".to_string(),
        final_url: "http://fake/".to_string(),
        ssl: None,
    })
}

pub fn refused() -> Result<ProbeResponse, ProbeError> {
    Err(ProbeError::Connect("connection refused".to_string()))
}

/// Answers from a per-URL script, then succeeds with 200 forever
#[derive(Default)]
pub struct FakeTransport {
    scripts: Mutex<HashMap<String, VecDeque<Result<ProbeResponse, ProbeError>>>>,
    calls: Mutex<HashMap<String, usize>>,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn script(&self, url: &str, answers: Vec<Result<ProbeResponse, ProbeError>>) {
        self.scripts
            .lock()
            .unwrap()
            .insert(url.to_string(), answers.into());
    }

    pub fn calls(&self, url: &str) -> usize {
        self.calls.lock().unwrap().get(url).copied().unwrap_or(0)
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn probe(&self, request: &ProbeRequest) -> Result<ProbeResponse, ProbeError> {
        *self
            .calls
            .lock()
            .unwrap()
            .entry(request.url.clone())
            .or_default() += 1;

        self.scripts
            .lock()
            .unwrap()
            .get_mut(&request.url)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| ok_response(200))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sent {
    pub kind: &'static str,
    pub target: String,
    pub recipients: Vec<String>,
}

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Sent>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        self.sent().iter().map(|sent| sent.kind).collect()
    }

    fn push(&self, kind: &'static str, target: &TargetInfo, recipients: &[String]) {
        self.sent.lock().unwrap().push(Sent {
            kind,
            target: target.name.clone(),
            recipients: recipients.to_vec(),
        });
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn name(&self) -> &str {
        "recording"
    }

    async fn notify_down(
        &self,
        target: &TargetInfo,
        _outcome: &CheckOutcome,
        recipients: &[String],
    ) -> Result<(), NotifyError> {
        self.push("down", target, recipients);
        Ok(())
    }

    async fn notify_up(
        &self,
        target: &TargetInfo,
        _outcome: &CheckOutcome,
        recipients: &[String],
    ) -> Result<(), NotifyError> {
        self.push("recovered", target, recipients);
        Ok(())
    }

    async fn notify_ssl_expiring(
        &self,
        target: &TargetInfo,
        _ssl: &SslInfo,
        recipients: &[String],
    ) -> Result<(), NotifyError> {
        self.push("ssl_expiring", target, recipients);
        Ok(())
    }
}

/// Services backed by fakes and an in-memory backend
pub fn fake_services(
    transport: Arc<FakeTransport>,
    notifier: Arc<RecordingNotifier>,
    clock: SharedClock,
) -> HubServices {
    HubServices {
        transport,
        notifiers: vec![notifier as Arc<dyn Notifier>],
        clock,
        backend: Box::new(MemoryBackend::new()),
        projections: vec![],
    }
}

/// Let spawned tasks run without moving paused time forward
pub async fn settle() {
    for _ in 0..200 {
        tokio::task::yield_now().await;
    }
}
