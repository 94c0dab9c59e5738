//! Per-target status state machine
//!
//! Transitions are edge-triggered: a down alert fires only when a target
//! goes from up (or never checked) to down, gated by the status cooldown.
//! Recovery is never gated. Certificate expiry is evaluated on every cycle
//! with its own 24 hour suppression window.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::check::{CheckOutcome, ServiceStatus, SslInfo};
use crate::config::AlertsConfig;

/// Certificates with this many days left or fewer trigger an expiry alert
pub const SSL_EXPIRY_WARNING_DAYS: i64 = 14;

/// Minimum gap between two expiry alerts for the same target
pub const SSL_ALERT_WINDOW_HOURS: i64 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    StatusChange,
    SslExpiry,
}

/// Current state of one target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetState {
    pub status: ServiceStatus,
    pub category: String,
    /// When the current status was entered
    pub since: DateTime<Utc>,
    pub last_check: CheckOutcome,
}

/// Last alert time per `(target, kind)`
#[derive(Debug, Default, Clone)]
pub struct AlertSuppression {
    last_alert: HashMap<(String, AlertKind), DateTime<Utc>>,
}

impl AlertSuppression {
    /// True if no alert of `kind` fired for `target` within `window`
    pub fn allows(&self, target: &str, kind: AlertKind, now: DateTime<Utc>, window: Duration) -> bool {
        match self.last_alert.get(&(target.to_string(), kind)) {
            Some(last) => now - *last > window,
            None => true,
        }
    }

    pub fn stamp(&mut self, target: &str, kind: AlertKind, at: DateTime<Utc>) {
        self.last_alert.insert((target.to_string(), kind), at);
    }

    pub fn last_alert(&self, target: &str, kind: AlertKind) -> Option<DateTime<Utc>> {
        self.last_alert.get(&(target.to_string(), kind)).copied()
    }

    fn forget(&mut self, target: &str) {
        self.last_alert.retain(|(name, _), _| name != target);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertPolicy {
    pub cooldown: Duration,
    pub alert_on_recovery: bool,
}

impl From<&AlertsConfig> for AlertPolicy {
    fn from(alerts: &AlertsConfig) -> Self {
        Self {
            cooldown: alerts.cooldown(),
            alert_on_recovery: alerts.alert_on_recovery,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    WentDown,
    Recovered,
}

/// What the monitor has to do after a cycle
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub previous: Option<ServiceStatus>,
    pub current: ServiceStatus,
    pub transition: Option<Transition>,
    /// Send the down notification and open an incident
    pub alert_down: bool,
    pub notify_recovery: bool,
    pub ssl_expiring: Option<SslInfo>,
}

#[derive(Debug, Default, Clone)]
pub struct StateMachine {
    states: HashMap<String, TargetState>,
    suppression: AlertSuppression,
    /// Targets whose outage was alerted by a previous run
    carried_over: HashSet<String>,
}

impl StateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next down of a never-checked `target` continues an outage that
    /// was already alerted: no alert and no cooldown stamp
    pub fn carry_over_outage(&mut self, target: &str) {
        if !self.states.contains_key(target) {
            self.carried_over.insert(target.to_string());
        }
    }

    /// Apply a completed cycle's outcome to `target`
    pub fn evaluate(
        &mut self,
        target: &str,
        category: &str,
        outcome: &CheckOutcome,
        now: DateTime<Utc>,
        policy: &AlertPolicy,
    ) -> Decision {
        let current = outcome.status();
        let previous = self.states.get(target).map(|state| state.status);
        let carried_over = self.carried_over.remove(target);

        let transition = match (previous.unwrap_or(ServiceStatus::Up), current) {
            (ServiceStatus::Up, ServiceStatus::Down) => Some(Transition::WentDown),
            (ServiceStatus::Down, ServiceStatus::Up) => Some(Transition::Recovered),
            _ => None,
        };

        let mut alert_down = false;
        let mut notify_recovery = false;
        match transition {
            Some(Transition::WentDown) if carried_over => {
                info!(service = target, "still down since previous run");
            }
            Some(Transition::WentDown) => {
                if self
                    .suppression
                    .allows(target, AlertKind::StatusChange, now, policy.cooldown)
                {
                    alert_down = true;
                    self.suppression.stamp(target, AlertKind::StatusChange, now);
                    info!(service = target, "went down: {}", outcome.error_text());
                } else {
                    info!(service = target, "went down within cooldown, not alerting");
                }
            }
            Some(Transition::Recovered) => {
                notify_recovery = policy.alert_on_recovery;
                info!(service = target, "recovered");
            }
            None => debug!(service = target, status = %current, "no status change"),
        }

        let ssl_expiring = outcome
            .ssl
            .as_ref()
            .filter(|ssl| ssl.days_remaining <= SSL_EXPIRY_WARNING_DAYS)
            .filter(|_| {
                self.suppression.allows(
                    target,
                    AlertKind::SslExpiry,
                    now,
                    Duration::hours(SSL_ALERT_WINDOW_HOURS),
                )
            })
            .cloned();
        if let Some(ssl) = &ssl_expiring {
            self.suppression.stamp(target, AlertKind::SslExpiry, now);
            info!(service = target, days_remaining = ssl.days_remaining, "certificate expiring");
        }

        let since = match (transition, self.states.get(target)) {
            (None, Some(state)) => state.since,
            _ => outcome.timestamp,
        };
        self.states.insert(
            target.to_string(),
            TargetState {
                status: current,
                category: category.to_string(),
                since,
                last_check: outcome.clone(),
            },
        );

        Decision {
            previous,
            current,
            transition,
            alert_down,
            notify_recovery,
            ssl_expiring,
        }
    }

    pub fn get(&self, target: &str) -> Option<&TargetState> {
        self.states.get(target)
    }

    pub fn suppression(&self) -> &AlertSuppression {
        &self.suppression
    }

    /// Drop state and suppression for every target not in `active`
    pub fn retain_targets(&mut self, active: &HashSet<String>) -> Vec<String> {
        let removed: Vec<String> = self
            .states
            .keys()
            .filter(|name| !active.contains(*name))
            .cloned()
            .collect();
        for name in &removed {
            self.states.remove(name);
        }
        let stale: HashSet<String> = self
            .suppression
            .last_alert
            .keys()
            .filter(|(name, _)| !active.contains(name))
            .map(|(name, _)| name.clone())
            .collect();
        for name in stale {
            self.suppression.forget(&name);
        }
        self.carried_over.retain(|name| active.contains(name));
        removed
    }
}
