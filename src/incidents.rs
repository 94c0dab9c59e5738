//! Incident Ledger

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::history::retention_cutoff;

/// A recorded down period of one target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Incident {
    pub id: u64,
    pub target: String,
    pub error: String,
    pub opened_at: DateTime<Utc>,
    pub resolved: bool,
    pub resolved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct IncidentLedger {
    /// Oldest first; exposed newest first
    incidents: Vec<Incident>,
    retention_days: u32,
    next_id: u64,
}

impl IncidentLedger {
    pub fn new(retention_days: u32) -> Self {
        Self {
            incidents: Vec::new(),
            retention_days,
            next_id: 1,
        }
    }

    /// Restore a ledger from persisted incidents
    pub fn from_incidents(retention_days: u32, mut incidents: Vec<Incident>) -> Self {
        incidents.sort_by_key(|incident| (incident.opened_at, incident.id));
        let next_id = incidents.iter().map(|i| i.id).max().unwrap_or(0) + 1;
        Self {
            incidents,
            retention_days,
            next_id,
        }
    }

    pub fn set_retention_days(&mut self, retention_days: u32) {
        self.retention_days = retention_days;
    }

    /// Open a new unresolved incident, then prune relative to `opened_at`
    pub fn open(&mut self, target: &str, error: &str, opened_at: DateTime<Utc>) -> Incident {
        let incident = Incident {
            id: self.next_id,
            target: target.to_string(),
            error: error.to_string(),
            opened_at,
            resolved: false,
            resolved_at: None,
        };
        self.next_id += 1;
        self.incidents.push(incident.clone());
        self.prune(opened_at);
        incident
    }

    /// Resolve the most recent unresolved incident of `target`
    ///
    /// Returns `None` without touching anything when there is none.
    pub fn resolve(&mut self, target: &str, resolved_at: DateTime<Utc>) -> Option<Incident> {
        let incident = self
            .incidents
            .iter_mut()
            .rev()
            .find(|incident| incident.target == target && !incident.resolved)?;
        incident.resolved = true;
        incident.resolved_at = Some(resolved_at);
        Some(incident.clone())
    }

    /// Drop incidents opened before `now - retention_days`, resolved or not
    pub fn prune(&mut self, now: DateTime<Utc>) -> usize {
        let cutoff = retention_cutoff(now, self.retention_days);
        let before = self.incidents.len();
        self.incidents.retain(|incident| incident.opened_at >= cutoff);
        let removed = before - self.incidents.len();
        if removed > 0 {
            debug!(removed, "pruned incidents");
        }
        removed
    }

    pub fn open_incident(&self, target: &str) -> Option<&Incident> {
        self.incidents
            .iter()
            .rev()
            .find(|incident| incident.target == target && !incident.resolved)
    }

    /// All incidents, most recent first
    pub fn list(&self) -> Vec<Incident> {
        self.incidents.iter().rev().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.incidents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.incidents.is_empty()
    }
}
