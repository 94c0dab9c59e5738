//! Message types for actor communication
//!
//! 1. **Commands**: request/response messages sent to one actor via mpsc
//! 2. **Events**: broadcast notifications for any number of subscribers
//! 3. **Request/Response**: oneshot channels carried inside commands

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::check::{CheckOutcome, ServiceStatus};
use crate::history::{HourlyBucket, StoredCheck, UptimeStats};
use crate::incidents::Incident;
use crate::state::TargetState;
use crate::status::StatusSnapshot;

use super::monitor::MonitorSettings;

/// Published after the monitor has processed a completed cycle
///
/// Subscribers that lag may miss events; the status snapshot and history
/// stay authoritative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckEvent {
    pub target: String,
    pub category: String,
    pub previous: Option<ServiceStatus>,
    pub status: ServiceStatus,
    pub outcome: CheckOutcome,
}

/// Commands for a TargetRunner
#[derive(Debug)]
pub enum TargetCommand {
    /// Run a cycle now, after any cycle in flight
    CheckNow,

    Shutdown,
}

/// Commands for the MonitorActor
#[derive(Debug)]
pub enum MonitorCommand {
    /// A target finished a cycle
    Outcome {
        target: String,
        outcome: CheckOutcome,
    },

    /// Swap the active target set and alert settings
    Reconfigure {
        settings: MonitorSettings,
        respond_to: oneshot::Sender<()>,
    },

    GetState {
        target: String,
        respond_to: oneshot::Sender<Option<TargetState>>,
    },

    Snapshot {
        respond_to: oneshot::Sender<StatusSnapshot>,
    },

    Incidents {
        respond_to: oneshot::Sender<Vec<Incident>>,
    },

    Shutdown,
}

/// Commands for the StorageActor
#[derive(Debug)]
pub enum StorageCommand {
    /// Append a completed check; acknowledged once it is readable
    Record {
        target: String,
        check: StoredCheck,
        respond_to: oneshot::Sender<()>,
    },

    Recent {
        target: String,
        limit: usize,
        respond_to: oneshot::Sender<Vec<StoredCheck>>,
    },

    Hourly {
        target: String,
        hours: u32,
        respond_to: oneshot::Sender<Vec<HourlyBucket>>,
    },

    Uptime {
        target: String,
        since: DateTime<Utc>,
        respond_to: oneshot::Sender<UptimeStats>,
    },

    /// Persist the full incident ledger
    ReplaceIncidents { incidents: Vec<Incident> },

    LoadIncidents {
        respond_to: oneshot::Sender<Vec<Incident>>,
    },

    SetRetention { retention_days: u32 },

    /// Run the retention sweep now, returning how many in-memory entries went
    Prune { respond_to: oneshot::Sender<usize> },

    HealthCheck {
        respond_to: oneshot::Sender<anyhow::Result<String>>,
    },

    GetStats {
        respond_to: oneshot::Sender<StorageStats>,
    },

    Shutdown,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageStats {
    /// Checks held in memory across all targets
    pub total_checks: usize,

    pub targets: usize,

    /// Backend summary line
    pub backend: String,

    pub last_cleanup_time: Option<DateTime<Utc>>,

    pub total_checks_deleted: u64,

    /// Failed durable writes since start
    pub persistence_errors: u64,
}
