//! Shared state handed to every API handler

use crate::actors::{MonitorHandle, StorageHandle};
use crate::clock::SharedClock;
use crate::status::SharedStatus;

#[derive(Clone)]
pub struct ApiState {
    /// Latest published status snapshot
    pub status: SharedStatus,

    /// History queries and storage statistics
    pub storage: StorageHandle,

    /// Incident ledger and the check event stream
    pub monitor: MonitorHandle,

    pub clock: SharedClock,
}

impl ApiState {
    pub fn new(
        status: SharedStatus,
        storage: StorageHandle,
        monitor: MonitorHandle,
        clock: SharedClock,
    ) -> Self {
        Self {
            status,
            storage,
            monitor,
            clock,
        }
    }
}
