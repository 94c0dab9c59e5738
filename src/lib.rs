//! Uptime monitor for HTTP(S) endpoints
//!
//! Targets are probed on independent timers through a retry gate; a single
//! monitor task turns completed cycles into up/down transitions, incidents
//! and rate-limited notifications, and publishes status snapshots.

pub mod actors;
#[cfg(feature = "api")]
pub mod api;
pub mod check;
pub mod clock;
pub mod config;
pub mod history;
pub mod hub;
pub mod incidents;
pub mod notify;
pub mod probe;
pub mod reload;
pub mod retry;
pub mod scheduler;
pub mod state;
pub mod status;
pub mod storage;
pub mod util;
