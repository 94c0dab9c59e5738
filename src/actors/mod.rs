//! Actors of the uptime monitor
//!
//! Each actor is an independent tokio task that owns its state and is
//! driven through an mpsc command channel. Callers talk to it through a
//! cloneable handle; queries carry a oneshot for the answer.
//!
//! ```text
//!   TargetRunner (one per target) ──outcome──┐
//!   TargetRunner ────────────────────────────┤
//!                                            ▼
//!                                      MonitorActor ──> NotificationGateway
//!                                       │        │
//!                           record/read │        └──> StatusProjection(s)
//!                                       ▼             broadcast CheckEvent
//!                                  StorageActor ──> StorageBackend
//! ```
//!
//! - **TargetRunner**: timer and retry-gated probing for one target
//! - **MonitorActor**: state machine, incident ledger, alert suppression
//! - **StorageActor**: in-memory history mirrored to a durable backend

pub mod messages;
pub mod monitor;
pub mod storage;
pub mod target_runner;

pub use messages::{CheckEvent, StorageStats};
pub use monitor::{MonitorHandle, MonitorSettings};
pub use storage::StorageHandle;
pub use target_runner::TargetHandle;
