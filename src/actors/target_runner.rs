//! TargetRunner - drives the check cycles of one target
//!
//! ```text
//! interval tick ─┐
//!                ├─> run_check (retry-gated) ─> MonitorHandle::submit
//! CheckNow ──────┘
//! ```
//!
//! The first tick fires immediately. Cycles of one target never overlap:
//! a tick that comes due while a cycle is still running is skipped, and a
//! cycle that outlives its interval is logged.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, instrument, warn};

use crate::clock::SharedClock;
use crate::config::ResolvedTarget;
use crate::probe::Transport;
use crate::retry::run_check;

use super::messages::TargetCommand;
use super::monitor::MonitorHandle;

pub struct TargetRunner {
    target: ResolvedTarget,
    transport: Arc<dyn Transport>,
    monitor: MonitorHandle,
    clock: SharedClock,
    command_rx: mpsc::Receiver<TargetCommand>,
}

impl TargetRunner {
    pub fn new(
        target: ResolvedTarget,
        transport: Arc<dyn Transport>,
        monitor: MonitorHandle,
        clock: SharedClock,
        command_rx: mpsc::Receiver<TargetCommand>,
    ) -> Self {
        Self {
            target,
            transport,
            monitor,
            clock,
            command_rx,
        }
    }

    #[instrument(skip(self), fields(service = %self.target.name))]
    pub async fn run(mut self) {
        debug!(
            "starting target runner ({} every {:?})",
            self.target.url, self.target.interval
        );

        let mut ticker = time::interval(self.target.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if !self.cycle().await {
                        break;
                    }
                }

                Some(cmd) = self.command_rx.recv() => {
                    match cmd {
                        TargetCommand::CheckNow => {
                            debug!("received CheckNow command");
                            if !self.cycle().await {
                                break;
                            }
                        }

                        TargetCommand::Shutdown => {
                            debug!("received shutdown command");
                            break;
                        }
                    }
                }

                else => {
                    warn!("command channel closed, shutting down");
                    break;
                }
            }
        }

        debug!("target runner stopped");
    }

    /// Returns false once the monitor is gone
    async fn cycle(&self) -> bool {
        let started = time::Instant::now();
        let outcome = run_check(self.transport.as_ref(), &self.target, self.clock.as_ref()).await;

        let elapsed = started.elapsed();
        if elapsed > self.target.interval {
            warn!(
                "check cycle took {:?}, longer than the {:?} interval",
                elapsed, self.target.interval
            );
        }

        if let Err(e) = self.monitor.submit(&self.target.name, outcome).await {
            warn!("monitor unavailable: {e:#}");
            return false;
        }
        true
    }
}

/// Handle for one running TargetRunner
pub struct TargetHandle {
    name: String,
    sender: mpsc::Sender<TargetCommand>,
    join: JoinHandle<()>,
}

impl TargetHandle {
    pub fn spawn(
        target: ResolvedTarget,
        transport: Arc<dyn Transport>,
        monitor: MonitorHandle,
        clock: SharedClock,
    ) -> Self {
        // a single slot, so repeated CheckNow requests collapse into one
        let (cmd_tx, cmd_rx) = mpsc::channel(1);
        let name = target.name.clone();
        let runner = TargetRunner::new(target, transport, monitor, clock, cmd_rx);
        let join = tokio::spawn(runner.run());

        Self {
            name,
            sender: cmd_tx,
            join,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Queue an extra cycle; dropped if one is already queued
    pub fn check_now(&self) {
        if self.sender.try_send(TargetCommand::CheckNow).is_err() {
            debug!(service = %self.name, "check already queued");
        }
    }

    /// Stop after the cycle in flight, if any
    pub async fn shutdown(self) {
        let _ = self.sender.send(TargetCommand::Shutdown).await;
        let _ = self.join.await;
    }

    /// Stop immediately, discarding a cycle in flight
    pub fn abort(self) {
        self.join.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}
