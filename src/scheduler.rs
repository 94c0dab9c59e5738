//! One timer per target, rebuilt by diffing configurations
//!
//! A reload leaves untouched targets on their current phase and only
//! queues an immediate check for them. Changed targets are restarted,
//! removed ones are aborted together with any cycle in flight.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::actors::{MonitorHandle, MonitorSettings, TargetHandle};
use crate::clock::SharedClock;
use crate::config::{Config, ResolvedTarget};
use crate::probe::Transport;

/// What a call to [`Scheduler::apply`] did, by target name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReloadSummary {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub restarted: Vec<String>,
    pub unchanged: Vec<String>,
}

struct Running {
    handle: TargetHandle,
    target: ResolvedTarget,
}

pub struct Scheduler {
    runners: HashMap<String, Running>,
    transport: Arc<dyn Transport>,
    monitor: MonitorHandle,
    clock: SharedClock,
}

impl Scheduler {
    pub fn new(transport: Arc<dyn Transport>, monitor: MonitorHandle, clock: SharedClock) -> Self {
        Self {
            runners: HashMap::new(),
            transport,
            monitor,
            clock,
        }
    }

    /// Make the running timer set match `config`
    ///
    /// The monitor learns the new target set before any timer changes, so
    /// an outcome from a removed target is dropped rather than recorded.
    #[instrument(skip_all, fields(targets = config.targets.len()))]
    pub async fn apply(&mut self, config: &Config) -> anyhow::Result<ReloadSummary> {
        self.monitor
            .reconfigure(MonitorSettings::from_config(config))
            .await?;

        let desired = config.resolved_targets();
        let wanted: HashSet<&str> = desired.iter().map(|t| t.name.as_str()).collect();
        let mut summary = ReloadSummary::default();

        let stale: Vec<String> = self
            .runners
            .keys()
            .filter(|name| !wanted.contains(name.as_str()))
            .cloned()
            .collect();
        for name in stale {
            if let Some(running) = self.runners.remove(&name) {
                running.handle.abort();
            }
            summary.removed.push(name);
        }

        for target in desired {
            match self.runners.get(&target.name) {
                Some(running) if running.target == target && !running.handle.is_finished() => {
                    running.handle.check_now();
                    summary.unchanged.push(target.name);
                }
                Some(_) => {
                    if let Some(running) = self.runners.remove(&target.name) {
                        running.handle.abort();
                    }
                    summary.restarted.push(target.name.clone());
                    self.spawn(target);
                }
                None => {
                    summary.added.push(target.name.clone());
                    self.spawn(target);
                }
            }
        }

        info!(
            added = summary.added.len(),
            removed = summary.removed.len(),
            restarted = summary.restarted.len(),
            unchanged = summary.unchanged.len(),
            "applied configuration"
        );
        Ok(summary)
    }

    fn spawn(&mut self, target: ResolvedTarget) {
        debug!(service = %target.name, "spawning target runner");
        let handle = TargetHandle::spawn(
            target.clone(),
            Arc::clone(&self.transport),
            self.monitor.clone(),
            Arc::clone(&self.clock),
        );
        self.runners
            .insert(target.name.clone(), Running { handle, target });
    }

    /// Names of targets with a running timer, sorted
    pub fn targets(&self) -> Vec<String> {
        let mut names: Vec<String> = self.runners.keys().cloned().collect();
        names.sort();
        names
    }

    /// Queue an immediate cycle for one target
    pub fn check_now(&self, target: &str) -> bool {
        match self.runners.get(target) {
            Some(running) => {
                running.handle.check_now();
                true
            }
            None => false,
        }
    }

    /// Cancel every timer without waiting for cycles in flight
    pub fn shutdown(&mut self) {
        for (_, running) in self.runners.drain() {
            running.handle.abort();
        }
    }
}
