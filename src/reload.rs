//! Configuration hot reload
//!
//! Polls the modification time of the configuration file and delivers
//! every successfully re-parsed [`Config`]. A file that fails to parse is
//! logged and skipped; the receiver keeps the last good configuration.

use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};

use crate::config::{Config, read_config_file};

pub struct ConfigWatcher {
    path: PathBuf,
    poll_interval: Duration,
    last_modified: Option<SystemTime>,
    config_tx: mpsc::Sender<Config>,
}

impl ConfigWatcher {
    /// Start watching `path`, returning the receiving end of the deliveries
    pub fn spawn(
        path: impl Into<PathBuf>,
        poll_interval: Duration,
    ) -> (JoinHandle<()>, mpsc::Receiver<Config>) {
        let (config_tx, config_rx) = mpsc::channel(4);
        let path = path.into();
        let watcher = Self {
            last_modified: modified(&path),
            path,
            poll_interval,
            config_tx,
        };
        (tokio::spawn(watcher.run()), config_rx)
    }

    #[instrument(skip(self), fields(path = %self.path.display()))]
    async fn run(mut self) {
        debug!("watching configuration every {:?}", self.poll_interval);

        let mut ticker = time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            ticker.tick().await;

            let Some(config) = self.poll() else {
                continue;
            };
            if self.config_tx.send(config).await.is_err() {
                debug!("receiver dropped, stopping watcher");
                break;
            }
        }
    }

    fn poll(&mut self) -> Option<Config> {
        let current = modified(&self.path);
        if current.is_none() || current == self.last_modified {
            return None;
        }
        self.last_modified = current;

        match read_config_file(&self.path) {
            Ok(config) => {
                info!("configuration changed, reloading");
                Some(config)
            }
            Err(e) => {
                warn!("ignoring invalid configuration: {e}");
                None
            }
        }
    }
}

fn modified(path: &std::path::Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}
