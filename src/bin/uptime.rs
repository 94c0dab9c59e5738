use std::path::PathBuf;

use clap::Parser;
use guardia_uptime::{
    config::read_config_file,
    hub::{Hub, HubServices},
    reload::ConfigWatcher,
    util::get_config_path,
};
use tokio::time::Duration;
use tracing::{error, info, level_filters::LevelFilter, trace, warn};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
#[command(version, about = "Uptime monitor for HTTP(S) endpoints")]
struct Args {
    /// Config file (JSON, or TOML with a .toml extension)
    #[arg(short = 'f', long = "config")]
    file: Option<PathBuf>,

    /// Log everything down to trace level
    #[arg(short, long)]
    verbose: bool,
}

fn init(verbose: bool) {
    let level = if verbose {
        LevelFilter::TRACE
    } else {
        LevelFilter::INFO
    };
    let filter = filter::Targets::new().with_targets(vec![
        ("guardia_uptime", level),
        ("uptime", level),
        ("tower_http", LevelFilter::WARN),
    ]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();
    init(args.verbose);
    trace!("started with args: {args:?}");

    let path = get_config_path(args.file);
    let config = read_config_file(&path)?;
    info!("loaded {} targets from {}", config.targets.len(), path.display());

    let services = HubServices::production(&config).await?;
    let mut hub = Hub::start(&config, services).await?;

    #[cfg(feature = "api")]
    {
        use guardia_uptime::api::{ApiConfig, spawn_api_server};
        use guardia_uptime::util::get_api_bind;

        let mut api_config = ApiConfig::from(&config.api);
        api_config.bind_addr = get_api_bind(api_config.bind_addr);
        spawn_api_server(api_config, hub.api_state()).await?;
    }

    let (_watcher, mut reloads) = ConfigWatcher::spawn(
        &path,
        Duration::from_secs(config.settings.reload_interval.max(1)),
    );

    loop {
        tokio::select! {
            Some(config) = reloads.recv() => {
                match hub.reload(&config).await {
                    Ok(summary) => info!(
                        "reloaded configuration: {} added, {} removed, {} restarted",
                        summary.added.len(),
                        summary.removed.len(),
                        summary.restarted.len()
                    ),
                    Err(e) => error!("failed to apply configuration: {e:#}"),
                }
            }

            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    warn!("failed to listen for shutdown signal: {e}");
                }
                break;
            }
        }
    }

    hub.shutdown().await;
    Ok(())
}
