//! Environment overrides for the binary
//!
//! Both are read after `.env` has been loaded.

use std::net::SocketAddr;
use std::path::PathBuf;

const CONFIG_PATH: &str = "UPTIME_CONFIG";

const DEFAULT_CONFIG_PATH: &str = "config.json";

/// Command line first, then `UPTIME_CONFIG`, then `config.json`
pub fn get_config_path(from_args: Option<PathBuf>) -> PathBuf {
    from_args
        .or_else(|| std::env::var(CONFIG_PATH).ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

const API_BIND: &str = "UPTIME_API_BIND";

/// `UPTIME_API_BIND` if set and valid, otherwise the configured address
pub fn get_api_bind(configured: SocketAddr) -> SocketAddr {
    parse_bind(std::env::var(API_BIND).ok(), configured)
}

fn parse_bind(value: Option<String>, fallback: SocketAddr) -> SocketAddr {
    value.map_or(fallback, |res| res.parse().unwrap_or(fallback))
}
