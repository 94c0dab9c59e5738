//! Probe transport
//!
//! One HTTP(S) exchange per call. The transport only reports raw facts
//! (status, latency, body, certificate); deciding whether that counts as a
//! successful check is [`crate::retry`]'s job.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::check::SslInfo;
use crate::config::{HttpMethod, ResolvedTarget};

mod http;
pub mod tls;

pub use http::HttpTransport;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    #[error("invalid url `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("redirect ({status}) without Location header")]
    RedirectWithoutLocation { status: u16 },

    #[error("too many redirects (max {max})")]
    TooManyRedirects { max: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeRequest {
    pub url: String,
    pub method: HttpMethod,
    pub timeout: Duration,
    pub follow_redirects: bool,
    pub max_redirects: usize,
    pub user_agent: String,
    /// Capture the peer certificate when the scheme is HTTPS
    pub inspect_tls: bool,
}

impl From<&ResolvedTarget> for ProbeRequest {
    fn from(target: &ResolvedTarget) -> Self {
        Self {
            url: target.url.clone(),
            method: target.method,
            timeout: target.timeout,
            follow_redirects: target.follow_redirects,
            max_redirects: target.max_redirects,
            user_agent: target.user_agent.clone(),
            inspect_tls: target.check_ssl,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProbeResponse {
    pub status_code: u16,
    pub response_time: Duration,
    pub body: String,
    /// URL of the last hop after following redirects
    pub final_url: String,
    pub ssl: Option<SslInfo>,
}

#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn probe(&self, request: &ProbeRequest) -> Result<ProbeResponse, ProbeError>;
}
