//! Liveness probes.
//!
//! Probes never fail: every error (refusal, timeout, bad response) is
//! normalized to `false` at this boundary.

pub mod http;
pub mod tcp;

use crate::monitor::target::Target;
use async_trait::async_trait;
use std::time::Duration;

/// Checks whether a single target is up.
#[async_trait]
pub trait TargetProber: Send + Sync {
    async fn probe(&self, target: &Target, timeout: Duration) -> bool;
}

/// Probes targets on one host over the network.
pub struct NetworkProber {
    host: String,
    client: reqwest::Client,
}

impl NetworkProber {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            client: reqwest::Client::new(),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }
}

#[async_trait]
impl TargetProber for NetworkProber {
    async fn probe(&self, target: &Target, timeout: Duration) -> bool {
        match target {
            Target::Port { number, .. } => tcp::check_port(&self.host, *number, timeout).await,
            Target::HttpEndpoint { url } => http::check_endpoint(&self.client, url, timeout).await,
        }
    }
}
