use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::Url;
use std::{fmt::Debug, time::Duration};
use tokio::net::TcpStream;

#[async_trait]
pub trait Connectivity: Send + Sync + Debug {
    async fn is_network_available(&self) -> bool;
}

/// Treats the network as available when the API host accepts a TCP connection.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    host: String,
    port: u16,
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(host: impl Into<String>, port: u16, timeout: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            timeout,
        }
    }

    /// Probe the host and port `url` would be fetched from.
    pub fn for_url(url: &str, timeout: Duration) -> Result<Self> {
        let parsed = Url::parse(url).with_context(|| format!("Invalid base URL '{url}'"))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| anyhow!("Base URL '{url}' has no host"))?;
        let port = parsed.port_or_known_default().unwrap_or(443);

        Ok(Self::new(host, port, timeout))
    }
}

#[async_trait]
impl Connectivity for TcpProbe {
    async fn is_network_available(&self) -> bool {
        let addr = (self.host.as_str(), self.port);
        match tokio::time::timeout(self.timeout, TcpStream::connect(addr)).await {
            Ok(Ok(_)) => true,
            Ok(Err(err)) => {
                tracing::debug!(host = %self.host, error = %err, "connectivity probe failed");
                false
            }
            Err(_) => {
                tracing::debug!(host = %self.host, "connectivity probe timed out");
                false
            }
        }
    }
}
