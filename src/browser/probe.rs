//! Readiness probe for a browser's DevTools endpoint

use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::config::Config;
use crate::{Error, Result};

/// Upper bound on a single probe request
const REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

/// Polls `GET <endpoint><path>` at a fixed interval until it answers 200
pub struct ReadinessProbe {
    url: url::Url,
    port: u16,
    interval: Duration,
    timeout: Duration,
    client: reqwest::Client,
}

impl ReadinessProbe {
    pub fn new(
        endpoint: &url::Url,
        path: &str,
        interval: Duration,
        timeout: Duration,
    ) -> Result<Self> {
        let url = endpoint
            .join(path)
            .map_err(|e| Error::Config(format!("Invalid probe path {}: {}", path, e)))?;
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT.min(timeout.max(Duration::from_millis(1))))
            .build()?;

        Ok(Self {
            port: endpoint.port_or_known_default().unwrap_or_default(),
            url,
            interval,
            timeout,
            client,
        })
    }

    /// Probe for the agent's port using the configured path and timings
    pub fn for_port(config: &Config, port: u16) -> Result<Self> {
        let endpoint = config.control_endpoint(port)?;
        Self::new(
            &endpoint,
            &config.probe_path,
            config.timings.probe_interval(),
            config.timings.probe_timeout(),
        )
    }

    pub fn url(&self) -> &url::Url {
        &self.url
    }

    /// Single attempt; any error or non-200 status is "not ready"
    pub async fn is_ready(&self) -> bool {
        match self.client.get(self.url.clone()).send().await {
            Ok(response) if response.status() == reqwest::StatusCode::OK => true,
            Ok(response) => {
                debug!(status = %response.status(), "DevTools endpoint not ready");
                false
            }
            Err(e) => {
                debug!(error = %e, "DevTools endpoint unreachable");
                false
            }
        }
    }

    /// Probe until a 200 is observed or the deadline passes
    pub async fn wait_until_ready(&self) -> Result<()> {
        let start = Instant::now();
        info!(url = %self.url, "Waiting for browser");

        loop {
            if self.is_ready().await {
                debug!(elapsed_ms = start.elapsed().as_millis() as u64, "Browser ready");
                return Ok(());
            }

            if start.elapsed() > self.timeout {
                return Err(Error::Timeout(format!(
                    "DevTools endpoint on port {} not ready after {} ms",
                    self.port,
                    self.timeout.as_millis()
                )));
            }

            tokio::time::sleep(self.interval).await;
        }
    }
}
