//! Public-IP discovery across several well-known services.
//!
//! Services are tried in order; within a service the request is retried a
//! few times with a short backoff. Backup pipelines use the answer to tag
//! logs with the originating host, so failure here is never fatal.

use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};

const MAX_ATTEMPTS: u32 = 3;
const FETCH_TIMEOUT_SECS: u64 = 10;

pub struct PublicIpFetcher {
    client: Client,
}

#[derive(Deserialize)]
struct HttpBinAnswer {
    origin: String,
}

impl PublicIpFetcher {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
            .build()
            .map_err(|e| anyhow!("failed to create HTTP client: {}", e))?;
        Ok(Self { client })
    }

    /// Try each service in order and return the first non-empty answer.
    pub async fn fetch(&self) -> Result<String> {
        debug!("fetching public IP");

        match self.fetch_plain("https://ipinfo.io/ip").await {
            Ok(ip) => {
                info!("public IP {} (via ipinfo.io)", ip);
                return Ok(ip);
            }
            Err(e) => debug!("ipinfo.io lookup failed, trying next service: {:#}", e),
        }

        match self.fetch_httpbin().await {
            Ok(ip) => {
                info!("public IP {} (via httpbin.org)", ip);
                return Ok(ip);
            }
            Err(e) => debug!("httpbin.org lookup failed, trying next service: {:#}", e),
        }

        match self.fetch_plain("http://ip.sb").await {
            Ok(ip) => {
                info!("public IP {} (via ip.sb)", ip);
                return Ok(ip);
            }
            Err(e) => debug!("ip.sb lookup failed: {:#}", e),
        }

        bail!("no public-IP service answered")
    }

    /// Fetch from a service that answers with the bare address as text.
    pub(crate) async fn fetch_plain(&self, url: &str) -> Result<String> {
        let mut last_err = None;
        for attempt in 0..MAX_ATTEMPTS {
            if attempt > 0 {
                tokio::time::sleep(backoff(attempt)).await;
            }
            match self.try_plain(url).await {
                Ok(ip) => return Ok(ip),
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err.unwrap_or_else(|| anyhow!("no attempt made against {}", url)))
    }

    async fn try_plain(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            bail!("HTTP status {} from {}", response.status(), url);
        }
        let ip = response.text().await?.trim().to_string();
        if ip.is_empty() {
            bail!("empty answer from {}", url);
        }
        Ok(ip)
    }

    async fn fetch_httpbin(&self) -> Result<String> {
        let url = "https://httpbin.org/ip";
        let mut last_err = None;
        for attempt in 0..MAX_ATTEMPTS {
            if attempt > 0 {
                tokio::time::sleep(backoff(attempt)).await;
            }
            match self.try_httpbin(url).await {
                Ok(ip) => return Ok(ip),
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err.unwrap_or_else(|| anyhow!("no attempt made against {}", url)))
    }

    async fn try_httpbin(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            bail!("HTTP status {} from {}", response.status(), url);
        }
        let answer: HttpBinAnswer = response.json().await?;
        let ip = answer.origin.trim().to_string();
        if ip.is_empty() {
            bail!("empty origin field from {}", url);
        }
        Ok(ip)
    }
}

/// Retry wait: a fixed base plus a little per-attempt spread.
fn backoff(attempt: u32) -> Duration {
    Duration::from_secs(2) + Duration::from_millis(u64::from(attempt) * 100)
}
