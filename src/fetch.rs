//! Page fetching with transport fallback and bounded retry.
//!
//! Each attempt tries the render-capable proxy first (when a credential is
//! configured), then a direct GET with a browser-like user agent. Near-empty
//! bodies are rejected as likely block pages.

use std::cmp::min;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{info, warn};

use crate::error::FetchError;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

const DIRECT_TIMEOUT_SECS: u64 = 15;
const PROXY_TIMEOUT_SECS: u64 = 120;

/// Bodies under this size are block pages or error shells, not listings.
pub const MIN_HTML_LEN: usize = 512;

/// Injected everywhere a network call can fail, instead of ad hoc loops.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_step_ms: u64,
    pub backoff_cap_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 2,
            backoff_step_ms: 1000,
            backoff_cap_ms: 2000,
        }
    }
}

impl RetryPolicy {
    /// Capped linear backoff: `min(attempt * step, cap)`.
    pub fn delay(&self, attempt: u32) -> Duration {
        Duration::from_millis(min(attempt as u64 * self.backoff_step_ms, self.backoff_cap_ms))
    }
}

/// Render-capable fetch proxy, addressed as a plain GET endpoint.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub endpoint: String,
    pub api_key: String,
    pub render: bool,
    pub country_code: String,
}

impl ProxyConfig {
    pub fn new(api_key: String) -> Self {
        ProxyConfig {
            endpoint: "https://api.scraperapi.com/".to_string(),
            api_key,
            render: true,
            country_code: "us".to_string(),
        }
    }
}

#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

pub struct FetchClient {
    http: reqwest::Client,
    proxy: Option<ProxyConfig>,
    retry: RetryPolicy,
}

impl FetchClient {
    pub fn new(proxy: Option<ProxyConfig>, retry: RetryPolicy) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(PROXY_TIMEOUT_SECS))
            .build()?;
        Ok(FetchClient { http, proxy, retry })
    }

    async fn try_proxy(&self, proxy: &ProxyConfig, url: &str) -> Result<String, String> {
        let started = Instant::now();
        let response = self
            .http
            .get(&proxy.endpoint)
            .query(&[
                ("api_key", proxy.api_key.as_str()),
                ("url", url),
                ("render", if proxy.render { "true" } else { "false" }),
                ("country_code", proxy.country_code.as_str()),
            ])
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("proxy returned {}", status));
        }
        let body = response.text().await.map_err(|e| e.to_string())?;
        info!(
            method = "proxy",
            url,
            bytes = body.len(),
            ms = started.elapsed().as_millis() as u64,
            "fetched page"
        );
        Ok(body)
    }

    async fn try_direct(&self, url: &str) -> Result<String, String> {
        let started = Instant::now();
        let response = self
            .http
            .get(url)
            .timeout(Duration::from_secs(DIRECT_TIMEOUT_SECS))
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("direct GET returned {}", status));
        }
        let body = response.text().await.map_err(|e| e.to_string())?;
        info!(
            method = "direct",
            url,
            bytes = body.len(),
            ms = started.elapsed().as_millis() as u64,
            "fetched page"
        );
        Ok(body)
    }

    fn check_body(body: String) -> Result<String, String> {
        if body.len() < MIN_HTML_LEN {
            Err(format!("body too small ({} bytes)", body.len()))
        } else {
            Ok(body)
        }
    }
}

#[async_trait]
impl PageFetcher for FetchClient {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let mut last_error = String::new();

        for attempt in 1..=self.retry.max_attempts {
            if let Some(proxy) = &self.proxy {
                match self.try_proxy(proxy, url).await.and_then(Self::check_body) {
                    Ok(body) => return Ok(body),
                    Err(e) => {
                        warn!(url, attempt, error = %e, "proxy fetch failed, trying direct");
                        last_error = e;
                    }
                }
            }

            match self.try_direct(url).await.and_then(Self::check_body) {
                Ok(body) => return Ok(body),
                Err(e) => {
                    warn!(url, attempt, error = %e, "direct fetch failed");
                    last_error = e;
                }
            }

            if attempt < self.retry.max_attempts {
                tokio::time::sleep(self.retry.delay(attempt)).await;
            }
        }

        Err(FetchError {
            url: url.to_string(),
            attempts: self.retry.max_attempts,
            last_error,
        })
    }
}

// ── Tests ──
