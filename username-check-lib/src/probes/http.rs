//! HTTP probe implementation.
//!
//! Each check sleeps a random jitter, picks a browser user agent and an
//! optional proxy, issues a single GET for the profile page and hands the
//! response to the platform's classification rule.

use super::rules::{classify, needs_body, ProbeResponse};
use super::Probe;
use crate::error::UsernameCheckError;
use crate::proxy::{build_client, ProxyConfig, ProxyPool};
use crate::types::{EngineConfig, Platform, ProbeVerdict};
use rand::seq::SliceRandom;
use rand::Rng;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, CONNECTION, USER_AGENT};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Browser user agents rotated across requests.
pub const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:124.0) Gecko/20100101 Firefox/124.0",
];

const ACCEPT_VALUE: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8";
const ACCEPT_LANGUAGE_VALUE: &str = "en-US,en;q=0.9";

/// Pick a delay uniformly from `[min, max]`.
pub fn jitter_delay(min: Duration, max: Duration) -> Duration {
    if max <= min {
        return min;
    }
    let secs = rand::thread_rng().gen_range(min.as_secs_f64()..=max.as_secs_f64());
    Duration::try_from_secs_f64(secs).unwrap_or(max)
}

fn random_user_agent() -> &'static str {
    USER_AGENTS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(USER_AGENTS[0])
}

/// Real probe for Pinterest, GitHub and Instagram.
#[derive(Clone)]
pub struct PlatformProbe {
    /// Shared proxy pool
    pool: Arc<ProxyPool>,
    /// Client for requests without a proxy
    direct: reqwest::Client,
    /// Origins overriding the platforms' public ones
    base_urls: HashMap<Platform, String>,
}

impl PlatformProbe {
    /// Create a probe drawing proxies from `pool`.
    pub fn new(pool: Arc<ProxyPool>) -> Result<Self, UsernameCheckError> {
        Ok(Self {
            pool,
            direct: build_client(None)?,
            base_urls: HashMap::new(),
        })
    }

    /// Point `platform` at another origin, e.g. a local test server.
    pub fn with_base_url<S: Into<String>>(mut self, platform: Platform, base: S) -> Self {
        self.base_urls.insert(platform, base.into());
        self
    }

    /// Profile URL this probe requests for `username`.
    pub fn url_for(&self, platform: Platform, username: &str) -> String {
        match self.base_urls.get(&platform) {
            Some(base) => platform.profile_url_with_base(base, username),
            None => platform.profile_url(username),
        }
    }

    /// Sleep the jitter, then fetch the profile page once.
    pub async fn fetch(
        &self,
        platform: Platform,
        username: &str,
        config: &EngineConfig,
    ) -> Result<ProbeResponse, UsernameCheckError> {
        let (min, max) = config.jitter_bounds();
        tokio::time::sleep(jitter_delay(min, max)).await;

        let url = self.url_for(platform, username);
        let proxy = if config.use_proxies {
            self.pool.select_proxy()
        } else {
            None
        };

        let result = self.send(platform, &url, proxy.as_ref(), config.timeout).await;
        if let (Err(e), Some(proxy)) = (&result, &proxy) {
            if e.is_proxy_failure() {
                tracing::warn!(
                    platform = %platform,
                    proxy = %proxy.address,
                    error = %e,
                    "request through proxy failed"
                );
                self.pool.mark_bad(&proxy.address);
            }
        }
        result.map_err(|e| e.on_platform(platform))
    }

    async fn send(
        &self,
        platform: Platform,
        url: &str,
        proxy: Option<&ProxyConfig>,
        timeout: Duration,
    ) -> Result<ProbeResponse, UsernameCheckError> {
        let client = match proxy {
            Some(proxy) => build_client(Some(proxy))?,
            None => self.direct.clone(),
        };

        tracing::debug!(
            platform = %platform,
            url = %url,
            proxy = proxy.map(|p| p.address.as_str()).unwrap_or("direct"),
            "probing profile"
        );

        let response = client
            .get(url)
            .header(USER_AGENT, random_user_agent())
            .header(ACCEPT, ACCEPT_VALUE)
            .header(ACCEPT_LANGUAGE, ACCEPT_LANGUAGE_VALUE)
            .header(CONNECTION, "keep-alive")
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    UsernameCheckError::timeout(format!("{} profile request", platform), timeout)
                } else {
                    UsernameCheckError::from(e)
                }
            })?;

        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let body = if needs_body(platform) {
            response.text().await?
        } else {
            String::new()
        };

        tracing::debug!(platform = %platform, status, final_url = %final_url, "profile response");

        Ok(ProbeResponse {
            status,
            final_url,
            body,
        })
    }

    /// Boolean view of a check: any failure counts as taken.
    pub async fn is_available(&self, platform: Platform, username: &str, config: &EngineConfig) -> bool {
        match self.fetch(platform, username, config).await {
            Ok(response) => classify(platform, &response, config),
            Err(e) => {
                tracing::debug!(platform = %platform, username, error = %e, "probe failed, assuming taken");
                false
            }
        }
    }
}

impl Probe for PlatformProbe {
    async fn check(
        &self,
        platform: Platform,
        username: &str,
        config: &EngineConfig,
    ) -> Result<ProbeVerdict, UsernameCheckError> {
        let response = self.fetch(platform, username, config).await?;
        Ok(ProbeVerdict::from_available(classify(platform, &response, config)))
    }
}
