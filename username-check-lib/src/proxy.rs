//! Shared proxy pool with a persistent blacklist.
//!
//! The pool is constructed explicitly and shared by reference between the
//! probes, the webhook dispatcher and the caller. Proxies that fail are
//! blacklisted and never selected again until un-marked or cleared.

use crate::error::UsernameCheckError;
use futures::stream::{self, StreamExt};
use rand::seq::SliceRandom;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// Default endpoint used by the proxy health check.
pub const DEFAULT_PROXY_TEST_URL: &str = "https://httpbin.org/ip";

/// A proxy picked for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    /// The entry exactly as listed in the pool
    pub address: String,
    /// Normalized proxy URL with scheme
    pub url: String,
}

impl ProxyConfig {
    /// Normalize a listed address. Entries without a scheme are HTTP proxies.
    pub fn from_address(address: &str) -> Self {
        let trimmed = address.trim();
        let url = if trimmed.contains("://") {
            trimmed.to_string()
        } else {
            format!("http://{}", trimmed)
        };
        Self {
            address: trimmed.to_string(),
            url,
        }
    }

    /// Whether this proxy speaks SOCKS.
    pub fn is_socks(&self) -> bool {
        self.url.to_lowercase().starts_with("socks")
    }

    /// Convert to a reqwest proxy covering both http and https targets.
    pub fn to_reqwest(&self) -> Result<reqwest::Proxy, UsernameCheckError> {
        reqwest::Proxy::all(&self.url)
            .map_err(|e| UsernameCheckError::proxy(&self.address, format!("Invalid proxy URL: {}", e)))
    }
}

/// Build an HTTP client, optionally routed through `proxy`.
pub(crate) fn build_client(proxy: Option<&ProxyConfig>) -> Result<reqwest::Client, UsernameCheckError> {
    let mut builder = reqwest::Client::builder();
    builder = match proxy {
        Some(proxy) => builder.proxy(proxy.to_reqwest()?),
        // direct means direct, even with HTTP(S)_PROXY set
        None => builder.no_proxy(),
    };
    builder.build().map_err(|e| {
        UsernameCheckError::network_with_source("Failed to create HTTP client", e.to_string())
    })
}

/// Result of testing one proxy against the health-check endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyHealth {
    pub address: String,
    pub healthy: bool,
    /// Response body on success, failure reason otherwise
    pub detail: String,
}

#[derive(Debug, Default)]
struct PoolState {
    proxies: Vec<String>,
    blacklist: BTreeSet<String>,
}

/// Proxy list plus blacklist, safe to share across concurrent probes.
#[derive(Debug)]
pub struct ProxyPool {
    state: Mutex<PoolState>,
    enabled: AtomicBool,
    proxy_path: Option<PathBuf>,
    blacklist_path: Option<PathBuf>,
    socks_supported: bool,
}

impl Default for ProxyPool {
    fn default() -> Self {
        Self::new()
    }
}

impl ProxyPool {
    /// Create an empty, in-memory pool with proxying disabled.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(PoolState::default()),
            enabled: AtomicBool::new(false),
            proxy_path: None,
            blacklist_path: None,
            socks_supported: cfg!(feature = "socks"),
        }
    }

    /// Create a pool backed by a proxy list file and a blacklist file.
    ///
    /// Nothing is read until [`ProxyPool::load`] is called.
    pub fn with_files<P: Into<PathBuf>, B: Into<PathBuf>>(proxy_path: P, blacklist_path: B) -> Self {
        Self {
            proxy_path: Some(proxy_path.into()),
            blacklist_path: Some(blacklist_path.into()),
            ..Self::new()
        }
    }

    /// Create an in-memory pool pre-filled with `addresses`.
    pub fn from_addresses<I, S>(addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let pool = Self::new();
        for address in addresses {
            pool.add(address.as_ref());
        }
        pool
    }

    fn lock(&self) -> MutexGuard<'_, PoolState> {
        // A panic while holding the lock leaves plain data behind; keep going.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Turn proxy selection on or off.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    /// Whether proxy selection is on.
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Reload the proxy list and blacklist from their files.
    ///
    /// Missing, unreadable or corrupt files yield an empty list; this never fails.
    pub fn load(&self) {
        let proxies = self
            .proxy_path
            .as_deref()
            .map(read_entries)
            .unwrap_or_default();
        let blacklist = self
            .blacklist_path
            .as_deref()
            .map(read_entries)
            .unwrap_or_default();

        let mut unique = BTreeSet::new();
        let proxies: Vec<String> = proxies
            .into_iter()
            .filter(|p| unique.insert(p.clone()))
            .collect();

        tracing::debug!(
            proxies = proxies.len(),
            blacklisted = blacklist.len(),
            "proxy pool loaded"
        );

        let mut state = self.lock();
        state.proxies = proxies;
        state.blacklist = blacklist.into_iter().collect();
    }

    /// Write the proxy list and blacklist back to their files.
    pub fn save(&self) -> Result<(), UsernameCheckError> {
        let state = self.lock();
        self.write_proxies(&state)?;
        self.write_blacklist(&state)
    }

    fn write_proxies(&self, state: &PoolState) -> Result<(), UsernameCheckError> {
        match &self.proxy_path {
            Some(path) => write_entries(path, state.proxies.iter()),
            None => Ok(()),
        }
    }

    fn write_blacklist(&self, state: &PoolState) -> Result<(), UsernameCheckError> {
        match &self.blacklist_path {
            // BTreeSet iteration is already sorted
            Some(path) => write_entries(path, state.blacklist.iter()),
            None => Ok(()),
        }
    }

    // Callers hold the state lock while persisting, so writes through the
    // shared `.tmp` sibling never interleave and the file matches the
    // latest state. The lists are small enough that the blocking write is
    // brief even on a runtime worker.
    fn persist_proxies(&self, state: &PoolState) {
        if let Err(e) = self.write_proxies(state) {
            tracing::warn!(error = %e, "failed to persist proxy list");
        }
    }

    fn persist_blacklist(&self, state: &PoolState) {
        if let Err(e) = self.write_blacklist(state) {
            tracing::warn!(error = %e, "failed to persist proxy blacklist");
        }
    }

    /// Add a proxy. Returns false for empty or duplicate entries.
    pub fn add(&self, address: &str) -> bool {
        let address = address.trim();
        if address.is_empty() {
            return false;
        }
        let mut state = self.lock();
        if state.proxies.iter().any(|p| p == address) {
            return false;
        }
        state.proxies.push(address.to_string());
        self.persist_proxies(&state);
        true
    }

    /// Remove a proxy. Returns false if it was not listed.
    pub fn remove(&self, address: &str) -> bool {
        let address = address.trim();
        let mut state = self.lock();
        let before = state.proxies.len();
        state.proxies.retain(|p| p != address);
        if state.proxies.len() == before {
            return false;
        }
        self.persist_proxies(&state);
        true
    }

    /// Blacklist a proxy. Marking twice keeps a single entry.
    pub fn mark_bad(&self, address: &str) {
        let mut state = self.lock();
        if state.blacklist.insert(address.trim().to_string()) {
            tracing::warn!(proxy = %address, "proxy blacklisted");
            self.persist_blacklist(&state);
        }
    }

    /// Take a proxy off the blacklist.
    pub fn unmark_bad(&self, address: &str) {
        let mut state = self.lock();
        if state.blacklist.remove(address.trim()) {
            self.persist_blacklist(&state);
        }
    }

    /// Whether a proxy is blacklisted.
    pub fn is_blacklisted(&self, address: &str) -> bool {
        self.lock().blacklist.contains(address.trim())
    }

    /// Empty the blacklist.
    pub fn clear_blacklist(&self) {
        let mut state = self.lock();
        state.blacklist.clear();
        self.persist_blacklist(&state);
    }

    /// Listed proxies, in insertion order.
    pub fn proxies(&self) -> Vec<String> {
        self.lock().proxies.clone()
    }

    /// Blacklisted addresses, sorted.
    pub fn blacklist(&self) -> Vec<String> {
        self.lock().blacklist.iter().cloned().collect()
    }

    /// Listed proxies that are not blacklisted.
    pub fn good(&self) -> Vec<String> {
        let state = self.lock();
        state
            .proxies
            .iter()
            .filter(|p| !state.blacklist.contains(*p))
            .cloned()
            .collect()
    }

    /// Listed proxies that are blacklisted.
    pub fn bad(&self) -> Vec<String> {
        let state = self.lock();
        state
            .proxies
            .iter()
            .filter(|p| state.blacklist.contains(*p))
            .cloned()
            .collect()
    }

    /// Number of listed proxies.
    pub fn len(&self) -> usize {
        self.lock().proxies.len()
    }

    /// Whether no proxies are listed.
    pub fn is_empty(&self) -> bool {
        self.lock().proxies.is_empty()
    }

    /// Drop every blacklisted proxy from the list and the blacklist.
    ///
    /// Returns the removed addresses.
    pub fn remove_blacklisted(&self) -> Vec<String> {
        let mut state = self.lock();
        let PoolState { proxies, blacklist } = &mut *state;
        let (bad, good): (Vec<String>, Vec<String>) =
            proxies.drain(..).partition(|p| blacklist.contains(p));
        *proxies = good;
        for address in &bad {
            blacklist.remove(address);
        }
        if !bad.is_empty() {
            self.persist_proxies(&state);
            self.persist_blacklist(&state);
        }
        bad
    }

    /// Pick a usable proxy uniformly at random.
    ///
    /// Returns `None` when proxying is disabled or every listed proxy is
    /// blacklisted. A SOCKS proxy picked without SOCKS support is
    /// blacklisted and `None` is returned; there is no silent direct fallback.
    pub fn select_proxy(&self) -> Option<ProxyConfig> {
        if !self.is_enabled() {
            return None;
        }

        let picked = {
            let state = self.lock();
            let usable: Vec<&String> = state
                .proxies
                .iter()
                .filter(|p| !state.blacklist.contains(*p))
                .collect();
            usable.choose(&mut rand::thread_rng()).map(|p| p.to_string())
        }?;

        let config = ProxyConfig::from_address(&picked);
        if config.is_socks() && !self.socks_supported {
            tracing::warn!(
                proxy = %config.address,
                "SOCKS proxy selected but SOCKS support is not available"
            );
            self.mark_bad(&config.address);
            return None;
        }
        Some(config)
    }

    /// Test every listed proxy against `test_url`.
    ///
    /// Healthy proxies come off the blacklist, failing ones go on it.
    /// Results arrive in completion order.
    pub async fn check_all(&self, test_url: &str, timeout: Duration, workers: usize) -> Vec<ProxyHealth> {
        let proxies = self.proxies();
        if proxies.is_empty() {
            return Vec::new();
        }
        let workers = workers.clamp(1, proxies.len());
        let socks_supported = self.socks_supported;

        let results: Vec<ProxyHealth> = stream::iter(proxies)
            .map(|address| async move {
                check_one_proxy(&address, test_url, timeout, socks_supported).await
            })
            .buffer_unordered(workers)
            .collect()
            .await;

        {
            let mut state = self.lock();
            for health in &results {
                if health.healthy {
                    state.blacklist.remove(&health.address);
                } else {
                    state.blacklist.insert(health.address.clone());
                }
            }
            self.persist_blacklist(&state);
        }

        results
    }
}

async fn check_one_proxy(
    address: &str,
    test_url: &str,
    timeout: Duration,
    socks_supported: bool,
) -> ProxyHealth {
    let unhealthy = |detail: String| ProxyHealth {
        address: address.to_string(),
        healthy: false,
        detail,
    };

    let config = ProxyConfig::from_address(address);
    if config.is_socks() && !socks_supported {
        return unhealthy("SOCKS support not available".to_string());
    }

    let client = match build_client(Some(&config)) {
        Ok(client) => client,
        Err(e) => return unhealthy(e.to_string()),
    };

    match client.get(test_url).timeout(timeout).send().await {
        Ok(response) if response.status() == reqwest::StatusCode::OK => {
            let body = response.text().await.unwrap_or_default();
            ProxyHealth {
                address: address.to_string(),
                healthy: true,
                detail: body.trim().to_string(),
            }
        }
        Ok(response) => unhealthy(format!("status:{}", response.status().as_u16())),
        Err(e) => unhealthy(e.to_string()),
    }
}

/// Validate a user-entered proxy address.
///
/// Accepts `host:port`, `user:pass@host:port` and either form prefixed
/// with `http://`, `https://`, `socks4://` or `socks5://`.
pub fn validate_proxy_address(proxy: &str) -> Result<(), String> {
    let proxy = proxy.trim();
    if proxy.is_empty() {
        return Err("Proxy cannot be empty".to_string());
    }

    let mut rest = proxy;
    for scheme in ["http://", "https://", "socks4://", "socks5://"] {
        if let Some(stripped) = proxy.strip_prefix(scheme) {
            rest = stripped;
            break;
        }
    }

    let host_port = match rest.split_once('@') {
        Some((auth, host_port)) => {
            if !auth.contains(':') {
                return Err(
                    "Invalid authentication format (should be user:pass@host:port)".to_string(),
                );
            }
            host_port
        }
        None => rest,
    };

    let (host, port) = host_port
        .rsplit_once(':')
        .ok_or_else(|| "Missing port (format: host:port)".to_string())?;

    if host.is_empty() {
        return Err("Missing host".to_string());
    }

    match port.parse::<u32>() {
        Ok(p) if (1..=65535).contains(&p) => Ok(()),
        Ok(_) => Err("Port must be between 1 and 65535".to_string()),
        Err(_) => Err("Port must be a number".to_string()),
    }
}

/// Read a list file: one entry per line, blank lines and `#` comments skipped.
fn read_entries(path: &Path) -> Vec<String> {
    match fs::read_to_string(path) {
        Ok(content) => content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(String::from)
            .collect(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "unreadable list file, starting empty");
            Vec::new()
        }
    }
}

/// Write a list file through a temporary sibling and rename it into place.
fn write_entries<'a, I>(path: &Path, entries: I) -> Result<(), UsernameCheckError>
where
    I: Iterator<Item = &'a String>,
{
    let mut content = entries.map(String::as_str).collect::<Vec<_>>().join("\n");
    if !content.is_empty() {
        content.push('\n');
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| {
            UsernameCheckError::file_error(parent.to_string_lossy(), e.to_string())
        })?;
    }

    let tmp = path.with_extension("tmp");
    fs::write(&tmp, content)
        .and_then(|_| fs::rename(&tmp, path))
        .map_err(|e| UsernameCheckError::file_error(path.to_string_lossy(), e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn enabled_pool(addresses: &[&str]) -> ProxyPool {
        let pool = ProxyPool::from_addresses(addresses);
        pool.set_enabled(true);
        pool
    }

    #[test]
    fn test_add_twice_then_remove_round_trip() {
        let pool = ProxyPool::from_addresses(["10.0.0.1:8080"]);
        let before = pool.proxies();

        assert!(pool.add("10.0.0.2:3128"));
        assert!(!pool.add("10.0.0.2:3128"));
        assert!(!pool.add("   "));
        assert!(pool.remove("10.0.0.2:3128"));
        assert!(!pool.remove("10.0.0.2:3128"));

        assert_eq!(pool.proxies(), before);
    }

    #[test]
    fn test_mark_bad_is_idempotent() {
        let pool = ProxyPool::from_addresses(["10.0.0.1:8080"]);
        pool.mark_bad("10.0.0.1:8080");
        pool.mark_bad("10.0.0.1:8080");
        assert_eq!(pool.blacklist(), vec!["10.0.0.1:8080"]);
        assert!(pool.is_blacklisted("10.0.0.1:8080"));

        pool.unmark_bad("10.0.0.1:8080");
        assert!(!pool.is_blacklisted("10.0.0.1:8080"));

        pool.mark_bad("10.0.0.1:8080");
        pool.clear_blacklist();
        assert!(pool.blacklist().is_empty());
    }

    #[test]
    fn test_select_never_returns_blacklisted() {
        let pool = enabled_pool(&["a:1", "b:2", "c:3"]);
        pool.mark_bad("a:1");
        pool.mark_bad("c:3");
        for _ in 0..50 {
            let picked = pool.select_proxy().unwrap();
            assert_eq!(picked.address, "b:2");
            assert_eq!(picked.url, "http://b:2");
        }
        pool.mark_bad("b:2");
        assert!(pool.select_proxy().is_none());
    }

    #[test]
    fn test_select_returns_none_when_disabled() {
        let pool = ProxyPool::from_addresses(["a:1", "b:2"]);
        assert!(pool.select_proxy().is_none());
        pool.set_enabled(true);
        assert!(pool.select_proxy().is_some());
        pool.set_enabled(false);
        assert!(pool.select_proxy().is_none());
    }

    #[test]
    fn test_socks_without_support_is_blacklisted() {
        let mut pool = ProxyPool::from_addresses(["socks5://user:pw@10.0.0.9:1080"]);
        pool.socks_supported = false;
        pool.set_enabled(true);

        assert!(pool.select_proxy().is_none());
        assert!(pool.is_blacklisted("socks5://user:pw@10.0.0.9:1080"));
    }

    #[test]
    fn test_scheme_normalization() {
        assert_eq!(ProxyConfig::from_address("1.2.3.4:80").url, "http://1.2.3.4:80");
        assert_eq!(
            ProxyConfig::from_address("u:p@1.2.3.4:80").url,
            "http://u:p@1.2.3.4:80"
        );
        let https = ProxyConfig::from_address("https://1.2.3.4:443");
        assert_eq!(https.url, "https://1.2.3.4:443");
        assert!(!https.is_socks());
        assert!(ProxyConfig::from_address("socks4://1.2.3.4:1080").is_socks());
    }

    #[test]
    fn test_concurrent_mark_bad() {
        let pool = Arc::new(ProxyPool::from_addresses(["a:1", "b:2"]));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let pool = Arc::clone(&pool);
                std::thread::spawn(move || {
                    pool.mark_bad(if i % 2 == 0 { "a:1" } else { "b:2" });
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(pool.blacklist(), vec!["a:1", "b:2"]);
    }

    #[test]
    fn test_concurrent_mark_bad_persists_every_entry() {
        let dir = TempDir::new().unwrap();
        let blacklist_path = dir.path().join("bad_proxies.txt");
        let pool = Arc::new(ProxyPool::with_files(
            dir.path().join("proxies.txt"),
            &blacklist_path,
        ));

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let pool = Arc::clone(&pool);
                std::thread::spawn(move || pool.mark_bad(&format!("10.0.0.{}:80", i)))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let written = fs::read_to_string(&blacklist_path).unwrap();
        let mut lines: Vec<_> = written.lines().collect();
        lines.sort();
        assert_eq!(lines.len(), 16);
        assert_eq!(lines, pool.blacklist());
        assert!(!blacklist_path.with_extension("tmp").exists());
    }

    #[test]
    fn test_load_and_save_files() {
        let dir = TempDir::new().unwrap();
        let proxy_path = dir.path().join("proxies.txt");
        let blacklist_path = dir.path().join("bad_proxies.txt");
        fs::write(
            &proxy_path,
            "# my proxies\n1.1.1.1:80\n\nuser:pw@2.2.2.2:8080\nsocks5://3.3.3.3:1080\n1.1.1.1:80\n",
        )
        .unwrap();
        fs::write(&blacklist_path, "2.2.2.2:9999\n").unwrap();

        let pool = ProxyPool::with_files(&proxy_path, &blacklist_path);
        pool.load();
        assert_eq!(
            pool.proxies(),
            vec!["1.1.1.1:80", "user:pw@2.2.2.2:8080", "socks5://3.3.3.3:1080"]
        );
        assert!(pool.is_blacklisted("2.2.2.2:9999"));

        pool.mark_bad("socks5://3.3.3.3:1080");
        pool.mark_bad("1.1.1.1:80");
        let written = fs::read_to_string(&blacklist_path).unwrap();
        assert_eq!(
            written,
            "1.1.1.1:80\n2.2.2.2:9999\nsocks5://3.3.3.3:1080\n"
        );

        assert!(pool.add("4.4.4.4:80"));
        let reloaded = ProxyPool::with_files(&proxy_path, &blacklist_path);
        reloaded.load();
        assert_eq!(reloaded.len(), 4);
        assert_eq!(reloaded.bad(), vec!["1.1.1.1:80", "socks5://3.3.3.3:1080"]);
        assert_eq!(reloaded.good(), vec!["user:pw@2.2.2.2:8080", "4.4.4.4:80"]);
    }

    #[test]
    fn test_corrupt_file_fails_soft() {
        let dir = TempDir::new().unwrap();
        let proxy_path = dir.path().join("proxies.txt");
        fs::write(&proxy_path, [0xff, 0xfe, 0x00, 0x80]).unwrap();

        let pool = ProxyPool::with_files(&proxy_path, dir.path().join("missing.txt"));
        pool.load();
        assert!(pool.is_empty());
        assert!(pool.blacklist().is_empty());
    }

    #[test]
    fn test_remove_blacklisted() {
        let pool = ProxyPool::from_addresses(["a:1", "b:2", "c:3"]);
        pool.mark_bad("b:2");
        assert_eq!(pool.remove_blacklisted(), vec!["b:2"]);
        assert_eq!(pool.proxies(), vec!["a:1", "c:3"]);
        assert!(pool.blacklist().is_empty());
    }

    #[test]
    fn test_validate_proxy_address() {
        assert!(validate_proxy_address("1.2.3.4:8080").is_ok());
        assert!(validate_proxy_address("user:pass@proxy.example:3128").is_ok());
        assert!(validate_proxy_address("socks5://1.2.3.4:1080").is_ok());
        assert!(validate_proxy_address("").is_err());
        assert!(validate_proxy_address("1.2.3.4").is_err());
        assert!(validate_proxy_address(":8080").is_err());
        assert!(validate_proxy_address("user@1.2.3.4:8080").is_err());
        assert!(validate_proxy_address("1.2.3.4:0").is_err());
        assert!(validate_proxy_address("1.2.3.4:70000").is_err());
        assert!(validate_proxy_address("1.2.3.4:http").is_err());
    }

    #[tokio::test]
    async fn test_check_all_marks_results() {
        // The mock server acts as a forward proxy: absolute-form requests
        // for the test URL land on it with the original path.
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/ip");
                then.status(200).body("{\"origin\": \"10.0.0.1\"}\n");
            })
            .await;

        let good = server.address().to_string();
        let dead = "127.0.0.1:1".to_string();
        let pool = ProxyPool::from_addresses([good.as_str(), dead.as_str()]);
        pool.mark_bad(&good);

        let results = pool
            .check_all("http://check.invalid/ip", Duration::from_secs(5), 4)
            .await;

        assert_eq!(results.len(), 2);
        let good_health = results.iter().find(|h| h.address == good).unwrap();
        assert!(good_health.healthy, "{:?}", good_health);
        assert!(good_health.detail.contains("origin"));
        let dead_health = results.iter().find(|h| h.address == dead).unwrap();
        assert!(!dead_health.healthy);

        assert!(!pool.is_blacklisted(&good));
        assert!(pool.is_blacklisted(&dead));
    }
}
