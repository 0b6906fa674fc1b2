//! Core data types for username availability checking.
//!
//! This module defines the platforms, per-platform verdicts, aggregated
//! check results and the engine configuration snapshot.

use crate::error::UsernameCheckError;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::str::FromStr;
use std::time::Duration;

/// Upper bound on worker tasks for bulk runs.
pub const MAX_THREADS: usize = 100;

/// Longest accepted per-request timeout.
pub const MAX_TIMEOUT: Duration = Duration::from_secs(600);

/// Longest accepted jitter bound, in seconds.
pub const MAX_JITTER_SECS: f64 = 300.0;

/// Platforms a username can be checked on.
///
/// Declaration order is the order probes run in within a single check
/// and the order platforms are listed in results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Pinterest,
    GitHub,
    Instagram,
}

impl Platform {
    /// Every supported platform, in probe order.
    pub const ALL: [Platform; 3] = [Platform::Pinterest, Platform::GitHub, Platform::Instagram];

    /// Stable lowercase identifier used in settings keys and JSON output.
    pub fn id(&self) -> &'static str {
        match self {
            Platform::Pinterest => "pinterest",
            Platform::GitHub => "github",
            Platform::Instagram => "instagram",
        }
    }

    /// Human readable platform name.
    pub fn display_name(&self) -> &'static str {
        match self {
            Platform::Pinterest => "Pinterest",
            Platform::GitHub => "GitHub",
            Platform::Instagram => "Instagram",
        }
    }

    /// Origin that profile URLs are built on.
    pub fn default_base_url(&self) -> &'static str {
        match self {
            Platform::Pinterest => "https://www.pinterest.com",
            Platform::GitHub => "https://github.com",
            Platform::Instagram => "https://www.instagram.com",
        }
    }

    /// Public profile URL for `username`.
    pub fn profile_url(&self, username: &str) -> String {
        self.profile_url_with_base(self.default_base_url(), username)
    }

    /// Profile URL for `username` on an alternative origin (mirrors, test servers).
    pub fn profile_url_with_base(&self, base: &str, username: &str) -> String {
        let base = base.trim_end_matches('/');
        match self {
            Platform::Pinterest | Platform::Instagram => format!("{}/{}/", base, username),
            Platform::GitHub => format!("{}/{}", base, username),
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl FromStr for Platform {
    type Err = UsernameCheckError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pinterest" => Ok(Platform::Pinterest),
            "github" => Ok(Platform::GitHub),
            "instagram" => Ok(Platform::Instagram),
            other => Err(UsernameCheckError::config(format!(
                "Unknown platform '{}'. Supported: pinterest, github, instagram",
                other
            ))),
        }
    }
}

/// Outcome of one platform check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeVerdict {
    /// The profile does not exist
    Available,
    /// The profile exists, or the check failed closed
    Taken,
    /// Signals were ambiguous; worth a human look
    Inconclusive,
}

impl ProbeVerdict {
    /// Collapse a boolean probe answer into a verdict.
    pub fn from_available(available: bool) -> Self {
        if available {
            ProbeVerdict::Available
        } else {
            ProbeVerdict::Taken
        }
    }
}

/// Aggregated result of checking one username across platforms.
///
/// Immutable once the engine produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    /// The username that was checked
    pub username: String,

    /// Platforms a probe was actually issued for
    pub checked_platforms: BTreeSet<Platform>,

    /// Platforms that reported the username as free
    pub available_on: BTreeSet<Platform>,

    /// Platforms whose answer was ambiguous
    pub possibly_available: BTreeSet<Platform>,

    /// When the check finished
    pub timestamp: DateTime<Local>,
}

impl CheckResult {
    /// A result with nothing checked yet, stamped now.
    pub fn empty<U: Into<String>>(username: U) -> Self {
        Self {
            username: username.into(),
            checked_platforms: BTreeSet::new(),
            available_on: BTreeSet::new(),
            possibly_available: BTreeSet::new(),
            timestamp: Local::now(),
        }
    }

    /// True when at least one platform is available or possibly available.
    pub fn has_hits(&self) -> bool {
        !self.available_on.is_empty() || !self.possibly_available.is_empty()
    }

    /// True when no platform was plausible for this username.
    pub fn nothing_checked(&self) -> bool {
        self.checked_platforms.is_empty()
    }
}

/// Execution mode of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// One-shot parallel check of a fixed list
    Bulk,
    /// Repeating check of a single username
    Monitor,
}

impl std::fmt::Display for RunMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunMode::Bulk => write!(f, "Bulk"),
            RunMode::Monitor => write!(f, "Monitor"),
        }
    }
}

/// Observable engine state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineState {
    pub active: bool,
    pub mode: Option<RunMode>,
}

/// What a finished run did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub mode: RunMode,
    /// Results delivered to the callback
    pub checked: usize,
    /// Delivered results with at least one hit
    pub with_hits: usize,
    /// Whether the run ended because of `stop()`
    pub cancelled: bool,
}

/// Configuration snapshot the engine runs with.
///
/// Taken once at the start of a bulk or monitor run; edits made while a
/// run is in progress apply to the next run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Worker tasks for bulk runs
    /// Default: 10, Range: 1-100
    pub threads: usize,

    /// Timeout for each probe request
    /// Default: 15 seconds
    #[serde(skip)]
    pub timeout: Duration,

    /// Route requests through the proxy pool
    /// Default: false
    pub use_proxies: bool,

    /// Lower bound of the pre-request delay, in seconds
    /// Default: 0.5
    pub jitter_min: f64,

    /// Upper bound of the pre-request delay, in seconds
    /// Default: 1.5
    pub jitter_max: f64,

    /// Platforms to probe, in probe order
    pub enabled_platforms: Vec<Platform>,

    /// Where to send availability alerts
    pub webhook_url: Option<String>,

    /// Usernames shorter than this are reported as possibly available when a
    /// probe errors out. 0 disables the rule.
    /// Default: 4
    pub inconclusive_below_len: usize,

    /// Final URLs (trailing slash stripped) that mean Pinterest bounced a
    /// missing profile back to its home page
    pub pinterest_home_urls: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            threads: 10,
            timeout: Duration::from_secs(15),
            use_proxies: false,
            jitter_min: 0.5,
            jitter_max: 1.5,
            enabled_platforms: Platform::ALL.to_vec(),
            webhook_url: None,
            inconclusive_below_len: 4,
            pinterest_home_urls: vec![
                "https://www.pinterest.com".to_string(),
                "https://br.pinterest.com".to_string(),
            ],
        }
    }
}

impl EngineConfig {
    /// Set the bulk worker count, capped to 1-100.
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads.clamp(1, MAX_THREADS);
        self
    }

    /// Set the per-request timeout, capped to [`MAX_TIMEOUT`]. A zero
    /// timeout keeps the current value.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        if !timeout.is_zero() {
            self.timeout = clamp_timeout(timeout);
        }
        self
    }

    /// Enable or disable proxy routing.
    pub fn with_proxies(mut self, enabled: bool) -> Self {
        self.use_proxies = enabled;
        self
    }

    /// Set the jitter bounds in seconds.
    ///
    /// Negative or non-finite bounds become 0, bounds above
    /// [`MAX_JITTER_SECS`] are capped, and a minimum above the maximum
    /// raises the maximum to match.
    pub fn with_jitter(mut self, min: f64, max: f64) -> Self {
        let (min, max) = clamp_jitter(min, max);
        self.jitter_min = min;
        self.jitter_max = max;
        self
    }

    /// Set which platforms are probed. Duplicates are dropped and the
    /// result follows probe order.
    pub fn with_platforms<I: IntoIterator<Item = Platform>>(mut self, platforms: I) -> Self {
        let wanted: BTreeSet<Platform> = platforms.into_iter().collect();
        self.enabled_platforms = wanted.into_iter().collect();
        self
    }

    /// Set the alert webhook. Blank URLs disable alerts.
    pub fn with_webhook_url<S: Into<String>>(mut self, url: Option<S>) -> Self {
        self.webhook_url = url.map(Into::into).filter(|u| !u.trim().is_empty());
        self
    }

    /// Set the short-username threshold for the inconclusive rule.
    pub fn with_inconclusive_below_len(mut self, len: usize) -> Self {
        self.inconclusive_below_len = len;
        self
    }

    /// Replace the recognized Pinterest home-page redirect targets.
    pub fn with_pinterest_home_urls(mut self, urls: Vec<String>) -> Self {
        self.pinterest_home_urls = urls
            .into_iter()
            .map(|u| u.trim().trim_end_matches('/').to_string())
            .filter(|u| !u.is_empty())
            .collect();
        self
    }

    /// Whether `platform` is switched on.
    pub fn is_enabled(&self, platform: Platform) -> bool {
        self.enabled_platforms.contains(&platform)
    }

    /// The same configuration with every field brought back in range.
    ///
    /// Fields are public, so a hand-built or deserialized config may hold
    /// values the builders would have rejected; runs always use this.
    pub fn normalized(mut self) -> Self {
        self.threads = self.threads.clamp(1, MAX_THREADS);
        self.timeout = if self.timeout.is_zero() {
            Self::default().timeout
        } else {
            clamp_timeout(self.timeout)
        };
        let (min, max) = clamp_jitter(self.jitter_min, self.jitter_max);
        self.jitter_min = min;
        self.jitter_max = max;
        self
    }

    /// Jitter bounds as durations.
    pub fn jitter_bounds(&self) -> (Duration, Duration) {
        let (min, max) = clamp_jitter(self.jitter_min, self.jitter_max);
        (Duration::from_secs_f64(min), Duration::from_secs_f64(max))
    }
}

fn clamp_timeout(timeout: Duration) -> Duration {
    if timeout > MAX_TIMEOUT {
        tracing::warn!(timeout = ?timeout, max = ?MAX_TIMEOUT, "timeout too large, capping");
        MAX_TIMEOUT
    } else {
        timeout
    }
}

fn clamp_jitter_bound(secs: f64) -> f64 {
    if !secs.is_finite() {
        return 0.0;
    }
    if secs > MAX_JITTER_SECS {
        tracing::warn!(jitter = secs, max = MAX_JITTER_SECS, "jitter bound too large, capping");
        return MAX_JITTER_SECS;
    }
    secs.max(0.0)
}

/// Normalize a pair of jitter bounds so that `0 <= min <= max <= MAX_JITTER_SECS`.
pub(crate) fn clamp_jitter(min: f64, max: f64) -> (f64, f64) {
    let min = clamp_jitter_bound(min);
    let max = clamp_jitter_bound(max);
    if min > max {
        tracing::warn!(
            jitter_min = min,
            jitter_max = max,
            "jitter_min exceeds jitter_max, raising jitter_max"
        );
        (min, min)
    } else {
        (min, max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_round_trips_through_id() {
        for platform in Platform::ALL {
            assert_eq!(platform.id().parse::<Platform>().unwrap(), platform);
        }
        assert!("myspace".parse::<Platform>().is_err());
        assert_eq!(" GitHub ".parse::<Platform>().unwrap(), Platform::GitHub);
    }

    #[test]
    fn test_profile_urls() {
        assert_eq!(
            Platform::Pinterest.profile_url("alice"),
            "https://www.pinterest.com/alice/"
        );
        assert_eq!(Platform::GitHub.profile_url("alice"), "https://github.com/alice");
        assert_eq!(
            Platform::Instagram.profile_url_with_base("http://127.0.0.1:9000/", "bob"),
            "http://127.0.0.1:9000/bob/"
        );
    }

    #[test]
    fn test_jitter_min_above_max_is_clamped() {
        let config = EngineConfig::default().with_jitter(2.0, 1.0);
        assert_eq!(config.jitter_min, 2.0);
        assert_eq!(config.jitter_max, 2.0);

        let config = EngineConfig::default().with_jitter(-1.0, f64::NAN);
        assert_eq!((config.jitter_min, config.jitter_max), (0.0, 0.0));
    }

    #[test]
    fn test_huge_timeout_and_jitter_are_capped() {
        let config = EngineConfig::default()
            .with_timeout(Duration::from_secs(u64::MAX))
            .with_jitter(1e300, 1e300);
        assert_eq!(config.timeout, MAX_TIMEOUT);
        assert_eq!((config.jitter_min, config.jitter_max), (MAX_JITTER_SECS, MAX_JITTER_SECS));

        let (min, max) = config.jitter_bounds();
        assert_eq!(max, Duration::from_secs(300));
        assert_eq!(min, max);
    }

    #[test]
    fn test_normalized_repairs_hand_built_config() {
        let mut config = EngineConfig::default();
        config.threads = 0;
        config.timeout = Duration::ZERO;
        config.jitter_min = 5.0;
        config.jitter_max = f64::INFINITY;

        let config = config.normalized();
        assert_eq!(config.threads, 1);
        assert_eq!(config.timeout, Duration::from_secs(15));
        assert_eq!((config.jitter_min, config.jitter_max), (5.0, 5.0));

        let mut config = EngineConfig::default();
        config.threads = 10_000;
        config.timeout = Duration::MAX;
        let config = config.normalized();
        assert_eq!(config.threads, MAX_THREADS);
        assert_eq!(config.timeout, MAX_TIMEOUT);
    }

    #[test]
    fn test_threads_are_capped() {
        assert_eq!(EngineConfig::default().with_threads(0).threads, 1);
        assert_eq!(EngineConfig::default().with_threads(500).threads, 100);
    }

    #[test]
    fn test_platforms_follow_probe_order() {
        let config = EngineConfig::default().with_platforms([
            Platform::Instagram,
            Platform::Pinterest,
            Platform::Instagram,
        ]);
        assert_eq!(
            config.enabled_platforms,
            vec![Platform::Pinterest, Platform::Instagram]
        );
        assert!(!config.is_enabled(Platform::GitHub));
    }

    #[test]
    fn test_blank_webhook_disables_alerts() {
        let config = EngineConfig::default().with_webhook_url(Some("   "));
        assert!(config.webhook_url.is_none());
    }

    #[test]
    fn test_check_result_hits() {
        let mut result = CheckResult::empty("abc");
        assert!(!result.has_hits());
        assert!(result.nothing_checked());
        result.possibly_available.insert(Platform::GitHub);
        assert!(result.has_hits());
    }
}
