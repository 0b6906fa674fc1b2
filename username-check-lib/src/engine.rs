//! Check engine.
//!
//! This module provides the `CheckEngine` that runs probes across platforms
//! for a username, aggregates the verdicts, fires webhook alerts and drives
//! the bulk and monitor run modes.

use crate::error::UsernameCheckError;
use crate::probes::{PlatformProbe, Probe};
use crate::proxy::ProxyPool;
use crate::types::{
    CheckResult, EngineConfig, EngineState, Platform, ProbeVerdict, RunMode, RunSummary,
};
use crate::validator::is_plausible;
use crate::webhook::WebhookDispatcher;
use chrono::Local;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::sync::{mpsc, Notify, Semaphore};

/// Orchestrates username checks across platforms.
///
/// The engine is cheap to clone; clones share state, so a clone handed to a
/// signal handler can `stop()` a run driven from another task.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use username_check_lib::{CheckEngine, EngineConfig, ProxyPool};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let pool = Arc::new(ProxyPool::new());
///     let engine = CheckEngine::with_pool(pool, EngineConfig::default())?;
///     let usernames = vec!["octocat".to_string(), "some-free-name".to_string()];
///     engine
///         .run_bulk(usernames, |result| {
///             println!("{}: {:?}", result.username, result.available_on);
///         })
///         .await?;
///     Ok(())
/// }
/// ```
pub struct CheckEngine<P: Probe = PlatformProbe> {
    inner: Arc<EngineInner<P>>,
}

impl<P: Probe> Clone for CheckEngine<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct EngineInner<P> {
    /// Probe used for every platform check
    probe: P,
    /// Shared proxy pool, also used for webhook sends
    pool: Arc<ProxyPool>,
    /// Settings for the next run
    config: RwLock<EngineConfig>,
    /// Sole cancellation signal
    active: AtomicBool,
    mode: Mutex<Option<RunMode>>,
    /// Wakes a bulk consumer waiting on results when `stop()` is called
    stop_signal: Notify,
    /// Worker gate of the running bulk run
    workers: Mutex<Option<Arc<Semaphore>>>,
}

impl CheckEngine<PlatformProbe> {
    /// Create an engine with the HTTP probe, drawing proxies from `pool`.
    pub fn with_pool(pool: Arc<ProxyPool>, config: EngineConfig) -> Result<Self, UsernameCheckError> {
        let probe = PlatformProbe::new(Arc::clone(&pool))?;
        Ok(Self::new(probe, pool, config))
    }
}

impl<P: Probe> CheckEngine<P> {
    /// Create an engine around any probe implementation.
    pub fn new(probe: P, pool: Arc<ProxyPool>, config: EngineConfig) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                probe,
                pool,
                config: RwLock::new(config),
                active: AtomicBool::new(false),
                mode: Mutex::new(None),
                stop_signal: Notify::new(),
                workers: Mutex::new(None),
            }),
        }
    }

    /// Snapshot of the current configuration.
    pub fn config(&self) -> EngineConfig {
        self.inner
            .config
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Replace the configuration.
    ///
    /// Runs take a snapshot when they start, so a change made mid-run
    /// applies to the next run.
    pub fn set_config(&self, config: EngineConfig) {
        *self
            .inner
            .config
            .write()
            .unwrap_or_else(|e| e.into_inner()) = config;
    }

    pub fn pool(&self) -> &Arc<ProxyPool> {
        &self.inner.pool
    }

    pub fn probe(&self) -> &P {
        &self.inner.probe
    }

    pub fn is_active(&self) -> bool {
        self.inner.is_active()
    }

    pub fn state(&self) -> EngineState {
        EngineState {
            active: self.is_active(),
            mode: *self.inner.mode.lock().unwrap_or_else(|e| e.into_inner()),
        }
    }

    /// Check one username on every enabled, plausible platform.
    ///
    /// Returns `None` when the engine is not running, which makes a check
    /// issued after `stop()` a no-op. Use [`run_bulk`](Self::run_bulk) with
    /// a single username to check it outside a run.
    pub async fn check_target(&self, username: &str) -> Option<CheckResult> {
        let config = self.config();
        let dispatcher = self.inner.dispatcher_for(&config);
        self.inner.check(username, &config, &dispatcher).await
    }

    /// Check a list of usernames in parallel.
    ///
    /// At most `threads` checks run at once. `on_result` is called once per
    /// finished check, in completion order. After `stop()` no new check
    /// starts and the call returns without waiting for checks in flight;
    /// their results are dropped.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyRunning` if a bulk or monitor run is in progress.
    pub async fn run_bulk<I, F>(&self, usernames: I, mut on_result: F) -> Result<RunSummary, UsernameCheckError>
    where
        I: IntoIterator<Item = String>,
        F: FnMut(CheckResult) + Send,
    {
        let config = self.begin(RunMode::Bulk)?;
        let dispatcher = Arc::new(self.inner.dispatcher_for(&config));
        let config = Arc::new(config);

        let workers = Arc::new(Semaphore::new(config.threads));
        *self.inner.workers.lock().unwrap_or_else(|e| e.into_inner()) = Some(Arc::clone(&workers));

        let usernames: Vec<String> = usernames.into_iter().collect();
        tracing::info!(count = usernames.len(), threads = config.threads, "bulk run started");

        let (tx, mut rx) = mpsc::channel(usernames.len().max(1));
        for username in usernames {
            let inner = Arc::clone(&self.inner);
            let workers = Arc::clone(&workers);
            let config = Arc::clone(&config);
            let dispatcher = Arc::clone(&dispatcher);
            let tx = tx.clone();

            tokio::spawn(async move {
                // the gate is closed by stop()
                let Ok(_permit) = workers.acquire_owned().await else {
                    return;
                };
                if let Some(result) = inner.check(&username, &config, &dispatcher).await {
                    let _ = tx.send(result).await;
                }
            });
        }
        drop(tx);

        let mut summary = RunSummary {
            mode: RunMode::Bulk,
            checked: 0,
            with_hits: 0,
            cancelled: false,
        };

        loop {
            let stopped = self.inner.stop_signal.notified();
            tokio::pin!(stopped);
            stopped.as_mut().enable();

            if !self.is_active() {
                summary.cancelled = true;
                break;
            }

            tokio::select! {
                biased;
                _ = &mut stopped => {
                    summary.cancelled = true;
                    break;
                }
                received = rx.recv() => match received {
                    Some(result) => {
                        summary.checked += 1;
                        if result.has_hits() {
                            summary.with_hits += 1;
                        }
                        on_result(result);
                    }
                    None => break,
                },
            }
        }

        self.finish();
        tracing::info!(
            checked = summary.checked,
            with_hits = summary.with_hits,
            cancelled = summary.cancelled,
            "bulk run finished"
        );
        Ok(summary)
    }

    /// Check one username repeatedly until stopped.
    ///
    /// Each cycle checks, reports the result, then waits `interval_secs`
    /// (at least 1) in one-second steps so a stop is noticed within a second.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyRunning` if a bulk or monitor run is in progress.
    pub async fn run_monitor<F>(
        &self,
        username: &str,
        mut on_result: F,
        interval_secs: u64,
    ) -> Result<RunSummary, UsernameCheckError>
    where
        F: FnMut(CheckResult) + Send,
    {
        let config = self.begin(RunMode::Monitor)?;
        let dispatcher = self.inner.dispatcher_for(&config);
        let interval_secs = interval_secs.max(1);
        tracing::info!(username, interval_secs, "monitor started");

        let mut summary = RunSummary {
            mode: RunMode::Monitor,
            checked: 0,
            with_hits: 0,
            cancelled: false,
        };

        'cycles: while self.is_active() {
            if let Some(result) = self.inner.check(username, &config, &dispatcher).await {
                summary.checked += 1;
                if result.has_hits() {
                    summary.with_hits += 1;
                }
                on_result(result);
            }

            for _ in 0..interval_secs {
                if !self.is_active() {
                    break 'cycles;
                }
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }

        summary.cancelled = true;
        self.finish();
        tracing::info!(username, checks = summary.checked, "monitor stopped");
        Ok(summary)
    }

    /// Stop the current run.
    ///
    /// No new checks start and loops exit at their next check point. Checks
    /// already talking to the network are not interrupted. Safe to call any
    /// number of times, running or not.
    pub fn stop(&self) {
        let was_active = self.inner.active.swap(false, Ordering::SeqCst);
        if let Some(workers) = self
            .inner
            .workers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
        {
            workers.close();
        }
        self.inner.stop_signal.notify_waiters();
        if was_active {
            tracing::info!("stop requested");
        }
    }

    fn begin(&self, mode: RunMode) -> Result<EngineConfig, UsernameCheckError> {
        if self
            .inner
            .active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(UsernameCheckError::AlreadyRunning);
        }
        *self.inner.mode.lock().unwrap_or_else(|e| e.into_inner()) = Some(mode);

        let config = self.config().normalized();
        self.inner.pool.set_enabled(config.use_proxies);
        Ok(config)
    }

    fn finish(&self) {
        *self.inner.workers.lock().unwrap_or_else(|e| e.into_inner()) = None;
        *self.inner.mode.lock().unwrap_or_else(|e| e.into_inner()) = None;
        self.inner.active.store(false, Ordering::SeqCst);
    }
}

impl<P: Probe> EngineInner<P> {
    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    fn dispatcher_for(&self, config: &EngineConfig) -> WebhookDispatcher {
        WebhookDispatcher::new(config.webhook_url.clone(), Arc::clone(&self.pool))
    }

    async fn check(
        &self,
        username: &str,
        config: &EngineConfig,
        dispatcher: &WebhookDispatcher,
    ) -> Option<CheckResult> {
        if !self.is_active() {
            return None;
        }

        let mut result = CheckResult::empty(username);
        let platforms: Vec<Platform> = config
            .enabled_platforms
            .iter()
            .copied()
            .filter(|platform| is_plausible(*platform, username))
            .collect();

        if platforms.is_empty() {
            tracing::debug!(username, "no plausible platform to check");
            return Some(result);
        }
        result.checked_platforms.extend(platforms.iter().copied());

        let short = config.inconclusive_below_len > 0
            && username.chars().count() < config.inconclusive_below_len;

        for platform in platforms {
            match self.probe.check(platform, username, config).await {
                Ok(ProbeVerdict::Available) => {
                    result.available_on.insert(platform);
                }
                Ok(ProbeVerdict::Inconclusive) => {
                    result.possibly_available.insert(platform);
                }
                Ok(ProbeVerdict::Taken) => {}
                Err(e) if short => {
                    tracing::warn!(
                        platform = %platform,
                        username,
                        error = %e,
                        "check failed on a short username, reporting as possibly available"
                    );
                    result.possibly_available.insert(platform);
                }
                Err(e) => {
                    tracing::warn!(platform = %platform, username, error = %e, "check failed, skipping platform");
                }
            }
        }

        result.timestamp = Local::now();
        if result.has_hits() {
            dispatcher.dispatch(&result).await;
        }
        Some(result)
    }
}
