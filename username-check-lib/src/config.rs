//! Settings file parsing and management.
//!
//! Settings live in a nested TOML document read through dotted paths
//! (`platforms.github`). Files are discovered in standard locations and
//! merged with the usual precedence: defaults, then config files, then
//! `UC_*` environment variables. CLI flags are applied last by the caller.

use crate::error::UsernameCheckError;
use crate::types::{clamp_jitter, EngineConfig, Platform, MAX_THREADS};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use toml::{Table, Value};

/// Default proxy list location.
pub const DEFAULT_PROXY_FILE: &str = "proxies.txt";

/// Default proxy blacklist location.
pub const DEFAULT_BLACKLIST_FILE: &str = "bad_proxies.txt";

/// A settings document with typed, defaulted lookups.
///
/// Lookups never fail: a missing key or a value of the wrong type yields
/// the caller's default.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    table: Table,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            table: default_table(),
        }
    }
}

fn default_table() -> Table {
    let defaults = EngineConfig::default();

    let mut platforms = Table::new();
    for platform in Platform::ALL {
        platforms.insert(platform.id().to_string(), Value::Boolean(true));
    }

    let mut pinterest = Table::new();
    pinterest.insert(
        "home_urls".to_string(),
        Value::Array(
            defaults
                .pinterest_home_urls
                .iter()
                .map(|u| Value::String(u.clone()))
                .collect(),
        ),
    );

    let mut table = Table::new();
    table.insert("threads".to_string(), Value::Integer(defaults.threads as i64));
    table.insert(
        "timeout".to_string(),
        Value::Integer(defaults.timeout.as_secs() as i64),
    );
    table.insert("webhook_url".to_string(), Value::String(String::new()));
    table.insert("use_proxies".to_string(), Value::Boolean(defaults.use_proxies));
    table.insert("jitter_min".to_string(), Value::Float(defaults.jitter_min));
    table.insert("jitter_max".to_string(), Value::Float(defaults.jitter_max));
    table.insert("platforms".to_string(), Value::Table(platforms));
    table.insert(
        "inconclusive_below_len".to_string(),
        Value::Integer(defaults.inconclusive_below_len as i64),
    );
    table.insert("pinterest".to_string(), Value::Table(pinterest));
    table.insert(
        "proxy_file".to_string(),
        Value::String(DEFAULT_PROXY_FILE.to_string()),
    );
    table.insert(
        "blacklist_file".to_string(),
        Value::String(DEFAULT_BLACKLIST_FILE.to_string()),
    );
    table
}

impl Settings {
    /// Settings holding only the built-in defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overlaid with a parsed document.
    pub fn from_toml_str(content: &str) -> Result<Self, UsernameCheckError> {
        let parsed: Table = toml::from_str(content).map_err(|e| {
            UsernameCheckError::config(format!("Failed to parse TOML settings: {}", e))
        })?;
        let mut settings = Self::default();
        settings.merge(parsed);
        Ok(settings)
    }

    /// The underlying document.
    pub fn table(&self) -> &Table {
        &self.table
    }

    /// Overlay `higher` onto these settings, recursing into tables.
    pub fn merge(&mut self, higher: Table) {
        merge_tables(&mut self.table, higher);
    }

    /// Look up a dotted path such as `platforms.github`.
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('.');
        let mut current = self.table.get(parts.next()?)?;
        for part in parts {
            current = current.as_table()?.get(part)?;
        }
        Some(current)
    }

    /// Set a dotted path, creating intermediate tables as needed.
    ///
    /// # Errors
    ///
    /// Fails if a path segment is empty or an intermediate key already
    /// holds a non-table value.
    pub fn set<V: Into<Value>>(&mut self, path: &str, value: V) -> Result<(), UsernameCheckError> {
        let parts: Vec<&str> = path.split('.').collect();
        if parts.iter().any(|p| p.is_empty()) {
            return Err(UsernameCheckError::config(format!(
                "Invalid settings key '{}'",
                path
            )));
        }

        let (last, parents) = parts
            .split_last()
            .ok_or_else(|| UsernameCheckError::config("Empty settings key"))?;

        let mut current = &mut self.table;
        for part in parents {
            let entry = current
                .entry(part.to_string())
                .or_insert_with(|| Value::Table(Table::new()));
            current = match entry {
                Value::Table(table) => table,
                _ => {
                    return Err(UsernameCheckError::config(format!(
                        "Settings key '{}' is not a table",
                        part
                    )))
                }
            };
        }
        current.insert(last.to_string(), value.into());
        Ok(())
    }

    pub fn get_bool(&self, path: &str, default: bool) -> bool {
        self.get(path).and_then(Value::as_bool).unwrap_or(default)
    }

    /// Floats and integers both read as `f64`.
    pub fn get_f64(&self, path: &str, default: f64) -> f64 {
        match self.get(path) {
            Some(Value::Float(f)) => *f,
            Some(Value::Integer(i)) => *i as f64,
            _ => default,
        }
    }

    /// Negative values fall back to `default`.
    pub fn get_u64(&self, path: &str, default: u64) -> u64 {
        self.get(path)
            .and_then(Value::as_integer)
            .and_then(|i| u64::try_from(i).ok())
            .unwrap_or(default)
    }

    pub fn get_str(&self, path: &str, default: &str) -> String {
        self.get(path)
            .and_then(Value::as_str)
            .unwrap_or(default)
            .to_string()
    }

    /// An array of strings; non-string items are skipped.
    pub fn get_str_list(&self, path: &str) -> Option<Vec<String>> {
        self.get(path).and_then(Value::as_array).map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(String::from)
                .collect()
        })
    }

    pub fn proxy_file(&self) -> PathBuf {
        PathBuf::from(self.get_str("proxy_file", DEFAULT_PROXY_FILE))
    }

    pub fn blacklist_file(&self) -> PathBuf {
        PathBuf::from(self.get_str("blacklist_file", DEFAULT_BLACKLIST_FILE))
    }

    /// Build a validated engine configuration.
    ///
    /// Threads are capped to 1-100 and the timeout to [`MAX_TIMEOUT`](crate::MAX_TIMEOUT); a
    /// non-positive timeout keeps the default. Negative jitter becomes 0,
    /// jitter above [`MAX_JITTER_SECS`](crate::MAX_JITTER_SECS) is capped and a minimum above the
    /// maximum raises the maximum.
    pub fn to_engine_config(&self) -> EngineConfig {
        let defaults = EngineConfig::default();

        let threads = self.get_u64("threads", defaults.threads as u64);
        let threads = usize::try_from(threads).unwrap_or(MAX_THREADS);
        if !(1..=MAX_THREADS).contains(&threads) {
            tracing::warn!(threads, "threads out of range, clamping to 1-{}", MAX_THREADS);
        }

        let timeout_secs = self.get_f64("timeout", defaults.timeout.as_secs_f64());
        let timeout = if timeout_secs.is_finite() && timeout_secs > 0.0 {
            // Overflowing values are capped by `with_timeout`.
            Duration::try_from_secs_f64(timeout_secs).unwrap_or(Duration::MAX)
        } else {
            tracing::warn!(timeout = timeout_secs, "timeout must be positive, using default");
            defaults.timeout
        };

        let (jitter_min, jitter_max) = clamp_jitter(
            self.get_f64("jitter_min", defaults.jitter_min),
            self.get_f64("jitter_max", defaults.jitter_max),
        );

        let platforms = Platform::ALL
            .into_iter()
            .filter(|p| self.get_bool(&format!("platforms.{}", p.id()), true));

        let webhook = self.get_str("webhook_url", "");
        let mut config = defaults
            .with_threads(threads)
            .with_timeout(timeout)
            .with_proxies(self.get_bool("use_proxies", false))
            .with_jitter(jitter_min, jitter_max)
            .with_platforms(platforms)
            .with_webhook_url(Some(webhook))
            .with_inconclusive_below_len(
                self.get_u64("inconclusive_below_len", 4).try_into().unwrap_or(usize::MAX),
            );
        if let Some(home_urls) = self.get_str_list("pinterest.home_urls") {
            config = config.with_pinterest_home_urls(home_urls);
        }
        config
    }

    /// Write the whole document to `path`.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), UsernameCheckError> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(&self.table)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                UsernameCheckError::file_error(parent.to_string_lossy(), e.to_string())
            })?;
        }
        fs::write(path, content).map_err(|e| {
            UsernameCheckError::file_error(
                path.to_string_lossy(),
                format!("Failed to write settings: {}", e),
            )
        })
    }
}

/// Recursively overlay `higher` onto `lower`; non-table values replace.
fn merge_tables(lower: &mut Table, higher: Table) {
    for (key, value) in higher {
        if let Value::Table(higher_table) = value {
            if let Some(Value::Table(lower_table)) = lower.get_mut(&key) {
                merge_tables(lower_table, higher_table);
            } else {
                lower.insert(key, Value::Table(higher_table));
            }
        } else {
            lower.insert(key, value);
        }
    }
}

/// Settings file discovery and loading.
pub struct ConfigManager {
    /// Whether to report which files were loaded
    pub verbose: bool,
}

impl ConfigManager {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    /// Load settings from a specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, unreadable or not valid TOML.
    pub fn load_file<P: AsRef<Path>>(&self, path: P) -> Result<Settings, UsernameCheckError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(UsernameCheckError::file_error(
                path.to_string_lossy(),
                "Settings file not found",
            ));
        }

        let content = fs::read_to_string(path).map_err(|e| {
            UsernameCheckError::file_error(
                path.to_string_lossy(),
                format!("Failed to read settings file: {}", e),
            )
        })?;

        Settings::from_toml_str(&content)
    }

    /// Load settings from a file, falling back to defaults on any problem.
    pub fn load<P: AsRef<Path>>(&self, path: P) -> Settings {
        let path = path.as_ref();
        match self.load_file(path) {
            Ok(settings) => settings,
            Err(e) => {
                if path.exists() {
                    tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable settings file");
                }
                Settings::default()
            }
        }
    }

    /// Discover settings files and merge them, lowest precedence first:
    /// XDG, home directory, current directory.
    ///
    /// Broken files are skipped with a warning.
    pub fn discover_and_load(&self) -> Settings {
        let mut settings = Settings::default();
        let mut loaded_files = Vec::new();

        let candidates = [
            self.get_xdg_config_path(),
            self.get_global_config_path(),
            self.get_local_config_path(),
        ];

        for path in candidates.into_iter().flatten() {
            match read_table(&path) {
                Ok(table) => {
                    settings.merge(table);
                    loaded_files.push(path);
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping settings file");
                }
            }
        }

        if self.verbose {
            for path in &loaded_files {
                tracing::info!(path = %path.display(), "loaded settings");
            }
        }

        settings
    }

    /// Local settings in the current directory.
    fn get_local_config_path(&self) -> Option<PathBuf> {
        ["./username-check.toml", "./.username-check.toml"]
            .iter()
            .map(PathBuf::from)
            .find(|path| path.exists())
    }

    /// Settings in the user's home directory.
    fn get_global_config_path(&self) -> Option<PathBuf> {
        let home = env::var_os("HOME")?;
        [".username-check.toml", "username-check.toml"]
            .iter()
            .map(|candidate| Path::new(&home).join(candidate))
            .find(|path| path.exists())
    }

    /// Follows the XDG Base Directory Specification.
    fn get_xdg_config_path(&self) -> Option<PathBuf> {
        let config_dir = env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| env::var_os("HOME").map(|home| Path::new(&home).join(".config")))?;

        let path = config_dir.join("username-check").join("config.toml");
        path.exists().then_some(path)
    }
}

fn read_table(path: &Path) -> Result<Table, UsernameCheckError> {
    let content = fs::read_to_string(path)
        .map_err(|e| UsernameCheckError::file_error(path.to_string_lossy(), e.to_string()))?;
    Ok(toml::from_str(&content)?)
}

/// Settings taken from `UC_*` environment variables.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvConfig {
    pub threads: Option<u64>,
    pub timeout: Option<f64>,
    pub webhook_url: Option<String>,
    pub use_proxies: Option<bool>,
    pub jitter_min: Option<f64>,
    pub jitter_max: Option<f64>,
    pub platforms: Option<Vec<Platform>>,
    pub config: Option<String>,
}

impl EnvConfig {
    /// Write the values that were set into `settings`.
    pub fn apply(&self, settings: &mut Settings) -> Result<(), UsernameCheckError> {
        if let Some(threads) = self.threads {
            settings.set("threads", i64::try_from(threads).unwrap_or(i64::MAX))?;
        }
        if let Some(timeout) = self.timeout {
            settings.set("timeout", timeout)?;
        }
        if let Some(url) = &self.webhook_url {
            settings.set("webhook_url", url.as_str())?;
        }
        if let Some(use_proxies) = self.use_proxies {
            settings.set("use_proxies", use_proxies)?;
        }
        if let Some(min) = self.jitter_min {
            settings.set("jitter_min", min)?;
        }
        if let Some(max) = self.jitter_max {
            settings.set("jitter_max", max)?;
        }
        if let Some(platforms) = &self.platforms {
            for platform in Platform::ALL {
                settings.set(
                    &format!("platforms.{}", platform.id()),
                    platforms.contains(&platform),
                )?;
            }
        }
        Ok(())
    }
}

/// Load configuration from the process environment.
///
/// Invalid values are logged as warnings and ignored.
pub fn load_env_config(verbose: bool) -> EnvConfig {
    load_env_config_from(verbose, |key| env::var(key).ok())
}

/// Like [`load_env_config`], reading variables through `lookup`.
pub fn load_env_config_from<F>(verbose: bool, lookup: F) -> EnvConfig
where
    F: Fn(&str) -> Option<String>,
{
    let mut env_config = EnvConfig::default();
    let report = |key: &str, value: &str| {
        if verbose {
            tracing::info!("Using {}={}", key, value);
        }
    };

    if let Some(val) = lookup("UC_THREADS") {
        match val.trim().parse::<u64>() {
            Ok(threads) if threads > 0 && threads <= MAX_THREADS as u64 => {
                env_config.threads = Some(threads);
                report("UC_THREADS", &val);
            }
            _ => tracing::warn!("Invalid UC_THREADS='{}', must be 1-{}", val, MAX_THREADS),
        }
    }

    if let Some(val) = lookup("UC_TIMEOUT") {
        match parse_seconds(&val) {
            Some(secs) if secs > 0.0 => {
                env_config.timeout = Some(secs);
                report("UC_TIMEOUT", &val);
            }
            _ => tracing::warn!("Invalid UC_TIMEOUT='{}', use seconds like '15' or '2.5'", val),
        }
    }

    if let Some(url) = lookup("UC_WEBHOOK_URL") {
        env_config.webhook_url = Some(url.trim().to_string());
        report("UC_WEBHOOK_URL", &url);
    }

    if let Some(val) = lookup("UC_USE_PROXIES") {
        match parse_bool(&val) {
            Some(enabled) => {
                env_config.use_proxies = Some(enabled);
                report("UC_USE_PROXIES", &val);
            }
            None => tracing::warn!("Invalid UC_USE_PROXIES='{}', use true/false", val),
        }
    }

    for (key, slot) in [
        ("UC_JITTER_MIN", &mut env_config.jitter_min),
        ("UC_JITTER_MAX", &mut env_config.jitter_max),
    ] {
        if let Some(val) = lookup(key) {
            match parse_seconds(&val) {
                Some(secs) if secs >= 0.0 => {
                    *slot = Some(secs);
                    report(key, &val);
                }
                _ => tracing::warn!("Invalid {}='{}', must be a non-negative number", key, val),
            }
        }
    }

    if let Some(val) = lookup("UC_PLATFORMS") {
        match parse_platform_list(&val) {
            Ok(platforms) => {
                env_config.platforms = Some(platforms);
                report("UC_PLATFORMS", &val);
            }
            Err(e) => tracing::warn!("Invalid UC_PLATFORMS='{}': {}", val, e),
        }
    }

    if let Some(path) = lookup("UC_CONFIG") {
        if !path.trim().is_empty() {
            env_config.config = Some(path.clone());
            report("UC_CONFIG", &path);
        }
    }

    env_config
}

/// Parse a comma-separated platform list such as `github,instagram`.
pub fn parse_platform_list(list: &str) -> Result<Vec<Platform>, UsernameCheckError> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::parse::<Platform>)
        .collect()
}

fn parse_bool(val: &str) -> Option<bool> {
    match val.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Seconds as a plain number, optionally suffixed with `s`.
fn parse_seconds(val: &str) -> Option<f64> {
    let val = val.trim().to_lowercase();
    let number = val.strip_suffix('s').unwrap_or(&val);
    number.parse::<f64>().ok().filter(|n| n.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MAX_JITTER_SECS, MAX_TIMEOUT};
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    #[test]
    fn test_defaults() {
        let settings = Settings::new();
        assert_eq!(settings.get_u64("threads", 0), 10);
        assert_eq!(settings.get_f64("timeout", 0.0), 15.0);
        assert_eq!(settings.get_str("webhook_url", "x"), "");
        assert!(!settings.get_bool("use_proxies", true));
        assert!(settings.get_bool("platforms.github", false));
        assert_eq!(settings.proxy_file(), PathBuf::from("proxies.txt"));
        assert_eq!(settings.blacklist_file(), PathBuf::from("bad_proxies.txt"));

        let config = settings.to_engine_config();
        assert_eq!(config.threads, 10);
        assert_eq!(config.timeout, Duration::from_secs(15));
        assert_eq!(config.enabled_platforms, Platform::ALL.to_vec());
        assert!(config.webhook_url.is_none());
    }

    #[test]
    fn test_dotted_get_and_set() {
        let mut settings = Settings::new();
        assert!(settings.get("no.such.key").is_none());
        assert_eq!(settings.get_u64("no.such.key", 7), 7);

        settings.set("platforms.instagram", false).unwrap();
        assert!(!settings.get_bool("platforms.instagram", true));

        settings.set("extra.nested.value", "x").unwrap();
        assert_eq!(settings.get_str("extra.nested.value", ""), "x");

        // an existing scalar cannot grow children
        assert!(settings.set("threads.inner", 1).is_err());
        assert!(settings.set("a..b", 1).is_err());
    }

    #[test]
    fn test_wrong_types_fall_back_to_defaults() {
        let settings = Settings::from_toml_str("threads = \"many\"\ntimeout = 2\n").unwrap();
        assert_eq!(settings.get_u64("threads", 10), 10);
        assert_eq!(settings.get_f64("timeout", 15.0), 2.0);
    }

    #[test]
    fn test_load_valid_file() {
        let config_content = r#"
threads = 25
timeout = 7.5
webhook_url = "https://discord.com/api/webhooks/1/abc"
use_proxies = true
jitter_min = 0.1
jitter_max = 0.2

[platforms]
pinterest = false

[pinterest]
home_urls = ["https://de.pinterest.com/"]
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(config_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let manager = ConfigManager::new(false);
        let settings = manager.load_file(temp_file.path()).unwrap();
        let config = settings.to_engine_config();

        assert_eq!(config.threads, 25);
        assert_eq!(config.timeout, Duration::from_millis(7500));
        assert!(config.use_proxies);
        assert_eq!(config.jitter_min, 0.1);
        assert_eq!(config.jitter_max, 0.2);
        assert_eq!(config.enabled_platforms, vec![Platform::GitHub, Platform::Instagram]);
        assert_eq!(
            config.webhook_url.as_deref(),
            Some("https://discord.com/api/webhooks/1/abc")
        );
        assert_eq!(config.pinterest_home_urls, vec!["https://de.pinterest.com"]);
        // untouched keys keep their defaults
        assert_eq!(config.inconclusive_below_len, 4);
    }

    #[test]
    fn test_load_file_errors_but_load_fails_soft() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"threads = [unclosed").unwrap();
        temp_file.flush().unwrap();

        let manager = ConfigManager::new(false);
        assert!(manager.load_file(temp_file.path()).is_err());
        assert!(manager.load_file("/definitely/not/here.toml").is_err());

        assert_eq!(manager.load(temp_file.path()), Settings::default());
        assert_eq!(manager.load("/definitely/not/here.toml"), Settings::default());
    }

    #[test]
    fn test_clamping() {
        let settings = Settings::from_toml_str(
            "threads = 500\ntimeout = 0\njitter_min = 3.0\njitter_max = 1.0\n",
        )
        .unwrap();
        let config = settings.to_engine_config();
        assert_eq!(config.threads, MAX_THREADS);
        assert_eq!(config.timeout, Duration::from_secs(15));
        assert_eq!((config.jitter_min, config.jitter_max), (3.0, 3.0));

        let settings = Settings::from_toml_str("threads = 0\njitter_min = -1\n").unwrap();
        let config = settings.to_engine_config();
        assert_eq!(config.threads, 1);
        assert_eq!(config.jitter_min, 0.0);
    }

    #[test]
    fn test_huge_values_are_capped() {
        let settings = Settings::from_toml_str("timeout = 1e300
jitter_max = 1e300
").unwrap();
        let config = settings.to_engine_config();
        assert_eq!(config.timeout, MAX_TIMEOUT);
        assert_eq!(config.jitter_max, MAX_JITTER_SECS);

        let (_, max) = config.jitter_bounds();
        assert_eq!(max, Duration::from_secs_f64(MAX_JITTER_SECS));

        let settings = Settings::from_toml_str("timeout = 86400
jitter_min = 1e300
").unwrap();
        let config = settings.to_engine_config();
        assert_eq!(config.timeout, MAX_TIMEOUT);
        assert_eq!((config.jitter_min, config.jitter_max), (MAX_JITTER_SECS, MAX_JITTER_SECS));
    }

    #[test]
    fn test_merge_settings() {
        let mut settings = Settings::from_toml_str("threads = 10\n[platforms]\ngithub = false\n").unwrap();
        let higher: Table = toml::from_str("threads = 25\n[platforms]\ninstagram = false\n").unwrap();
        settings.merge(higher);

        assert_eq!(settings.get_u64("threads", 0), 25); // higher wins
        assert!(!settings.get_bool("platforms.github", true)); // lower preserved
        assert!(!settings.get_bool("platforms.instagram", true));
        assert!(settings.get_bool("platforms.pinterest", false));
    }

    #[test]
    fn test_save_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("settings.toml");

        let mut settings = Settings::new();
        settings.set("threads", 42).unwrap();
        settings.set("platforms.pinterest", false).unwrap();
        settings.save(&path).unwrap();

        let loaded = ConfigManager::new(false).load_file(&path).unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_env_config() {
        let vars: HashMap<&str, &str> = [
            ("UC_THREADS", "20"),
            ("UC_TIMEOUT", "5s"),
            ("UC_USE_PROXIES", "yes"),
            ("UC_JITTER_MIN", "0"),
            ("UC_JITTER_MAX", "0.25"),
            ("UC_PLATFORMS", "github, instagram"),
            ("UC_WEBHOOK_URL", "https://example.com/hook"),
        ]
        .into_iter()
        .collect();

        let env_config = load_env_config_from(false, |k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(env_config.threads, Some(20));
        assert_eq!(env_config.timeout, Some(5.0));
        assert_eq!(env_config.use_proxies, Some(true));
        assert_eq!(env_config.jitter_max, Some(0.25));
        assert_eq!(
            env_config.platforms,
            Some(vec![Platform::GitHub, Platform::Instagram])
        );

        let mut settings = Settings::new();
        env_config.apply(&mut settings).unwrap();
        let config = settings.to_engine_config();
        assert_eq!(config.threads, 20);
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.jitter_bounds(), (Duration::ZERO, Duration::from_millis(250)));
        assert_eq!(config.enabled_platforms, vec![Platform::GitHub, Platform::Instagram]);
        assert_eq!(config.webhook_url.as_deref(), Some("https://example.com/hook"));
    }

    #[test]
    fn test_invalid_env_values_are_ignored() {
        let vars: HashMap<&str, &str> = [
            ("UC_THREADS", "0"),
            ("UC_TIMEOUT", "soon"),
            ("UC_USE_PROXIES", "maybe"),
            ("UC_JITTER_MIN", "-2"),
            ("UC_PLATFORMS", "github,myspace"),
        ]
        .into_iter()
        .collect();

        let env_config = load_env_config_from(false, |k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(env_config, EnvConfig::default());
    }

    #[test]
    fn test_parse_seconds() {
        assert_eq!(parse_seconds("5s"), Some(5.0));
        assert_eq!(parse_seconds("2.5"), Some(2.5));
        assert_eq!(parse_seconds(" 30S "), Some(30.0));
        assert_eq!(parse_seconds("invalid"), None);
    }
}
