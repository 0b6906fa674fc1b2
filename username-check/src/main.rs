//! Username Check CLI Application
//!
//! A command-line interface for checking whether usernames are free on
//! Pinterest, GitHub and Instagram. This CLI drives the username-check-lib
//! engine in bulk or monitor mode and manages its proxy list.

mod ui;

use clap::builder::styling::{AnsiColor, Effects, Styles};
use clap::Parser;
use std::collections::HashSet;
use std::path::Path;
use std::process;
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::EnvFilter;
use username_check_lib::{
    load_env_config, parse_platform_list, parse_username_list, require_format,
    validate_proxy_address, CheckEngine, ConfigManager, EngineConfig, Platform, ProxyPool,
    Settings, WebhookDispatcher, DEFAULT_PROXY_TEST_URL, MAX_JITTER_SECS, MAX_THREADS, MAX_TIMEOUT,
};

const STYLES: Styles = Styles::styled()
    .header(AnsiColor::Yellow.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Yellow.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

/// Workers used by `--check-proxies`
const PROXY_CHECK_WORKERS: usize = 20;

/// CLI arguments for username-check
#[derive(Parser, Debug)]
#[command(name = "username-check")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Check username availability on Pinterest, GitHub and Instagram")]
#[command(
    long_about = "Check whether usernames are free on Pinterest, GitHub and Instagram.\n\nSupports parallel bulk checks, monitoring a single name, rotating proxies and webhook alerts."
)]
#[command(styles = STYLES)]
pub struct Args {
    /// Usernames to check
    #[arg(value_name = "USERNAMES", help_heading = "Username Selection")]
    pub usernames: Vec<String>,

    /// Input file with usernames (one per line, # for comments)
    #[arg(
        short = 'f',
        long = "file",
        value_name = "FILE",
        help_heading = "Username Selection"
    )]
    pub file: Option<String>,

    /// Keep checking one username until interrupted
    #[arg(long = "monitor", value_name = "NAME", help_heading = "Monitor Mode")]
    pub monitor: Option<String>,

    /// Seconds between monitor checks
    #[arg(
        long = "interval",
        value_name = "SECS",
        default_value = "60",
        help_heading = "Monitor Mode"
    )]
    pub interval: u64,

    /// Platforms to check (comma-separated: pinterest, github, instagram)
    #[arg(
        short = 'p',
        long = "platforms",
        value_name = "LIST",
        value_delimiter = ',',
        help_heading = "Platforms"
    )]
    pub platforms: Option<Vec<String>>,

    /// List supported platforms and exit
    #[arg(long = "list-platforms", help_heading = "Platforms")]
    pub list_platforms: bool,

    /// Parallel checks in bulk mode (1-100)
    #[arg(short = 't', long = "threads", help_heading = "Performance")]
    pub threads: Option<usize>,

    /// Per-request timeout in seconds
    #[arg(long = "timeout", value_name = "SECS", help_heading = "Performance")]
    pub timeout: Option<f64>,

    /// Minimum random delay before each request, in seconds
    #[arg(long = "jitter-min", value_name = "SECS", help_heading = "Performance")]
    pub jitter_min: Option<f64>,

    /// Maximum random delay before each request, in seconds
    #[arg(long = "jitter-max", value_name = "SECS", help_heading = "Performance")]
    pub jitter_max: Option<f64>,

    /// Route requests through the proxy list
    #[arg(long = "proxies", help_heading = "Proxies")]
    pub proxies: bool,

    /// Proxy list file (default: proxies.txt)
    #[arg(long = "proxy-file", value_name = "FILE", help_heading = "Proxies")]
    pub proxy_file: Option<String>,

    /// Add a proxy to the list (repeatable)
    #[arg(long = "add-proxy", value_name = "PROXY", action = clap::ArgAction::Append, help_heading = "Proxies")]
    pub add_proxy: Vec<String>,

    /// Remove a proxy from the list (repeatable)
    #[arg(long = "remove-proxy", value_name = "PROXY", action = clap::ArgAction::Append, help_heading = "Proxies")]
    pub remove_proxy: Vec<String>,

    /// Test every proxy and update the blacklist
    #[arg(long = "check-proxies", help_heading = "Proxies")]
    pub check_proxies: bool,

    /// Drop blacklisted proxies from the list
    #[arg(long = "remove-bad-proxies", help_heading = "Proxies")]
    pub remove_bad_proxies: bool,

    /// Forget every blacklisted proxy
    #[arg(long = "clear-blacklist", help_heading = "Proxies")]
    pub clear_blacklist: bool,

    /// Webhook URL for availability alerts
    #[arg(long = "webhook", value_name = "URL", help_heading = "Webhook")]
    pub webhook: Option<String>,

    /// Send a test message to the webhook and exit
    #[arg(long = "test-webhook", help_heading = "Webhook")]
    pub test_webhook: bool,

    /// Output one JSON record per line
    #[arg(short = 'j', long = "json", help_heading = "Output Format")]
    pub json: bool,

    /// Use specific config file instead of automatic discovery
    #[arg(long = "config", value_name = "FILE", help_heading = "Configuration")]
    pub config: Option<String>,

    /// Show debug logging
    #[arg(short = 'd', long = "debug", help_heading = "Configuration")]
    pub debug: bool,

    /// Verbose logging
    #[arg(short = 'v', long = "verbose", help_heading = "Configuration")]
    pub verbose: bool,
}

impl Args {
    fn has_proxy_operations(&self) -> bool {
        !self.add_proxy.is_empty()
            || !self.remove_proxy.is_empty()
            || self.check_proxies
            || self.remove_bad_proxies
            || self.clear_blacklist
    }

    fn has_check_targets(&self) -> bool {
        !self.usernames.is_empty() || self.file.is_some() || self.monitor.is_some()
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Validate arguments
    if let Err(e) = validate_args(&args) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }

    // Handle --list-platforms early
    if args.list_platforms {
        ui::print_platforms();
        return;
    }

    init_tracing(&args);
    tracing::debug!("username-check v{} starting", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(args).await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn validate_args(args: &Args) -> Result<(), String> {
    // --list-platforms is self-contained, skip other validation
    if args.list_platforms {
        return Ok(());
    }

    if !args.has_check_targets() && !args.has_proxy_operations() && !args.test_webhook {
        return Err(
            "You must specify usernames, a file with --file, a name with --monitor, or a proxy/webhook operation"
                .to_string(),
        );
    }

    if args.monitor.is_some() && (!args.usernames.is_empty() || args.file.is_some()) {
        return Err("Cannot combine --monitor with usernames or --file".to_string());
    }

    if args.interval == 0 {
        return Err("Interval must be at least 1 second".to_string());
    }

    if let Some(threads) = args.threads {
        if threads == 0 || threads > MAX_THREADS {
            return Err(format!("Threads must be between 1 and {}", MAX_THREADS));
        }
    }

    if let Some(timeout) = args.timeout {
        if !timeout.is_finite() || timeout <= 0.0 {
            return Err("Timeout must be a positive number of seconds".to_string());
        }
        if timeout > MAX_TIMEOUT.as_secs_f64() {
            return Err(format!("Timeout must be at most {} seconds", MAX_TIMEOUT.as_secs()));
        }
    }

    for (flag, value) in [("--jitter-min", args.jitter_min), ("--jitter-max", args.jitter_max)] {
        if let Some(value) = value {
            if !value.is_finite() || value < 0.0 {
                return Err(format!("{} must be a non-negative number", flag));
            }
            if value > MAX_JITTER_SECS {
                return Err(format!("{} must be at most {} seconds", flag, MAX_JITTER_SECS));
            }
        }
    }

    if let Some(platforms) = &args.platforms {
        let platforms = parse_platform_list(&platforms.join(",")).map_err(|e| e.to_string())?;
        if platforms.is_empty() {
            return Err("At least one platform must be enabled".to_string());
        }
    }

    for proxy in &args.add_proxy {
        validate_proxy_address(proxy).map_err(|e| format!("Invalid proxy '{}': {}", proxy, e))?;
    }

    Ok(())
}

/// Logs go to stderr so stdout stays clean for results.
fn init_tracing(args: &Args) {
    let filter = if args.debug {
        EnvFilter::new("debug")
    } else {
        let default_level = if args.verbose { "info" } else { "warn" };
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Main username checking logic
async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let settings = build_settings(&args)?;
    let config = settings.to_engine_config();

    let pool = Arc::new(ProxyPool::with_files(
        settings.proxy_file(),
        settings.blacklist_file(),
    ));
    pool.load();

    if args.has_proxy_operations() {
        run_proxy_operations(&args, &pool, &config).await?;
    }

    if args.test_webhook {
        let dispatcher = WebhookDispatcher::new(config.webhook_url.clone(), Arc::clone(&pool));
        dispatcher.send_test().await?;
        println!("{}", console::style("Webhook test sent successfully").green());
    }

    if !args.has_check_targets() {
        return Ok(());
    }

    let engine = CheckEngine::with_pool(Arc::clone(&pool), config)?;

    // Ctrl-C stops the run; results already delivered are kept
    let stopper = engine.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!();
            tracing::info!("interrupted, stopping");
            stopper.stop();
        }
    });

    match &args.monitor {
        Some(username) => run_monitor(&args, &engine, username).await,
        None => run_bulk(&args, &engine).await,
    }
}

/// Build settings with precedence: defaults < config file < UC_* env < CLI.
fn build_settings(args: &Args) -> Result<Settings, Box<dyn std::error::Error>> {
    let config_manager = ConfigManager::new(args.verbose);
    let env_config = load_env_config(args.verbose);

    let mut settings = if let Some(explicit_config_path) = &args.config {
        tracing::info!("Using explicit config file (CLI --config): {}", explicit_config_path);
        config_manager
            .load_file(explicit_config_path)
            .map_err(|e| format!("Failed to load config file '{}': {}", explicit_config_path, e))?
    } else if let Some(env_config_path) = &env_config.config {
        tracing::info!("Using explicit config file (UC_CONFIG env var): {}", env_config_path);
        config_manager
            .load_file(env_config_path)
            .map_err(|e| format!("Failed to load config file '{}': {}", env_config_path, e))?
    } else {
        config_manager.discover_and_load()
    };

    env_config.apply(&mut settings)?;
    apply_cli_args(&mut settings, args)?;
    Ok(settings)
}

/// Apply CLI arguments (highest precedence). Only flags the user passed override.
fn apply_cli_args(settings: &mut Settings, args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(threads) = args.threads {
        settings.set("threads", threads as i64)?;
    }
    if let Some(timeout) = args.timeout {
        settings.set("timeout", timeout)?;
    }
    if let Some(min) = args.jitter_min {
        settings.set("jitter_min", min)?;
    }
    if let Some(max) = args.jitter_max {
        settings.set("jitter_max", max)?;
    }
    if let Some(platforms) = &args.platforms {
        let enabled = parse_platform_list(&platforms.join(","))?;
        for platform in Platform::ALL {
            settings.set(
                &format!("platforms.{}", platform.id()),
                enabled.contains(&platform),
            )?;
        }
    }
    if let Some(url) = &args.webhook {
        settings.set("webhook_url", url.as_str())?;
    }
    if args.proxies {
        settings.set("use_proxies", true)?;
    }
    if let Some(path) = &args.proxy_file {
        settings.set("proxy_file", path.as_str())?;
    }
    Ok(())
}

async fn run_proxy_operations(
    args: &Args,
    pool: &ProxyPool,
    config: &EngineConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    for proxy in &args.add_proxy {
        if pool.add(proxy) {
            println!("Added proxy {}", proxy);
        } else {
            println!("Proxy {} is already listed", proxy);
        }
    }

    for proxy in &args.remove_proxy {
        if pool.remove(proxy) {
            println!("Removed proxy {}", proxy);
        } else {
            return Err(format!("Proxy '{}' is not in the list", proxy).into());
        }
    }

    if args.clear_blacklist {
        pool.clear_blacklist();
        println!("Proxy blacklist cleared");
    }

    if args.check_proxies {
        if pool.is_empty() {
            println!("No proxies to check");
        } else {
            let spinner = (!args.json)
                .then(|| ui::Spinner::start(format!("Checking {} proxies...", pool.len())));
            let health = pool
                .check_all(DEFAULT_PROXY_TEST_URL, config.timeout, PROXY_CHECK_WORKERS)
                .await;
            if let Some(spinner) = spinner {
                spinner.stop().await;
            }

            if args.json {
                for entry in &health {
                    println!(
                        "{}",
                        serde_json::json!({
                            "proxy": entry.address,
                            "healthy": entry.healthy,
                            "detail": entry.detail,
                        })
                    );
                }
            } else {
                ui::print_proxy_health(&health);
            }
        }
    }

    if args.remove_bad_proxies {
        let removed = pool.remove_blacklisted();
        println!(
            "Removed {} blacklisted prox{}",
            removed.len(),
            if removed.len() == 1 { "y" } else { "ies" }
        );
    }

    pool.save()?;
    Ok(())
}

async fn run_bulk(args: &Args, engine: &CheckEngine) -> Result<(), Box<dyn std::error::Error>> {
    let usernames = get_usernames_to_check(args)?;
    let total = usernames.len();
    let config = engine.config();

    if !args.json {
        ui::print_header(total, &config);
    }

    let start = Instant::now();
    let mut tally = ui::Tally::default();
    let json = args.json;
    let summary = engine
        .run_bulk(usernames, |result| {
            tally.record(&result);
            if json {
                print_json(&result);
            } else {
                ui::print_result(&result, Some((tally.total(), total)));
            }
        })
        .await?;

    if !json {
        println!();
        ui::print_summary(&tally, start.elapsed());
        if summary.cancelled {
            println!(
                "  {}",
                console::style(format!("Stopped after {} of {} usernames", summary.checked, total)).yellow()
            );
        }
    }
    Ok(())
}

async fn run_monitor(
    args: &Args,
    engine: &CheckEngine,
    username: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    require_format(username)?;

    if !args.json {
        ui::print_monitor_header(username, args.interval, &engine.config());
    }

    let json = args.json;
    let summary = engine
        .run_monitor(
            username,
            |result| {
                if json {
                    print_json(&result);
                } else {
                    ui::print_monitor_line(&result);
                }
            },
            args.interval,
        )
        .await?;

    if !json {
        println!(
            "  {}",
            console::style(format!(
                "Monitor stopped after {} check{} ({} with hits)",
                summary.checked,
                if summary.checked == 1 { "" } else { "s" },
                summary.with_hits
            ))
            .dim()
        );
    }
    Ok(())
}

fn print_json(result: &username_check_lib::CheckResult) {
    match serde_json::to_string(result) {
        Ok(line) => println!("{}", line),
        Err(e) => tracing::warn!(username = %result.username, error = %e, "failed to serialize result"),
    }
}

/// Collect usernames from args and file, dropping invalid and repeated entries.
fn get_usernames_to_check(args: &Args) -> Result<Vec<String>, Box<dyn std::error::Error>> {
    let mut raw: Vec<String> = args.usernames.iter().map(|u| u.trim().to_string()).collect();

    if let Some(file) = &args.file {
        raw.extend(read_usernames_from_file(Path::new(file))?);
    }

    let mut seen = HashSet::new();
    let mut usernames = Vec::new();
    for username in raw {
        if let Err(e) = require_format(&username) {
            eprintln!("{} {}", console::style("Skipping:").yellow(), e);
            continue;
        }
        if seen.insert(username.clone()) {
            usernames.push(username);
        }
    }

    if usernames.is_empty() {
        return Err("No valid usernames to check".into());
    }
    Ok(usernames)
}

fn read_usernames_from_file(path: &Path) -> Result<Vec<String>, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read '{}': {}", path.display(), e))?;
    Ok(parse_username_list(&content))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("username-check").chain(argv.iter().copied())).unwrap()
    }

    #[test]
    fn test_validate_requires_work() {
        assert!(validate_args(&parse(&[])).is_err());
        assert!(validate_args(&parse(&["octocat"])).is_ok());
        assert!(validate_args(&parse(&["--clear-blacklist"])).is_ok());
        assert!(validate_args(&parse(&["--test-webhook"])).is_ok());
        assert!(validate_args(&parse(&["--list-platforms"])).is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(validate_args(&parse(&["a", "--threads", "0"])).is_err());
        assert!(validate_args(&parse(&["a", "--threads", "101"])).is_err());
        assert!(validate_args(&parse(&["a", "--timeout", "0"])).is_err());
        assert!(validate_args(&parse(&["a", "--timeout", "1e20"])).is_err());
        assert!(validate_args(&parse(&["a", "--timeout", "600"])).is_ok());
        assert!(validate_args(&parse(&["a", "--jitter-max", "1e300"])).is_err());
        assert!(validate_args(&parse(&["a", "--jitter-min", "-1"])).is_err());
        assert!(validate_args(&parse(&["a", "--platforms", "github,myspace"])).is_err());
        assert!(validate_args(&parse(&["--add-proxy", "no-port"])).is_err());
        assert!(validate_args(&parse(&["a", "--monitor", "b"])).is_err());
        assert!(validate_args(&parse(&["--monitor", "b", "--interval", "0"])).is_err());
    }

    #[test]
    fn test_cli_args_override_settings() {
        let args = parse(&[
            "a",
            "--threads",
            "3",
            "--timeout",
            "2.5",
            "--jitter-min",
            "0",
            "--jitter-max",
            "0.1",
            "--platforms",
            "github",
            "--webhook",
            "https://example.com/hook",
            "--proxies",
        ]);
        let mut settings = Settings::new();
        apply_cli_args(&mut settings, &args).unwrap();
        let config = settings.to_engine_config();

        assert_eq!(config.threads, 3);
        assert_eq!(config.timeout, Duration::from_millis(2500));
        assert_eq!(config.jitter_max, 0.1);
        assert_eq!(config.enabled_platforms, vec![Platform::GitHub]);
        assert_eq!(config.webhook_url.as_deref(), Some("https://example.com/hook"));
        assert!(config.use_proxies);
    }

    #[test]
    fn test_unset_flags_keep_settings() {
        let mut settings = Settings::new();
        settings.set("threads", 42).unwrap();
        apply_cli_args(&mut settings, &parse(&["a"])).unwrap();
        assert_eq!(settings.to_engine_config().threads, 42);
        assert!(!settings.to_engine_config().use_proxies);
    }

    #[test]
    fn test_usernames_are_validated_and_deduplicated() {
        let args = parse(&["alice", "bad name", "bob", "alice"]);
        assert_eq!(get_usernames_to_check(&args).unwrap(), vec!["alice", "bob"]);

        let args = parse(&["bad name!"]);
        assert!(get_usernames_to_check(&args).is_err());
    }
}
