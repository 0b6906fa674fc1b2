//! Terminal display logic for the username-check CLI.
//!
//! Colored result lines, headers, the proxy health table, the spinner and
//! the closing summary. Uses only the `console` crate.

use console::{pad_str, style, Alignment, Term};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use username_check_lib::{CheckResult, EngineConfig, Platform, ProxyHealth};

// ── Spinner ──────────────────────────────────────────────────────────────────

const SPINNER_FRAMES: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// An async braille-dot spinner that writes to stderr so stdout stays clean.
pub struct Spinner {
    running: Arc<AtomicBool>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl Spinner {
    /// Start a new spinner with the given message (e.g. "Checking 8 proxies...").
    pub fn start(message: String) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let running_clone = running.clone();

        let handle = tokio::spawn(async move {
            let term = Term::stderr();
            let mut idx = 0usize;
            while running_clone.load(Ordering::Relaxed) {
                let frame = SPINNER_FRAMES[idx % SPINNER_FRAMES.len()];
                let _ = term.clear_line();
                let _ = term.write_str(&format!("{} {}", style(frame).cyan(), message));
                idx += 1;
                tokio::time::sleep(Duration::from_millis(80)).await;
            }
            let _ = term.clear_line();
        });

        Self {
            running,
            handle: Some(handle),
        }
    }

    /// Stop the spinner and clear the line.
    pub async fn stop(mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(h) = self.handle.take() {
            let _ = h.await;
        }
    }
}

// ── Status ───────────────────────────────────────────────────────────────────

/// How a result reads at a glance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Confirmed free somewhere
    Available,
    /// Only ambiguous hits
    Possible,
    /// Checked and taken everywhere
    Taken,
    /// No platform accepted the name's format
    Skipped,
}

pub fn status_of(result: &CheckResult) -> Status {
    if !result.available_on.is_empty() {
        Status::Available
    } else if !result.possibly_available.is_empty() {
        Status::Possible
    } else if result.nothing_checked() {
        Status::Skipped
    } else {
        Status::Taken
    }
}

/// Running counts for the closing summary.
#[derive(Debug, Default)]
pub struct Tally {
    pub available: usize,
    pub possible: usize,
    pub taken: usize,
    pub skipped: usize,
}

impl Tally {
    pub fn record(&mut self, result: &CheckResult) {
        match status_of(result) {
            Status::Available => self.available += 1,
            Status::Possible => self.possible += 1,
            Status::Taken => self.taken += 1,
            Status::Skipped => self.skipped += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.available + self.possible + self.taken + self.skipped
    }
}

// ── Headers ──────────────────────────────────────────────────────────────────

/// Print a styled header at the start of a bulk run.
pub fn print_header(count: usize, config: &EngineConfig) {
    println!(
        "{} {} {}",
        style("username-check").bold(),
        style(format!("v{}", env!("CARGO_PKG_VERSION"))).dim(),
        style(format!(
            "- Checking {} username{}",
            count,
            if count == 1 { "" } else { "s" }
        ))
        .dim(),
    );
    println!("{}", style(run_details(config).join(" | ")).dim());
    println!();
}

/// Print a styled header at the start of a monitor run.
pub fn print_monitor_header(username: &str, interval: u64, config: &EngineConfig) {
    println!(
        "{} {} {}",
        style("username-check").bold(),
        style(format!("v{}", env!("CARGO_PKG_VERSION"))).dim(),
        style(format!("- Monitoring @{} every {}s (Ctrl-C to stop)", username, interval)).dim(),
    );
    println!("{}", style(run_details(config).join(" | ")).dim());
    println!();
}

fn run_details(config: &EngineConfig) -> Vec<String> {
    let mut parts = vec![
        format!("Platforms: {}", platform_names(config.enabled_platforms.iter())),
        format!("Threads: {}", config.threads),
        format!("Jitter: {:.1}-{:.1}s", config.jitter_min, config.jitter_max),
    ];
    if config.use_proxies {
        parts.push("Proxies: on".to_string());
    }
    if config.webhook_url.is_some() {
        parts.push("Webhook: on".to_string());
    }
    parts
}

// ── Result lines ─────────────────────────────────────────────────────────────

/// Format and print a single result with colors and alignment.
///
/// If `counter` is Some((current, total)), a progress prefix like `[3/8]` is shown.
pub fn print_result(result: &CheckResult, counter: Option<(usize, usize)>) {
    let prefix = match counter {
        Some((cur, total)) => format!("{} ", style(format!("[{}/{}]", cur, total)).dim()),
        None => String::new(),
    };
    println!("  {}{}", prefix, result_line(result));
}

/// One monitor cycle, stamped with the check time.
pub fn print_monitor_line(result: &CheckResult) {
    println!(
        "  {} {}",
        style(result.timestamp.format("%H:%M:%S")).dim(),
        result_line(result)
    );
}

fn result_line(result: &CheckResult) -> String {
    let padded = pad_str(&result.username, 30, Alignment::Left, Some(".."));
    let name = style(padded.to_string()).white();

    match status_of(result) {
        Status::Available => {
            let mut line = format!(
                "{}  {}  {}",
                name,
                style("AVAILABLE").green().bold(),
                platform_names(result.available_on.iter()),
            );
            if !result.possibly_available.is_empty() {
                line.push_str(&format!(
                    "  {}",
                    style(format!("(possibly: {})", platform_names(result.possibly_available.iter()))).yellow()
                ));
            }
            line
        }
        Status::Possible => format!(
            "{}  {}  {}",
            name,
            style("POSSIBLE").yellow().bold(),
            platform_names(result.possibly_available.iter()),
        ),
        Status::Taken => format!("{}  {}", name, style("TAKEN").red().bold()),
        Status::Skipped => format!(
            "{}  {}  {}",
            name,
            style("SKIPPED").dim(),
            style("(no platform accepts this format)").dim(),
        ),
    }
}

// ── Summary ──────────────────────────────────────────────────────────────────

/// Print the final summary bar with colored counts.
pub fn print_summary(tally: &Tally, duration: Duration) {
    let total = tally.total();
    println!(
        "  {}",
        style("────────────────────────────────────────────────────").dim()
    );
    println!(
        "  {} username{} in {:.1}s  {}  {}  {}  {}  {}  {}",
        style(total).bold(),
        if total == 1 { "" } else { "s" },
        duration.as_secs_f64(),
        style("|").dim(),
        style(format!("{} available", tally.available)).green(),
        style("|").dim(),
        style(format!("{} possible", tally.possible)).yellow(),
        style("|").dim(),
        style(format!("{} taken", tally.taken)).red(),
    );
    if tally.skipped > 0 {
        println!(
            "  {}",
            style(format!(
                "{} skipped: no enabled platform accepts the format",
                tally.skipped
            ))
            .dim()
        );
    }
}

// ── Proxies ──────────────────────────────────────────────────────────────────

/// Print health check results, healthy first.
pub fn print_proxy_health(health: &[ProxyHealth]) {
    let mut sorted: Vec<&ProxyHealth> = health.iter().collect();
    sorted.sort_by(|a, b| b.healthy.cmp(&a.healthy).then_with(|| a.address.cmp(&b.address)));

    for entry in &sorted {
        let padded = pad_str(&entry.address, 36, Alignment::Left, Some(".."));
        let status = if entry.healthy {
            style("OK").green().bold()
        } else {
            style("BAD").red().bold()
        };
        println!(
            "  {}  {}  {}",
            style(padded.to_string()).white(),
            status,
            style(brief_detail(&entry.detail)).dim()
        );
    }

    let good = health.iter().filter(|h| h.healthy).count();
    println!();
    println!(
        "  {} {}  {}  {}",
        style(health.len()).bold(),
        if health.len() == 1 { "proxy" } else { "proxies" },
        style(format!("{} good", good)).green(),
        style(format!("{} bad", health.len() - good)).red(),
    );
}

/// Print supported platforms and their profile URL shapes, then exit.
pub fn print_platforms() {
    let heading = style("Supported platforms:").yellow().bold();
    println!();
    println!("{}", heading);
    println!();
    for platform in Platform::ALL {
        println!(
            "  {}  {}",
            style(format!("{:<10}", platform.id())).green().bold(),
            style(platform.profile_url("<username>")).dim(),
        );
    }
    println!();
    println!("Use: username-check <name> --platforms github,instagram");
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn platform_names<'a, I: Iterator<Item = &'a Platform>>(platforms: I) -> String {
    let names: BTreeSet<&str> = platforms.map(|p| p.display_name()).collect();
    if names.is_empty() {
        "none".to_string()
    } else {
        names.into_iter().collect::<Vec<_>>().join(", ")
    }
}

/// Keep health details to one short line.
fn brief_detail(detail: &str) -> String {
    let line = detail.lines().next().unwrap_or("").trim();
    if line.chars().count() > 60 {
        format!("{}...", line.chars().take(57).collect::<String>())
    } else {
        line.to_string()
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
