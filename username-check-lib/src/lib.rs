//! # Username Check Library
//!
//! Checks whether usernames are free on Pinterest, GitHub and Instagram,
//! optionally through rotating proxies, and posts webhook alerts for hits.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use username_check_lib::{CheckEngine, EngineConfig, ProxyPool};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = Arc::new(ProxyPool::new());
//!     let engine = CheckEngine::with_pool(pool, EngineConfig::default())?;
//!
//!     engine
//!         .run_bulk(vec!["octocat".to_string()], |result| {
//!             println!("{}: available on {:?}", result.username, result.available_on);
//!         })
//!         .await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Plausibility pre-filter**: platforms whose username rules reject a
//!   name are never contacted for it
//! - **Bulk and monitor modes**: bounded parallel runs over a list, or a
//!   repeating check of one name, both stoppable at any time
//! - **Proxy pool**: random rotation, automatic blacklisting, health checks
//! - **Webhook alerts**: Discord-compatible embeds with proxy fallback

// Re-export main public API types and functions
pub use config::{
    load_env_config, load_env_config_from, parse_platform_list, ConfigManager, EnvConfig, Settings,
};
pub use engine::CheckEngine;
pub use error::UsernameCheckError;
pub use probes::{classify, jitter_delay, PlatformProbe, Probe, ProbeResponse, USER_AGENTS};
pub use proxy::{validate_proxy_address, ProxyConfig, ProxyHealth, ProxyPool, DEFAULT_PROXY_TEST_URL};
pub use types::{
    CheckResult, EngineConfig, EngineState, Platform, ProbeVerdict, RunMode, RunSummary,
    MAX_JITTER_SECS, MAX_THREADS, MAX_TIMEOUT,
};
pub use validator::{is_plausible, parse_username_list, require_format, validate_format};
pub use webhook::{validate_webhook_url, WebhookDispatcher};

// Public modules
pub mod probes;

// Internal modules - these are not part of the public API
mod config;
mod engine;
mod error;
mod proxy;
mod types;
mod validator;
mod webhook;

// Type alias for convenience
pub type Result<T> = std::result::Result<T, UsernameCheckError>;

// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
