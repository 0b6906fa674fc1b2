//! Platform probes.
//!
//! A probe answers one question: is this username free on this platform?
//! The engine talks to probes through the [`Probe`] trait so the HTTP
//! implementation can be swapped out.

/// HTTP implementation issuing one GET per check
pub mod http;

/// Per-platform response classification
pub mod rules;

pub use http::{jitter_delay, PlatformProbe, USER_AGENTS};
pub use rules::{classify, ProbeResponse};

use crate::error::UsernameCheckError;
use crate::types::{EngineConfig, Platform, ProbeVerdict};
use std::future::Future;

/// Checks a username on a platform.
///
/// Implementations make at most one network attempt per call; retries are
/// up to the caller. Transport failures come back as `Err` so the engine
/// can decide how to treat them.
pub trait Probe: Send + Sync + 'static {
    fn check(
        &self,
        platform: Platform,
        username: &str,
        config: &EngineConfig,
    ) -> impl Future<Output = Result<ProbeVerdict, UsernameCheckError>> + Send;
}
