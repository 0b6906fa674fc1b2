//! Error handling for username checking operations.
//!
//! This module defines a single error type that covers the ways a check,
//! a proxy operation or a webhook delivery can fail. Background paths
//! (probes, proxy bookkeeping, alert delivery) log these and carry on;
//! foreground calls such as the webhook test hand them to the caller.

use crate::types::Platform;
use std::fmt;

/// Main error type for username checking operations.
#[derive(Debug, Clone)]
pub enum UsernameCheckError {
    /// Username is empty or contains characters no platform accepts
    InvalidUsername {
        username: String,
        reason: String,
    },

    /// Network-related errors (connection, DNS, TLS, etc.)
    NetworkError {
        message: String,
        source: Option<String>,
    },

    /// A platform probe failed before it could classify the response
    ProbeError {
        platform: Platform,
        message: String,
        status_code: Option<u16>,
    },

    /// A proxy could not be used for a request
    ProxyError {
        address: String,
        message: String,
    },

    /// Webhook delivery failed
    WebhookError {
        message: String,
        status_code: Option<u16>,
    },

    /// Configuration errors (invalid settings, unparsable files, etc.)
    ConfigError {
        message: String,
    },

    /// File I/O errors when reading or writing lists and settings
    FileError {
        path: String,
        message: String,
    },

    /// Timeout errors when operations take too long
    Timeout {
        operation: String,
        duration: std::time::Duration,
    },

    /// A bulk or monitor run was requested while another one is active
    AlreadyRunning,

    /// Generic internal errors that don't fit other categories
    Internal {
        message: String,
    },
}

impl UsernameCheckError {
    /// Create a new invalid username error.
    pub fn invalid_username<U: Into<String>, R: Into<String>>(username: U, reason: R) -> Self {
        Self::InvalidUsername {
            username: username.into(),
            reason: reason.into(),
        }
    }

    /// Create a new network error.
    pub fn network<M: Into<String>>(message: M) -> Self {
        Self::NetworkError {
            message: message.into(),
            source: None,
        }
    }

    /// Create a new network error with source information.
    pub fn network_with_source<M: Into<String>, S: Into<String>>(message: M, source: S) -> Self {
        Self::NetworkError {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Create a new probe error.
    pub fn probe<M: Into<String>>(platform: Platform, message: M) -> Self {
        Self::ProbeError {
            platform,
            message: message.into(),
            status_code: None,
        }
    }

    /// Create a new proxy error.
    pub fn proxy<A: Into<String>, M: Into<String>>(address: A, message: M) -> Self {
        Self::ProxyError {
            address: address.into(),
            message: message.into(),
        }
    }

    /// Create a new webhook error.
    pub fn webhook<M: Into<String>>(message: M) -> Self {
        Self::WebhookError {
            message: message.into(),
            status_code: None,
        }
    }

    /// Create a new webhook error carrying the HTTP status that was returned.
    pub fn webhook_with_status<M: Into<String>>(message: M, status_code: u16) -> Self {
        Self::WebhookError {
            message: message.into(),
            status_code: Some(status_code),
        }
    }

    /// Create a new configuration error.
    pub fn config<M: Into<String>>(message: M) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// Create a new timeout error.
    pub fn timeout<O: Into<String>>(operation: O, duration: std::time::Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create a new internal error.
    pub fn internal<M: Into<String>>(message: M) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Create a new file error.
    pub fn file_error<P: Into<String>, M: Into<String>>(path: P, message: M) -> Self {
        Self::FileError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Attach the platform a transport failure happened on.
    pub(crate) fn on_platform(self, platform: Platform) -> Self {
        match self {
            Self::NetworkError { message, source } => Self::ProbeError {
                platform,
                message: match source {
                    Some(source) => format!("{}: {}", message, source),
                    None => message,
                },
                status_code: None,
            },
            other => other,
        }
    }

    /// Check if this error should count against the proxy that carried the request.
    pub fn is_proxy_failure(&self) -> bool {
        matches!(
            self,
            Self::NetworkError { .. }
                | Self::Timeout { .. }
                | Self::ProxyError { .. }
                | Self::ProbeError {
                    status_code: None,
                    ..
                }
        )
    }
}

impl fmt::Display for UsernameCheckError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidUsername { username, reason } => {
                write!(f, "Invalid username '{}': {}", username, reason)
            }
            Self::NetworkError { message, source } => {
                if let Some(source) = source {
                    write!(f, "Network error: {} (source: {})", message, source)
                } else {
                    write!(f, "Network error: {}", message)
                }
            }
            Self::ProbeError {
                platform,
                message,
                status_code,
            } => {
                if let Some(code) = status_code {
                    write!(f, "{} probe failed (HTTP {}): {}", platform, code, message)
                } else {
                    write!(f, "{} probe failed: {}", platform, message)
                }
            }
            Self::ProxyError { address, message } => {
                write!(f, "Proxy error for '{}': {}", address, message)
            }
            Self::WebhookError {
                message,
                status_code,
            } => {
                if let Some(code) = status_code {
                    write!(f, "Webhook error (HTTP {}): {}", code, message)
                } else {
                    write!(f, "Webhook error: {}", message)
                }
            }
            Self::ConfigError { message } => {
                write!(f, "Configuration error: {}", message)
            }
            Self::FileError { path, message } => {
                write!(f, "File error at '{}': {}", path, message)
            }
            Self::Timeout {
                operation,
                duration,
            } => {
                write!(f, "Timeout after {:?} during: {}", duration, operation)
            }
            Self::AlreadyRunning => {
                write!(f, "A check run is already active; stop it first")
            }
            Self::Internal { message } => {
                write!(f, "Internal error: {}", message)
            }
        }
    }
}

impl std::error::Error for UsernameCheckError {}

impl From<reqwest::Error> for UsernameCheckError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::timeout("HTTP request", std::time::Duration::from_secs(0))
        } else if err.is_connect() {
            Self::network_with_source("Connection failed", err.to_string())
        } else {
            Self::network_with_source("HTTP request failed", err.to_string())
        }
    }
}

impl From<toml::de::Error> for UsernameCheckError {
    fn from(err: toml::de::Error) -> Self {
        Self::config(format!("Failed to parse TOML settings: {}", err))
    }
}

impl From<toml::ser::Error> for UsernameCheckError {
    fn from(err: toml::ser::Error) -> Self {
        Self::config(format!("Failed to serialize TOML settings: {}", err))
    }
}
