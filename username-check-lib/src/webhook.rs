//! Availability alerts over a chat webhook.
//!
//! The payload follows the Discord embed schema: a sender name, an avatar
//! and a single embed listing where the username was found.

use crate::error::UsernameCheckError;
use crate::proxy::{build_client, ProxyConfig, ProxyPool};
use crate::types::{CheckResult, Platform};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

/// Display name the alerts are posted under.
pub const SENDER_NAME: &str = "Username Checker";

const AVATAR_URL: &str = "https://github.githubassets.com/images/modules/logos_page/GitHub-Mark.png";
const FOOTER_TEXT: &str = "username-check";

const COLOR_AVAILABLE: u32 = 0x2b2d31;
const COLOR_POSSIBLE: u32 = 0xe0a526;

const DISPATCH_TIMEOUT: Duration = Duration::from_secs(5);
const TEST_TIMEOUT: Duration = Duration::from_secs(8);

/// Message posted by [`WebhookDispatcher::send_test`].
pub const TEST_MESSAGE: &str = "Webhook test: your configuration is working.";

/// Posts availability alerts for check results.
#[derive(Clone)]
pub struct WebhookDispatcher {
    url: Option<String>,
    pool: Arc<ProxyPool>,
}

impl WebhookDispatcher {
    /// Create a dispatcher. A blank or missing URL turns every send into a no-op.
    pub fn new(url: Option<String>, pool: Arc<ProxyPool>) -> Self {
        let url = url
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty());
        Self { url, pool }
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn is_configured(&self) -> bool {
        self.url.is_some()
    }

    /// Build the alert payload, or `None` when the result has no hits.
    pub fn build_payload(result: &CheckResult) -> Option<Value> {
        if !result.has_hits() {
            return None;
        }

        let username = &result.username;
        let (title, color) = match (
            result.available_on.is_empty(),
            result.possibly_available.is_empty(),
        ) {
            (false, true) => (format!("Available: @{}", username), COLOR_AVAILABLE),
            (true, false) => (format!("Possibly available: @{}", username), COLOR_POSSIBLE),
            _ => (
                format!("Available: @{} (some unconfirmed)", username),
                COLOR_AVAILABLE,
            ),
        };

        let mut names = Vec::new();
        let mut links = String::new();
        for platform in &result.available_on {
            names.push(platform.display_name().to_string());
            links.push_str(&profile_link(*platform, username, false));
        }
        for platform in &result.possibly_available {
            names.push(format!("{} (possible)", platform.display_name()));
            links.push_str(&profile_link(*platform, username, true));
        }

        let embed = json!({
            "title": title,
            "color": color,
            "fields": [
                {
                    "name": "Found at",
                    "value": format!("`{}`", result.timestamp.format("%H:%M:%S")),
                    "inline": false
                },
                { "name": "Platform", "value": names.join(", "), "inline": true },
                { "name": "Profile Link", "value": links, "inline": true }
            ],
            "footer": { "text": FOOTER_TEXT, "icon_url": AVATAR_URL },
            "thumbnail": { "url": AVATAR_URL }
        });

        Some(json!({
            "username": SENDER_NAME,
            "avatar_url": AVATAR_URL,
            "embeds": [embed]
        }))
    }

    /// Send an alert for `result`.
    ///
    /// Tries through a proxy first when the pool hands one out, then once
    /// directly if that fails or the webhook answers with an error status.
    /// Failures are logged and swallowed. Returns whether a send succeeded.
    pub async fn dispatch(&self, result: &CheckResult) -> bool {
        let Some(url) = self.url.as_deref() else {
            return false;
        };
        let Some(payload) = Self::build_payload(result) else {
            return false;
        };

        if let Some(proxy) = self.pool.select_proxy() {
            match post(url, &payload, Some(&proxy), DISPATCH_TIMEOUT).await {
                Ok(()) => {
                    tracing::debug!(username = %result.username, proxy = %proxy.address, "webhook sent");
                    return true;
                }
                Err(e) => {
                    tracing::warn!(
                        proxy = %proxy.address,
                        error = %e,
                        "webhook through proxy failed, retrying directly"
                    );
                    if e.is_proxy_failure() {
                        self.pool.mark_bad(&proxy.address);
                    }
                }
            }
        }

        match post(url, &payload, None, DISPATCH_TIMEOUT).await {
            Ok(()) => {
                tracing::debug!(username = %result.username, "webhook sent");
                true
            }
            Err(e) => {
                tracing::warn!(username = %result.username, error = %e, "webhook delivery failed");
                false
            }
        }
    }

    /// Post a test message directly and report the outcome.
    pub async fn send_test(&self) -> Result<(), UsernameCheckError> {
        let url = self
            .url
            .as_deref()
            .ok_or_else(|| UsernameCheckError::webhook("No webhook URL configured"))?;
        validate_webhook_url(url)?;

        let payload = json!({
            "username": SENDER_NAME,
            "content": TEST_MESSAGE,
        });
        post(url, &payload, None, TEST_TIMEOUT).await
    }
}

fn profile_link(platform: Platform, username: &str, possible: bool) -> String {
    let suffix = if possible { " (possible)" } else { "" };
    format!(
        "[{}]({}){}\n",
        platform.display_name(),
        platform.profile_url(username),
        suffix
    )
}

/// Accept only absolute http(s) URLs with a host.
pub fn validate_webhook_url(url: &str) -> Result<(), UsernameCheckError> {
    let parsed = reqwest::Url::parse(url)
        .map_err(|e| UsernameCheckError::webhook(format!("Invalid webhook URL: {}", e)))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(UsernameCheckError::webhook(format!(
            "Invalid webhook URL: unsupported scheme '{}'",
            parsed.scheme()
        )));
    }
    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(UsernameCheckError::webhook("Invalid webhook URL: missing host"));
    }
    Ok(())
}

async fn post(
    url: &str,
    payload: &Value,
    proxy: Option<&ProxyConfig>,
    timeout: Duration,
) -> Result<(), UsernameCheckError> {
    let client = build_client(proxy)?;
    let response = client
        .post(url)
        .json(payload)
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| {
            if proxy.is_some() {
                let address = proxy.map(|p| p.address.clone()).unwrap_or_default();
                UsernameCheckError::proxy(address, e.to_string())
            } else {
                UsernameCheckError::webhook(format!("Request failed: {}", e))
            }
        })?;

    let status = response.status();
    if status.is_client_error() || status.is_server_error() {
        return Err(UsernameCheckError::webhook_with_status(
            format!("Webhook rejected the message ({})", status),
            status.as_u16(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn hit(username: &str, available: &[Platform], possible: &[Platform]) -> CheckResult {
        let mut result = CheckResult::empty(username);
        result.checked_platforms.extend(available.iter().chain(possible));
        result.available_on.extend(available);
        result.possibly_available.extend(possible);
        result
    }

    #[test]
    fn test_payload_shape() {
        let result = hit("octo", &[Platform::GitHub, Platform::Instagram], &[]);
        let payload = WebhookDispatcher::build_payload(&result).unwrap();

        assert_eq!(payload["username"], SENDER_NAME);
        assert!(payload["avatar_url"].is_string());
        let embed = &payload["embeds"][0];
        assert_eq!(embed["title"], "Available: @octo");
        assert_eq!(embed["color"], COLOR_AVAILABLE);
        assert_eq!(embed["fields"][0]["name"], "Found at");
        assert_eq!(embed["fields"][1]["value"], "GitHub, Instagram");
        let links = embed["fields"][2]["value"].as_str().unwrap();
        assert!(links.contains("[GitHub](https://github.com/octo)"));
        assert!(links.contains("[Instagram](https://www.instagram.com/octo/)"));
        assert!(embed["footer"]["text"].is_string());
        assert!(embed["thumbnail"]["url"].is_string());
    }

    #[test]
    fn test_title_variants() {
        let possible = hit("ab", &[], &[Platform::Pinterest]);
        let payload = WebhookDispatcher::build_payload(&possible).unwrap();
        assert_eq!(payload["embeds"][0]["title"], "Possibly available: @ab");
        assert_eq!(payload["embeds"][0]["fields"][1]["value"], "Pinterest (possible)");

        let mixed = hit("ab", &[Platform::GitHub], &[Platform::Pinterest]);
        let payload = WebhookDispatcher::build_payload(&mixed).unwrap();
        assert_eq!(payload["embeds"][0]["title"], "Available: @ab (some unconfirmed)");

        assert!(WebhookDispatcher::build_payload(&hit("ab", &[], &[])).is_none());
    }

    #[tokio::test]
    async fn test_dispatch_posts_once() {
        let server = MockServer::start_async().await;
        let hook = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/hook")
                    .header("content-type", "application/json")
                    .json_body_partial(r#"{"username": "Username Checker"}"#);
                then.status(204);
            })
            .await;

        let dispatcher = WebhookDispatcher::new(Some(server.url("/hook")), Arc::new(ProxyPool::new()));
        assert!(dispatcher.dispatch(&hit("octo", &[Platform::GitHub], &[])).await);
        hook.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn test_dispatch_noops() {
        let server = MockServer::start_async().await;
        let hook = server
            .mock_async(|when, then| {
                when.method(POST).path("/hook");
                then.status(204);
            })
            .await;

        let pool = Arc::new(ProxyPool::new());
        let unconfigured = WebhookDispatcher::new(Some("   ".to_string()), Arc::clone(&pool));
        assert!(!unconfigured.is_configured());
        assert!(!unconfigured.dispatch(&hit("octo", &[Platform::GitHub], &[])).await);

        let dispatcher = WebhookDispatcher::new(Some(server.url("/hook")), pool);
        assert!(!dispatcher.dispatch(&hit("octo", &[], &[])).await);
        hook.assert_hits_async(0).await;
    }

    #[tokio::test]
    async fn test_dispatch_falls_back_to_direct() {
        let server = MockServer::start_async().await;
        let hook = server
            .mock_async(|when, then| {
                when.method(POST).path("/hook");
                then.status(200);
            })
            .await;

        let pool = Arc::new(ProxyPool::from_addresses(["127.0.0.1:1"]));
        pool.set_enabled(true);
        let dispatcher = WebhookDispatcher::new(Some(server.url("/hook")), Arc::clone(&pool));

        assert!(dispatcher.dispatch(&hit("octo", &[Platform::GitHub], &[])).await);
        hook.assert_hits_async(1).await;
        assert!(pool.is_blacklisted("127.0.0.1:1"));
    }

    #[tokio::test]
    async fn test_error_status_through_proxy_retries_directly_without_blacklisting() {
        // a mock server acting as a forward proxy sees the absolute-form
        // request and answers 500 on the webhook's behalf
        let proxy_server = MockServer::start_async().await;
        let proxied = proxy_server
            .mock_async(|when, then| {
                when.method(POST).path("/hook");
                then.status(500);
            })
            .await;
        let target = MockServer::start_async().await;
        let direct = target
            .mock_async(|when, then| {
                when.method(POST).path("/hook");
                then.status(204);
            })
            .await;

        let proxy_address = proxy_server.address().to_string();
        let pool = Arc::new(ProxyPool::from_addresses([proxy_address.as_str()]));
        pool.set_enabled(true);
        let dispatcher = WebhookDispatcher::new(Some(target.url("/hook")), Arc::clone(&pool));

        assert!(dispatcher.dispatch(&hit("octo", &[Platform::GitHub], &[])).await);
        proxied.assert_hits_async(1).await;
        direct.assert_hits_async(1).await;
        assert!(!pool.is_blacklisted(&proxy_address));
    }

    #[tokio::test]
    async fn test_dispatch_swallows_error_status() {
        let server = MockServer::start_async().await;
        let hook = server
            .mock_async(|when, then| {
                when.method(POST).path("/hook");
                then.status(500);
            })
            .await;

        let dispatcher = WebhookDispatcher::new(Some(server.url("/hook")), Arc::new(ProxyPool::new()));
        assert!(!dispatcher.dispatch(&hit("octo", &[Platform::GitHub], &[])).await);
        hook.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn test_send_test() {
        let server = MockServer::start_async().await;
        let ok = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/ok")
                    .json_body(json!({ "username": SENDER_NAME, "content": TEST_MESSAGE }));
                then.status(204);
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/gone");
                then.status(404);
            })
            .await;

        let pool = Arc::new(ProxyPool::new());
        WebhookDispatcher::new(Some(server.url("/ok")), Arc::clone(&pool))
            .send_test()
            .await
            .unwrap();
        ok.assert_async().await;

        let err = WebhookDispatcher::new(Some(server.url("/gone")), Arc::clone(&pool))
            .send_test()
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            UsernameCheckError::WebhookError {
                status_code: Some(404),
                ..
            }
        ));

        assert!(WebhookDispatcher::new(None, Arc::clone(&pool)).send_test().await.is_err());
        assert!(WebhookDispatcher::new(Some("ftp://example.com/x".into()), pool)
            .send_test()
            .await
            .is_err());
    }

    #[test]
    fn test_validate_webhook_url() {
        assert!(validate_webhook_url("https://discord.com/api/webhooks/1/abc").is_ok());
        assert!(validate_webhook_url("http://localhost:8080/hook").is_ok());
        assert!(validate_webhook_url("discord.com/api").is_err());
        assert!(validate_webhook_url("ftp://example.com").is_err());
    }
}
