//! Response classification per platform.
//!
//! Each platform signals a missing profile differently; these rules turn a
//! fetched response into "available" or "taken".

use crate::types::{EngineConfig, Platform};

/// The parts of an HTTP response the classification rules look at.
#[derive(Debug, Clone, Default)]
pub struct ProbeResponse {
    /// HTTP status of the final response
    pub status: u16,
    /// URL after following redirects
    pub final_url: String,
    /// Response body, empty when the platform's rule never reads it
    pub body: String,
}

/// Whether the platform reads the body to classify a response.
pub fn needs_body(platform: Platform) -> bool {
    !matches!(platform, Platform::GitHub)
}

/// Decide whether `response` means the username is free on `platform`.
pub fn classify(platform: Platform, response: &ProbeResponse, config: &EngineConfig) -> bool {
    match platform {
        Platform::Pinterest => classify_pinterest(response, &config.pinterest_home_urls),
        Platform::GitHub => response.status == 404,
        Platform::Instagram => classify_instagram(response),
    }
}

/// Pinterest bounces missing profiles to its home page, or serves a 404 /
/// "page not found" document.
fn classify_pinterest(response: &ProbeResponse, home_urls: &[String]) -> bool {
    let final_url = response.final_url.trim_end_matches('/');
    if home_urls
        .iter()
        .any(|home| home.trim_end_matches('/') == final_url)
    {
        return true;
    }

    if response.status == 404 {
        return true;
    }

    response.body.to_lowercase().contains("page not found")
}

fn classify_instagram(response: &ProbeResponse) -> bool {
    match response.status {
        404 => true,
        200 => {
            response.body.contains("Page Not Found")
                || response.body.contains("The link you followed may be broken")
        }
        _ => false,
    }
}
