use reqwest::header::CACHE_CONTROL;
use reqwest::Client;
use tracing::{debug, warn};

use crate::error::{EngineError, Result};

/// Selects a reachable, protocol-safe download endpoint from an ordered
/// candidate list.
///
/// Reachability is a lightweight HEAD check; an endpoint that answers 2xx is
/// taken immediately. The check is inherently racy (the endpoint can go away
/// before the real test starts), so the download meters handle their own
/// failures rather than trusting this result.
pub struct EndpointProbe {
    secure_context: bool,
}

impl EndpointProbe {
    pub fn new(secure_context: bool) -> Self {
        Self { secure_context }
    }

    /// True when fetching `url` from this context would be mixed content.
    /// Such candidates are never attempted; a browser would block the
    /// request and the failure would be misreported as a network error.
    fn is_mixed_content(&self, url: &str) -> bool {
        self.secure_context && url.starts_with("http:")
    }

    pub async fn select(
        &self,
        client: &Client,
        candidates: &[String],
        fallback: Option<&str>,
    ) -> Result<String> {
        for url in candidates {
            if self.is_mixed_content(url) {
                warn!(%url, "skipping mixed-content candidate");
                continue;
            }
            // Some servers reject HEAD; any inconclusive answer just moves
            // on to the next candidate.
            match client
                .head(url)
                .header(CACHE_CONTROL, "no-store")
                .send()
                .await
            {
                Ok(res) if res.status().is_success() => {
                    debug!(%url, "endpoint reachable");
                    return Ok(url.clone());
                }
                Ok(res) => {
                    debug!(%url, status = %res.status(), "probe rejected candidate");
                }
                Err(err) => {
                    debug!(%url, %err, "probe request failed");
                }
            }
        }

        // Last resort: hand back the designated fallback unchecked and let
        // the real download surface any error with better context.
        if let Some(url) = fallback {
            if !self.is_mixed_content(url) {
                warn!(%url, "all candidates failed, using fallback unprobed");
                return Ok(url.to_string());
            }
        }

        Err(EngineError::NoReachableEndpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mixed_content_only_in_secure_context() {
        let secure = EndpointProbe::new(true);
        assert!(secure.is_mixed_content("http://example.com/file"));
        assert!(!secure.is_mixed_content("https://example.com/file"));

        let insecure = EndpointProbe::new(false);
        assert!(!insecure.is_mixed_content("http://example.com/file"));
    }
}
