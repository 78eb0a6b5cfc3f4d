use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

/// Picks the best poster URL among per-provider candidates.
#[async_trait]
pub trait PosterResolver: Send + Sync {
    /// Returns the first candidate that validates as an image, or the first
    /// candidate verbatim when none do. `None` only for an empty candidate
    /// list.
    async fn resolve_best(&self, candidates: &[String]) -> Option<String>;
}

/// Validates candidates with a lightweight HEAD probe: success status and a
/// `content-type` starting with `image/`. Probe failures of any kind count
/// against the candidate, never against the caller.
pub struct HttpPosterResolver {
    http: reqwest::Client,
    timeout: Duration,
}

impl HttpPosterResolver {
    pub fn new(http: reqwest::Client, timeout: Duration) -> Self {
        Self { http, timeout }
    }

    async fn probe(&self, url: &str) -> bool {
        let resp = match self.http.head(url).timeout(self.timeout).send().await {
            Ok(resp) => resp,
            Err(err) => {
                debug!(url = %url, error = %err, "poster probe failed");
                return false;
            }
        };
        if !resp.status().is_success() {
            return false;
        }
        resp.headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.starts_with("image/"))
            .unwrap_or(false)
    }
}

#[async_trait]
impl PosterResolver for HttpPosterResolver {
    async fn resolve_best(&self, candidates: &[String]) -> Option<String> {
        for url in candidates {
            if self.probe(url).await {
                return Some(url.clone());
            }
        }
        // Unvalidated beats nothing: the consumer can still try to render it.
        candidates.first().cloned()
    }
}
