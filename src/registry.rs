use std::{collections::HashMap, sync::Arc, time::Duration};

use anyhow::Context;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::cache::{self, CacheStore};

const PROVIDERS_CACHE_KEY: &str = "providers:all";

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderEndpoints {
    pub movies: String,
    pub movie_detail: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health: Option<String>,
}

/// Immutable snapshot of one configured provider. Snapshots are replaced
/// wholesale on refresh, never mutated in place.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    pub id: String,
    pub name: String,
    pub display_name: String,
    pub base_url: String,
    pub api_token: String,
    pub is_enabled: bool,
    pub priority: i32,
    pub timeout_seconds: u64,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    pub endpoints: ProviderEndpoints,
    #[serde(default)]
    pub last_updated: Option<Timestamp>,
}

impl ProviderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds.max(1))
    }
}

/// Supplies the configured provider set, fronted by a short-TTL cache entry
/// in the shared [`CacheStore`].
///
/// When the upstream configuration source is unreachable or returns garbage
/// the registry answers with a hard-coded fallback pair instead of failing
/// the caller: availability over freshness.
pub struct ProviderRegistry {
    http: reqwest::Client,
    cache: Arc<dyn CacheStore>,
    config_url: Option<String>,
    fallback_token: String,
    ttl: Duration,
}

impl ProviderRegistry {
    pub fn new(
        http: reqwest::Client,
        cache: Arc<dyn CacheStore>,
        config_url: Option<String>,
        fallback_token: String,
        ttl: Duration,
    ) -> Self {
        if config_url.is_none() {
            debug!("no provider config source set, using built-in provider set");
        }
        Self { http, cache, config_url, fallback_token, ttl }
    }

    /// Current provider snapshot, cached for the registry TTL.
    pub async fn list_providers(&self) -> Vec<ProviderConfig> {
        if let Some(cached) =
            cache::get_typed::<Vec<ProviderConfig>>(self.cache.as_ref(), PROVIDERS_CACHE_KEY).await
        {
            return cached;
        }

        let providers = self.fetch_or_fallback().await;
        cache::set_typed(self.cache.as_ref(), PROVIDERS_CACHE_KEY, &providers, self.ttl, None)
            .await;
        providers
    }

    /// Enabled providers in deterministic order: priority, then id. The
    /// aggregation pass iterates in this order, which also fixes
    /// cheapest-price tie-breaks.
    pub async fn enabled_providers(&self) -> Vec<ProviderConfig> {
        let mut providers: Vec<ProviderConfig> =
            self.list_providers().await.into_iter().filter(|p| p.is_enabled).collect();
        providers.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.id.cmp(&b.id)));
        providers
    }

    /// Case-insensitive lookup by provider id.
    pub async fn get_provider(&self, id: &str) -> Option<ProviderConfig> {
        self.list_providers().await.into_iter().find(|p| p.id.eq_ignore_ascii_case(id))
    }

    pub async fn is_enabled(&self, id: &str) -> bool {
        self.get_provider(id).await.map(|p| p.is_enabled).unwrap_or(false)
    }

    /// Drop the cached snapshot and eagerly repopulate it.
    pub async fn refresh(&self) {
        self.cache.invalidate(PROVIDERS_CACHE_KEY).await;
        let providers = self.list_providers().await;
        debug!(count = providers.len(), "provider registry refreshed");
    }

    async fn fetch_or_fallback(&self) -> Vec<ProviderConfig> {
        let Some(url) = &self.config_url else {
            return self.default_providers();
        };

        match self.fetch_remote(url).await {
            Ok(providers) if !providers.is_empty() => {
                debug!(count = providers.len(), "fetched provider configuration");
                providers
            }
            Ok(_) => {
                warn!("provider configuration source returned no providers, using fallback set");
                self.default_providers()
            }
            Err(err) => {
                error!(error = %err, "failed to fetch provider configuration, using fallback set");
                self.default_providers()
            }
        }
    }

    async fn fetch_remote(&self, url: &str) -> anyhow::Result<Vec<ProviderConfig>> {
        let providers = self
            .http
            .get(url)
            .send()
            .await
            .context("provider config request failed")?
            .error_for_status()
            .context("provider config request returned error status")?
            .json::<Vec<ProviderConfig>>()
            .await
            .context("provider config payload did not parse")?;
        Ok(providers)
    }

    fn default_providers(&self) -> Vec<ProviderConfig> {
        let entry = |id: &str, display_name: &str, priority: i32| ProviderConfig {
            id: id.to_string(),
            name: id.to_string(),
            display_name: display_name.to_string(),
            base_url: format!("https://webjetapitest.azurewebsites.net/api/{id}"),
            api_token: self.fallback_token.clone(),
            is_enabled: true,
            priority,
            timeout_seconds: 10,
            headers: HashMap::new(),
            endpoints: ProviderEndpoints {
                movies: "/movies".to_string(),
                movie_detail: "/movie/{id}".to_string(),
                health: None,
            },
            last_updated: None,
        };

        vec![entry("cinemaworld", "Cinema World", 1), entry("filmworld", "Film World", 2)]
    }
}
