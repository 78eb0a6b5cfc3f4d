use std::{sync::Arc, time::Duration};

use futures::{StreamExt, stream};
use jiff::Timestamp;
use tracing::{debug, warn};

use crate::{
    cache::{self, CacheStore},
    client::{ExternalMovieDetail, ExternalMovieSummary, MovieCatalog},
    models::{self, MovieProviderDetail, MovieSummary},
    poster::PosterResolver,
    registry::{ProviderConfig, ProviderRegistry},
};

const MOVIES_CACHE_KEY: &str = "movies:all";

/// Fans out to every enabled provider, merges per-provider records into
/// unified summaries keyed by title, and fronts the whole pass with the
/// result cache.
///
/// Providers are processed sequentially; each pass produces an independent
/// contribution that a pure fold merges into the accumulator, so a failing
/// provider only costs its own contribution. Two concurrent cold-cache
/// callers may both run a full pass; the last write wins and both snapshots
/// are equivalent.
pub struct Aggregator {
    registry: Arc<ProviderRegistry>,
    catalog: Arc<dyn MovieCatalog>,
    cache: Arc<dyn CacheStore>,
    posters: Arc<dyn PosterResolver>,
    result_ttl: Duration,
    result_idle: Duration,
    poster_concurrency: usize,
}

impl Aggregator {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        catalog: Arc<dyn MovieCatalog>,
        cache: Arc<dyn CacheStore>,
        posters: Arc<dyn PosterResolver>,
        result_ttl: Duration,
        result_idle: Duration,
        poster_concurrency: usize,
    ) -> Self {
        Self { registry, catalog, cache, posters, result_ttl, result_idle, poster_concurrency }
    }

    /// All merged movies, from cache when fresh.
    pub async fn get_all_movies(&self) -> Vec<MovieSummary> {
        if let Some(cached) =
            cache::get_typed::<Vec<MovieSummary>>(self.cache.as_ref(), MOVIES_CACHE_KEY).await
        {
            debug!(count = cached.len(), "serving movies from cache");
            return cached;
        }
        self.aggregate().await
    }

    /// Locate one movie by any of its provider-native ids.
    pub async fn get_movie_detail(&self, movie_id: &str) -> Option<MovieSummary> {
        self.get_all_movies()
            .await
            .into_iter()
            .find(|movie| movie.providers.iter().any(|d| d.movie_id == movie_id))
    }

    /// Drop the cached result and the provider snapshot, then re-run the
    /// pass so the next caller hits a warm cache.
    pub async fn refresh_data(&self) {
        self.cache.invalidate(MOVIES_CACHE_KEY).await;
        self.registry.refresh().await;
        let movies = self.aggregate().await;
        debug!(count = movies.len(), "movie cache warmed after refresh");
    }

    async fn aggregate(&self) -> Vec<MovieSummary> {
        let providers = self.registry.enabled_providers().await;
        debug!(providers = providers.len(), "starting aggregation pass");

        let mut merged: Vec<MovieSummary> = Vec::new();
        for provider in &providers {
            let contribution = self.provider_contribution(provider).await;
            if contribution.is_empty() {
                warn!(provider = %provider.id, "provider contributed no movies");
                continue;
            }
            debug!(
                provider = %provider.id,
                movies = contribution.len(),
                "merging provider contribution"
            );
            merge_contribution(&mut merged, contribution);
        }

        let merged = self.resolve_posters(merged).await;

        cache::set_typed(
            self.cache.as_ref(),
            MOVIES_CACHE_KEY,
            &merged,
            self.result_ttl,
            Some(self.result_idle),
        )
        .await;

        debug!(count = merged.len(), "aggregation pass complete");
        merged
    }

    /// One provider's independent slice of the result: its movie list plus a
    /// detail fetch per movie, folded into summary fragments by title.
    async fn provider_contribution(&self, provider: &ProviderConfig) -> Vec<MovieSummary> {
        let stubs = self.catalog.list_movies(&provider.id).await;

        let mut contribution: Vec<MovieSummary> = Vec::new();
        for stub in stubs {
            let detail = self.catalog.movie_detail(&provider.id, &stub.id).await;
            let fragment = provider_fragment(provider, &stub, detail.as_ref());
            merge_contribution(&mut contribution, vec![fragment]);
        }
        contribution
    }

    async fn resolve_posters(&self, movies: Vec<MovieSummary>) -> Vec<MovieSummary> {
        stream::iter(movies)
            .map(|mut movie| {
                let posters = Arc::clone(&self.posters);
                async move {
                    let candidates = poster_candidates(&movie);
                    if !candidates.is_empty() {
                        movie.poster = posters.resolve_best(&candidates).await;
                    }
                    movie
                }
            })
            .buffered(self.poster_concurrency.max(1))
            .collect()
            .await
    }
}

/// Fold a contribution into the accumulator. The merge key is the exact,
/// case-sensitive title.
pub(crate) fn merge_contribution(acc: &mut Vec<MovieSummary>, contribution: Vec<MovieSummary>) {
    for summary in contribution {
        match acc.iter_mut().find(|m| m.title == summary.title) {
            Some(existing) => existing.absorb(summary),
            None => acc.push(summary),
        }
    }
}

/// Build one provider's summary fragment for one movie. Detail fields win
/// over stub fields; an unparseable price leaves the price absent but keeps
/// the record.
fn provider_fragment(
    provider: &ProviderConfig,
    stub: &ExternalMovieSummary,
    detail: Option<&ExternalMovieDetail>,
) -> MovieSummary {
    let mut summary = MovieSummary::new(stub.title.clone());
    summary.year = non_empty(stub.year.clone());
    summary.kind = non_empty(stub.kind.clone());

    let mut price: Option<f64> = None;
    let mut poster_url = non_empty(stub.poster.clone());

    if let Some(detail) = detail {
        summary.year = non_empty(detail.year.clone()).or(summary.year.take());
        summary.rated = non_empty(detail.rated.clone());
        summary.released = non_empty(detail.released.clone());
        summary.runtime = non_empty(detail.runtime.clone());
        summary.genre = non_empty(detail.genre.clone());
        summary.director = non_empty(detail.director.clone());
        summary.writer = non_empty(detail.writer.clone());
        summary.actors = non_empty(detail.actors.clone());
        summary.plot = non_empty(detail.plot.clone());
        summary.language = non_empty(detail.language.clone());
        summary.country = non_empty(detail.country.clone());
        summary.awards = non_empty(detail.awards.clone());
        summary.metascore = non_empty(detail.metascore.clone());
        summary.rating = non_empty(detail.rating.clone());
        summary.votes = non_empty(detail.votes.clone());
        summary.kind = non_empty(detail.kind.clone()).or(summary.kind.take());

        if let Some(url) = non_empty(detail.poster.clone()) {
            poster_url = Some(url);
        }

        if let Some(raw) = detail.price.as_deref() {
            price = models::parse_price(raw);
            if price.is_none() {
                debug!(
                    provider = %provider.id,
                    movie_id = %stub.id,
                    raw = %raw,
                    "unparseable price, leaving absent"
                );
            }
        }
    }

    summary.upsert_detail(MovieProviderDetail {
        provider_id: provider.id.clone(),
        provider: provider.display_name.clone(),
        movie_id: stub.id.clone(),
        price,
        poster_url,
        updated_at: Timestamp::now(),
    });

    summary
}

fn poster_candidates(movie: &MovieSummary) -> Vec<String> {
    let mut candidates: Vec<String> = Vec::new();
    for detail in &movie.providers {
        if let Some(url) = &detail.poster_url {
            let url = url.trim();
            if !url.is_empty() && !candidates.iter().any(|c| c == url) {
                candidates.push(url.to_string());
            }
        }
    }
    candidates
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}
