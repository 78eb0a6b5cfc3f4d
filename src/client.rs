use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::registry::{ProviderConfig, ProviderRegistry};

/// Header carrying the provider auth token.
pub const TOKEN_HEADER: &str = "x-access-token";

/// One entry from a provider's list endpoint.
#[derive(Clone, Debug, Deserialize)]
pub struct ExternalMovieSummary {
    #[serde(rename = "Title")]
    pub title: String,
    #[serde(rename = "Year", default)]
    pub year: Option<String>,
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "Type", default)]
    pub kind: Option<String>,
    #[serde(rename = "Poster", default)]
    pub poster: Option<String>,
}

/// Full record from a provider's detail endpoint. Everything is a string on
/// the wire, including the price.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExternalMovieDetail {
    pub title: String,
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(default)]
    pub year: Option<String>,
    #[serde(default)]
    pub rated: Option<String>,
    #[serde(default)]
    pub released: Option<String>,
    #[serde(default)]
    pub runtime: Option<String>,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub director: Option<String>,
    #[serde(default)]
    pub writer: Option<String>,
    #[serde(default)]
    pub actors: Option<String>,
    #[serde(default)]
    pub plot: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub awards: Option<String>,
    #[serde(default)]
    pub poster: Option<String>,
    #[serde(default)]
    pub metascore: Option<String>,
    #[serde(alias = "ImdbRating", default)]
    pub rating: Option<String>,
    #[serde(alias = "ImdbVotes", default)]
    pub votes: Option<String>,
    #[serde(default)]
    pub price: Option<String>,
    #[serde(rename = "Type", default)]
    pub kind: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MovieListResponse {
    #[serde(rename = "Movies", default)]
    movies: Vec<ExternalMovieSummary>,
}

#[derive(Debug, Error)]
enum FetchError {
    #[error("provider is not configured")]
    UnknownProvider,
    #[error("provider is disabled")]
    ProviderDisabled,
    #[error("provider has no api token")]
    MissingToken,
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}

/// The two remote calls the aggregation pass makes per provider.
///
/// Implementations never surface errors: a failed call degrades to an empty
/// list or `None` so one provider outage cannot abort the whole pass.
#[async_trait]
pub trait MovieCatalog: Send + Sync {
    async fn list_movies(&self, provider_id: &str) -> Vec<ExternalMovieSummary>;

    async fn movie_detail(
        &self,
        provider_id: &str,
        movie_id: &str,
    ) -> Option<ExternalMovieDetail>;
}

pub struct HttpProviderClient {
    http: reqwest::Client,
    registry: Arc<ProviderRegistry>,
}

impl HttpProviderClient {
    pub fn new(http: reqwest::Client, registry: Arc<ProviderRegistry>) -> Self {
        Self { http, registry }
    }

    async fn resolve_provider(&self, provider_id: &str) -> Result<ProviderConfig, FetchError> {
        let provider = self
            .registry
            .get_provider(provider_id)
            .await
            .ok_or(FetchError::UnknownProvider)?;
        if !provider.is_enabled {
            return Err(FetchError::ProviderDisabled);
        }
        if provider.api_token.trim().is_empty() {
            return Err(FetchError::MissingToken);
        }
        Ok(provider)
    }

    fn request(&self, provider: &ProviderConfig, template: &str) -> reqwest::RequestBuilder {
        let url = format!(
            "{}/{}",
            provider.base_url.trim_end_matches('/'),
            template.trim_start_matches('/')
        );
        let mut req = self
            .http
            .get(url)
            .timeout(provider.timeout())
            .header(TOKEN_HEADER, &provider.api_token);
        for (name, value) in &provider.headers {
            req = req.header(name, value);
        }
        req
    }

    async fn fetch_list(
        &self,
        provider: &ProviderConfig,
    ) -> Result<Vec<ExternalMovieSummary>, FetchError> {
        let resp: MovieListResponse = self
            .request(provider, &provider.endpoints.movies)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(resp.movies)
    }

    async fn fetch_detail(
        &self,
        provider: &ProviderConfig,
        movie_id: &str,
    ) -> Result<ExternalMovieDetail, FetchError> {
        let template = provider.endpoints.movie_detail.replace("{id}", movie_id);
        let detail = self
            .request(provider, &template)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(detail)
    }
}

#[async_trait]
impl MovieCatalog for HttpProviderClient {
    async fn list_movies(&self, provider_id: &str) -> Vec<ExternalMovieSummary> {
        let provider = match self.resolve_provider(provider_id).await {
            Ok(provider) => provider,
            Err(err) => {
                warn!(provider = %provider_id, error = %err, "skipping movie list");
                return Vec::new();
            }
        };

        match self.fetch_list(&provider).await {
            Ok(movies) => {
                debug!(provider = %provider.id, count = movies.len(), "listed movies");
                movies
            }
            Err(err) => {
                warn!(provider = %provider.id, error = %err, "movie list request failed");
                Vec::new()
            }
        }
    }

    async fn movie_detail(
        &self,
        provider_id: &str,
        movie_id: &str,
    ) -> Option<ExternalMovieDetail> {
        let provider = match self.resolve_provider(provider_id).await {
            Ok(provider) => provider,
            Err(err) => {
                warn!(provider = %provider_id, error = %err, "skipping movie detail");
                return None;
            }
        };

        match self.fetch_detail(&provider, movie_id).await {
            Ok(detail) => Some(detail),
            Err(err) => {
                warn!(
                    provider = %provider.id,
                    movie_id = %movie_id,
                    error = %err,
                    "movie detail request failed"
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{header, method, path},
    };

    async fn catalog_for(server: &MockServer, providers: serde_json::Value) -> HttpProviderClient {
        Mock::given(method("GET"))
            .and(path("/providers"))
            .respond_with(ResponseTemplate::new(200).set_body_json(providers))
            .mount(server)
            .await;

        let http = reqwest::Client::new();
        let registry = Arc::new(ProviderRegistry::new(
            http.clone(),
            Arc::new(MemoryCache::new()),
            Some(format!("{}/providers", server.uri())),
            "".to_string(),
            Duration::from_secs(60),
        ));
        HttpProviderClient::new(http, registry)
    }

    fn provider_json(server: &MockServer, id: &str, enabled: bool, token: &str) -> serde_json::Value {
        json!({
            "id": id,
            "name": id,
            "displayName": id,
            "baseUrl": format!("{}/api/{id}", server.uri()),
            "apiToken": token,
            "isEnabled": enabled,
            "priority": 1,
            "timeoutSeconds": 5,
            "endpoints": { "movies": "/movies", "movieDetail": "/movie/{id}" },
        })
    }

    #[tokio::test]
    async fn lists_movies_with_token_header() {
        let server = MockServer::start().await;
        let catalog =
            catalog_for(&server, json!([provider_json(&server, "cinemaworld", true, "secret")]))
                .await;

        Mock::given(method("GET"))
            .and(path("/api/cinemaworld/movies"))
            .and(header(TOKEN_HEADER, "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Movies": [
                    { "Title": "Star Wars", "Year": "1977", "ID": "cw001", "Type": "movie", "Poster": "http://img/sw.jpg" },
                    { "Title": "Alien", "ID": "cw002" },
                ]
            })))
            .mount(&server)
            .await;

        let movies = catalog.list_movies("cinemaworld").await;
        assert_eq!(movies.len(), 2);
        assert_eq!(movies[0].title, "Star Wars");
        assert_eq!(movies[0].year.as_deref(), Some("1977"));
        assert_eq!(movies[1].id, "cw002");
        assert!(movies[1].poster.is_none());
    }

    #[tokio::test]
    async fn list_failure_degrades_to_empty() {
        let server = MockServer::start().await;
        let catalog =
            catalog_for(&server, json!([provider_json(&server, "cinemaworld", true, "secret")]))
                .await;

        Mock::given(method("GET"))
            .and(path("/api/cinemaworld/movies"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        assert!(catalog.list_movies("cinemaworld").await.is_empty());
    }

    #[tokio::test]
    async fn malformed_list_payload_degrades_to_empty() {
        let server = MockServer::start().await;
        let catalog =
            catalog_for(&server, json!([provider_json(&server, "cinemaworld", true, "secret")]))
                .await;

        Mock::given(method("GET"))
            .and(path("/api/cinemaworld/movies"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        assert!(catalog.list_movies("cinemaworld").await.is_empty());
    }

    #[tokio::test]
    async fn unknown_disabled_or_tokenless_providers_yield_empty() {
        let server = MockServer::start().await;
        let catalog = catalog_for(
            &server,
            json!([
                provider_json(&server, "disabled", false, "secret"),
                provider_json(&server, "tokenless", true, ""),
            ]),
        )
        .await;

        assert!(catalog.list_movies("missing").await.is_empty());
        assert!(catalog.list_movies("disabled").await.is_empty());
        assert!(catalog.list_movies("tokenless").await.is_empty());
        assert!(catalog.movie_detail("disabled", "x1").await.is_none());
    }

    #[tokio::test]
    async fn detail_substitutes_id_and_parses_aliases() {
        let server = MockServer::start().await;
        let catalog =
            catalog_for(&server, json!([provider_json(&server, "filmworld", true, "secret")]))
                .await;

        Mock::given(method("GET"))
            .and(path("/api/filmworld/movie/fw001"))
            .and(header(TOKEN_HEADER, "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Title": "Star Wars",
                "ID": "fw001",
                "Year": "1977",
                "Genre": "Sci-Fi",
                "ImdbRating": "8.6",
                "ImdbVotes": "1,200,000",
                "Price": "25.99",
                "Type": "movie",
            })))
            .mount(&server)
            .await;

        let detail = catalog.movie_detail("filmworld", "fw001").await.unwrap();
        assert_eq!(detail.title, "Star Wars");
        assert_eq!(detail.rating.as_deref(), Some("8.6"));
        assert_eq!(detail.votes.as_deref(), Some("1,200,000"));
        assert_eq!(detail.price.as_deref(), Some("25.99"));
    }

    #[tokio::test]
    async fn slow_provider_times_out_and_degrades_to_empty() {
        let server = MockServer::start().await;
        let catalog = catalog_for(
            &server,
            json!([{
                "id": "cinemaworld",
                "name": "cinemaworld",
                "displayName": "cinemaworld",
                "baseUrl": format!("{}/api/cinemaworld", server.uri()),
                "apiToken": "secret",
                "isEnabled": true,
                "priority": 1,
                "timeoutSeconds": 1,
                "endpoints": { "movies": "/movies", "movieDetail": "/movie/{id}" },
            }]),
        )
        .await;

        Mock::given(method("GET"))
            .and(path("/api/cinemaworld/movies"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({
                        "Movies": [{ "Title": "Star Wars", "ID": "cw001" }]
                    }))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let started = std::time::Instant::now();
        let movies = catalog.list_movies("cinemaworld").await;

        // The provider's own timeout cancels the call, not the mock's delay.
        assert!(movies.is_empty());
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[tokio::test]
    async fn detail_not_found_degrades_to_none() {
        let server = MockServer::start().await;
        let catalog =
            catalog_for(&server, json!([provider_json(&server, "filmworld", true, "secret")]))
                .await;

        Mock::given(method("GET"))
            .and(path("/api/filmworld/movie/gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        assert!(catalog.movie_detail("filmworld", "gone").await.is_none());
    }
}
