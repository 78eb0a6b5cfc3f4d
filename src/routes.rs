use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;

use crate::{
    AppState,
    error::AppResult,
    models::{CheapestPrice, MovieSummary},
};

/// Consumer-facing movie shape: the merged summary plus the computed
/// cheapest offer, so clients need no price logic of their own.
#[derive(Serialize)]
pub struct MovieView {
    #[serde(flatten)]
    summary: MovieSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    cheapest: Option<CheapestPrice>,
}

impl From<MovieSummary> for MovieView {
    fn from(summary: MovieSummary) -> Self {
        let cheapest = summary.cheapest();
        Self { summary, cheapest }
    }
}

pub async fn list_movies(State(state): State<Arc<AppState>>) -> AppResult<Json<Vec<MovieView>>> {
    let movies = state.aggregator.get_all_movies().await;
    Ok(Json(movies.into_iter().map(MovieView::from).collect()))
}

pub async fn movie_detail(
    State(state): State<Arc<AppState>>,
    Path(movie_id): Path<String>,
) -> AppResult<Response> {
    let resp = match state.aggregator.get_movie_detail(&movie_id).await {
        Some(movie) => Json(MovieView::from(movie)).into_response(),
        None => {
            (StatusCode::NOT_FOUND, Json(json!({ "error": "movie not found" }))).into_response()
        }
    };
    Ok(resp)
}

pub async fn refresh(State(state): State<Arc<AppState>>) -> StatusCode {
    state.aggregator.refresh_data().await;
    StatusCode::NO_CONTENT
}

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}
