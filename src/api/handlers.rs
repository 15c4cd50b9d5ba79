use axum::{extract::State, http::StatusCode, Extension, Json};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{
    error::{AppError, AppResult},
    middleware::request_id::RequestId,
    models::{EnrichedMovie, GenerationResult, MovieLookup, Ratings, VibeRequest},
    services::enrichment,
};

use super::{extract::ApiJson, AppState};

/// Upper bound on movies per batch enrichment request
const MAX_ENRICH_BATCH: usize = 20;

// Request/Response types

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    #[serde(default, alias = "userVibe")]
    pub vibe: String,
    #[serde(default)]
    pub exclude: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct PosterResponse {
    #[serde(rename = "posterUrl")]
    pub poster_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RatingsResponse {
    pub ratings: Option<Ratings>,
}

#[derive(Debug, Deserialize)]
pub struct EnrichRequest {
    pub movies: Vec<MovieLookup>,
}

#[derive(Debug, Serialize)]
pub struct EnrichResponse {
    pub results: Vec<EnrichedMovie>,
}

#[derive(Debug, Serialize)]
pub struct ProviderStatus {
    pub name: &'static str,
    pub configured: bool,
}

#[derive(Debug, Serialize)]
pub struct ProvidersResponse {
    /// Generation providers in fallback order
    pub generation: Vec<ProviderStatus>,
    pub enrichment: Vec<ProviderStatus>,
}

// Handlers

/// Health check endpoint
pub async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

/// Generate recommendations for a vibe, excluding titles already shown
pub async fn generate(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    ApiJson(request): ApiJson<GenerateRequest>,
) -> AppResult<Json<GenerationResult>> {
    tracing::info!(
        request_id = %request_id,
        vibe_len = request.vibe.len(),
        exclude_count = request.exclude.len(),
        "Processing vibe request"
    );

    let result = state
        .recommendations
        .get_recommendations(&VibeRequest::new(request.vibe, request.exclude))
        .await?;

    tracing::info!(
        request_id = %request_id,
        provider = %result.provider,
        movies = result.movies.len(),
        "Vibe request completed"
    );

    Ok(Json(result))
}

/// Resolve a poster URL; a miss is `posterUrl: null`, not an error
pub async fn poster(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    ApiJson(lookup): ApiJson<MovieLookup>,
) -> AppResult<Json<PosterResponse>> {
    let has_query = lookup
        .tmdb_search_query
        .as_deref()
        .is_some_and(|q| !q.trim().is_empty());
    if lookup.title.trim().is_empty() && !has_query {
        return Err(AppError::InvalidInput(
            "Missing title or search query".to_string(),
        ));
    }

    let poster_url = state.posters.resolve(&lookup).await;

    tracing::info!(
        request_id = %request_id,
        found = poster_url.is_some(),
        "Poster lookup completed"
    );

    Ok(Json(PosterResponse { poster_url }))
}

/// Resolve review scores; a miss is `ratings: null`, not an error
pub async fn ratings(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    ApiJson(lookup): ApiJson<MovieLookup>,
) -> AppResult<Json<RatingsResponse>> {
    if lookup.title.trim().is_empty() {
        return Err(AppError::InvalidInput("Missing title".to_string()));
    }

    let ratings = state
        .ratings
        .resolve(&lookup.title, lookup.year.as_deref())
        .await;

    tracing::info!(
        request_id = %request_id,
        found = ratings.is_some(),
        "Ratings lookup completed"
    );

    Ok(Json(RatingsResponse { ratings }))
}

/// Poster and ratings for a whole result set in one round trip
pub async fn enrich(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    ApiJson(request): ApiJson<EnrichRequest>,
) -> AppResult<Json<EnrichResponse>> {
    if request.movies.len() > MAX_ENRICH_BATCH {
        return Err(AppError::InvalidInput(format!(
            "At most {} movies can be enriched at once",
            MAX_ENRICH_BATCH
        )));
    }

    tracing::info!(
        request_id = %request_id,
        count = request.movies.len(),
        "Processing enrichment batch"
    );

    let results = enrichment::enrich_all(
        state.posters.clone(),
        state.ratings.clone(),
        request.movies,
        state.enrich_concurrency,
    )
    .await;

    Ok(Json(EnrichResponse { results }))
}

/// Which upstream integrations have credentials; never exposes the credentials
pub async fn providers(State(state): State<AppState>) -> Json<ProvidersResponse> {
    let generation = state
        .recommendations
        .orchestrator()
        .provider_status()
        .into_iter()
        .map(|(name, configured)| ProviderStatus { name, configured })
        .collect();

    let enrichment = vec![
        ProviderStatus {
            name: "tmdb",
            configured: state.posters.tmdb_configured(),
        },
        ProviderStatus {
            name: "wikipedia",
            configured: true,
        },
        ProviderStatus {
            name: "omdb",
            configured: state.ratings.is_configured(),
        },
    ];

    Json(ProvidersResponse {
        generation,
        enrichment,
    })
}
