use std::collections::HashSet;

use tracing::instrument;

use crate::{
    error::{AppError, AppResult},
    models::{normalize_title, GenerationResult, Movie, VibeRequest},
    services::{orchestrator::GenerationOrchestrator, providers::GenerationRequest},
};

/// Entry point for vibe recommendations
///
/// Passes the exclusion list to the models as a prompt hint, then enforces it:
/// any returned title matching an excluded one (case-insensitively) is dropped
/// before truncating to the target count. A filtered-down result is returned
/// short rather than regenerated.
pub struct RecommendationService {
    orchestrator: GenerationOrchestrator,
    target_count: usize,
}

impl RecommendationService {
    pub fn new(orchestrator: GenerationOrchestrator, target_count: usize) -> Self {
        Self {
            orchestrator,
            target_count: target_count.max(1),
        }
    }

    pub fn orchestrator(&self) -> &GenerationOrchestrator {
        &self.orchestrator
    }

    #[instrument(skip(self, request), fields(exclude_count = request.exclude.len()))]
    pub async fn get_recommendations(&self, request: &VibeRequest) -> AppResult<GenerationResult> {
        let vibe = request.text.trim();
        if vibe.is_empty() {
            return Err(AppError::InvalidInput("Vibe text cannot be empty".to_string()));
        }

        let exclude: Vec<String> = request
            .exclude
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();

        let generation = GenerationRequest {
            vibe: vibe.to_string(),
            exclude,
            target_count: self.target_count,
        };

        let result = self.orchestrator.orchestrate(&generation).await?;
        let returned = result.movies.len();
        let movies = filter_excluded(result.movies, &generation.exclude, self.target_count);

        tracing::info!(
            provider = %result.provider,
            returned,
            kept = movies.len(),
            "Recommendations generated"
        );

        Ok(GenerationResult {
            movies,
            provider: result.provider,
        })
    }
}

/// Drop excluded titles, then keep at most `target_count`
pub fn filter_excluded(movies: Vec<Movie>, exclude: &[String], target_count: usize) -> Vec<Movie> {
    let excluded: HashSet<String> = exclude.iter().map(|t| normalize_title(t)).collect();

    movies
        .into_iter()
        .filter(|movie| {
            let keep = !excluded.contains(&normalize_title(&movie.title));
            if !keep {
                tracing::info!(title = %movie.title, "Dropping previously shown title");
            }
            keep
        })
        .take(target_count)
        .collect()
}
