//! Generation provider abstraction
//!
//! Each provider wraps one LLM vendor and turns a vibe into a fixed-size list of
//! movies. Providers are tried in order by the orchestrator; within a provider,
//! failures are reported as `ProviderError` and never retried by the caller.

use crate::{
    error::ProviderError,
    models::{GenerationResult, Movie, RawMovie},
    services::events::GenerationObserver,
};

pub mod gemini;
pub mod openai_compat;

pub use gemini::GeminiProvider;
pub use openai_compat::OpenAiCompatibleProvider;

/// Input shared by every provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub vibe: String,
    /// Titles the model is asked not to repeat
    pub exclude: Vec<String>,
    /// Exact number of movies the model must return
    pub target_count: usize,
}

#[async_trait::async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Short vendor name for logs and events
    fn name(&self) -> &'static str;

    /// False when the vendor credential is absent; such providers are skipped
    fn is_configured(&self) -> bool;

    async fn generate(
        &self,
        request: &GenerationRequest,
        observer: &dyn GenerationObserver,
    ) -> Result<GenerationResult, ProviderError>;
}

/// Instructions sent to every vendor, including the exclusion clause
pub fn system_prompt(target_count: usize, exclude: &[String]) -> String {
    let mut prompt = format!(
        "You are the 'Vibe Reel' engine, a cinematic curator. Your goal is to map abstract human \
emotions, sensory descriptions, and natural language scenarios to cinematic masterpieces.
- Analyze the Aesthetic, Emotional Frequency, and Narrative Tension of the user's input.
- Requirement: Return exactly {target_count} movies in a valid JSON array.
- Requirement: Each movie object must include: 'title', 'year', 'vibe_match' (a poetic, evocative \
explanation of why it fits the vibe), and 'tmdb_search_query' (the movie title ONLY, without year \
or extra text).
- Diversity: Provide a mix of world cinema, classics, and modern hits. Avoid the most obvious \
choices unless they are a perfect fit.

Output strictly valid JSON. No markdown formatting."
    );

    if !exclude.is_empty() {
        prompt.push_str(&format!(
            "\n\nIMPORTANT: Do NOT recommend any of these movies (the user has already seen them): {}.",
            exclude.join(", ")
        ));
    }

    prompt
}

/// Single-message prompt for vendors without a system role
pub fn combined_prompt(request: &GenerationRequest) -> String {
    format!(
        "{}\n\nUser Input: \"{}\"",
        system_prompt(request.target_count, &request.exclude),
        request.vibe
    )
}

/// Parse model output into exactly-validated movies.
///
/// Accepts a bare array or an object with a `movies` array, optionally wrapped
/// in a markdown code fence. Any missing field, or fewer than `target_count`
/// movies, is a malformed response.
pub fn parse_movies(raw: &str, target_count: usize) -> Result<Vec<Movie>, ProviderError> {
    let cleaned = strip_code_fences(raw);

    let value: serde_json::Value = serde_json::from_str(&cleaned)
        .map_err(|e| ProviderError::Malformed(format!("invalid JSON: {}", e)))?;

    let items = match value {
        serde_json::Value::Array(items) => items,
        serde_json::Value::Object(mut object) => match object.remove("movies") {
            Some(serde_json::Value::Array(items)) => items,
            _ => {
                return Err(ProviderError::Malformed(
                    "expected a JSON array or an object with a 'movies' array".to_string(),
                ))
            }
        },
        _ => {
            return Err(ProviderError::Malformed(
                "expected a JSON array of movies".to_string(),
            ))
        }
    };

    let movies = items
        .into_iter()
        .map(|item| {
            let raw: RawMovie = serde_json::from_value(item)
                .map_err(|e| ProviderError::Malformed(format!("invalid movie object: {}", e)))?;
            Movie::try_from(raw).map_err(ProviderError::Malformed)
        })
        .collect::<Result<Vec<_>, _>>()?;

    if movies.len() < target_count {
        return Err(ProviderError::Malformed(format!(
            "expected {} movies, got {}",
            target_count,
            movies.len()
        )));
    }

    Ok(movies)
}

fn strip_code_fences(raw: &str) -> String {
    raw.replace("```json", "").replace("```", "").trim().to_string()
}

/// Leading slice of an upstream body, for error messages
pub(crate) fn excerpt(body: &str) -> String {
    const MAX_CHARS: usize = 300;
    body.chars().take(MAX_CHARS).collect()
}
