use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

/// A free-text mood query plus the titles already shown to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VibeRequest {
    pub text: String,
    pub exclude: Vec<String>,
}

impl VibeRequest {
    pub fn new(text: impl Into<String>, exclude: Vec<String>) -> Self {
        Self {
            text: text.into(),
            exclude,
        }
    }
}

/// One recommended film as produced by a generation provider
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Movie {
    pub title: String,
    pub year: String,
    /// Rationale for why the film fits the vibe
    pub vibe_match: String,
    /// Title only, used for structured metadata search
    pub tmdb_search_query: String,
}

/// Key under which titles are compared for exclusion (case-insensitive)
pub fn normalize_title(title: &str) -> String {
    title.trim().to_lowercase()
}

/// Movies from the first provider that succeeded
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct GenerationResult {
    pub movies: Vec<Movie>,
    /// `vendor:model` label of whoever produced the movies
    pub provider: String,
}

/// Review scores, each independently optional
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Ratings {
    pub imdb: Option<String>,
    pub rotten_tomatoes: Option<String>,
    pub metacritic: Option<String>,
}

/// Lookup key for enrichment (poster and ratings)
#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
pub struct MovieLookup {
    #[serde(default)]
    pub title: String,
    #[serde(default, deserialize_with = "optional_year")]
    pub year: Option<String>,
    #[serde(default)]
    pub tmdb_search_query: Option<String>,
}

/// Poster and ratings for one movie, both best-effort
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedMovie {
    pub title: String,
    pub poster_url: Option<String>,
    pub ratings: Option<Ratings>,
}

// ============================================================================
// Generation Output Types
// ============================================================================

/// Movie object as the model wrote it, before validation
#[derive(Debug, Clone, Deserialize)]
pub struct RawMovie {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub year: Option<RawYear>,
    #[serde(default)]
    pub vibe_match: Option<String>,
    #[serde(default)]
    pub tmdb_search_query: Option<String>,
}

/// Models return the year as either `"2001"` or `2001`
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawYear {
    Text(String),
    Number(i64),
}

impl From<RawYear> for String {
    fn from(year: RawYear) -> Self {
        match year {
            RawYear::Text(text) => text,
            RawYear::Number(n) => n.to_string(),
        }
    }
}

fn optional_year<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(Option::<RawYear>::deserialize(deserializer)?.map(String::from))
}

impl TryFrom<RawMovie> for Movie {
    type Error = String;

    fn try_from(raw: RawMovie) -> Result<Self, Self::Error> {
        fn required(field: &str, value: Option<String>) -> Result<String, String> {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| format!("movie is missing required field '{}'", field))
        }

        let year = raw.year.map(String::from);

        Ok(Movie {
            title: required("title", raw.title)?,
            year: required("year", year)?,
            vibe_match: required("vibe_match", raw.vibe_match)?,
            tmdb_search_query: required("tmdb_search_query", raw.tmdb_search_query)?,
        })
    }
}

// ============================================================================
// Gemini API Types
// ============================================================================

#[derive(Debug, Clone, Deserialize, Default)]
pub struct GeminiResponse {
    #[serde(default)]
    pub candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeminiCandidate {
    #[serde(default)]
    pub content: Option<GeminiContent>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeminiContent {
    #[serde(default)]
    pub parts: Vec<GeminiPart>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeminiPart {
    #[serde(default)]
    pub text: Option<String>,
}

impl GeminiResponse {
    /// Concatenated text of the first candidate
    pub fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();
        (!text.trim().is_empty()).then_some(text)
    }
}

// ============================================================================
// OpenAI-Compatible Chat Completion Types (Groq, DeepSeek)
// ============================================================================

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatChoice {
    pub message: ChatMessage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatMessage {
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatCompletionResponse {
    pub fn content(&self) -> Option<String> {
        self.choices
            .first()
            .and_then(|c| c.message.content.clone())
            .filter(|c| !c.trim().is_empty())
    }
}

// ============================================================================
// TMDB API Types
// ============================================================================

#[derive(Debug, Clone, Deserialize, Default)]
pub struct TmdbSearchResponse {
    #[serde(default)]
    pub results: Vec<TmdbMovieResult>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TmdbMovieResult {
    #[serde(default)]
    pub poster_path: Option<String>,
}

// ============================================================================
// Wikipedia API Types
// ============================================================================

#[derive(Debug, Clone, Deserialize, Default)]
pub struct WikiSearchResponse {
    #[serde(default)]
    pub query: Option<WikiQuery>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WikiQuery {
    /// Keyed by page id
    #[serde(default)]
    pub pages: HashMap<String, WikiPage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WikiPage {
    /// Search rank when the query uses a search generator
    #[serde(default)]
    pub index: Option<u32>,
    #[serde(default)]
    pub thumbnail: Option<WikiThumbnail>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WikiThumbnail {
    pub source: String,
}

impl WikiSearchResponse {
    /// Thumbnail of the best-ranked page, if it has one
    pub fn top_thumbnail(&self) -> Option<String> {
        let pages = &self.query.as_ref()?.pages;
        let best = pages.values().min_by_key(|p| p.index.unwrap_or(u32::MAX))?;
        best.thumbnail
            .as_ref()
            .map(|t| t.source.clone())
            .filter(|s| !s.is_empty())
    }
}

// ============================================================================
// OMDb API Types
// ============================================================================

pub const OMDB_NOT_AVAILABLE: &str = "N/A";

#[derive(Debug, Clone, Deserialize)]
pub struct OmdbResponse {
    #[serde(rename = "Response")]
    pub response: String,
    #[serde(rename = "Ratings", default)]
    pub ratings: Vec<OmdbRating>,
    #[serde(rename = "imdbRating", default)]
    pub imdb_rating: Option<String>,
    #[serde(rename = "Metascore", default)]
    pub metascore: Option<String>,
    #[serde(rename = "Error", default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OmdbRating {
    #[serde(rename = "Source")]
    pub source: String,
    #[serde(rename = "Value")]
    pub value: String,
}

impl OmdbResponse {
    pub fn found(&self) -> bool {
        self.response.eq_ignore_ascii_case("true")
    }
}

impl From<OmdbResponse> for Ratings {
    fn from(data: OmdbResponse) -> Self {
        fn available(value: Option<String>) -> Option<String> {
            value.filter(|v| !v.is_empty() && v != OMDB_NOT_AVAILABLE)
        }

        let rotten_tomatoes = data
            .ratings
            .into_iter()
            .find(|r| r.source == "Rotten Tomatoes")
            .map(|r| r.value);

        Ratings {
            imdb: available(data.imdb_rating),
            rotten_tomatoes: available(rotten_tomatoes),
            metacritic: available(data.metascore),
        }
    }
}
