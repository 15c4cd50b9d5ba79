use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

pub const NO_PROVIDER_MESSAGE: &str =
    "No AI providers configured. Please set GEMINI_API_KEY, GROQ_API_KEY, or DEEPSEEK_API_KEY.";

pub const OVERWHELMED_MESSAGE: &str =
    "The cinematic oracle is overwhelmed. Please try again in a moment.";

/// A single HTTP exchange that never produced a response
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    #[error("Invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Network error: {0}")]
    Network(String),
}

/// Failure of the retrying fetch helper
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    #[error("Max retries exceeded after {attempts} attempts: {last_error}")]
    MaxRetriesExceeded { attempts: u32, last_error: String },
}

/// Failure of one generation adapter (or one of its models)
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("{0} not configured")]
    MissingCredential(&'static str),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Upstream returned status {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Empty response from {0}")]
    EmptyResponse(&'static str),

    #[error("Malformed recommendations: {0}")]
    Malformed(String),

    #[error("All {provider} models failed; last error: {last_error}")]
    AllModelsFailed {
        provider: &'static str,
        last_error: String,
    },
}

impl ProviderError {
    /// Whether the failure looks like vendor throttling
    pub fn is_rate_limited(&self) -> bool {
        match self {
            ProviderError::Http { status: 429, .. } => true,
            ProviderError::Http { body, .. } => body.contains("RESOURCE_EXHAUSTED"),
            ProviderError::Transport(TransportError::Network(msg)) => msg.contains("429"),
            _ => false,
        }
    }
}

/// Outcome of the whole fallback chain failing
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum GenerationError {
    #[error("{}", NO_PROVIDER_MESSAGE)]
    NoProviderConfigured,

    #[error("All {attempts} configured providers failed")]
    AllProvidersFailed { attempts: usize },
}

/// Application-level errors
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("{}", OVERWHELMED_MESSAGE)]
    ProvidersExhausted,
}

impl From<GenerationError> for AppError {
    fn from(err: GenerationError) -> Self {
        match err {
            GenerationError::NoProviderConfigured => AppError::Configuration(err.to_string()),
            // Which vendors failed stays in the logs only
            GenerationError::AllProvidersFailed { .. } => AppError::ProvidersExhausted,
        }
    }
}

/// Body rejections answer 400 with the usual `{ "error" }` shape
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::InvalidInput(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Configuration(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            AppError::ProvidersExhausted => (StatusCode::SERVICE_UNAVAILABLE, self.to_string()),
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
