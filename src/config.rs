use serde::Deserialize;
use std::time::Duration;

/// Application configuration loaded from environment variables
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Google Gemini API key (primary generation vendor)
    #[serde(default)]
    pub gemini_api_key: Option<String>,

    /// Groq API key (secondary generation vendor)
    #[serde(default)]
    pub groq_api_key: Option<String>,

    /// DeepSeek API key (tertiary generation vendor)
    #[serde(default)]
    pub deepseek_api_key: Option<String>,

    /// TMDB API key for poster lookups
    #[serde(default)]
    pub tmdb_api_key: Option<String>,

    /// OMDb API key for ratings lookups
    #[serde(default)]
    pub omdb_api_key: Option<String>,

    #[serde(default = "default_gemini_api_url")]
    pub gemini_api_url: String,

    /// Gemini models to try, most preferred first
    #[serde(default = "default_gemini_models")]
    pub gemini_models: Vec<String>,

    #[serde(default = "default_groq_api_url")]
    pub groq_api_url: String,

    #[serde(default = "default_groq_model")]
    pub groq_model: String,

    #[serde(default = "default_deepseek_api_url")]
    pub deepseek_api_url: String,

    #[serde(default = "default_deepseek_model")]
    pub deepseek_model: String,

    #[serde(default = "default_tmdb_api_url")]
    pub tmdb_api_url: String,

    /// Prefix joined with TMDB `poster_path` fragments
    #[serde(default = "default_tmdb_image_base_url")]
    pub tmdb_image_base_url: String,

    #[serde(default = "default_wikipedia_api_url")]
    pub wikipedia_api_url: String,

    #[serde(default = "default_omdb_api_url")]
    pub omdb_api_url: String,

    /// Number of movies each generation must produce
    #[serde(default = "default_target_count")]
    pub target_count: usize,

    #[serde(default = "default_fetch_max_attempts")]
    pub fetch_max_attempts: u32,

    /// Linear backoff unit between fetch retries
    #[serde(default = "default_fetch_base_delay_ms")]
    pub fetch_base_delay_ms: u64,

    /// Pause before the next Gemini model after a rate-limited one
    #[serde(default = "default_rate_limit_pause_ms")]
    pub rate_limit_pause_ms: u64,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Max movies enriched at once by the batch endpoint
    #[serde(default = "default_enrich_concurrency")]
    pub enrich_concurrency: usize,

    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_gemini_api_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_gemini_models() -> Vec<String> {
    vec![
        "gemini-2.0-flash".to_string(),
        "gemini-1.5-flash".to_string(),
        "gemini-1.5-pro".to_string(),
    ]
}

fn default_groq_api_url() -> String {
    "https://api.groq.com/openai/v1".to_string()
}

fn default_groq_model() -> String {
    "llama-3.3-70b-versatile".to_string()
}

fn default_deepseek_api_url() -> String {
    "https://api.deepseek.com".to_string()
}

fn default_deepseek_model() -> String {
    "deepseek-chat".to_string()
}

fn default_tmdb_api_url() -> String {
    "https://api.themoviedb.org/3".to_string()
}

fn default_tmdb_image_base_url() -> String {
    "https://image.tmdb.org/t/p/w780".to_string()
}

fn default_wikipedia_api_url() -> String {
    "https://en.wikipedia.org/w/api.php".to_string()
}

fn default_omdb_api_url() -> String {
    "https://www.omdbapi.com/".to_string()
}

fn default_target_count() -> usize {
    4
}

fn default_fetch_max_attempts() -> u32 {
    3
}

fn default_fetch_base_delay_ms() -> u64 {
    1000
}

fn default_rate_limit_pause_ms() -> u64 {
    1000
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_enrich_concurrency() -> usize {
    4
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Default for Config {
    /// Defaults with every credential absent
    fn default() -> Self {
        Self {
            gemini_api_key: None,
            groq_api_key: None,
            deepseek_api_key: None,
            tmdb_api_key: None,
            omdb_api_key: None,
            gemini_api_url: default_gemini_api_url(),
            gemini_models: default_gemini_models(),
            groq_api_url: default_groq_api_url(),
            groq_model: default_groq_model(),
            deepseek_api_url: default_deepseek_api_url(),
            deepseek_model: default_deepseek_model(),
            tmdb_api_url: default_tmdb_api_url(),
            tmdb_image_base_url: default_tmdb_image_base_url(),
            wikipedia_api_url: default_wikipedia_api_url(),
            omdb_api_url: default_omdb_api_url(),
            target_count: default_target_count(),
            fetch_max_attempts: default_fetch_max_attempts(),
            fetch_base_delay_ms: default_fetch_base_delay_ms(),
            rate_limit_pause_ms: default_rate_limit_pause_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            enrich_concurrency: default_enrich_concurrency(),
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        envy::from_env::<Config>().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
    }

    /// True when at least one generation vendor has a credential
    pub fn generation_configured(&self) -> bool {
        [
            &self.gemini_api_key,
            &self.groq_api_key,
            &self.deepseek_api_key,
        ]
        .into_iter()
        .any(|key| credential(key).is_some())
    }

    pub fn fetch_base_delay(&self) -> Duration {
        Duration::from_millis(self.fetch_base_delay_ms)
    }

    pub fn rate_limit_pause(&self) -> Duration {
        Duration::from_millis(self.rate_limit_pause_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Treats blank credentials the same as unset ones
pub fn credential(key: &Option<String>) -> Option<String> {
    key.as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
}
