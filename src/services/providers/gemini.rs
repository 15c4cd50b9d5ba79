/// Google Gemini provider (primary)
///
/// Walks an ordered list of models. A model that errors is logged and the next
/// one is tried; after a rate-limited model the provider pauses before moving
/// on. Output that parses but is malformed ends the provider immediately.
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use crate::{
    config::{credential, Config},
    error::ProviderError,
    models::{GeminiResponse, GenerationResult, Movie},
    services::{
        events::{GenerationEvent, GenerationObserver},
        fetch::{HttpRequest, HttpTransport},
        providers::{combined_prompt, excerpt, parse_movies, GenerationProvider, GenerationRequest},
    },
};

const PROVIDER: &str = "gemini";

pub struct GeminiProvider {
    transport: Arc<dyn HttpTransport>,
    api_key: Option<String>,
    api_url: String,
    models: Vec<String>,
    rate_limit_pause: Duration,
}

impl GeminiProvider {
    pub fn new(transport: Arc<dyn HttpTransport>, config: &Config) -> Self {
        Self {
            transport,
            api_key: credential(&config.gemini_api_key),
            api_url: config.gemini_api_url.trim_end_matches('/').to_string(),
            models: config
                .gemini_models
                .iter()
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty())
                .collect(),
            rate_limit_pause: config.rate_limit_pause(),
        }
    }

    async fn try_model(
        &self,
        api_key: &str,
        model: &str,
        prompt: &str,
        target_count: usize,
    ) -> Result<Vec<Movie>, ProviderError> {
        let url = format!("{}/models/{}:generateContent", self.api_url, model);
        let body = json!({
            "contents": [{
                "role": "user",
                "parts": [{ "text": prompt }]
            }]
        });

        let request = HttpRequest::post_json(&url, body)?.header("x-goog-api-key", api_key);
        let response = self.transport.send(request).await?;

        if !response.is_success() {
            return Err(ProviderError::Http {
                status: response.status,
                body: excerpt(&response.body),
            });
        }

        let data: GeminiResponse = response
            .json()
            .map_err(|e| ProviderError::Malformed(format!("unexpected Gemini payload: {}", e)))?;
        let text = data.text().ok_or(ProviderError::EmptyResponse(PROVIDER))?;

        parse_movies(&text, target_count)
    }
}

#[async_trait::async_trait]
impl GenerationProvider for GeminiProvider {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn generate(
        &self,
        request: &GenerationRequest,
        observer: &dyn GenerationObserver,
    ) -> Result<GenerationResult, ProviderError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(ProviderError::MissingCredential("GEMINI_API_KEY"))?;
        let prompt = combined_prompt(request);
        let mut last_error: Option<ProviderError> = None;

        for (index, model) in self.models.iter().enumerate() {
            tracing::debug!(model = %model, "Trying Gemini model");

            match self
                .try_model(api_key, model, &prompt, request.target_count)
                .await
            {
                Ok(movies) => {
                    return Ok(GenerationResult {
                        movies,
                        provider: format!("{}:{}", PROVIDER, model),
                    });
                }
                Err(e @ ProviderError::Malformed(_)) => return Err(e),
                Err(e) => {
                    observer.on_event(&GenerationEvent::ModelFailed {
                        provider: PROVIDER,
                        model: model.clone(),
                        error: e.to_string(),
                    });

                    let has_next = index + 1 < self.models.len();
                    if e.is_rate_limited() && has_next {
                        observer.on_event(&GenerationEvent::RateLimitPause {
                            provider: PROVIDER,
                            model: model.clone(),
                            pause: self.rate_limit_pause,
                        });
                        tokio::time::sleep(self.rate_limit_pause).await;
                    }

                    last_error = Some(e);
                }
            }
        }

        Err(ProviderError::AllModelsFailed {
            provider: PROVIDER,
            last_error: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no models configured".to_string()),
        })
    }
}
