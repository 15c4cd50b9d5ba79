/// OpenAI-compatible chat completion provider
///
/// Groq and DeepSeek both expose `/chat/completions` with JSON mode, so one
/// implementation serves both; each is configured with its own credential,
/// base URL and model.
use std::sync::Arc;

use serde_json::json;

use crate::{
    config::{credential, Config},
    error::ProviderError,
    models::{ChatCompletionResponse, GenerationResult},
    services::{
        events::GenerationObserver,
        fetch::{HttpRequest, HttpTransport},
        providers::{excerpt, parse_movies, system_prompt, GenerationProvider, GenerationRequest},
    },
};

const TEMPERATURE: f64 = 0.8;

/// JSON mode only allows an object at the top level
const JSON_MODE_HINT: &str =
    "\n\nReturn the array as the value of a top-level \"movies\" key in a JSON object.";

pub struct OpenAiCompatibleProvider {
    name: &'static str,
    credential_name: &'static str,
    transport: Arc<dyn HttpTransport>,
    api_key: Option<String>,
    api_url: String,
    model: String,
}

impl OpenAiCompatibleProvider {
    pub fn new(
        name: &'static str,
        credential_name: &'static str,
        transport: Arc<dyn HttpTransport>,
        api_key: Option<String>,
        api_url: &str,
        model: &str,
    ) -> Self {
        Self {
            name,
            credential_name,
            transport,
            api_key: credential(&api_key),
            api_url: api_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }

    /// Groq-hosted Llama (secondary)
    pub fn groq(transport: Arc<dyn HttpTransport>, config: &Config) -> Self {
        Self::new(
            "groq",
            "GROQ_API_KEY",
            transport,
            config.groq_api_key.clone(),
            &config.groq_api_url,
            &config.groq_model,
        )
    }

    /// DeepSeek chat (tertiary)
    pub fn deepseek(transport: Arc<dyn HttpTransport>, config: &Config) -> Self {
        Self::new(
            "deepseek",
            "DEEPSEEK_API_KEY",
            transport,
            config.deepseek_api_key.clone(),
            &config.deepseek_api_url,
            &config.deepseek_model,
        )
    }
}

#[async_trait::async_trait]
impl GenerationProvider for OpenAiCompatibleProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn generate(
        &self,
        request: &GenerationRequest,
        _observer: &dyn GenerationObserver,
    ) -> Result<GenerationResult, ProviderError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(ProviderError::MissingCredential(self.credential_name))?;

        let system = format!(
            "{}{}",
            system_prompt(request.target_count, &request.exclude),
            JSON_MODE_HINT
        );
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": request.vibe },
            ],
            "response_format": { "type": "json_object" },
            "temperature": TEMPERATURE,
        });

        let url = format!("{}/chat/completions", self.api_url);
        let http_request = HttpRequest::post_json(&url, body)?
            .header("Authorization", format!("Bearer {}", api_key));

        tracing::debug!(provider = self.name, model = %self.model, "Requesting chat completion");

        let response = self.transport.send(http_request).await?;
        if !response.is_success() {
            return Err(ProviderError::Http {
                status: response.status,
                body: excerpt(&response.body),
            });
        }

        let completion: ChatCompletionResponse = response.json().map_err(|e| {
            ProviderError::Malformed(format!("unexpected {} payload: {}", self.name, e))
        })?;
        let text = completion
            .content()
            .ok_or(ProviderError::EmptyResponse(self.name))?;

        let movies = parse_movies(&text, request.target_count)?;

        Ok(GenerationResult {
            movies,
            provider: format!("{}:{}", self.name, self.model),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::events::RecordingObserver;
    use crate::services::fetch::{HttpResponse, MockHttpTransport};

    fn completion(content: &str) -> String {
        json!({
            "id": "chatcmpl-1",
            "choices": [{ "index": 0, "message": { "role": "assistant", "content": content } }]
        })
        .to_string()
    }

    fn groq(transport: MockHttpTransport, key: Option<&str>) -> OpenAiCompatibleProvider {
        let config = Config {
            groq_api_key: key.map(str::to_string),
            groq_api_url: "http://groq.test/openai/v1/".to_string(),
            ..Config::default()
        };
        OpenAiCompatibleProvider::groq(Arc::new(transport), &config)
    }

    fn request(exclude: &[&str]) -> GenerationRequest {
        GenerationRequest {
            vibe: "cozy autumn mystery".to_string(),
            exclude: exclude.iter().map(|s| s.to_string()).collect(),
            target_count: 1,
        }
    }

    #[tokio::test]
    async fn test_request_shape_and_label() {
        let mut transport = MockHttpTransport::new();
        transport
            .expect_send()
            .times(1)
            .withf(|req| {
                let body = req.body.as_ref().unwrap();
                req.url == "http://groq.test/openai/v1/chat/completions"
                    && req.headers.contains(&("Authorization".to_string(), "Bearer gsk".to_string()))
                    && body["model"] == "llama-3.3-70b-versatile"
                    && body["response_format"]["type"] == "json_object"
                    && body["messages"][0]["role"] == "system"
                    && body["messages"][0]["content"]
                        .as_str()
                        .unwrap()
                        .contains("Do NOT recommend any of these movies (the user has already seen them): Knives Out.")
                    && body["messages"][1]["content"] == "cozy autumn mystery"
            })
            .returning(|_| {
                Ok(HttpResponse::new(
                    200,
                    completion(
                        r#"{"movies":[{"title":"Gosford Park","year":"2001","vibe_match":"manor intrigue","tmdb_search_query":"Gosford Park"}]}"#,
                    ),
                ))
            });

        let result = groq(transport, Some("gsk"))
            .generate(&request(&["Knives Out"]), &RecordingObserver::new())
            .await
            .unwrap();

        assert_eq!(result.provider, "groq:llama-3.3-70b-versatile");
        assert_eq!(result.movies[0].title, "Gosford Park");
    }

    #[tokio::test]
    async fn test_http_error() {
        let mut transport = MockHttpTransport::new();
        transport
            .expect_send()
            .returning(|_| Ok(HttpResponse::new(401, r#"{"error":"invalid key"}"#)));

        let err = groq(transport, Some("gsk"))
            .generate(&request(&[]), &RecordingObserver::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Http { status: 401, .. }));
    }

    #[tokio::test]
    async fn test_empty_content() {
        let mut transport = MockHttpTransport::new();
        transport
            .expect_send()
            .returning(|_| Ok(HttpResponse::new(200, r#"{"choices":[]}"#)));

        let err = groq(transport, Some("gsk"))
            .generate(&request(&[]), &RecordingObserver::new())
            .await
            .unwrap_err();
        assert_eq!(err, ProviderError::EmptyResponse("groq"));
    }

    #[tokio::test]
    async fn test_missing_key_names_credential() {
        let config = Config {
            deepseek_api_key: Some("  ".to_string()),
            ..Config::default()
        };
        let mut transport = MockHttpTransport::new();
        transport.expect_send().times(0);
        let deepseek = OpenAiCompatibleProvider::deepseek(Arc::new(transport), &config);

        assert!(!deepseek.is_configured());
        let err = deepseek
            .generate(&request(&[]), &RecordingObserver::new())
            .await
            .unwrap_err();
        assert_eq!(err, ProviderError::MissingCredential("DEEPSEEK_API_KEY"));
    }
}
