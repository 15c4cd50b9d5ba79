/// Generation fallback chain
///
/// Providers are tried strictly one after another in priority order and the
/// first success wins. Unconfigured providers are skipped without a call.
use std::sync::Arc;
use std::time::Instant;

use crate::{
    config::Config,
    error::GenerationError,
    models::GenerationResult,
    services::{
        events::{GenerationEvent, GenerationObserver},
        fetch::HttpTransport,
        providers::{GeminiProvider, GenerationProvider, GenerationRequest, OpenAiCompatibleProvider},
    },
};

pub struct GenerationOrchestrator {
    providers: Vec<Arc<dyn GenerationProvider>>,
    observer: Arc<dyn GenerationObserver>,
}

impl GenerationOrchestrator {
    pub fn new(
        providers: Vec<Arc<dyn GenerationProvider>>,
        observer: Arc<dyn GenerationObserver>,
    ) -> Self {
        Self {
            providers,
            observer,
        }
    }

    /// Gemini, then Groq, then DeepSeek
    pub fn from_config(
        transport: Arc<dyn HttpTransport>,
        config: &Config,
        observer: Arc<dyn GenerationObserver>,
    ) -> Self {
        let providers: Vec<Arc<dyn GenerationProvider>> = vec![
            Arc::new(GeminiProvider::new(transport.clone(), config)),
            Arc::new(OpenAiCompatibleProvider::groq(transport.clone(), config)),
            Arc::new(OpenAiCompatibleProvider::deepseek(transport, config)),
        ];
        Self::new(providers, observer)
    }

    /// Names and configured state, in priority order
    pub fn provider_status(&self) -> Vec<(&'static str, bool)> {
        self.providers
            .iter()
            .map(|p| (p.name(), p.is_configured()))
            .collect()
    }

    pub async fn orchestrate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResult, GenerationError> {
        let mut attempts = 0;

        for provider in &self.providers {
            let name = provider.name();

            if !provider.is_configured() {
                self.observer.on_event(&GenerationEvent::ProviderSkipped {
                    provider: name,
                    reason: "credential not configured".to_string(),
                });
                continue;
            }

            attempts += 1;
            self.observer
                .on_event(&GenerationEvent::ProviderStarted { provider: name });
            let started = Instant::now();

            match provider.generate(request, self.observer.as_ref()).await {
                Ok(result) => {
                    self.observer.on_event(&GenerationEvent::ProviderSucceeded {
                        provider: name,
                        label: result.provider.clone(),
                        latency: started.elapsed(),
                    });
                    return Ok(result);
                }
                Err(e) => {
                    self.observer.on_event(&GenerationEvent::ProviderFailed {
                        provider: name,
                        error: e.to_string(),
                        latency: started.elapsed(),
                    });
                }
            }
        }

        if attempts == 0 {
            tracing::error!("No generation provider has a credential configured");
            Err(GenerationError::NoProviderConfigured)
        } else {
            tracing::error!(attempts, "Every configured generation provider failed");
            Err(GenerationError::AllProvidersFailed { attempts })
        }
    }
}
