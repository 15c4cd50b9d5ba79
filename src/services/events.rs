use std::sync::Mutex;
use std::time::Duration;

/// Something that happened while walking the generation fallback chain
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationEvent {
    /// Provider left out of the chain because it has no credential
    ProviderSkipped {
        provider: &'static str,
        reason: String,
    },
    ProviderStarted {
        provider: &'static str,
    },
    ProviderSucceeded {
        provider: &'static str,
        /// `vendor:model` that produced the movies
        label: String,
        latency: Duration,
    },
    ProviderFailed {
        provider: &'static str,
        error: String,
        latency: Duration,
    },
    /// One model of a multi-model provider failed
    ModelFailed {
        provider: &'static str,
        model: String,
        error: String,
    },
    RateLimitPause {
        provider: &'static str,
        model: String,
        pause: Duration,
    },
}

pub trait GenerationObserver: Send + Sync {
    fn on_event(&self, event: &GenerationEvent);
}

/// Emits every event as a structured log line
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl GenerationObserver for TracingObserver {
    fn on_event(&self, event: &GenerationEvent) {
        match event {
            GenerationEvent::ProviderSkipped { provider, reason } => {
                tracing::info!(provider, reason = %reason, "Skipping provider");
            }
            GenerationEvent::ProviderStarted { provider } => {
                tracing::info!(provider, "Trying provider");
            }
            GenerationEvent::ProviderSucceeded {
                provider,
                label,
                latency,
            } => {
                tracing::info!(
                    provider,
                    label = %label,
                    latency_ms = latency.as_millis() as u64,
                    "Provider succeeded"
                );
            }
            GenerationEvent::ProviderFailed {
                provider,
                error,
                latency,
            } => {
                tracing::warn!(
                    provider,
                    error = %error,
                    latency_ms = latency.as_millis() as u64,
                    "Provider failed, falling back"
                );
            }
            GenerationEvent::ModelFailed {
                provider,
                model,
                error,
            } => {
                tracing::warn!(provider, model = %model, error = %error, "Model failed");
            }
            GenerationEvent::RateLimitPause {
                provider,
                model,
                pause,
            } => {
                tracing::info!(
                    provider,
                    model = %model,
                    pause_ms = pause.as_millis() as u64,
                    "Rate limited, pausing before next model"
                );
            }
        }
    }
}

/// Keeps events in memory so fallback behaviour can be asserted on
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<GenerationEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<GenerationEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Providers actually invoked, in order
    pub fn started_providers(&self) -> Vec<&'static str> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                GenerationEvent::ProviderStarted { provider } => Some(provider),
                _ => None,
            })
            .collect()
    }
}

impl GenerationObserver for RecordingObserver {
    fn on_event(&self, event: &GenerationEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
