use std::sync::Arc;

use crate::{
    config::Config,
    services::{
        events::{GenerationObserver, TracingObserver},
        fetch::{HttpTransport, ReqwestTransport},
        orchestrator::GenerationOrchestrator,
        poster::PosterResolver,
        ratings::RatingsResolver,
        recommendations::RecommendationService,
    },
};

/// Shared application state
///
/// Nothing here is mutable; each request works only with its own data.
#[derive(Clone)]
pub struct AppState {
    pub recommendations: Arc<RecommendationService>,
    pub posters: Arc<PosterResolver>,
    pub ratings: Arc<RatingsResolver>,
    pub enrich_concurrency: usize,
}

impl AppState {
    /// Wires every service over the given transport and observer
    pub fn new(
        config: &Config,
        transport: Arc<dyn HttpTransport>,
        observer: Arc<dyn GenerationObserver>,
    ) -> Self {
        let orchestrator = GenerationOrchestrator::from_config(transport.clone(), config, observer);

        Self {
            recommendations: Arc::new(RecommendationService::new(
                orchestrator,
                config.target_count,
            )),
            posters: Arc::new(PosterResolver::new(transport.clone(), config)),
            ratings: Arc::new(RatingsResolver::new(transport, config)),
            enrich_concurrency: config.enrich_concurrency,
        }
    }

    /// Production wiring: reqwest transport, tracing observer
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let transport = ReqwestTransport::new(config.request_timeout())?;
        Ok(Self::new(config, Arc::new(transport), Arc::new(TracingObserver)))
    }
}
