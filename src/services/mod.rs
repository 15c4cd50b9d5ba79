pub mod enrichment;
pub mod events;
pub mod fetch;
pub mod orchestrator;
pub mod poster;
pub mod providers;
pub mod ratings;
pub mod recommendations;

pub use orchestrator::GenerationOrchestrator;
pub use poster::PosterResolver;
pub use ratings::RatingsResolver;
pub use recommendations::RecommendationService;
