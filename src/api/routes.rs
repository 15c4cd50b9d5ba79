use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::handlers;
use super::AppState;
use crate::middleware::request_id::{make_span_with_request_id, request_id_middleware};

/// Creates the main API router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/api", api_routes())
        .with_state(state)
        // Request id first, so the trace span can pick it up
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(request_id_middleware))
                .layer(TraceLayer::new_for_http().make_span_with(make_span_with_request_id))
                .layer(CorsLayer::permissive()),
        )
}

/// Routes under /api
fn api_routes() -> Router<AppState> {
    Router::new()
        // Generation
        .route("/vibe", post(handlers::generate))
        // Enrichment
        .route("/poster", post(handlers::poster))
        .route("/ratings", post(handlers::ratings))
        .route("/enrich", post(handlers::enrich))
        // Diagnostics
        .route("/providers", get(handlers::providers))
}
