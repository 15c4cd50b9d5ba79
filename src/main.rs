use tracing_subscriber::EnvFilter;

use vibe_reel::{
    api::{create_router, AppState},
    config::Config,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("vibe_reel=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env()?;

    if !config.generation_configured() {
        tracing::warn!(
            "No generation provider configured; set GEMINI_API_KEY, GROQ_API_KEY, or DEEPSEEK_API_KEY"
        );
    }

    // Initialize application state
    let state = AppState::from_config(&config)?;

    // Create the router with all routes
    let app = create_router(state);

    // Start the server
    let address = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!(address = %address, "Server running");
    axum::serve(listener, app).await?;

    Ok(())
}
