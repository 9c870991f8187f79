use std::sync::Arc;

use anyhow::Result;
use medichat::providers::gemini::GeminiProvider;
use tower_http::cors::{Any, CorsLayer};

mod configuration;
mod error;
mod routes;
mod state;

use configuration::Settings;
use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file, quietly skipping it when absent
    let _ = dotenv::dotenv();

    // Initialize logging
    tracing_subscriber::fmt::init();

    let settings = Settings::new()?;
    let addr = settings.server.socket_addr();

    if settings.provider.api_key.is_empty() {
        tracing::warn!("MEDICHAT_PROVIDER__API_KEY is not set; provider calls will fail");
    }

    let provider = GeminiProvider::new(settings.provider.into_config())?;
    let state = AppState::new(Arc::new(provider));

    // Allow the browser client on another origin to reach the relay
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = routes::configure(state).layer(cors);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on {addr}");
    axum::serve(listener, app).await?;

    Ok(())
}
