use anyhow::Result;
use std::sync::Arc;

use dataset_auditor::{config, logging, routes, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    logging::init_logging()?;

    // Load configuration
    let config = config::load_config()?;
    let addr = config.bind_addr;
    tracing::info!(
        "LLM endpoint: {} (model: {}), upload limit: {}MB",
        config.llm_url,
        config.llm_model,
        config.max_upload_bytes / (1024 * 1024)
    );

    // Build our application state
    let state = Arc::new(AppState::new(config)?);

    let app = routes::app(state);

    // Run it
    tracing::info!("listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
