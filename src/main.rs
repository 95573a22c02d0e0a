use std::sync::Arc;

use anyhow::Context;
use news_summarizer_api::llm::AnthropicClient;
use news_summarizer_api::{create_router, AppState, Config, Summarizer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = Config::from_env().context("failed to load configuration")?;
    tracing::info!(upstream = ?config.upstream, upload = ?config.upload, "configuration loaded");

    let client = AnthropicClient::new(&config.upstream).context("failed to build upstream client")?;
    let state = AppState {
        summarizer: Arc::new(Summarizer::new(Arc::new(client), config.upload.clone())),
    };

    let static_dir = Some(config.server.static_dir.clone()).filter(|dir| dir.is_dir());
    if static_dir.is_none() {
        tracing::warn!(dir = %config.server.static_dir.display(), "static directory not found, front end disabled");
    }

    let app = create_router(state, static_dir);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
