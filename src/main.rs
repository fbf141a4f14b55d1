use std::sync::Arc;

use recommender_api::{
    api::{create_router, AppState},
    config::Config,
    services::{OpenAiGenerator, PayloadLimits, ProductStore, SessionStore},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "recommender_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let catalog = ProductStore::load(&config.data_path)?;
    let generator = OpenAiGenerator::new(&config)?;
    let limits = PayloadLimits {
        max_candidates: config.max_candidates,
        max_history: config.max_history,
    };

    let sessions = SessionStore::with_limits(
        config.max_sessions,
        chrono::Duration::seconds(config.session_ttl_secs),
    );

    let state = AppState::new(catalog, Arc::new(generator), limits).with_sessions(sessions);
    let app = create_router(state);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, model = %config.model_name, "Server listening");
    axum::serve(listener, app).await?;

    Ok(())
}
