use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::info;

use bugboard_server::config::Config;
use bugboard_server::routes::app_router;
use bugboard_server::{AppState, LifecycleEngine, SqliteRepository};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bugboard_server=info,tower_http=info".into()),
        )
        .init();

    let config = Config::from_env()?;

    let repo = SqliteRepository::new(config.db_path(), config.id_prefix.clone())
        .with_context(|| format!("failed to open database at {}", config.db_path().display()))?;
    let engine = LifecycleEngine::new(Arc::new(repo));
    let state = Arc::new(AppState { engine });

    let app = app_router(state).layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()));

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!(
        %addr,
        db = %config.db_path().display(),
        id_prefix = %config.id_prefix,
        "bugboard listening"
    );

    axum::serve(listener, app)
        .await
        .context("server terminated unexpectedly")?;
    Ok(())
}
