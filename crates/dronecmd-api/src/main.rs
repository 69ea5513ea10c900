//! Binary entrypoint for the dronecmd API server.
use anyhow::Context;
use dronecmd_api::{serve, AppState, Metrics};
use dronecmd_client::HttpBackendClient;
use dronecmd_config::{spawn_watcher, ConfigManager, DEFAULT_DEBOUNCE};
use dronecmd_dispatch::{CommandPipeline, Dispatcher};
use dronecmd_in::Interpreter;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let manager = Arc::new(ConfigManager::from_env().context("failed to load configuration")?);
    let config = manager.current();

    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
    tracing::info!(path = %manager.path().display(), "configuration loaded");

    let _watcher = spawn_watcher(manager.clone(), DEFAULT_DEBOUNCE).context("failed to watch configuration")?;

    let interpreter = match &config.interpreter.grammar_path {
        Some(path) => Interpreter::from_path(path).with_context(|| format!("failed to load grammar {}", path))?,
        None => Interpreter::builtin().context("failed to load built-in grammar")?,
    };
    let client = HttpBackendClient::new(manager.handle()).context("failed to build backend client")?;
    let dispatcher = Dispatcher::new(Arc::new(client), manager.handle());
    let pipeline = CommandPipeline::new(Arc::new(interpreter), dispatcher);
    let state = AppState::new(pipeline, Metrics::new().context("failed to register metrics")?);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    serve(state, listener, shutdown_signal()).await.context("server error")?;
    tracing::info!("dronecmd API stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
