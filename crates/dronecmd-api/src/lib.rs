//! dronecmd API: the inbound HTTP surface
//!
//! Free-text commands and batches go through the interpreter; the device
//! routes dispatch one action directly.
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;

pub use error::ApiError;
pub use metrics::Metrics;
pub use middleware::{CorrelationId, RateLimiter, API_KEY_HEADER, CORRELATION_HEADER};

use axum::body::Bytes;
use axum::extract::{Extension, State};
use axum::routing::{get, post, MethodRouter};
use axum::Router;
use dronecmd_config::ConfigHandle;
use dronecmd_dispatch::{BatchExecutor, CommandPipeline};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::TraceLayer;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<CommandPipeline>,
    pub batch: BatchExecutor,
    pub config: ConfigHandle,
    pub metrics: Arc<Metrics>,
    pub limiter: Arc<RateLimiter>,
    pub started: Instant,
}

impl AppState {
    pub fn new(pipeline: CommandPipeline, metrics: Metrics) -> Self {
        let config = pipeline.config().clone();
        let pipeline = Arc::new(pipeline);
        Self {
            batch: BatchExecutor::new(pipeline.clone()),
            pipeline,
            config,
            metrics: Arc::new(metrics),
            limiter: Arc::new(RateLimiter::new()),
            started: Instant::now(),
        }
    }
}

fn action(name: &'static str) -> MethodRouter<AppState> {
    post(
        move |state: State<AppState>, id: Extension<CorrelationId>, body: Bytes| {
            handlers::run_action(state, id, name, body)
        },
    )
}

fn query(name: &'static str) -> MethodRouter<AppState> {
    get(move |state: State<AppState>, id: Extension<CorrelationId>| {
        handlers::run_action(state, id, name, Bytes::new())
    })
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/command", post(handlers::command))
        .route("/command/batch", post(handlers::batch))
        .route("/drone/connect", action("connect"))
        .route("/drone/disconnect", action("disconnect"))
        .route("/drone/takeoff", action("takeoff"))
        .route("/drone/land", action("land"))
        .route("/drone/move", action("move"))
        .route("/drone/rotate", action("rotate"))
        .route("/drone/emergency-stop", action("emergency_stop"))
        .route("/drone/launch", action("launch"))
        .route("/camera/photo", action("take_photo"))
        .route("/vision/detect", action("detect_objects"))
        .route("/vision/tracking/start", action("start_tracking"))
        .route("/vision/tracking/stop", action("stop_tracking"))
        .route("/datasets", query("list_datasets").merge(action("create_dataset")))
        .route("/models", query("list_models"))
        .route("/models/train", action("train_model"))
        .route("/system/health", get(handlers::health))
        .route("/system/status", get(handlers::status))
        .route("/config", get(handlers::config))
        .route("/metrics", get(handlers::metrics))
        .layer(axum::middleware::from_fn_with_state(state.clone(), middleware::rate_limit))
        .layer(axum::middleware::from_fn_with_state(state.clone(), middleware::require_api_key))
        .layer(axum::middleware::from_fn(middleware::correlation_id))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::cors())
        .with_state(state)
}

/// Serve until `shutdown` resolves
pub async fn serve(
    state: AppState,
    listener: tokio::net::TcpListener,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    tracing::info!(addr = ?listener.local_addr().ok(), "dronecmd API listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}
