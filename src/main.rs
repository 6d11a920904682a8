//! Reviewer Assignment Service
//!
//! Tracks teams, users and pull requests, assigns reviewers automatically and
//! reassigns them on request. SQLite persistence behind a storage port.

mod api;
mod config;
mod db;
mod errors;
mod models;
mod services;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    error_handling::HandleErrorLayer,
    routing::{get, post},
    BoxError, Json, Router,
};
use serde_json::{json, Value};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::{Config, Environment};
use db::{SqliteStore, Store};
use errors::AppError;
use services::{selection, PullRequestService, TeamService, UserService};

/// Upper bound for a single request, transaction included.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Upper bound for opening the database at startup.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub teams: TeamService,
    pub users: UserService,
    pub pull_requests: PullRequestService,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, rng: selection::RandomSource) -> Self {
        Self {
            teams: TeamService::new(store.clone()),
            users: UserService::new(store.clone()),
            pull_requests: PullRequestService::new(store, rng),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env()?;

    init_logging(config.env);

    tracing::info!(env = config.env.as_str(), port = config.http_port, "Starting reviewer assignment service");

    // Initialize database
    let pool = tokio::time::timeout(CONNECT_TIMEOUT, db::init_database(&config.database_url)).await??;
    let store = SqliteStore::new(pool);
    store.ping().await?;
    tracing::info!("Connected to database");

    let state = AppState::new(Arc::new(store), selection::entropy_source());
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
    tracing::info!("Server listening on {}", config.bind_addr());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Install the global subscriber. `RUST_LOG` overrides the environment's
/// default level; production logs are JSON lines.
fn init_logging(env: Environment) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(env.log_level()));

    let (json, pretty) = match env {
        Environment::Production => (Some(tracing_subscriber::fmt::layer().json()), None),
        Environment::Development => (None, Some(tracing_subscriber::fmt::layer())),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json)
        .with(pretty)
        .init();
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    let routes = Router::new()
        // Teams
        .route("/team/add", post(api::add_team))
        .route("/team/get", get(api::get_team))
        // Users
        .route("/users/setIsActive", post(api::set_is_active))
        .route("/users/getReview", get(api::get_review))
        // Pull requests
        .route("/pullRequest/create", post(api::create_pull_request))
        .route("/pullRequest/merge", post(api::merge_pull_request))
        .route("/pullRequest/reassign", post(api::reassign_reviewer))
        .route("/pullRequest/get", get(api::get_pull_request))
        // Liveness
        .route("/health", get(health_check))
        .with_state(state);

    with_middleware(routes, REQUEST_TIMEOUT)
}

/// Wrap routes with tracing, CORS and a per-request timeout.
fn with_middleware(routes: Router, request_timeout: Duration) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    routes.layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(cors)
            .layer(HandleErrorLayer::new(handle_middleware_error))
            .timeout(request_timeout),
    )
}

/// Turn middleware failures into the standard error envelope.
async fn handle_middleware_error(err: BoxError) -> AppError {
    if err.is::<tower::timeout::error::Elapsed>() {
        AppError::Internal("request timed out".to_string())
    } else {
        AppError::Internal(format!("unhandled middleware error: {err}"))
    }
}

/// Health check endpoint.
async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Resolve on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutting down server...");
}
