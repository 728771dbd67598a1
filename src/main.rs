mod config;
mod dto;
mod error;
mod external;
mod handlers;
mod middleware;
mod models;
mod repositories;
mod services;
#[cfg(test)]
mod test_support;
mod utils;
mod workers;

use axum::{
    http::{header, Method},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use sqlx::mysql::MySqlPoolOptions;
use sqlx::MySqlPool;
use std::time::Duration;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{AppState, Config};
use crate::handlers::{
    authorize_finish_handler, authorize_handler, authorize_options_handler,
    finish_authentication_handler, finish_registration_handler, start_authentication_handler,
    start_registration_handler,
};
use crate::workers::spawn_expiry_worker;

/// Health check response
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Health check endpoint
async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Readiness check - verifies database connection
async fn ready_handler(
    axum::extract::State(pool): axum::extract::State<MySqlPool>,
) -> Result<Json<HealthResponse>, axum::http::StatusCode> {
    sqlx::query("SELECT 1")
        .execute(&pool)
        .await
        .map_err(|_| axum::http::StatusCode::SERVICE_UNAVAILABLE)?;

    Ok(Json(HealthResponse {
        status: "ready",
        version: env!("CARGO_PKG_VERSION"),
    }))
}

/// Create the application router with all routes configured
///
/// # Routes
///
/// ## OAuth2 authorization endpoint (no authentication required)
/// - GET /oauth2/authorize - Initial authorization request
/// - POST /oauth2/authorize - Engine-response leg (front-channel client)
/// - OPTIONS /oauth2/authorize - CORS preflight
///
/// ## Passkey ceremonies (driven by the login flow)
/// - POST /passkey/registration/start
/// - POST /passkey/registration/finish
/// - POST /passkey/authentication/start
/// - POST /passkey/authentication/finish
pub fn create_router(state: AppState) -> Router {
    // The authorization endpoint serves browser front-channels of other
    // origins: mirror the origin so credentials stay allowed.
    let oauth_routes = Router::new()
        .route(
            "/authorize",
            get(authorize_handler)
                .post(authorize_finish_handler)
                .options(authorize_options_handler),
        )
        .layer(
            CorsLayer::new()
                .allow_origin(AllowOrigin::mirror_request())
                .allow_methods([Method::GET, Method::POST])
                .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
                .allow_credentials(true),
        );

    let passkey_routes = Router::new()
        .route("/registration/start", axum::routing::post(start_registration_handler))
        .route("/registration/finish", axum::routing::post(finish_registration_handler))
        .route("/authentication/start", axum::routing::post(start_authentication_handler))
        .route("/authentication/finish", axum::routing::post(finish_authentication_handler));

    Router::new()
        .route("/health", get(health_handler))
        .nest("/oauth2", oauth_routes)
        .nest("/passkey", passkey_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "idp_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    // Create database pool with production settings
    let pool = MySqlPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(5))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(&config.database_url)
        .await?;

    // Run migrations
    sqlx::migrate!("./migrations").run(&pool).await?;

    let addr = config.socket_addr();

    // Create app state
    let state = AppState::new(pool.clone(), config);

    // Periodic sweep of expired transient state
    spawn_expiry_worker(&state);

    // Build router; readiness keeps its own handle on the pool
    let app = create_router(state).merge(
        Router::new()
            .route("/ready", get(ready_handler))
            .with_state(pool),
    );

    tracing::info!("IdP server v{} listening on {}", env!("CARGO_PKG_VERSION"), addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown...");
        },
    }
}
