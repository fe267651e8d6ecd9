//! HTTP Gateway
//!
//! axum server exposing user, account and transfer endpoints. Account and
//! transfer routes sit behind [`jwt_auth_middleware`], which injects the
//! caller's [`crate::user_auth::Claims`].

pub mod handlers;
pub mod openapi;
pub mod state;
pub mod types;

use axum::{
    Json, Router,
    middleware::from_fn_with_state,
    routing::{get, post},
};
use std::sync::Arc;
use tokio::net::TcpListener;

use utoipa::OpenApi;

use crate::config::GatewayConfig;
use crate::user_auth::handlers::{create_user, login_user};
use crate::user_auth::jwt_auth_middleware;
use state::AppState;

/// Build the complete router
pub fn build_router(state: Arc<AppState>) -> Router {
    // Private routes (JWT required)
    let private_routes = Router::new()
        .route(
            "/api/v1/accounts",
            post(handlers::create_account).get(handlers::list_accounts),
        )
        .route("/api/v1/accounts/{id}", get(handlers::get_account))
        .route("/api/v1/transfers", post(handlers::create_transfer))
        .layer(from_fn_with_state(state.clone(), jwt_auth_middleware));

    Router::new()
        .route("/api/v1/health", get(handlers::health_check))
        .route("/api/v1/users", post(create_user))
        .route("/api/v1/users/login", post(login_user))
        .route("/api-docs/openapi.json", get(openapi_json))
        .merge(private_routes)
        .with_state(state)
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(openapi::ApiDoc::openapi())
}

/// Serve until Ctrl-C
pub async fn run_server(config: &GatewayConfig, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = build_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind {}: {}", addr, e))?;

    tracing::info!("Gateway listening on http://{}", addr);
    tracing::info!("OpenAPI JSON: http://{}/api-docs/openapi.json", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
