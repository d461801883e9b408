//! Server initialization
//!
//! Wires the event bus, store, runner and gateway together, builds the
//! router and runs it until a shutdown signal arrives.

use super::config::AppConfig;
use super::validation::validate_config;
use anyhow::{Context, Result};
use axum::{routing::get, Extension, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use stepsos_core::shutdown::shutdown_signal_with_controller;
use stepsos_core::{
    EventBus, ExecutionGateway, ExecutionStore, Pipeline, ShutdownController, ShutdownPhase,
    StepRunner,
};
use stepsos_llm::NarrationService;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Shared handles every handler may need
#[derive(Debug, Clone)]
pub struct AppState {
    pub gateway: ExecutionGateway,
    pub narration: Arc<NarrationService>,
    pub shutdown: Arc<ShutdownController>,
}

impl AppState {
    /// Build the execution stack described by `config`
    pub fn from_config(config: &AppConfig, narration: NarrationService) -> Self {
        let shutdown = ShutdownController::new();
        let bus = EventBus::new();
        let pipeline = Pipeline::file_upload(config.pipeline.allowed_file_types.clone());
        let runner = StepRunner::new(pipeline, bus, config.pipeline.runner_config());
        let gateway = ExecutionGateway::new(ExecutionStore::new(), runner, shutdown.clone())
            .with_default_workflow_id(config.pipeline.default_workflow_id.clone());

        Self {
            gateway,
            narration: Arc::new(narration),
            shutdown,
        }
    }

    /// Bus the runner publishes on
    pub fn bus(&self) -> &EventBus {
        self.gateway.runner().bus()
    }
}

/// Build the main router with all endpoints
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(crate::api::health_routes())
        .merge(crate::api::docs_routes())
        .merge(crate::api::api_router())
        .merge(crate::websocket::websocket_router())
        .route("/", get(|| async { "StepsOS" }))
        .layer(Extension(state.bus().clone()))
        .layer(Extension(state.gateway))
        .layer(Extension(state.narration))
        .layer(Extension(state.shutdown))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Run the server until SIGINT/SIGTERM, then drain in-flight executions
pub async fn run(config: AppConfig) -> Result<()> {
    validate_config(&config)?;

    let narration = NarrationService::from_settings(&config.narration.settings());
    info!(provider = narration.provider_name(), "Narration ready");

    let state = AppState::from_config(&config, narration);
    let gateway = state.gateway.clone();
    let shutdown = state.shutdown.clone();
    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("HTTP server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal_with_controller(shutdown.clone()))
        .await
        .context("HTTP server error")?;

    shutdown.set_phase(ShutdownPhase::Draining);
    let drain_timeout = config.shutdown.drain_timeout();
    if !gateway.drain(drain_timeout).await {
        warn!(
            in_flight = gateway.in_flight(),
            "Shutting down with executions still running"
        );
    }
    shutdown.set_phase(ShutdownPhase::Terminated);

    info!("StepsOS shutdown complete");
    Ok(())
}
