// src/server/mod.rs
//
// HTTP surface: the `/ws` event channel, `/health`, and the optional static
// client directory.

pub mod protocol;
mod websocket;

pub use protocol::{CaptureSource, ClientEvent, ServerEvent, TranslationResult};
pub use websocket::ws_handler;

use crate::pipeline::FramePipeline;
use crate::session::SessionRegistry;
use crate::types::{Config, Language};
use anyhow::{Context, Result};
use axum::{extract::State, routing::get, Json, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::{error, info};

/// Shared by every handler; cloning is an `Arc` bump.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    registry: SessionRegistry,
    pipeline: FramePipeline,
}

impl AppState {
    pub fn new(config: Config, pipeline: FramePipeline) -> Self {
        let registry = SessionRegistry::new(config.recognition.clone());
        Self {
            inner: Arc::new(AppStateInner {
                config,
                registry,
                pipeline,
            }),
        }
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.inner.registry
    }

    pub fn pipeline(&self) -> &FramePipeline {
        &self.inner.pipeline
    }

    pub fn language(&self) -> Language {
        self.inner.config.language
    }

    pub fn frame_timeout(&self) -> Duration {
        Duration::from_millis(self.inner.config.performance.frame_timeout_ms.max(1))
    }
}

pub fn router(state: AppState) -> Router {
    let mut app = Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health));

    if let Some(dir) = &state.config().server.static_dir {
        info!("Serving static files from {}", dir);
        app = app.fallback_service(ServeDir::new(dir));
    }

    app.layer(TraceLayer::new_for_http()).with_state(state)
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "classifier_loaded": state.pipeline().has_classifier(),
        "sessions": state.registry().len(),
        "metrics": state.pipeline().metrics().summary(),
    }))
}

/// Bind and serve until Ctrl+C.
pub async fn serve(state: AppState) -> Result<()> {
    let server = &state.config().server;
    let addr: SocketAddr = format!("{}:{}", server.host, server.port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", server.host, server.port))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("✓ Listening on http://{}", addr);
    info!("  WebSocket endpoint: ws://{}/ws", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
            info!("Shutdown signal received");
        })
        .await
        .context("Server error")?;

    Ok(())
}
