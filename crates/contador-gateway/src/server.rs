//! Webhook server — Axum-based HTTP server

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use contador_core::clock::Clock;
use contador_core::ledger::LedgerStore;
use contador_core::providers::LlmProvider;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::webhook::{health_handler, webhook_handler};

/// Shared state for all requests
#[derive(Clone)]
pub struct GatewayState {
    pub ledger: Arc<dyn LedgerStore>,
    pub assistant: Arc<dyn LlmProvider>,
    pub clock: Arc<dyn Clock>,
    /// Today's total above which the reply becomes a warning
    pub daily_threshold: f64,
    pub system_prompt: String,
}

/// The webhook server
pub struct GatewayServer {
    state: GatewayState,
    bind: SocketAddr,
}

impl GatewayServer {
    pub fn new(bind: SocketAddr, state: GatewayState) -> Self {
        Self { state, bind }
    }

    /// Build the Axum router
    pub fn router(&self) -> Router {
        router(self.state.clone())
    }

    /// Start the server (blocks until shutdown)
    pub async fn run(self) -> anyhow::Result<()> {
        let router = self.router();
        let listener = tokio::net::TcpListener::bind(self.bind).await?;
        let port = listener.local_addr()?.port();
        info!("✅ Bot corriendo en http://localhost:{}", port);

        axum::serve(listener, router).await?;
        Ok(())
    }

    /// Start the server in the background, returning a handle
    pub fn spawn(self) -> tokio::task::JoinHandle<anyhow::Result<()>> {
        tokio::spawn(async move { self.run().await })
    }
}

pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route("/", get(health_handler))
        .route("/webhook", post(webhook_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
