use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::info;

use formflow_core::config::GatewayConfig;
use formflow_core::traits::ResponseStore;
use formflow_engine::{CompletionDispatcher, FlowEngine};

use crate::routes;
use crate::state::AppState;

/// HTTP gateway built on axum: respondent session routes, the internal
/// dispatch trigger, and the owner-facing integration surface.
pub struct GatewayServer {
    config: GatewayConfig,
    engine: Arc<FlowEngine>,
    dispatcher: Arc<CompletionDispatcher>,
    store: Arc<dyn ResponseStore>,
}

impl GatewayServer {
    pub fn new(
        config: GatewayConfig,
        engine: Arc<FlowEngine>,
        dispatcher: Arc<CompletionDispatcher>,
        store: Arc<dyn ResponseStore>,
    ) -> Self {
        Self {
            config,
            engine,
            dispatcher,
            store,
        }
    }

    /// Run the gateway until the cancellation token is triggered.
    pub async fn run(&self, shutdown: CancellationToken) -> anyhow::Result<()> {
        let state = Arc::new(AppState {
            config: self.config.clone(),
            engine: self.engine.clone(),
            dispatcher: self.dispatcher.clone(),
            store: self.store.clone(),
        });

        let app = Router::new()
            .route("/api/health", get(routes::health))
            // Respondent session flow
            .route("/api/forms/{id}/sessions", post(routes::start_session))
            .route("/api/sessions/{token}", get(routes::resume_session))
            .route("/api/sessions/{token}/answers", post(routes::submit_answer))
            .route("/api/sessions/{token}/back", post(routes::navigate_back))
            // Internal trigger
            .route(
                "/api/internal/responses/{id}/dispatch",
                post(routes::dispatch_completion),
            )
            // Owner surface
            .route(
                "/api/integrations/{id}/test",
                post(routes::test_integration),
            )
            .route(
                "/api/responses/{id}/integration-logs",
                get(routes::integration_logs),
            )
            .layer(CorsLayer::permissive())
            .with_state(state);

        let listener = TcpListener::bind(&self.config.bind).await?;
        info!(bind = %self.config.bind, "Gateway listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;

        info!("Gateway shut down");
        Ok(())
    }
}
