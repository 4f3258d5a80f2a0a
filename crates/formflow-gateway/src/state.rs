use std::sync::Arc;

use formflow_core::config::GatewayConfig;
use formflow_core::traits::ResponseStore;
use formflow_engine::{CompletionDispatcher, FlowEngine};

/// Shared application state for axum handlers.
pub struct AppState {
    pub config: GatewayConfig,
    pub engine: Arc<FlowEngine>,
    pub dispatcher: Arc<CompletionDispatcher>,
    pub store: Arc<dyn ResponseStore>,
}
