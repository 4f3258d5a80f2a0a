use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use formflow_core::config::DispatchConfig;
use formflow_core::error::{FormFlowError, Result};
use formflow_core::traits::ResponseStore;
use formflow_core::types::{
    Integration, IntegrationId, IntegrationLog, IntegrationTrigger, LogStatus, ResponseId,
};
use formflow_integrations::{completion_payload, HandlerRegistry};
use formflow_template::TemplateContext;

/// Outcome of one dispatch call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchSummary {
    /// Integrations that delivered successfully.
    pub processed: usize,
    /// Integrations that errored (logged, never retried here).
    pub failed: usize,
    /// True when another caller already claimed this response.
    pub already_processed: bool,
}

impl DispatchSummary {
    fn already() -> Self {
        Self {
            processed: 0,
            failed: 0,
            already_processed: true,
        }
    }
}

/// Fans a completed response out to its form's enabled integrations,
/// exactly once per response. The idempotency claim is the commit
/// point: once won, every integration runs to an outcome and is
/// logged, with no cross-handler failure propagation.
pub struct CompletionDispatcher {
    store: Arc<dyn ResponseStore>,
    registry: Arc<HandlerRegistry>,
    handler_timeout: Duration,
}

impl CompletionDispatcher {
    pub fn new(
        store: Arc<dyn ResponseStore>,
        registry: Arc<HandlerRegistry>,
        config: &DispatchConfig,
    ) -> Self {
        Self {
            store,
            registry,
            handler_timeout: Duration::from_secs(config.handler_timeout_secs),
        }
    }

    pub async fn dispatch(&self, response_id: &ResponseId) -> Result<DispatchSummary> {
        // Claim before any other work so two racing callers cannot
        // both see an unclaimed response and double-deliver.
        if !self.store.claim_dispatch(response_id, Utc::now()).await? {
            debug!(response = %response_id, "Dispatch already processed, skipping");
            return Ok(DispatchSummary::already());
        }

        let response = self
            .store
            .load_response(response_id)
            .await?
            .ok_or_else(|| FormFlowError::ResponseNotFound(response_id.to_string()))?;
        let definition = self
            .store
            .load_form(&response.form_id)
            .await?
            .ok_or_else(|| FormFlowError::FormNotFound(response.form_id.to_string()))?;
        let answers = self.store.load_answers(response_id).await?;

        // Built once; every handler renders from the same context.
        let ctx = TemplateContext::build(&definition, &response, &answers);

        let integrations = self
            .store
            .enabled_integrations(&response.form_id, IntegrationTrigger::FormCompleted)
            .await?;

        if integrations.is_empty() {
            info!(response = %response_id, "Dispatch complete, no integrations enabled");
            return Ok(DispatchSummary {
                processed: 0,
                failed: 0,
                already_processed: false,
            });
        }

        let payload_snapshot = completion_payload(&ctx, false);

        // Settle all: every integration runs to its own outcome, no
        // short-circuit on the first failure.
        let outcomes = futures::future::join_all(integrations.iter().map(|integration| {
            let ctx = &ctx;
            async move {
                let result = self.run_handler(integration, ctx, false).await;
                (integration, result)
            }
        }))
        .await;

        let mut processed = 0;
        let mut failed = 0;
        for (integration, result) in outcomes {
            let log = match result {
                Ok(data) => {
                    processed += 1;
                    self.log_row(integration, response_id, LogStatus::Success, &payload_snapshot, Some(data), None)
                }
                Err(e) => {
                    failed += 1;
                    warn!(
                        integration = %integration.id,
                        kind = %integration.kind,
                        error = %e,
                        "Integration dispatch failed"
                    );
                    self.log_row(
                        integration,
                        response_id,
                        LogStatus::Error,
                        &payload_snapshot,
                        None,
                        Some(e.to_string()),
                    )
                }
            };
            if let Err(e) = self.store.append_integration_log(&log).await {
                error!(integration = %integration.id, error = %e, "Failed to append integration log");
            }
        }

        info!(response = %response_id, processed, failed, "Completion dispatch finished");
        Ok(DispatchSummary {
            processed,
            failed,
            already_processed: false,
        })
    }

    /// Run one handler against synthetic sample data. Returns the
    /// handler's outcome and writes no log row.
    pub async fn test(&self, integration_id: &IntegrationId) -> Result<Value> {
        let integration = self
            .store
            .load_integration(integration_id)
            .await?
            .ok_or_else(|| FormFlowError::IntegrationNotFound(integration_id.to_string()))?;
        let definition = self
            .store
            .load_form(&integration.form_id)
            .await?
            .ok_or_else(|| FormFlowError::FormNotFound(integration.form_id.to_string()))?;

        let ctx = TemplateContext::sample(&definition);
        self.run_handler(&integration, &ctx, true).await
    }

    async fn run_handler(
        &self,
        integration: &Integration,
        ctx: &TemplateContext,
        is_test: bool,
    ) -> Result<Value> {
        let handler = self.registry.resolve(&integration.kind)?;
        match tokio::time::timeout(self.handler_timeout, handler.execute(integration, ctx, is_test))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(FormFlowError::HandlerTimeout {
                kind: integration.kind.clone(),
                timeout_secs: self.handler_timeout.as_secs(),
            }),
        }
    }

    fn log_row(
        &self,
        integration: &Integration,
        response_id: &ResponseId,
        status: LogStatus,
        payload: &Value,
        response_data: Option<Value>,
        error_message: Option<String>,
    ) -> IntegrationLog {
        IntegrationLog {
            id: uuid::Uuid::new_v4().to_string(),
            integration_id: integration.id.clone(),
            response_id: response_id.clone(),
            status,
            payload: payload.clone(),
            response_data,
            error_message,
            executed_at: Utc::now(),
        }
    }
}
