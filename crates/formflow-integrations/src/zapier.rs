use std::sync::Arc;

use futures::future::BoxFuture;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use formflow_core::error::{FormFlowError, Result};
use formflow_core::traits::SecretStore;
use formflow_core::types::{Integration, IntegrationKind};
use formflow_template::TemplateContext;

use crate::payload::completion_payload;
use crate::registry::IntegrationHandler;
use crate::secrets::resolve_secret;

/// Pushes the common completion payload to a Zapier catch hook.
pub struct ZapierHandler {
    secrets: Arc<dyn SecretStore>,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct ZapierConfig {
    /// Raw URL or `${ENV_VAR}` reference.
    hook_url: String,
}

impl ZapierHandler {
    pub fn new(secrets: Arc<dyn SecretStore>, http: reqwest::Client) -> Self {
        Self { secrets, http }
    }

    fn hook_url(&self, integration: &Integration) -> Result<String> {
        let config: ZapierConfig = serde_json::from_value(integration.config.clone())
            .map_err(|e| FormFlowError::IntegrationConfig {
                kind: "zapier".into(),
                message: e.to_string(),
            })?;
        resolve_secret(self.secrets.as_ref(), &config.hook_url)
    }
}

impl IntegrationHandler for ZapierHandler {
    fn kind(&self) -> IntegrationKind {
        IntegrationKind::Zapier
    }

    fn execute(
        &self,
        integration: &Integration,
        ctx: &TemplateContext,
        is_test: bool,
    ) -> BoxFuture<'_, Result<Value>> {
        let url = self.hook_url(integration);
        let payload = completion_payload(ctx, is_test);

        Box::pin(async move {
            let url = url?;

            let resp = self
                .http
                .post(&url)
                .json(&payload)
                .send()
                .await
                .map_err(|e| FormFlowError::Handler {
                    kind: "zapier".into(),
                    message: format!("hook post failed: {e}"),
                })?;

            let status = resp.status();
            let body: Value = resp.json().await.unwrap_or(Value::Null);

            if !status.is_success() {
                return Err(FormFlowError::Handler {
                    kind: "zapier".into(),
                    message: format!("hook returned {status}: {body}"),
                });
            }

            debug!(status = %status, "Zapier hook dispatched");
            Ok(body)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secrets::StaticSecretStore;
    use formflow_core::types::*;
    use serde_json::json;

    #[test]
    fn hook_url_resolves_secret_references() {
        let handler = ZapierHandler::new(
            Arc::new(StaticSecretStore::new([(
                "ZAP_HOOK",
                "https://hooks.zapier.com/hooks/catch/1/a",
            )])),
            reqwest::Client::new(),
        );
        let integration = Integration {
            id: IntegrationId::from_string("i1"),
            form_id: FormId::from_string("f1"),
            kind: "zapier".into(),
            name: "zap".into(),
            enabled: true,
            trigger: IntegrationTrigger::FormCompleted,
            config: json!({"hook_url": "${ZAP_HOOK}"}),
        };
        assert_eq!(
            handler.hook_url(&integration).unwrap(),
            "https://hooks.zapier.com/hooks/catch/1/a"
        );
    }
}
