use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use formflow_core::error::{FormFlowError, Result};
use formflow_core::traits::SecretStore;
use formflow_core::types::{Integration, IntegrationKind};
use formflow_template::TemplateContext;

use crate::payload::completion_payload;
use crate::registry::IntegrationHandler;
use crate::secrets::resolve_secret;

const BODY_SNIPPET_MAX: usize = 2048;

/// Delivers the common completion payload to an arbitrary HTTP
/// endpoint with optional extra headers.
pub struct WebhookHandler {
    secrets: Arc<dyn SecretStore>,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct WebhookConfig {
    /// Raw URL or `${ENV_VAR}` reference.
    url: String,
    #[serde(default = "default_method")]
    method: String,
    /// Header values may also be secret references (auth tokens).
    #[serde(default)]
    headers: BTreeMap<String, String>,
}

fn default_method() -> String {
    "POST".to_string()
}

struct ComposedWebhook {
    url: String,
    method: reqwest::Method,
    headers: BTreeMap<String, String>,
}

impl WebhookHandler {
    pub fn new(secrets: Arc<dyn SecretStore>, http: reqwest::Client) -> Self {
        Self { secrets, http }
    }

    fn config_err(message: impl Into<String>) -> FormFlowError {
        FormFlowError::IntegrationConfig {
            kind: "webhook".into(),
            message: message.into(),
        }
    }

    fn compose(&self, integration: &Integration) -> Result<ComposedWebhook> {
        let config: WebhookConfig = serde_json::from_value(integration.config.clone())
            .map_err(|e| Self::config_err(e.to_string()))?;

        let method = reqwest::Method::from_bytes(config.method.to_uppercase().as_bytes())
            .map_err(|_| Self::config_err(format!("invalid method '{}'", config.method)))?;

        let url = resolve_secret(self.secrets.as_ref(), &config.url)?;
        let mut headers = BTreeMap::new();
        for (name, value) in config.headers {
            headers.insert(name, resolve_secret(self.secrets.as_ref(), &value)?);
        }

        Ok(ComposedWebhook {
            url,
            method,
            headers,
        })
    }
}

impl IntegrationHandler for WebhookHandler {
    fn kind(&self) -> IntegrationKind {
        IntegrationKind::Webhook
    }

    fn execute(
        &self,
        integration: &Integration,
        ctx: &TemplateContext,
        is_test: bool,
    ) -> BoxFuture<'_, Result<Value>> {
        let composed = self.compose(integration);
        let payload = completion_payload(ctx, is_test);

        Box::pin(async move {
            let composed = composed?;

            let mut request = self
                .http
                .request(composed.method, &composed.url)
                .json(&payload);
            for (name, value) in &composed.headers {
                request = request.header(name, value);
            }

            let resp = request.send().await.map_err(|e| FormFlowError::Handler {
                kind: "webhook".into(),
                message: format!("request failed: {e}"),
            })?;

            let status = resp.status();
            let mut body = resp.text().await.unwrap_or_default();
            if body.len() > BODY_SNIPPET_MAX {
                let mut end = BODY_SNIPPET_MAX;
                while !body.is_char_boundary(end) {
                    end -= 1;
                }
                body.truncate(end);
            }

            if !status.is_success() {
                return Err(FormFlowError::Handler {
                    kind: "webhook".into(),
                    message: format!("endpoint returned {status}: {body}"),
                });
            }

            debug!(status = %status, url = %composed.url, "Webhook dispatched");
            Ok(json!({ "status": status.as_u16(), "body": body }))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secrets::StaticSecretStore;
    use formflow_core::types::*;

    fn handler(secrets: StaticSecretStore) -> WebhookHandler {
        WebhookHandler::new(Arc::new(secrets), reqwest::Client::new())
    }

    fn integration(config: Value) -> Integration {
        Integration {
            id: IntegrationId::from_string("i1"),
            form_id: FormId::from_string("f1"),
            kind: "webhook".into(),
            name: "crm sync".into(),
            enabled: true,
            trigger: IntegrationTrigger::FormCompleted,
            config,
        }
    }

    #[test]
    fn defaults_to_post_and_resolves_header_secrets() {
        let handler = handler(StaticSecretStore::new([("API_TOKEN", "tok_123")]));
        let composed = handler
            .compose(&integration(json!({
                "url": "https://example.com/hook",
                "headers": { "Authorization": "${API_TOKEN}" },
            })))
            .unwrap();
        assert_eq!(composed.method, reqwest::Method::POST);
        assert_eq!(composed.headers["Authorization"], "tok_123");
    }

    #[test]
    fn invalid_method_is_a_config_error() {
        let handler = handler(StaticSecretStore::new::<_, &str, &str>([]));
        assert!(matches!(
            handler.compose(&integration(
                json!({"url": "https://example.com", "method": "TELEPORT IT"})
            )),
            Err(FormFlowError::IntegrationConfig { .. })
        ));
    }

    #[test]
    fn missing_url_secret_fails() {
        let handler = handler(StaticSecretStore::new::<_, &str, &str>([]));
        assert!(matches!(
            handler.compose(&integration(json!({"url": "${MISSING}"}))),
            Err(FormFlowError::MissingSecret(_))
        ));
    }
}
