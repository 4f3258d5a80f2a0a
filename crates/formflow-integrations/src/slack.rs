use std::sync::Arc;

use futures::future::BoxFuture;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use formflow_core::error::{FormFlowError, Result};
use formflow_core::traits::SecretStore;
use formflow_core::types::{Integration, IntegrationKind};
use formflow_template::TemplateContext;

use crate::registry::IntegrationHandler;
use crate::secrets::resolve_secret;

// Slack caps section text at 3000 characters.
const SLACK_TEXT_MAX: usize = 2900;

/// Posts the completion summary to a Slack incoming webhook.
pub struct SlackHandler {
    secrets: Arc<dyn SecretStore>,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct SlackConfig {
    /// Raw URL or `${ENV_VAR}` reference.
    webhook_url: String,
    #[serde(default)]
    channel: Option<String>,
}

impl SlackHandler {
    pub fn new(secrets: Arc<dyn SecretStore>, http: reqwest::Client) -> Self {
        Self { secrets, http }
    }

    fn compose(
        &self,
        integration: &Integration,
        ctx: &TemplateContext,
        is_test: bool,
    ) -> Result<(String, Value)> {
        let config: SlackConfig = serde_json::from_value(integration.config.clone())
            .map_err(|e| FormFlowError::IntegrationConfig {
                kind: "slack".into(),
                message: e.to_string(),
            })?;

        let url = resolve_secret(self.secrets.as_ref(), &config.webhook_url)?;

        let title = ctx.get("form_title").unwrap_or_default();
        let number = ctx.get("response_number").unwrap_or_default();
        let mut headline = format!("New response #{} for {}", number, title);
        if is_test {
            headline = format!("[Test] {}", headline);
        }

        let summary = clip(ctx.get("all_answers_markdown").unwrap_or_default());

        let mut payload = json!({
            "text": headline,
            "blocks": [
                {
                    "type": "section",
                    "text": { "type": "mrkdwn", "text": format!("*{}*", headline) }
                },
                {
                    "type": "section",
                    "text": { "type": "mrkdwn", "text": summary }
                }
            ]
        });
        if let Some(channel) = config.channel {
            payload["channel"] = Value::String(channel);
        }

        Ok((url, payload))
    }
}

fn clip(text: &str) -> String {
    if text.chars().count() <= SLACK_TEXT_MAX {
        return text.to_string();
    }
    let mut clipped: String = text.chars().take(SLACK_TEXT_MAX).collect();
    clipped.push('…');
    clipped
}

impl IntegrationHandler for SlackHandler {
    fn kind(&self) -> IntegrationKind {
        IntegrationKind::Slack
    }

    fn execute(
        &self,
        integration: &Integration,
        ctx: &TemplateContext,
        is_test: bool,
    ) -> BoxFuture<'_, Result<Value>> {
        let composed = self.compose(integration, ctx, is_test);

        Box::pin(async move {
            let (url, payload) = composed?;

            let resp = self
                .http
                .post(&url)
                .json(&payload)
                .send()
                .await
                .map_err(|e| FormFlowError::Handler {
                    kind: "slack".into(),
                    message: format!("webhook post failed: {e}"),
                })?;

            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();

            if !status.is_success() {
                return Err(FormFlowError::Handler {
                    kind: "slack".into(),
                    message: format!("webhook returned {status}: {body}"),
                });
            }

            debug!(status = %status, "Slack message dispatched");
            Ok(json!({ "status": status.as_u16(), "body": body }))
        })
    }
}
