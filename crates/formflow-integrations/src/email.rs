use std::sync::Arc;

use futures::future::BoxFuture;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use formflow_core::config::EmailSenderConfig;
use formflow_core::error::{FormFlowError, Result};
use formflow_core::traits::SecretStore;
use formflow_core::types::{Integration, IntegrationKind};
use formflow_template::TemplateContext;

use crate::registry::IntegrationHandler;
use crate::secrets::resolve_secret;

/// Sends the completion email through a JSON sending API. The service
/// sender identity comes from [`EmailSenderConfig`]; integrations can
/// opt into a bring-your-own-sender mode with their own verified
/// identity and api key.
pub struct EmailHandler {
    sender: EmailSenderConfig,
    secrets: Arc<dyn SecretStore>,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct EmailConfig {
    to: String,
    #[serde(default = "default_subject")]
    subject: String,
    #[serde(default = "default_body")]
    body: String,
    #[serde(default)]
    use_custom_sender: bool,
    #[serde(default)]
    from_name: Option<String>,
    #[serde(default)]
    from_email: Option<String>,
    /// Raw value or `${ENV_VAR}` reference. Required when
    /// use_custom_sender is set.
    #[serde(default)]
    api_key: Option<String>,
}

fn default_subject() -> String {
    "New response for {{form_title}}".to_string()
}

fn default_body() -> String {
    "<h2>{{form_title}}</h2>\n{{{all_answers_html}}}".to_string()
}

#[derive(Debug)]
struct ComposedEmail {
    api_key: String,
    payload: Value,
}

impl EmailHandler {
    pub fn new(
        sender: EmailSenderConfig,
        secrets: Arc<dyn SecretStore>,
        http: reqwest::Client,
    ) -> Self {
        Self {
            sender,
            secrets,
            http,
        }
    }

    fn config_err(message: impl Into<String>) -> FormFlowError {
        FormFlowError::IntegrationConfig {
            kind: "email".into(),
            message: message.into(),
        }
    }

    fn compose(
        &self,
        integration: &Integration,
        ctx: &TemplateContext,
        is_test: bool,
    ) -> Result<ComposedEmail> {
        let config: EmailConfig = serde_json::from_value(integration.config.clone())
            .map_err(|e| Self::config_err(e.to_string()))?;

        let (from, api_key) = if config.use_custom_sender {
            let from_email = config
                .from_email
                .as_deref()
                .ok_or_else(|| Self::config_err("use_custom_sender requires from_email"))?;
            let from = match config.from_name.as_deref() {
                Some(name) => format!("{} <{}>", name, from_email),
                None => from_email.to_string(),
            };
            let key = config
                .api_key
                .as_deref()
                .ok_or_else(|| Self::config_err("use_custom_sender requires api_key"))?;
            (from, resolve_secret(self.secrets.as_ref(), key)?)
        } else {
            let key = self
                .sender
                .api_key
                .as_deref()
                .ok_or_else(|| Self::config_err("service email api key not configured"))?;
            (
                self.sender.default_from.clone(),
                resolve_secret(self.secrets.as_ref(), key)?,
            )
        };

        let mut subject = ctx.render(&config.subject)?;
        if is_test {
            subject = format!("[Test] {}", subject);
        }
        let html = ctx.render(&config.body)?;

        Ok(ComposedEmail {
            api_key,
            payload: json!({
                "from": from,
                "to": [config.to],
                "subject": subject,
                "html": html,
            }),
        })
    }
}

impl IntegrationHandler for EmailHandler {
    fn kind(&self) -> IntegrationKind {
        IntegrationKind::Email
    }

    fn execute(
        &self,
        integration: &Integration,
        ctx: &TemplateContext,
        is_test: bool,
    ) -> BoxFuture<'_, Result<Value>> {
        let composed = self.compose(integration, ctx, is_test);

        Box::pin(async move {
            let composed = composed?;

            let resp = self
                .http
                .post(&self.sender.api_url)
                .bearer_auth(&composed.api_key)
                .json(&composed.payload)
                .send()
                .await
                .map_err(|e| FormFlowError::Handler {
                    kind: "email".into(),
                    message: format!("send failed: {e}"),
                })?;

            let status = resp.status();
            let body: Value = resp.json().await.unwrap_or(Value::Null);

            if !status.is_success() {
                return Err(FormFlowError::Handler {
                    kind: "email".into(),
                    message: format!("sending API returned {status}: {body}"),
                });
            }

            debug!(status = %status, "Email dispatched");
            Ok(body)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secrets::StaticSecretStore;
    use formflow_core::types::*;

    fn handler(service_key: Option<&str>) -> EmailHandler {
        EmailHandler::new(
            EmailSenderConfig {
                api_url: "https://api.resend.com/emails".into(),
                api_key: service_key.map(|s| s.to_string()),
                default_from: "FormFlow <notifications@formflow.local>".into(),
            },
            Arc::new(StaticSecretStore::new([("SENDER_KEY", "sk_custom")])),
            reqwest::Client::new(),
        )
    }

    fn integration(config: Value) -> Integration {
        Integration {
            id: IntegrationId::from_string("i1"),
            form_id: FormId::from_string("f1"),
            kind: "email".into(),
            name: "owner email".into(),
            enabled: true,
            trigger: IntegrationTrigger::FormCompleted,
            config,
        }
    }

    fn ctx() -> TemplateContext {
        TemplateContext::sample(&FormDefinition {
            form: Form {
                id: FormId::from_string("f1"),
                title: "Survey".into(),
                slug: "survey".into(),
                status: FormStatus::Active,
                access_code: None,
            },
            questions: vec![],
        })
    }

    #[test]
    fn default_templates_render_against_context() {
        let handler = handler(Some("sk_service"));
        let composed = handler
            .compose(&integration(json!({"to": "owner@example.com"})), &ctx(), false)
            .unwrap();
        assert_eq!(composed.payload["subject"], "New response for Survey");
        assert_eq!(composed.payload["to"][0], "owner@example.com");
        assert_eq!(
            composed.payload["from"],
            "FormFlow <notifications@formflow.local>"
        );
        assert_eq!(composed.api_key, "sk_service");
    }

    #[test]
    fn custom_sender_uses_own_identity_and_key() {
        let handler = handler(None);
        let composed = handler
            .compose(
                &integration(json!({
                    "to": "owner@example.com",
                    "use_custom_sender": true,
                    "from_name": "Acme Surveys",
                    "from_email": "hello@acme.example",
                    "api_key": "${SENDER_KEY}",
                })),
                &ctx(),
                false,
            )
            .unwrap();
        assert_eq!(composed.payload["from"], "Acme Surveys <hello@acme.example>");
        assert_eq!(composed.api_key, "sk_custom");
    }

    #[test]
    fn custom_sender_without_identity_is_a_config_error() {
        let handler = handler(Some("sk_service"));
        let err = handler
            .compose(
                &integration(json!({"to": "owner@example.com", "use_custom_sender": true})),
                &ctx(),
                false,
            )
            .unwrap_err();
        assert!(matches!(err, FormFlowError::IntegrationConfig { .. }));
    }

    #[test]
    fn test_runs_prefix_the_subject() {
        let handler = handler(Some("sk_service"));
        let composed = handler
            .compose(&integration(json!({"to": "owner@example.com"})), &ctx(), true)
            .unwrap();
        assert_eq!(composed.payload["subject"], "[Test] New response for Survey");
    }

    #[test]
    fn missing_service_key_is_a_config_error() {
        let handler = handler(None);
        let err = handler
            .compose(&integration(json!({"to": "owner@example.com"})), &ctx(), false)
            .unwrap_err();
        assert!(matches!(err, FormFlowError::IntegrationConfig { .. }));
    }
}
