use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;

use formflow_core::config::EmailSenderConfig;
use formflow_core::error::Result;
use formflow_core::traits::SecretStore;
use formflow_core::types::{Integration, IntegrationKind};
use formflow_template::TemplateContext;

use crate::email::EmailHandler;
use crate::slack::SlackHandler;
use crate::webhook::WebhookHandler;
use crate::zapier::ZapierHandler;

/// One outbound notification handler. Implementations resolve their
/// secret-backed config, render content through the template context,
/// perform exactly one outbound call, and raise on failure — logging
/// is the dispatcher's job.
pub trait IntegrationHandler: Send + Sync + 'static {
    fn kind(&self) -> IntegrationKind;

    fn execute(
        &self,
        integration: &Integration,
        ctx: &TemplateContext,
        is_test: bool,
    ) -> BoxFuture<'_, Result<Value>>;
}

/// Holds one handler per integration kind. Dispatch is an exhaustive
/// match on the parsed kind, so adding a kind without registering a
/// handler fails at build time rather than silently at runtime.
pub struct HandlerRegistry {
    email: EmailHandler,
    slack: SlackHandler,
    webhook: WebhookHandler,
    zapier: ZapierHandler,
}

impl HandlerRegistry {
    pub fn new(email_config: EmailSenderConfig, secrets: Arc<dyn SecretStore>) -> Self {
        let http = reqwest::Client::new();
        Self {
            email: EmailHandler::new(email_config, secrets.clone(), http.clone()),
            slack: SlackHandler::new(secrets.clone(), http.clone()),
            webhook: WebhookHandler::new(secrets.clone(), http.clone()),
            zapier: ZapierHandler::new(secrets, http),
        }
    }

    pub fn handler(&self, kind: IntegrationKind) -> &dyn IntegrationHandler {
        match kind {
            IntegrationKind::Email => &self.email,
            IntegrationKind::Slack => &self.slack,
            IntegrationKind::Webhook => &self.webhook,
            IntegrationKind::Zapier => &self.zapier,
        }
    }

    /// Look a handler up from the raw kind text stored on the
    /// integration row. Unknown text raises, never silently skips.
    pub fn resolve(&self, kind: &str) -> Result<&dyn IntegrationHandler> {
        let kind: IntegrationKind = kind.parse()?;
        Ok(self.handler(kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secrets::StaticSecretStore;
    use formflow_core::error::FormFlowError;

    fn registry() -> HandlerRegistry {
        HandlerRegistry::new(
            EmailSenderConfig::default(),
            Arc::new(StaticSecretStore::new::<_, &str, &str>([])),
        )
    }

    #[test]
    fn known_kinds_resolve() {
        let registry = registry();
        for kind in ["email", "slack", "webhook", "zapier"] {
            assert_eq!(registry.resolve(kind).unwrap().kind().as_str(), kind);
        }
    }

    #[test]
    fn unknown_kind_raises() {
        let registry = registry();
        assert!(matches!(
            registry.resolve("carrier_pigeon"),
            Err(FormFlowError::UnknownIntegrationKind(_))
        ));
    }
}
