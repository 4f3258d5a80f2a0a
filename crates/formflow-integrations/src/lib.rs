mod email;
mod payload;
mod registry;
mod secrets;
mod slack;
mod webhook;
mod zapier;

pub use email::EmailHandler;
pub use payload::completion_payload;
pub use registry::{HandlerRegistry, IntegrationHandler};
pub use secrets::{resolve_secret, EnvSecretStore, StaticSecretStore};
pub use slack::SlackHandler;
pub use webhook::WebhookHandler;
pub use zapier::ZapierHandler;
