use std::collections::HashMap;

use formflow_core::error::{FormFlowError, Result};
use formflow_core::traits::SecretStore;

/// Secret store backed by process environment variables.
pub struct EnvSecretStore;

impl SecretStore for EnvSecretStore {
    fn get(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

/// Fixed-map secret store for tests and embedded setups.
pub struct StaticSecretStore {
    values: HashMap<String, String>,
}

impl StaticSecretStore {
    pub fn new<I, K, V>(values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: values
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl SecretStore for StaticSecretStore {
    fn get(&self, name: &str) -> Option<String> {
        self.values.get(name).cloned()
    }
}

/// Expand a `${NAME}` reference through the secret store. Plain values
/// pass through unchanged; a reference to a missing secret is an error
/// so a misconfigured integration fails loudly instead of calling out
/// with a literal placeholder.
pub fn resolve_secret(store: &dyn SecretStore, raw: &str) -> Result<String> {
    match raw.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
        Some(name) => store
            .get(name)
            .ok_or_else(|| FormFlowError::MissingSecret(name.to_string())),
        None => Ok(raw.to_string()),
    }
}
