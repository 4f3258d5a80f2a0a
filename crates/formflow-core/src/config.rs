use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{FormFlowError, Result};

/// Top-level FormFlow configuration, loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub email: EmailSenderConfig,
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(FormFlowError::ConfigNotFound(path.display().to_string()));
        }
        let raw = std::fs::read_to_string(path)?;
        let config = toml::from_str(&raw).map_err(|e| FormFlowError::Config(e.to_string()))?;
        tracing::debug!(path = %path.display(), "Config loaded");
        Ok(config)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("formflow.db")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Shared credential for the internal dispatch trigger. Distinct
    /// from respondent session tokens and owner api keys.
    #[serde(default)]
    pub internal_token: Option<String>,
    /// Owner-facing api keys (integration tests, log views).
    #[serde(default)]
    pub api_keys: Vec<ApiKeyConfig>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            internal_token: None,
            api_keys: Vec::new(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8710".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKeyConfig {
    pub name: String,
    pub key: String,
    pub role: ApiKeyRole,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiKeyRole {
    Viewer,
    Operator,
    Admin,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Bounded timeout for each handler's outbound call. A timeout is
    /// an error outcome for that integration, never a hang.
    #[serde(default = "default_handler_timeout")]
    pub handler_timeout_secs: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            handler_timeout_secs: default_handler_timeout(),
        }
    }
}

fn default_handler_timeout() -> u64 {
    10
}

/// Service-level email sending identity. Integrations may override it
/// with a bring-your-own-sender config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailSenderConfig {
    #[serde(default = "default_email_api_url")]
    pub api_url: String,
    /// Raw value or `${ENV_VAR}` reference.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_from")]
    pub default_from: String,
}

impl Default for EmailSenderConfig {
    fn default() -> Self {
        Self {
            api_url: default_email_api_url(),
            api_key: None,
            default_from: default_from(),
        }
    }
}

fn default_email_api_url() -> String {
    "https://api.resend.com/emails".to_string()
}

fn default_from() -> String {
    "FormFlow <notifications@formflow.local>".to_string()
}
