use formflow_core::config::{ApiKeyRole, GatewayConfig};

/// Result of a successful owner authentication.
#[derive(Debug, Clone)]
pub struct AuthResult {
    #[allow(dead_code)]
    pub name: String,
    pub role: ApiKeyRole,
}

/// Validate an owner api key from a Bearer header.
///
/// With no keys configured, access is anonymous admin — single-tenant
/// deployments behind a private network. Once any key exists, every
/// owner call must present one.
pub fn validate_api_key(config: &GatewayConfig, bearer: Option<&str>) -> Option<AuthResult> {
    if let Some(bearer_val) = bearer {
        for ak in &config.api_keys {
            if ak.key == bearer_val {
                return Some(AuthResult {
                    name: ak.name.clone(),
                    role: ak.role.clone(),
                });
            }
        }
        return None; // Bearer provided but no match
    }

    if config.api_keys.is_empty() {
        Some(AuthResult {
            name: "anonymous".into(),
            role: ApiKeyRole::Admin,
        })
    } else {
        None
    }
}

/// Validate the internal dispatch credential. When no internal token
/// is configured the endpoint is open (private-network deployments);
/// once configured, the exact token is required.
pub fn validate_internal(config: &GatewayConfig, bearer: Option<&str>) -> bool {
    match &config.internal_token {
        Some(expected) => bearer == Some(expected.as_str()),
        None => true,
    }
}

/// Check if a role has at least viewer-level access.
pub fn has_viewer_access(role: &ApiKeyRole) -> bool {
    matches!(role, ApiKeyRole::Viewer | ApiKeyRole::Operator | ApiKeyRole::Admin)
}

/// Check if a role has at least operator-level access.
pub fn has_operator_access(role: &ApiKeyRole) -> bool {
    matches!(role, ApiKeyRole::Operator | ApiKeyRole::Admin)
}
