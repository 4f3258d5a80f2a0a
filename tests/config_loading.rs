use std::io::Write;

use formflow_core::config::{ApiKeyRole, AppConfig};

#[test]
fn test_load_full_config_from_file() {
    let toml_content = r#"
[database]
path = "/tmp/formflow-test/responses.db"

[gateway]
bind = "0.0.0.0:9999"
internal_token = "svc-secret"

[[gateway.api_keys]]
name = "ci"
key = "ff_ci_key"
role = "admin"

[dispatch]
handler_timeout_secs = 5

[email]
api_url = "https://api.resend.com/emails"
api_key = "${RESEND_API_KEY}"
default_from = "Surveys <surveys@example.com>"
"#;

    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(toml_content.as_bytes()).expect("write toml");

    let config = AppConfig::load(tmp.path()).expect("load config");

    assert_eq!(
        config.database.path.to_str().unwrap(),
        "/tmp/formflow-test/responses.db"
    );
    assert_eq!(config.gateway.bind, "0.0.0.0:9999");
    assert_eq!(config.gateway.internal_token.as_deref(), Some("svc-secret"));
    assert_eq!(config.gateway.api_keys.len(), 1);
    assert_eq!(config.gateway.api_keys[0].role, ApiKeyRole::Admin);
    assert_eq!(config.dispatch.handler_timeout_secs, 5);
    assert_eq!(config.email.api_key.as_deref(), Some("${RESEND_API_KEY}"));
    assert_eq!(config.email.default_from, "Surveys <surveys@example.com>");
}

#[test]
fn test_minimal_config_uses_defaults() {
    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(b"").expect("write toml");

    let config = AppConfig::load(tmp.path()).expect("load config");

    assert_eq!(config.gateway.bind, "127.0.0.1:8710");
    assert!(config.gateway.internal_token.is_none());
    assert!(config.gateway.api_keys.is_empty());
    assert_eq!(config.dispatch.handler_timeout_secs, 10);
    assert!(config.email.api_key.is_none());
}

#[test]
fn test_missing_config_file_errors() {
    let err = AppConfig::load(std::path::Path::new("/nonexistent/formflow.toml")).unwrap_err();
    assert!(err.to_string().contains("not found"));
}
