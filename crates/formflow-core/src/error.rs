use thiserror::Error;

#[derive(Debug, Error)]
pub enum FormFlowError {
    // Session validation errors
    #[error("Form not found: {0}")]
    FormNotFound(String),

    #[error("Form is not active: {0}")]
    FormNotActive(String),

    #[error("Form has no questions: {0}")]
    EmptyForm(String),

    #[error("Access verification failed")]
    VerificationFailed,

    #[error("Session not found or not resumable")]
    SessionNotResumable,

    #[error("Question {0} is not the session's current question")]
    OutOfTurnQuestion(String),

    #[error("Question not found: {0}")]
    QuestionNotFound(String),

    #[error("Invalid answer: {0}")]
    InvalidAnswer(String),

    // Dispatch / integration errors
    #[error("Unknown integration kind: {0}")]
    UnknownIntegrationKind(String),

    #[error("Integration not found: {0}")]
    IntegrationNotFound(String),

    #[error("Integration config error: {kind}: {message}")]
    IntegrationConfig { kind: String, message: String },

    #[error("Secret not found: {0}")]
    MissingSecret(String),

    #[error("Template error: {0}")]
    Template(String),

    #[error("Handler failed: {kind}: {message}")]
    Handler { kind: String, message: String },

    #[error("Handler timeout after {timeout_secs}s: {kind}")]
    HandlerTimeout { kind: String, timeout_secs: u64 },

    #[error("Response not found: {0}")]
    ResponseNotFound(String),

    // Storage errors
    #[error("Database error: {0}")]
    Database(String),

    // Config errors
    #[error("Config error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    // Gateway errors
    #[error("Gateway error: {0}")]
    Gateway(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FormFlowError {
    /// Stable machine-readable code for the HTTP error envelope.
    pub fn code(&self) -> &'static str {
        match self {
            Self::FormNotFound(_) => "form_not_found",
            Self::FormNotActive(_) => "form_not_active",
            Self::EmptyForm(_) => "empty_form",
            Self::VerificationFailed => "verification_failed",
            Self::SessionNotResumable => "session_not_resumable",
            Self::OutOfTurnQuestion(_) => "out_of_turn_question",
            Self::QuestionNotFound(_) => "question_not_found",
            Self::InvalidAnswer(_) => "invalid_answer",
            Self::UnknownIntegrationKind(_) => "unknown_integration_kind",
            Self::IntegrationNotFound(_) => "integration_not_found",
            Self::IntegrationConfig { .. } => "integration_config",
            Self::MissingSecret(_) => "missing_secret",
            Self::Template(_) => "template",
            Self::Handler { .. } => "handler_failed",
            Self::HandlerTimeout { .. } => "handler_timeout",
            Self::ResponseNotFound(_) => "response_not_found",
            Self::Database(_) => "database",
            Self::Config(_) | Self::ConfigNotFound(_) => "config",
            Self::Gateway(_) => "gateway",
            Self::Io(_) => "io",
            Self::Json(_) => "json",
        }
    }
}

pub type Result<T> = std::result::Result<T, FormFlowError>;
