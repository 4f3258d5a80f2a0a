use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info};

use formflow_core::error::FormFlowError;
use formflow_core::types::{FormId, IntegrationId, QuestionId, ResponseId};
use formflow_engine::{QuestionStep, SessionState, SubmitOutcome};

use crate::auth;
use crate::middleware::Authenticated;
use crate::state::AppState;

/// Error envelope: machine-readable code plus a human message.
/// Internal failure detail stays in the logs, not on the wire.
pub enum ApiError {
    Domain(FormFlowError),
    Status(StatusCode),
}

impl From<FormFlowError> for ApiError {
    fn from(e: FormFlowError) -> Self {
        Self::Domain(e)
    }
}

impl From<StatusCode> for ApiError {
    fn from(s: StatusCode) -> Self {
        Self::Status(s)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        use FormFlowError::*;
        let e = match self {
            Self::Status(status) => return status.into_response(),
            Self::Domain(e) => e,
        };

        let status = match &e {
            FormNotFound(_) | QuestionNotFound(_) | SessionNotResumable | ResponseNotFound(_)
            | IntegrationNotFound(_) => StatusCode::NOT_FOUND,
            FormNotActive(_) | OutOfTurnQuestion(_) => StatusCode::CONFLICT,
            VerificationFailed => StatusCode::FORBIDDEN,
            InvalidAnswer(_) | EmptyForm(_) => StatusCode::UNPROCESSABLE_ENTITY,
            UnknownIntegrationKind(_) | IntegrationConfig { .. } | MissingSecret(_)
            | Template(_) | Handler { .. } | HandlerTimeout { .. } => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(error = %e, "Internal error");
            "internal error".to_string()
        } else {
            e.to_string()
        };

        (
            status,
            axum::Json(json!({ "error": { "code": e.code(), "message": message } })),
        )
            .into_response()
    }
}

/// Question as shown to respondents: the logic rules stay server-side.
fn question_json(question: &formflow_core::types::Question) -> Value {
    let mut value = serde_json::to_value(question).unwrap_or(Value::Null);
    if let Some(obj) = value.as_object_mut() {
        obj.remove("logic");
    }
    value
}

fn step_json(step: &QuestionStep) -> Value {
    json!({
        "question": question_json(&step.question),
        "saved_answer": step.saved_answer,
        "answered": step.answered,
        "total_questions": step.total_questions,
    })
}

// GET /api/health — no auth required
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[derive(Deserialize, Default)]
pub struct StartBody {
    #[serde(default)]
    pub access_code: Option<String>,
}

// POST /api/forms/{id}/sessions — respondent entry point
pub async fn start_session(
    State(state): State<Arc<AppState>>,
    Path(form_id): Path<String>,
    body: Option<Json<StartBody>>,
) -> Result<Json<Value>, ApiError> {
    let Json(body) = body.unwrap_or_default();
    let started = state
        .engine
        .start(
            &FormId::from_string(&form_id),
            body.access_code.as_deref(),
        )
        .await?;

    Ok(Json(json!({
        "session_token": started.session_token,
        "response_id": started.response_id,
        "form": { "title": started.form_title, "slug": started.form_slug },
        "question": question_json(&started.question),
        "total_questions": started.total_questions,
    })))
}

// GET /api/sessions/{token} — resume a session of either status
pub async fn resume_session(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> Result<Json<Value>, ApiError> {
    match state.engine.resume(&token).await? {
        SessionState::InProgress(step) => {
            let mut body = step_json(&step);
            body["completed"] = json!(false);
            Ok(Json(body))
        }
        SessionState::Completed { completed_at } => Ok(Json(json!({
            "completed": true,
            "completed_at": completed_at,
        }))),
    }
}

#[derive(Deserialize)]
pub struct SubmitBody {
    pub question_id: String,
    pub value: Value,
}

// POST /api/sessions/{token}/answers
pub async fn submit_answer(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
    Json(body): Json<SubmitBody>,
) -> Result<Json<Value>, ApiError> {
    let outcome = state
        .engine
        .submit_answer(&token, &QuestionId::from_string(&body.question_id), &body.value)
        .await?;

    match outcome {
        SubmitOutcome::Next(step) => {
            let mut body = step_json(&step);
            body["completed"] = json!(false);
            Ok(Json(body))
        }
        SubmitOutcome::Completed { .. } => Ok(Json(json!({ "completed": true }))),
    }
}

#[derive(Deserialize)]
pub struct BackBody {
    pub current_question_id: String,
}

// POST /api/sessions/{token}/back
pub async fn navigate_back(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
    Json(body): Json<BackBody>,
) -> Result<Json<Value>, ApiError> {
    let step = state
        .engine
        .navigate_back(&token, &QuestionId::from_string(&body.current_question_id))
        .await?;
    Ok(Json(step_json(&step)))
}

// ── Internal dispatch trigger ───────────────────────────────────

/// POST /api/internal/responses/{id}/dispatch — authenticated by the
/// shared internal credential, never by respondent or owner tokens.
pub async fn dispatch_completion(
    State(state): State<Arc<AppState>>,
    headers: axum::http::HeaderMap,
    Path(response_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let bearer = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    if !auth::validate_internal(&state.config, bearer) {
        return Err(StatusCode::UNAUTHORIZED.into());
    }

    let summary = state
        .dispatcher
        .dispatch(&ResponseId::from_string(&response_id))
        .await?;

    info!(
        response = %response_id,
        processed = summary.processed,
        failed = summary.failed,
        already = summary.already_processed,
        "Dispatch trigger handled"
    );

    if summary.already_processed {
        Ok(Json(json!({ "processed": 0, "reason": "already_processed" })))
    } else {
        Ok(Json(json!({
            "processed": summary.processed,
            "failed": summary.failed,
        })))
    }
}

// ── Owner surface ───────────────────────────────────────────────

// POST /api/integrations/{id}/test — requires Operator+. Runs the
// handler against sample data; writes no log row.
pub async fn test_integration(
    Authenticated(auth_result): Authenticated,
    State(state): State<Arc<AppState>>,
    Path(integration_id): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    if !auth::has_operator_access(&auth_result.role) {
        return Err(StatusCode::FORBIDDEN);
    }

    match state
        .dispatcher
        .test(&IntegrationId::from_string(&integration_id))
        .await
    {
        Ok(data) => Ok(Json(json!({ "success": true, "data": data }))),
        Err(e) => Ok(Json(json!({
            "success": false,
            "error": { "code": e.code(), "message": e.to_string() },
        }))),
    }
}

// GET /api/responses/{id}/integration-logs — requires Viewer+. The
// only surface where handler failures are visible.
pub async fn integration_logs(
    Authenticated(auth_result): Authenticated,
    State(state): State<Arc<AppState>>,
    Path(response_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    if !auth::has_viewer_access(&auth_result.role) {
        return Err(StatusCode::FORBIDDEN.into());
    }

    let logs = state
        .store
        .integration_logs(&ResponseId::from_string(&response_id))
        .await?;
    Ok(Json(json!({ "logs": logs })))
}
