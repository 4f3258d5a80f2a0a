use chrono::{DateTime, Utc};
use futures::future::BoxFuture;

use crate::error::Result;
use crate::types::*;

/// Persistence backend for the response flow. All session state lives
/// here; every engine operation re-reads it, so two concurrent calls
/// against the same session race only at the conditional updates.
pub trait ResponseStore: Send + Sync + 'static {
    /// Load a form and its ordered questions.
    fn load_form(&self, form_id: &FormId) -> BoxFuture<'_, Result<Option<FormDefinition>>>;

    /// Insert a freshly started session, allocating its per-form
    /// response number inside the insert transaction. Returns the
    /// allocated number (the passed session's is ignored).
    fn create_session(&self, session: &ResponseSession) -> BoxFuture<'_, Result<i64>>;

    /// Look a session up by its opaque bearer token.
    fn find_session(&self, token: &str) -> BoxFuture<'_, Result<Option<ResponseSession>>>;

    fn load_response(&self, id: &ResponseId) -> BoxFuture<'_, Result<Option<ResponseSession>>>;

    /// Upsert the answer and apply the transition in one transaction,
    /// guarded by a conditional update matching both the token and the
    /// expected current question. Returns false (and mutates nothing)
    /// when the session moved on concurrently.
    fn advance_session(
        &self,
        token: &str,
        expected_current: &QuestionId,
        answer: &Answer,
        transition: &SessionTransition,
    ) -> BoxFuture<'_, Result<bool>>;

    /// Conditionally move an in-progress session back to `target`.
    /// Same guard shape as [`advance_session`](Self::advance_session).
    fn rewind_session(
        &self,
        token: &str,
        expected_current: &QuestionId,
        target: &QuestionId,
    ) -> BoxFuture<'_, Result<bool>>;

    fn load_answers(&self, response_id: &ResponseId) -> BoxFuture<'_, Result<Vec<Answer>>>;

    /// The dispatch idempotency claim: set integrations_processed_at
    /// only if it is currently null, as a single atomic conditional
    /// write. Returns true when this caller won the claim.
    fn claim_dispatch(
        &self,
        response_id: &ResponseId,
        at: DateTime<Utc>,
    ) -> BoxFuture<'_, Result<bool>>;

    fn enabled_integrations(
        &self,
        form_id: &FormId,
        trigger: IntegrationTrigger,
    ) -> BoxFuture<'_, Result<Vec<Integration>>>;

    fn load_integration(
        &self,
        id: &IntegrationId,
    ) -> BoxFuture<'_, Result<Option<Integration>>>;

    /// Append-only; log rows are never mutated after insert.
    fn append_integration_log(&self, log: &IntegrationLog) -> BoxFuture<'_, Result<()>>;

    fn integration_logs(
        &self,
        response_id: &ResponseId,
    ) -> BoxFuture<'_, Result<Vec<IntegrationLog>>>;
}

/// Resolves secret references found in integration configs.
pub trait SecretStore: Send + Sync + 'static {
    fn get(&self, name: &str) -> Option<String>;
}
