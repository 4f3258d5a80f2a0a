use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;

use formflow_core::error::{FormFlowError, Result};
use formflow_core::traits::ResponseStore;
use formflow_core::types::*;

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS forms (
        id TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        slug TEXT NOT NULL,
        status TEXT NOT NULL,
        access_code TEXT
    );

    CREATE TABLE IF NOT EXISTS questions (
        id TEXT PRIMARY KEY,
        form_id TEXT NOT NULL REFERENCES forms(id),
        position INTEGER NOT NULL,
        definition TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_questions_form
        ON questions(form_id, position);

    CREATE TABLE IF NOT EXISTS responses (
        id TEXT PRIMARY KEY,
        form_id TEXT NOT NULL REFERENCES forms(id),
        session_token TEXT NOT NULL UNIQUE,
        status TEXT NOT NULL,
        current_question_id TEXT,
        response_number INTEGER NOT NULL,
        started_at TEXT NOT NULL,
        completed_at TEXT,
        integrations_processed_at TEXT
    );

    CREATE TABLE IF NOT EXISTS answers (
        response_id TEXT NOT NULL REFERENCES responses(id),
        question_id TEXT NOT NULL,
        value TEXT NOT NULL,
        answered_at TEXT NOT NULL,
        PRIMARY KEY (response_id, question_id)
    );

    CREATE TABLE IF NOT EXISTS integrations (
        id TEXT PRIMARY KEY,
        form_id TEXT NOT NULL REFERENCES forms(id),
        kind TEXT NOT NULL,
        name TEXT NOT NULL,
        enabled INTEGER NOT NULL,
        trigger_event TEXT NOT NULL,
        config TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_integrations_form
        ON integrations(form_id);

    CREATE TABLE IF NOT EXISTS integration_logs (
        id TEXT PRIMARY KEY,
        integration_id TEXT NOT NULL,
        response_id TEXT NOT NULL,
        status TEXT NOT NULL,
        payload TEXT NOT NULL,
        response_data TEXT,
        error_message TEXT,
        executed_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_logs_response
        ON integration_logs(response_id);";

/// SQLite-backed store for forms, sessions, answers, and integration
/// state. The conditional updates here (submit advance, back rewind,
/// dispatch claim) are the engine's only concurrency guards.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

fn db_err(e: impl std::fmt::Display) -> FormFlowError {
    FormFlowError::Database(e.to_string())
}

impl SqliteStore {
    /// Open or create a SQLite database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| db_err(format!("Failed to create db directory: {}", e)))?;
        }

        let conn = Connection::open(path).map_err(db_err)?;

        // WAL for better concurrent read performance
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(db_err)?;
        conn.execute_batch(SCHEMA).map_err(db_err)?;

        debug!(path = %path.display(), "SQLite store opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        conn.execute_batch(SCHEMA).map_err(db_err)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Upsert a form and replace its question list. Used by the import
    /// command and by tests; the response flow never mutates forms.
    pub fn save_form(&self, definition: &FormDefinition) -> Result<()> {
        let mut conn = self.conn.lock().map_err(db_err)?;
        let tx = conn.transaction().map_err(db_err)?;

        let form = &definition.form;
        tx.execute(
            "INSERT INTO forms (id, title, slug, status, access_code)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                 title = excluded.title,
                 slug = excluded.slug,
                 status = excluded.status,
                 access_code = excluded.access_code",
            params![
                form.id.0,
                form.title,
                form.slug,
                status_str(form.status),
                form.access_code,
            ],
        )
        .map_err(db_err)?;

        tx.execute("DELETE FROM questions WHERE form_id = ?1", params![form.id.0])
            .map_err(db_err)?;
        for question in &definition.questions {
            let definition_json = serde_json::to_string(question)?;
            tx.execute(
                "INSERT INTO questions (id, form_id, position, definition)
                 VALUES (?1, ?2, ?3, ?4)",
                params![question.id.0, form.id.0, question.position, definition_json],
            )
            .map_err(db_err)?;
        }

        tx.commit().map_err(db_err)?;
        debug!(form = %form.id, questions = definition.questions.len(), "Form saved");
        Ok(())
    }

    /// Upsert one integration row.
    pub fn save_integration(&self, integration: &Integration) -> Result<()> {
        let conn = self.conn.lock().map_err(db_err)?;
        conn.execute(
            "INSERT INTO integrations (id, form_id, kind, name, enabled, trigger_event, config)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(id) DO UPDATE SET
                 kind = excluded.kind,
                 name = excluded.name,
                 enabled = excluded.enabled,
                 trigger_event = excluded.trigger_event,
                 config = excluded.config",
            params![
                integration.id.0,
                integration.form_id.0,
                integration.kind,
                integration.name,
                integration.enabled as i64,
                integration.trigger.as_str(),
                serde_json::to_string(&integration.config)?,
            ],
        )
        .map_err(db_err)?;
        Ok(())
    }
}

fn status_str(status: FormStatus) -> &'static str {
    match status {
        FormStatus::Draft => "draft",
        FormStatus::Active => "active",
        FormStatus::Archived => "archived",
    }
}

fn parse_form_status(s: &str) -> FormStatus {
    match s {
        "active" => FormStatus::Active,
        "archived" => FormStatus::Archived,
        _ => FormStatus::Draft,
    }
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn row_to_session(row: &Row<'_>) -> rusqlite::Result<ResponseSession> {
    let status: String = row.get(3)?;
    let current: Option<String> = row.get(4)?;
    let started_at: String = row.get(6)?;
    let completed_at: Option<String> = row.get(7)?;
    let processed_at: Option<String> = row.get(8)?;

    Ok(ResponseSession {
        id: ResponseId(row.get(0)?),
        form_id: FormId(row.get(1)?),
        session_token: row.get(2)?,
        status: if status == "completed" {
            ResponseStatus::Completed
        } else {
            ResponseStatus::InProgress
        },
        current_question_id: current.map(QuestionId),
        response_number: row.get(5)?,
        started_at: parse_timestamp(&started_at),
        completed_at: completed_at.as_deref().map(parse_timestamp),
        integrations_processed_at: processed_at.as_deref().map(parse_timestamp),
    })
}

const SESSION_COLUMNS: &str = "id, form_id, session_token, status, current_question_id, \
     response_number, started_at, completed_at, integrations_processed_at";

fn row_to_integration(row: &Row<'_>) -> rusqlite::Result<Integration> {
    let config: String = row.get(6)?;
    Ok(Integration {
        id: IntegrationId(row.get(0)?),
        form_id: FormId(row.get(1)?),
        kind: row.get(2)?,
        name: row.get(3)?,
        enabled: row.get::<_, i64>(4)? != 0,
        // form_completed is the only executed trigger today
        trigger: IntegrationTrigger::FormCompleted,
        config: serde_json::from_str(&config).unwrap_or(serde_json::Value::Null),
    })
}

impl ResponseStore for SqliteStore {
    fn load_form(&self, form_id: &FormId) -> BoxFuture<'_, Result<Option<FormDefinition>>> {
        let form_id = form_id.0.clone();

        Box::pin(async move {
            let conn = self.conn.lock().map_err(db_err)?;

            let form = conn
                .query_row(
                    "SELECT id, title, slug, status, access_code FROM forms WHERE id = ?1",
                    params![form_id],
                    |row| {
                        let status: String = row.get(3)?;
                        Ok(Form {
                            id: FormId(row.get(0)?),
                            title: row.get(1)?,
                            slug: row.get(2)?,
                            status: parse_form_status(&status),
                            access_code: row.get(4)?,
                        })
                    },
                )
                .optional()
                .map_err(db_err)?;

            let Some(form) = form else {
                return Ok(None);
            };

            let mut stmt = conn
                .prepare(
                    "SELECT definition FROM questions
                     WHERE form_id = ?1
                     ORDER BY position ASC",
                )
                .map_err(db_err)?;
            let rows = stmt
                .query_map(params![form_id], |row| row.get::<_, String>(0))
                .map_err(db_err)?;

            let mut questions = Vec::new();
            for row in rows {
                let definition = row.map_err(db_err)?;
                questions.push(serde_json::from_str::<Question>(&definition)?);
            }

            Ok(Some(FormDefinition { form, questions }))
        })
    }

    fn create_session(&self, session: &ResponseSession) -> BoxFuture<'_, Result<i64>> {
        let session = session.clone();

        Box::pin(async move {
            let mut conn = self.conn.lock().map_err(db_err)?;
            let tx = conn.transaction().map_err(db_err)?;

            let number: i64 = tx
                .query_row(
                    "SELECT COALESCE(MAX(response_number), 0) + 1
                     FROM responses WHERE form_id = ?1",
                    params![session.form_id.0],
                    |row| row.get(0),
                )
                .map_err(db_err)?;

            tx.execute(
                "INSERT INTO responses
                     (id, form_id, session_token, status, current_question_id,
                      response_number, started_at, completed_at, integrations_processed_at)
                 VALUES (?1, ?2, ?3, 'in_progress', ?4, ?5, ?6, NULL, NULL)",
                params![
                    session.id.0,
                    session.form_id.0,
                    session.session_token,
                    session.current_question_id.as_ref().map(|q| q.0.clone()),
                    number,
                    session.started_at.to_rfc3339(),
                ],
            )
            .map_err(db_err)?;

            tx.commit().map_err(db_err)?;
            Ok(number)
        })
    }

    fn find_session(&self, token: &str) -> BoxFuture<'_, Result<Option<ResponseSession>>> {
        let token = token.to_string();

        Box::pin(async move {
            let conn = self.conn.lock().map_err(db_err)?;
            conn.query_row(
                &format!(
                    "SELECT {} FROM responses WHERE session_token = ?1",
                    SESSION_COLUMNS
                ),
                params![token],
                row_to_session,
            )
            .optional()
            .map_err(db_err)
        })
    }

    fn load_response(&self, id: &ResponseId) -> BoxFuture<'_, Result<Option<ResponseSession>>> {
        let id = id.0.clone();

        Box::pin(async move {
            let conn = self.conn.lock().map_err(db_err)?;
            conn.query_row(
                &format!("SELECT {} FROM responses WHERE id = ?1", SESSION_COLUMNS),
                params![id],
                row_to_session,
            )
            .optional()
            .map_err(db_err)
        })
    }

    fn advance_session(
        &self,
        token: &str,
        expected_current: &QuestionId,
        answer: &Answer,
        transition: &SessionTransition,
    ) -> BoxFuture<'_, Result<bool>> {
        let token = token.to_string();
        let expected = expected_current.0.clone();
        let answer = answer.clone();
        let transition = transition.clone();

        Box::pin(async move {
            let mut conn = self.conn.lock().map_err(db_err)?;
            let tx = conn.transaction().map_err(db_err)?;

            // The conditional update is the out-of-turn guard: a stale
            // retry whose expected question no longer matches affects
            // zero rows and nothing is written.
            let affected = match &transition {
                SessionTransition::MoveTo(next) => tx
                    .execute(
                        "UPDATE responses SET current_question_id = ?3
                         WHERE session_token = ?1
                           AND status = 'in_progress'
                           AND current_question_id = ?2",
                        params![token, expected, next.0],
                    )
                    .map_err(db_err)?,
                SessionTransition::Complete { at } => tx
                    .execute(
                        "UPDATE responses SET
                             status = 'completed',
                             current_question_id = NULL,
                             completed_at = ?3
                         WHERE session_token = ?1
                           AND status = 'in_progress'
                           AND current_question_id = ?2",
                        params![token, expected, at.to_rfc3339()],
                    )
                    .map_err(db_err)?,
            };

            if affected == 0 {
                return Ok(false);
            }

            tx.execute(
                "INSERT INTO answers (response_id, question_id, value, answered_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(response_id, question_id) DO UPDATE SET
                     value = excluded.value,
                     answered_at = excluded.answered_at",
                params![
                    answer.response_id.0,
                    answer.question_id.0,
                    serde_json::to_string(&answer.value)?,
                    answer.answered_at.to_rfc3339(),
                ],
            )
            .map_err(db_err)?;

            tx.commit().map_err(db_err)?;
            Ok(true)
        })
    }

    fn rewind_session(
        &self,
        token: &str,
        expected_current: &QuestionId,
        target: &QuestionId,
    ) -> BoxFuture<'_, Result<bool>> {
        let token = token.to_string();
        let expected = expected_current.0.clone();
        let target = target.0.clone();

        Box::pin(async move {
            let conn = self.conn.lock().map_err(db_err)?;
            let affected = conn
                .execute(
                    "UPDATE responses SET current_question_id = ?3
                     WHERE session_token = ?1
                       AND status = 'in_progress'
                       AND current_question_id = ?2",
                    params![token, expected, target],
                )
                .map_err(db_err)?;
            Ok(affected > 0)
        })
    }

    fn load_answers(&self, response_id: &ResponseId) -> BoxFuture<'_, Result<Vec<Answer>>> {
        let response_id = response_id.0.clone();

        Box::pin(async move {
            let conn = self.conn.lock().map_err(db_err)?;
            let mut stmt = conn
                .prepare(
                    "SELECT response_id, question_id, value, answered_at
                     FROM answers
                     WHERE response_id = ?1
                     ORDER BY answered_at ASC",
                )
                .map_err(db_err)?;

            let rows = stmt
                .query_map(params![response_id], |row| {
                    let value: String = row.get(2)?;
                    let answered_at: String = row.get(3)?;
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        value,
                        answered_at,
                    ))
                })
                .map_err(db_err)?;

            let mut answers = Vec::new();
            for row in rows {
                let (response_id, question_id, value, answered_at) = row.map_err(db_err)?;
                answers.push(Answer {
                    response_id: ResponseId(response_id),
                    question_id: QuestionId(question_id),
                    value: serde_json::from_str(&value)?,
                    answered_at: parse_timestamp(&answered_at),
                });
            }

            Ok(answers)
        })
    }

    fn claim_dispatch(
        &self,
        response_id: &ResponseId,
        at: DateTime<Utc>,
    ) -> BoxFuture<'_, Result<bool>> {
        let response_id = response_id.0.clone();

        Box::pin(async move {
            let conn = self.conn.lock().map_err(db_err)?;
            // Single atomic conditional write; never read-then-write.
            let affected = conn
                .execute(
                    "UPDATE responses SET integrations_processed_at = ?2
                     WHERE id = ?1 AND integrations_processed_at IS NULL",
                    params![response_id, at.to_rfc3339()],
                )
                .map_err(db_err)?;
            Ok(affected > 0)
        })
    }

    fn enabled_integrations(
        &self,
        form_id: &FormId,
        trigger: IntegrationTrigger,
    ) -> BoxFuture<'_, Result<Vec<Integration>>> {
        let form_id = form_id.0.clone();

        Box::pin(async move {
            let conn = self.conn.lock().map_err(db_err)?;
            let mut stmt = conn
                .prepare(
                    "SELECT id, form_id, kind, name, enabled, trigger_event, config
                     FROM integrations
                     WHERE form_id = ?1 AND enabled = 1 AND trigger_event = ?2",
                )
                .map_err(db_err)?;

            let rows = stmt
                .query_map(params![form_id, trigger.as_str()], row_to_integration)
                .map_err(db_err)?;

            let mut integrations = Vec::new();
            for row in rows {
                integrations.push(row.map_err(db_err)?);
            }
            Ok(integrations)
        })
    }

    fn load_integration(
        &self,
        id: &IntegrationId,
    ) -> BoxFuture<'_, Result<Option<Integration>>> {
        let id = id.0.clone();

        Box::pin(async move {
            let conn = self.conn.lock().map_err(db_err)?;
            conn.query_row(
                "SELECT id, form_id, kind, name, enabled, trigger_event, config
                 FROM integrations WHERE id = ?1",
                params![id],
                row_to_integration,
            )
            .optional()
            .map_err(db_err)
        })
    }

    fn append_integration_log(&self, log: &IntegrationLog) -> BoxFuture<'_, Result<()>> {
        let log = log.clone();

        Box::pin(async move {
            let conn = self.conn.lock().map_err(db_err)?;
            conn.execute(
                "INSERT INTO integration_logs
                     (id, integration_id, response_id, status, payload,
                      response_data, error_message, executed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    log.id,
                    log.integration_id.0,
                    log.response_id.0,
                    match log.status {
                        LogStatus::Success => "success",
                        LogStatus::Error => "error",
                    },
                    serde_json::to_string(&log.payload)?,
                    log.response_data
                        .as_ref()
                        .map(serde_json::to_string)
                        .transpose()?,
                    log.error_message,
                    log.executed_at.to_rfc3339(),
                ],
            )
            .map_err(db_err)?;
            Ok(())
        })
    }

    fn integration_logs(
        &self,
        response_id: &ResponseId,
    ) -> BoxFuture<'_, Result<Vec<IntegrationLog>>> {
        let response_id = response_id.0.clone();

        Box::pin(async move {
            let conn = self.conn.lock().map_err(db_err)?;
            let mut stmt = conn
                .prepare(
                    "SELECT id, integration_id, response_id, status, payload,
                            response_data, error_message, executed_at
                     FROM integration_logs
                     WHERE response_id = ?1
                     ORDER BY executed_at ASC",
                )
                .map_err(db_err)?;

            let rows = stmt
                .query_map(params![response_id], |row| {
                    let status: String = row.get(3)?;
                    let payload: String = row.get(4)?;
                    let response_data: Option<String> = row.get(5)?;
                    let executed_at: String = row.get(7)?;
                    Ok(IntegrationLog {
                        id: row.get(0)?,
                        integration_id: IntegrationId(row.get(1)?),
                        response_id: ResponseId(row.get(2)?),
                        status: if status == "success" {
                            LogStatus::Success
                        } else {
                            LogStatus::Error
                        },
                        payload: serde_json::from_str(&payload)
                            .unwrap_or(serde_json::Value::Null),
                        response_data: response_data
                            .as_deref()
                            .map(|s| serde_json::from_str(s).unwrap_or(serde_json::Value::Null)),
                        error_message: row.get(6)?,
                        executed_at: parse_timestamp(&executed_at),
                    })
                })
                .map_err(db_err)?;

            let mut logs = Vec::new();
            for row in rows {
                logs.push(row.map_err(db_err)?);
            }
            Ok(logs)
        })
    }
}
