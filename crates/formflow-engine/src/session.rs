use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info};

use formflow_core::error::{FormFlowError, Result};
use formflow_core::traits::ResponseStore;
use formflow_core::types::*;
use formflow_logic::{resolve, RouteDirective};

use crate::dispatch::CompletionDispatcher;

/// Everything a client needs to render the first step.
#[derive(Debug, Clone)]
pub struct StartedSession {
    pub session_token: String,
    pub response_id: ResponseId,
    pub form_title: String,
    pub form_slug: String,
    pub question: Question,
    pub total_questions: usize,
}

/// One renderable step: the question to show, any previously saved
/// answer, and progress counters.
#[derive(Debug, Clone)]
pub struct QuestionStep {
    pub question: Question,
    pub saved_answer: Option<AnswerValue>,
    pub answered: usize,
    pub total_questions: usize,
}

#[derive(Debug, Clone)]
pub enum SubmitOutcome {
    Next(QuestionStep),
    Completed { response_id: ResponseId },
}

#[derive(Debug, Clone)]
pub enum SessionState {
    InProgress(QuestionStep),
    Completed {
        completed_at: Option<DateTime<Utc>>,
    },
}

/// Owns one respondent's progress through a form. Stateless between
/// calls: every operation re-reads the store, and the conditional
/// updates there are the only concurrency guards.
pub struct FlowEngine {
    store: Arc<dyn ResponseStore>,
    dispatcher: Arc<CompletionDispatcher>,
}

impl FlowEngine {
    pub fn new(store: Arc<dyn ResponseStore>, dispatcher: Arc<CompletionDispatcher>) -> Self {
        Self { store, dispatcher }
    }

    /// Start a new session on an active form. Returns the bearer token
    /// the respondent presents on every subsequent call.
    pub async fn start(
        &self,
        form_id: &FormId,
        access_code: Option<&str>,
    ) -> Result<StartedSession> {
        let definition = self
            .store
            .load_form(form_id)
            .await?
            .ok_or_else(|| FormFlowError::FormNotFound(form_id.to_string()))?;

        if definition.form.status != FormStatus::Active {
            return Err(FormFlowError::FormNotActive(form_id.to_string()));
        }
        let first = definition
            .first_question()
            .ok_or_else(|| FormFlowError::EmptyForm(form_id.to_string()))?
            .clone();
        if let Some(expected) = &definition.form.access_code {
            if access_code != Some(expected.as_str()) {
                return Err(FormFlowError::VerificationFailed);
            }
        }

        let session = ResponseSession {
            id: ResponseId::new(),
            form_id: form_id.clone(),
            session_token: session_token(),
            status: ResponseStatus::InProgress,
            current_question_id: Some(first.id.clone()),
            response_number: 0,
            started_at: Utc::now(),
            completed_at: None,
            integrations_processed_at: None,
        };
        self.store.create_session(&session).await?;

        info!(form = %form_id, response = %session.id, "Session started");
        Ok(StartedSession {
            session_token: session.session_token,
            response_id: session.id,
            form_title: definition.form.title.clone(),
            form_slug: definition.form.slug.clone(),
            question: first,
            total_questions: definition.questions.len(),
        })
    }

    /// Accept an answer for the session's current question and move to
    /// the next step. Out-of-turn submissions are rejected: the check
    /// is enforced by the store's conditional update against the
    /// latest state, so a stale concurrent retry cannot apply twice.
    pub async fn submit_answer(
        &self,
        token: &str,
        question_id: &QuestionId,
        raw_value: &serde_json::Value,
    ) -> Result<SubmitOutcome> {
        let session = self.in_progress_session(token).await?;
        let current = session
            .current_question_id
            .clone()
            .ok_or(FormFlowError::SessionNotResumable)?;
        if &current != question_id {
            return Err(FormFlowError::OutOfTurnQuestion(question_id.to_string()));
        }

        let definition = self.load_definition(&session.form_id).await?;
        let question = definition
            .question(question_id)
            .ok_or_else(|| FormFlowError::QuestionNotFound(question_id.to_string()))?
            .clone();

        let value = AnswerValue::from_submission(&question, raw_value)?;
        let directive = resolve(&question, Some(&value));
        let transition = next_transition(&definition, &current, directive);

        let answer = Answer {
            response_id: session.id.clone(),
            question_id: question_id.clone(),
            value,
            answered_at: Utc::now(),
        };
        let advanced = self
            .store
            .advance_session(token, &current, &answer, &transition)
            .await?;
        if !advanced {
            return Err(FormFlowError::OutOfTurnQuestion(question_id.to_string()));
        }
        debug!(
            response = %session.id,
            question = %question_id,
            kind = question.kind.name(),
            "Answer recorded"
        );

        match transition {
            SessionTransition::Complete { .. } => {
                info!(response = %session.id, "Session completed");
                // Dispatch failures stay on the owner's side of the
                // fence; the respondent's completion stands.
                if let Err(e) = self.dispatcher.dispatch(&session.id).await {
                    error!(response = %session.id, error = %e, "Completion dispatch failed");
                }
                Ok(SubmitOutcome::Completed {
                    response_id: session.id,
                })
            }
            SessionTransition::MoveTo(next_id) => {
                let step = self.question_step(&definition, &session.id, &next_id).await?;
                Ok(SubmitOutcome::Next(step))
            }
        }
    }

    /// Move back to the question actually visited before the current
    /// one, which branching may have made something other than
    /// position minus one. No-op at the first question.
    pub async fn navigate_back(
        &self,
        token: &str,
        current_question_id: &QuestionId,
    ) -> Result<QuestionStep> {
        let session = self.in_progress_session(token).await?;
        let current = session
            .current_question_id
            .clone()
            .ok_or(FormFlowError::SessionNotResumable)?;
        if &current != current_question_id {
            return Err(FormFlowError::OutOfTurnQuestion(current_question_id.to_string()));
        }

        let definition = self.load_definition(&session.form_id).await?;
        let answers = self.store.load_answers(&session.id).await?;
        let by_question: BTreeMap<String, AnswerValue> = answers
            .into_iter()
            .map(|a| (a.question_id.0, a.value))
            .collect();

        let path = walk_visited(&definition, &by_question, &current);
        let previous = match path.iter().position(|q| q == &current) {
            Some(i) if i > 0 => path[i - 1].clone(),
            _ => {
                // Already at the first visited question.
                return self.question_step(&definition, &session.id, &current).await;
            }
        };

        let moved = self.store.rewind_session(token, &current, &previous).await?;
        if !moved {
            return Err(FormFlowError::OutOfTurnQuestion(current.to_string()));
        }
        self.question_step(&definition, &session.id, &previous).await
    }

    /// Return the session's current state so a reloaded client can
    /// continue without re-answering.
    pub async fn resume(&self, token: &str) -> Result<SessionState> {
        let session = self
            .store
            .find_session(token)
            .await?
            .ok_or(FormFlowError::SessionNotResumable)?;

        match session.status {
            ResponseStatus::Completed => Ok(SessionState::Completed {
                completed_at: session.completed_at,
            }),
            ResponseStatus::InProgress => {
                let current = session
                    .current_question_id
                    .clone()
                    .ok_or(FormFlowError::SessionNotResumable)?;
                let definition = self.load_definition(&session.form_id).await?;
                let step = self.question_step(&definition, &session.id, &current).await?;
                Ok(SessionState::InProgress(step))
            }
        }
    }

    async fn in_progress_session(&self, token: &str) -> Result<ResponseSession> {
        let session = self
            .store
            .find_session(token)
            .await?
            .ok_or(FormFlowError::SessionNotResumable)?;
        if session.status != ResponseStatus::InProgress {
            return Err(FormFlowError::SessionNotResumable);
        }
        Ok(session)
    }

    async fn load_definition(&self, form_id: &FormId) -> Result<FormDefinition> {
        self.store
            .load_form(form_id)
            .await?
            .ok_or_else(|| FormFlowError::FormNotFound(form_id.to_string()))
    }

    async fn question_step(
        &self,
        definition: &FormDefinition,
        response_id: &ResponseId,
        question_id: &QuestionId,
    ) -> Result<QuestionStep> {
        let question = definition
            .question(question_id)
            .ok_or_else(|| FormFlowError::QuestionNotFound(question_id.to_string()))?
            .clone();
        let answers = self.store.load_answers(response_id).await?;
        let saved_answer = answers
            .iter()
            .find(|a| &a.question_id == question_id)
            .map(|a| a.value.clone());
        Ok(QuestionStep {
            question,
            saved_answer,
            answered: answers.len(),
            total_questions: definition.questions.len(),
        })
    }
}

/// Turn a route directive into a concrete transition. A jump to a
/// question outside the form degrades to the positional successor;
/// running off the end of the question list completes the session.
fn next_transition(
    definition: &FormDefinition,
    current: &QuestionId,
    directive: RouteDirective,
) -> SessionTransition {
    match directive {
        RouteDirective::End => SessionTransition::Complete { at: Utc::now() },
        RouteDirective::Jump(target) if definition.contains(&target) => {
            SessionTransition::MoveTo(target)
        }
        RouteDirective::Jump(_) | RouteDirective::Next => match definition.successor(current) {
            Some(next) => SessionTransition::MoveTo(next.id.clone()),
            None => SessionTransition::Complete { at: Utc::now() },
        },
    }
}

/// Reconstruct the visited-question path by replaying saved answers
/// through the rule resolver from the first question. Stops at
/// `stop_at`, at the first unanswered question, or on the first
/// revisit — a cyclic rule graph terminates the reconstruction, it
/// does not hang it.
fn walk_visited(
    definition: &FormDefinition,
    answers: &BTreeMap<String, AnswerValue>,
    stop_at: &QuestionId,
) -> Vec<QuestionId> {
    let mut path = Vec::new();
    let mut seen = HashSet::new();
    let Some(first) = definition.first_question() else {
        return path;
    };
    let mut cursor = first.id.clone();

    loop {
        if !seen.insert(cursor.0.clone()) {
            break;
        }
        path.push(cursor.clone());
        if &cursor == stop_at {
            break;
        }
        let Some(question) = definition.question(&cursor) else {
            break;
        };
        let Some(value) = answers.get(cursor.0.as_str()) else {
            break;
        };
        cursor = match next_transition(definition, &cursor, resolve(question, Some(value))) {
            SessionTransition::MoveTo(next) => next,
            SessionTransition::Complete { .. } => break,
        };
    }

    path
}
