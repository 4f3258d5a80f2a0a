use std::sync::OnceLock;

use chrono::{DateTime, NaiveDate, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{FormFlowError, Result};

/// Unique form identifier.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct FormId(pub String);

/// Unique question identifier, scoped to its form.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct QuestionId(pub String);

/// Primary id of a response row. Never handed to respondents — they
/// hold the opaque session token instead.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct ResponseId(pub String);

/// Unique integration identifier.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct IntegrationId(pub String);

macro_rules! impl_id {
    ($name:ident) => {
        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4().to_string())
            }

            pub fn from_string(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

impl_id!(FormId);
impl_id!(QuestionId);
impl_id!(ResponseId);
impl_id!(IntegrationId);

const SESSION_TOKEN_LEN: usize = 40;

/// Generate an unguessable bearer token for a respondent session.
pub fn session_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SESSION_TOKEN_LEN)
        .map(char::from)
        .collect()
}

// ── Forms and questions ─────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormStatus {
    Draft,
    Active,
    Archived,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Form {
    pub id: FormId,
    pub title: String,
    pub slug: String,
    pub status: FormStatus,
    /// Optional respondent verification code required to start a session.
    #[serde(default)]
    pub access_code: Option<String>,
}

/// A form plus its ordered question list — the unit the store loads
/// and the import command writes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormDefinition {
    pub form: Form,
    pub questions: Vec<Question>,
}

impl FormDefinition {
    /// Questions sorted by position. The store returns them sorted,
    /// but imported definitions may list them in any order.
    pub fn ordered_questions(&self) -> Vec<&Question> {
        let mut qs: Vec<&Question> = self.questions.iter().collect();
        qs.sort_by_key(|q| q.position);
        qs
    }

    pub fn question(&self, id: &QuestionId) -> Option<&Question> {
        self.questions.iter().find(|q| &q.id == id)
    }

    pub fn contains(&self, id: &QuestionId) -> bool {
        self.questions.iter().any(|q| &q.id == id)
    }

    /// The question after `id` in position order, if any.
    pub fn successor(&self, id: &QuestionId) -> Option<&Question> {
        let current = self.question(id)?;
        self.ordered_questions()
            .into_iter()
            .find(|q| q.position > current.position)
    }

    pub fn first_question(&self) -> Option<&Question> {
        self.ordered_questions().into_iter().next()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub label: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_required")]
    pub required: bool,
    /// 0-based; defines the default traversal order.
    pub position: u32,
    #[serde(flatten)]
    pub kind: QuestionKind,
    #[serde(default)]
    pub logic: Option<QuestionLogic>,
}

fn default_required() -> bool {
    true
}

/// Question type together with its type-specific settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuestionKind {
    ShortText {
        #[serde(default)]
        max_length: Option<u32>,
    },
    LongText,
    MultipleChoice {
        options: Vec<String>,
        #[serde(default)]
        allow_multiple: bool,
    },
    YesNo {
        #[serde(default = "default_yes_label")]
        yes_label: String,
        #[serde(default = "default_no_label")]
        no_label: String,
    },
    Rating {
        #[serde(default = "default_rating_min")]
        min: u8,
        #[serde(default = "default_rating_max")]
        max: u8,
    },
    Email,
    Phone,
    Date,
    RespondentName,
}

fn default_yes_label() -> String {
    "Yes".to_string()
}

fn default_no_label() -> String {
    "No".to_string()
}

fn default_rating_min() -> u8 {
    1
}

fn default_rating_max() -> u8 {
    5
}

impl QuestionKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ShortText { .. } => "short_text",
            Self::LongText => "long_text",
            Self::MultipleChoice { .. } => "multiple_choice",
            Self::YesNo { .. } => "yes_no",
            Self::Rating { .. } => "rating",
            Self::Email => "email",
            Self::Phone => "phone",
            Self::Date => "date",
            Self::RespondentName => "respondent_name",
        }
    }
}

// ── Branching logic ─────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionLogic {
    /// Evaluated in order; the first matching rule wins.
    #[serde(default)]
    pub rules: Vec<LogicRule>,
    #[serde(default)]
    pub default_action: DefaultAction,
    /// Overrides "next" when no rule matches.
    #[serde(default)]
    pub default_target: Option<QuestionId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultAction {
    #[default]
    Next,
    End,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogicRule {
    pub id: String,
    pub conditions: Vec<LogicCondition>,
    /// Applies uniformly across all conditions in the rule.
    #[serde(default)]
    pub condition_operator: ConditionJoin,
    pub action: RuleAction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionJoin {
    #[default]
    And,
    Or,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleAction {
    /// A jump without a target degrades to "next" at resolution time.
    Jump {
        #[serde(default)]
        target_question_id: Option<QuestionId>,
    },
    End,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogicCondition {
    #[serde(default)]
    pub field: ConditionField,
    pub operator: ConditionOperator,
    /// Comparison operand; absent for is_empty / is_not_empty.
    #[serde(default)]
    pub value: Option<serde_json::Value>,
}

/// The value a condition reads. Only the owning question's answer
/// is in scope in the current model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionField {
    #[default]
    Answer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    GreaterThan,
    LessThan,
    GreaterThanOrEqual,
    LessThanOrEqual,
    IsEmpty,
    IsNotEmpty,
    Before,
    After,
}

impl ConditionOperator {
    /// Operator whitelist per question kind. A condition using an
    /// operator outside its question's set evaluates to "not met".
    pub fn allowed_for(&self, kind: &QuestionKind) -> bool {
        use ConditionOperator::*;
        match kind {
            QuestionKind::ShortText { .. }
            | QuestionKind::LongText
            | QuestionKind::Email
            | QuestionKind::Phone
            | QuestionKind::RespondentName => matches!(
                self,
                Equals | NotEquals | Contains | NotContains | IsEmpty | IsNotEmpty
            ),
            QuestionKind::MultipleChoice { .. } => matches!(
                self,
                Equals | NotEquals | Contains | NotContains | IsEmpty | IsNotEmpty
            ),
            QuestionKind::YesNo { .. } => {
                matches!(self, Equals | NotEquals | IsEmpty | IsNotEmpty)
            }
            QuestionKind::Rating { .. } => matches!(
                self,
                Equals
                    | NotEquals
                    | GreaterThan
                    | LessThan
                    | GreaterThanOrEqual
                    | LessThanOrEqual
                    | IsEmpty
                    | IsNotEmpty
            ),
            QuestionKind::Date => {
                matches!(self, Equals | NotEquals | Before | After | IsEmpty | IsNotEmpty)
            }
        }
    }
}

// ── Answers ─────────────────────────────────────────────────────

/// A respondent's answer, typed per question kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum AnswerValue {
    Text(String),
    Bool(bool),
    Number(f64),
    Date(NaiveDate),
    Choices(Vec<String>),
    Skipped,
}

static EMAIL_RE: OnceLock<regex::Regex> = OnceLock::new();
static PHONE_RE: OnceLock<regex::Regex> = OnceLock::new();

fn email_re() -> &'static regex::Regex {
    EMAIL_RE.get_or_init(|| regex::Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap())
}

fn phone_re() -> &'static regex::Regex {
    PHONE_RE.get_or_init(|| regex::Regex::new(r"^\+?[0-9][0-9 ().-]{5,19}$").unwrap())
}

impl AnswerValue {
    /// Coerce and validate a raw submitted JSON value against the
    /// question it answers. JSON null becomes the skipped marker for
    /// optional questions and is rejected for required ones.
    pub fn from_submission(question: &Question, raw: &serde_json::Value) -> Result<Self> {
        if raw.is_null() {
            if question.required {
                return Err(FormFlowError::InvalidAnswer(format!(
                    "question {} is required",
                    question.id
                )));
            }
            return Ok(Self::Skipped);
        }

        let invalid = |msg: &str| FormFlowError::InvalidAnswer(format!("{}: {}", question.id, msg));

        match &question.kind {
            QuestionKind::ShortText { max_length } => {
                let s = raw.as_str().ok_or_else(|| invalid("expected a string"))?;
                if let Some(max) = max_length {
                    if s.chars().count() > *max as usize {
                        return Err(invalid(&format!("answer exceeds {} characters", max)));
                    }
                }
                Ok(Self::Text(s.to_string()))
            }
            QuestionKind::LongText => {
                let s = raw.as_str().ok_or_else(|| invalid("expected a string"))?;
                Ok(Self::Text(s.to_string()))
            }
            QuestionKind::RespondentName => {
                let s = raw.as_str().ok_or_else(|| invalid("expected a string"))?;
                if s.trim().is_empty() {
                    return Err(invalid("name must not be empty"));
                }
                Ok(Self::Text(s.to_string()))
            }
            QuestionKind::Email => {
                let s = raw.as_str().ok_or_else(|| invalid("expected a string"))?;
                if !email_re().is_match(s) {
                    return Err(invalid("not a valid email address"));
                }
                Ok(Self::Text(s.to_string()))
            }
            QuestionKind::Phone => {
                let s = raw.as_str().ok_or_else(|| invalid("expected a string"))?;
                if !phone_re().is_match(s.trim()) {
                    return Err(invalid("not a valid phone number"));
                }
                Ok(Self::Text(s.trim().to_string()))
            }
            QuestionKind::YesNo { .. } => {
                let b = raw.as_bool().ok_or_else(|| invalid("expected a boolean"))?;
                Ok(Self::Bool(b))
            }
            QuestionKind::Rating { min, max } => {
                let n = raw.as_f64().ok_or_else(|| invalid("expected a number"))?;
                if n.fract() != 0.0 || n < *min as f64 || n > *max as f64 {
                    return Err(invalid(&format!(
                        "rating must be an integer between {} and {}",
                        min, max
                    )));
                }
                Ok(Self::Number(n))
            }
            QuestionKind::Date => {
                let s = raw.as_str().ok_or_else(|| invalid("expected a date string"))?;
                let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
                    .map_err(|_| invalid("expected an ISO date (YYYY-MM-DD)"))?;
                Ok(Self::Date(date))
            }
            QuestionKind::MultipleChoice {
                options,
                allow_multiple,
            } => {
                let selected: Vec<String> = match raw {
                    serde_json::Value::String(s) => vec![s.clone()],
                    serde_json::Value::Array(items) => {
                        if !allow_multiple && items.len() > 1 {
                            return Err(invalid("question accepts a single choice"));
                        }
                        items
                            .iter()
                            .map(|v| {
                                v.as_str()
                                    .map(|s| s.to_string())
                                    .ok_or_else(|| invalid("choices must be strings"))
                            })
                            .collect::<Result<Vec<_>>>()?
                    }
                    _ => return Err(invalid("expected a choice or list of choices")),
                };
                if selected.is_empty() {
                    return Err(invalid("at least one choice is required"));
                }
                for choice in &selected {
                    if !options.contains(choice) {
                        return Err(invalid(&format!("'{}' is not one of the options", choice)));
                    }
                }
                Ok(Self::Choices(selected))
            }
        }
    }

    /// Canonical string form, used by string condition operators.
    pub fn canonical_text(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Bool(b) => b.to_string(),
            Self::Number(n) => format_number(*n),
            Self::Date(d) => d.format("%Y-%m-%d").to_string(),
            Self::Choices(cs) => cs.join(", "),
            Self::Skipped => String::new(),
        }
    }

    /// Numeric coercion for comparison operators. Returns None when
    /// the value has no sensible numeric reading.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => s.trim().parse().ok(),
            Self::Bool(_) | Self::Date(_) | Self::Choices(_) | Self::Skipped => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Self::Date(d) => Some(*d),
            Self::Text(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok(),
            _ => None,
        }
    }

    /// Empty means: skipped, empty string, or no choices selected.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Skipped => true,
            Self::Text(s) => s.is_empty(),
            Self::Choices(cs) => cs.is_empty(),
            Self::Bool(_) | Self::Number(_) | Self::Date(_) => false,
        }
    }
}

/// Render a float without a trailing ".0" when it is integral.
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

// ── Sessions ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    InProgress,
    Completed,
}

/// One respondent's pass through a form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseSession {
    pub id: ResponseId,
    pub form_id: FormId,
    pub session_token: String,
    pub status: ResponseStatus,
    /// Null only once the session is completed.
    pub current_question_id: Option<QuestionId>,
    /// Per-form counter, allocated at session creation.
    pub response_number: i64,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Doubles as the completion-dispatch idempotency flag; set at
    /// most once per response.
    pub integrations_processed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub response_id: ResponseId,
    pub question_id: QuestionId,
    pub value: AnswerValue,
    pub answered_at: DateTime<Utc>,
}

/// How a submit moves the session: onward to another question, or
/// into the terminal completed state.
#[derive(Debug, Clone)]
pub enum SessionTransition {
    MoveTo(QuestionId),
    Complete { at: DateTime<Utc> },
}

// ── Integrations ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrationKind {
    Email,
    Slack,
    Webhook,
    Zapier,
}

impl IntegrationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Slack => "slack",
            Self::Webhook => "webhook",
            Self::Zapier => "zapier",
        }
    }
}

impl std::str::FromStr for IntegrationKind {
    type Err = FormFlowError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "email" => Ok(Self::Email),
            "slack" => Ok(Self::Slack),
            "webhook" => Ok(Self::Webhook),
            "zapier" => Ok(Self::Zapier),
            other => Err(FormFlowError::UnknownIntegrationKind(other.to_string())),
        }
    }
}

impl std::fmt::Display for IntegrationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrationTrigger {
    FormCompleted,
}

impl IntegrationTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FormCompleted => "form_completed",
        }
    }
}

/// A configured outbound notification. `kind` is kept as raw text so
/// one corrupt row cannot poison loading its siblings; it is parsed
/// into [`IntegrationKind`] at the dispatch point, where unknown text
/// fails that integration loudly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Integration {
    pub id: IntegrationId,
    pub form_id: FormId,
    pub kind: String,
    pub name: String,
    pub enabled: bool,
    pub trigger: IntegrationTrigger,
    /// Type-specific config; string fields may hold `${ENV_VAR}`
    /// secret references resolved at execution time.
    pub config: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogStatus {
    Success,
    Error,
}

/// Append-only record of one dispatch attempt. Never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrationLog {
    pub id: String,
    pub integration_id: IntegrationId,
    pub response_id: ResponseId,
    pub status: LogStatus,
    pub payload: serde_json::Value,
    pub response_data: Option<serde_json::Value>,
    pub error_message: Option<String>,
    pub executed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(kind: QuestionKind) -> Question {
        Question {
            id: QuestionId::from_string("q1"),
            label: "Test".into(),
            description: None,
            required: true,
            position: 0,
            kind,
            logic: None,
        }
    }

    #[test]
    fn session_tokens_are_long_and_distinct() {
        let a = session_token();
        let b = session_token();
        assert_eq!(a.len(), 40);
        assert_ne!(a, b);
    }

    #[test]
    fn email_validation() {
        let q = question(QuestionKind::Email);
        assert!(AnswerValue::from_submission(&q, &serde_json::json!("a@b.co")).is_ok());
        assert!(AnswerValue::from_submission(&q, &serde_json::json!("not-an-email")).is_err());
        assert!(AnswerValue::from_submission(&q, &serde_json::json!(42)).is_err());
    }

    #[test]
    fn rating_bounds() {
        let q = question(QuestionKind::Rating { min: 1, max: 5 });
        assert_eq!(
            AnswerValue::from_submission(&q, &serde_json::json!(3)).unwrap(),
            AnswerValue::Number(3.0)
        );
        assert!(AnswerValue::from_submission(&q, &serde_json::json!(6)).is_err());
        assert!(AnswerValue::from_submission(&q, &serde_json::json!(2.5)).is_err());
    }

    #[test]
    fn required_question_rejects_null() {
        let q = question(QuestionKind::LongText);
        assert!(AnswerValue::from_submission(&q, &serde_json::Value::Null).is_err());

        let mut optional = question(QuestionKind::LongText);
        optional.required = false;
        assert_eq!(
            AnswerValue::from_submission(&optional, &serde_json::Value::Null).unwrap(),
            AnswerValue::Skipped
        );
    }

    #[test]
    fn multiple_choice_membership() {
        let q = question(QuestionKind::MultipleChoice {
            options: vec!["Red".into(), "Blue".into()],
            allow_multiple: true,
        });
        assert_eq!(
            AnswerValue::from_submission(&q, &serde_json::json!(["Red", "Blue"])).unwrap(),
            AnswerValue::Choices(vec!["Red".into(), "Blue".into()])
        );
        assert!(AnswerValue::from_submission(&q, &serde_json::json!(["Green"])).is_err());

        let single = question(QuestionKind::MultipleChoice {
            options: vec!["Red".into(), "Blue".into()],
            allow_multiple: false,
        });
        assert!(AnswerValue::from_submission(&single, &serde_json::json!(["Red", "Blue"])).is_err());
    }

    #[test]
    fn date_parsing() {
        let q = question(QuestionKind::Date);
        assert!(AnswerValue::from_submission(&q, &serde_json::json!("2025-06-01")).is_ok());
        assert!(AnswerValue::from_submission(&q, &serde_json::json!("06/01/2025")).is_err());
    }

    #[test]
    fn canonical_text_forms() {
        assert_eq!(AnswerValue::Number(4.0).canonical_text(), "4");
        assert_eq!(AnswerValue::Number(4.5).canonical_text(), "4.5");
        assert_eq!(AnswerValue::Bool(true).canonical_text(), "true");
        assert_eq!(
            AnswerValue::Choices(vec!["a".into(), "b".into()]).canonical_text(),
            "a, b"
        );
        assert_eq!(AnswerValue::Skipped.canonical_text(), "");
    }

    #[test]
    fn operator_whitelists() {
        let rating = QuestionKind::Rating { min: 1, max: 5 };
        assert!(ConditionOperator::GreaterThan.allowed_for(&rating));
        assert!(!ConditionOperator::Contains.allowed_for(&rating));

        let date = QuestionKind::Date;
        assert!(ConditionOperator::Before.allowed_for(&date));
        assert!(!ConditionOperator::GreaterThan.allowed_for(&date));

        let yes_no = QuestionKind::YesNo {
            yes_label: "Yes".into(),
            no_label: "No".into(),
        };
        assert!(ConditionOperator::Equals.allowed_for(&yes_no));
        assert!(!ConditionOperator::Contains.allowed_for(&yes_no));
    }

    #[test]
    fn integration_kind_parse() {
        assert_eq!("slack".parse::<IntegrationKind>().unwrap(), IntegrationKind::Slack);
        assert!(matches!(
            "carrier_pigeon".parse::<IntegrationKind>(),
            Err(FormFlowError::UnknownIntegrationKind(_))
        ));
    }

    #[test]
    fn successor_follows_position_order() {
        let def = FormDefinition {
            form: Form {
                id: FormId::from_string("f1"),
                title: "T".into(),
                slug: "t".into(),
                status: FormStatus::Active,
                access_code: None,
            },
            questions: vec![
                Question {
                    id: QuestionId::from_string("q3"),
                    label: "3".into(),
                    description: None,
                    required: true,
                    position: 2,
                    kind: QuestionKind::LongText,
                    logic: None,
                },
                Question {
                    id: QuestionId::from_string("q1"),
                    label: "1".into(),
                    description: None,
                    required: true,
                    position: 0,
                    kind: QuestionKind::LongText,
                    logic: None,
                },
            ],
        };
        assert_eq!(def.first_question().unwrap().id.0, "q1");
        assert_eq!(def.successor(&QuestionId::from_string("q1")).unwrap().id.0, "q3");
        assert!(def.successor(&QuestionId::from_string("q3")).is_none());
    }
}
