use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use handlebars::Handlebars;
use serde_json::{json, Value};

use formflow_core::error::{FormFlowError, Result};
use formflow_core::types::{
    Answer, AnswerValue, FormDefinition, QuestionKind, ResponseSession,
};

use crate::format::format_answer;

/// The flattened variable map and pre-rendered answer summaries used
/// to fill in notification content. Built once per dispatch and shared
/// by every handler.
#[derive(Debug, Clone)]
pub struct TemplateContext {
    variables: BTreeMap<String, String>,
    answers_json: Value,
}

impl TemplateContext {
    pub fn build(
        definition: &FormDefinition,
        response: &ResponseSession,
        answers: &[Answer],
    ) -> Self {
        let by_question: BTreeMap<&str, &AnswerValue> = answers
            .iter()
            .map(|a| (a.question_id.0.as_str(), &a.value))
            .collect();

        let mut variables = BTreeMap::new();
        variables.insert("form_id".to_string(), definition.form.id.to_string());
        variables.insert("form_title".to_string(), definition.form.title.clone());
        variables.insert("form_slug".to_string(), definition.form.slug.clone());
        variables.insert("response_id".to_string(), response.id.to_string());
        variables.insert(
            "response_number".to_string(),
            response.response_number.to_string(),
        );
        variables.insert(
            "submitted_at".to_string(),
            human_timestamp(response.completed_at.unwrap_or(response.started_at)),
        );

        let mut text_lines = Vec::new();
        let mut html_parts = Vec::new();
        let mut markdown_parts = Vec::new();
        let mut json_entries = Vec::new();

        for (index, question) in definition.ordered_questions().into_iter().enumerate() {
            let n = index + 1;
            let value = by_question.get(question.id.0.as_str()).copied();
            let rendered = format_answer(question, value);

            variables.insert(format!("q{}_text", n), question.label.clone());
            variables.insert(format!("q{}_answer", n), rendered.clone());

            text_lines.push(format!("{}: {}", question.label, rendered));
            html_parts.push(format!(
                "<p><strong>{}:</strong> {}</p>",
                html_escape(&question.label),
                html_escape(&rendered)
            ));
            markdown_parts.push(markdown_entry(question.label.as_str(), &question.kind, &rendered));
            json_entries.push(json!({
                "question": question.label,
                "answer": rendered,
            }));
        }

        let answers_json = Value::Array(json_entries);
        variables.insert("all_answers".to_string(), text_lines.join("\n"));
        variables.insert("all_answers_html".to_string(), html_parts.join("\n"));
        variables.insert("all_answers_markdown".to_string(), markdown_parts.join("\n\n"));
        variables.insert(
            "all_answers_json".to_string(),
            answers_json.to_string(),
        );

        Self {
            variables,
            answers_json,
        }
    }

    /// Synthetic context for integration test runs: one plausible
    /// answer per question, a fixed timestamp, response number 1.
    pub fn sample(definition: &FormDefinition) -> Self {
        let response = ResponseSession {
            id: formflow_core::types::ResponseId::from_string("sample-response"),
            form_id: definition.form.id.clone(),
            session_token: String::new(),
            status: formflow_core::types::ResponseStatus::Completed,
            current_question_id: None,
            response_number: 1,
            started_at: sample_timestamp(),
            completed_at: Some(sample_timestamp()),
            integrations_processed_at: None,
        };

        let answers: Vec<Answer> = definition
            .ordered_questions()
            .into_iter()
            .map(|q| Answer {
                response_id: response.id.clone(),
                question_id: q.id.clone(),
                value: sample_answer(&q.kind),
                answered_at: sample_timestamp(),
            })
            .collect();

        Self::build(definition, &response, &answers)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.variables.get(name).map(String::as_str)
    }

    pub fn variables(&self) -> &BTreeMap<String, String> {
        &self.variables
    }

    /// The structured all-answers rendering: an array of
    /// `{question, answer}` objects.
    pub fn answers_json(&self) -> &Value {
        &self.answers_json
    }

    /// Substitute `{{variable}}` references in an operator-authored
    /// template (email subjects and bodies).
    pub fn render(&self, template: &str) -> Result<String> {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(false);
        registry
            .render_template(template, &self.variables)
            .map_err(|e| FormFlowError::Template(e.to_string()))
    }
}

fn human_timestamp(at: DateTime<Utc>) -> String {
    at.format("%B %-d, %Y at %H:%M UTC").to_string()
}

fn sample_timestamp() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 15, 9, 30, 0).unwrap()
}

fn sample_answer(kind: &QuestionKind) -> AnswerValue {
    match kind {
        QuestionKind::ShortText { .. } => AnswerValue::Text("Sample answer".into()),
        QuestionKind::LongText => {
            AnswerValue::Text("This is a longer sample answer\nspanning two lines.".into())
        }
        QuestionKind::MultipleChoice { options, .. } => AnswerValue::Choices(
            options.first().cloned().map(|o| vec![o]).unwrap_or_default(),
        ),
        QuestionKind::YesNo { .. } => AnswerValue::Bool(true),
        QuestionKind::Rating { max, .. } => AnswerValue::Number(*max as f64),
        QuestionKind::Email => AnswerValue::Text("respondent@example.com".into()),
        QuestionKind::Phone => AnswerValue::Text("+1 555 0100".into()),
        QuestionKind::Date => {
            AnswerValue::Date(NaiveDate::from_ymd_opt(2025, 1, 15).unwrap())
        }
        QuestionKind::RespondentName => AnswerValue::Text("Alex Sample".into()),
    }
}

/// Long-text answers render as a blockquote; everything else inline.
fn markdown_entry(label: &str, kind: &QuestionKind, rendered: &str) -> String {
    match kind {
        QuestionKind::LongText => {
            let quoted = rendered
                .lines()
                .map(|line| format!("> {}", line))
                .collect::<Vec<_>>()
                .join("\n");
            format!("**{}:**\n{}", label, quoted)
        }
        _ => format!("**{}:** {}", label, rendered),
    }
}

fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use formflow_core::types::{
        Form, FormId, FormStatus, Question, QuestionId, ResponseId, ResponseStatus,
    };

    fn definition() -> FormDefinition {
        FormDefinition {
            form: Form {
                id: FormId::from_string("f1"),
                title: "Customer Survey".into(),
                slug: "customer-survey".into(),
                status: FormStatus::Active,
                access_code: None,
            },
            questions: vec![
                Question {
                    id: QuestionId::from_string("q1"),
                    label: "Happy?".into(),
                    description: None,
                    required: true,
                    position: 0,
                    kind: QuestionKind::YesNo {
                        yes_label: "Yes".into(),
                        no_label: "No".into(),
                    },
                    logic: None,
                },
                Question {
                    id: QuestionId::from_string("q2"),
                    label: "Details".into(),
                    description: None,
                    required: false,
                    position: 1,
                    kind: QuestionKind::LongText,
                    logic: None,
                },
            ],
        }
    }

    fn response() -> ResponseSession {
        ResponseSession {
            id: ResponseId::from_string("r1"),
            form_id: FormId::from_string("f1"),
            session_token: "tok".into(),
            status: ResponseStatus::Completed,
            current_question_id: None,
            response_number: 7,
            started_at: Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap(),
            completed_at: Some(Utc.with_ymd_and_hms(2025, 6, 1, 10, 5, 0).unwrap()),
            integrations_processed_at: None,
        }
    }

    fn answers() -> Vec<Answer> {
        vec![Answer {
            response_id: ResponseId::from_string("r1"),
            question_id: QuestionId::from_string("q1"),
            value: AnswerValue::Bool(true),
            answered_at: Utc::now(),
        }]
    }

    #[test]
    fn scalar_and_per_question_variables() {
        let ctx = TemplateContext::build(&definition(), &response(), &answers());
        assert_eq!(ctx.get("form_title"), Some("Customer Survey"));
        assert_eq!(ctx.get("form_slug"), Some("customer-survey"));
        assert_eq!(ctx.get("response_number"), Some("7"));
        assert_eq!(ctx.get("submitted_at"), Some("June 1, 2025 at 10:05 UTC"));
        assert_eq!(ctx.get("q1_text"), Some("Happy?"));
        assert_eq!(ctx.get("q1_answer"), Some("Yes"));
        assert_eq!(ctx.get("q2_answer"), Some("(not answered)"));
    }

    #[test]
    fn all_answers_renderings() {
        let ctx = TemplateContext::build(&definition(), &response(), &answers());
        assert_eq!(
            ctx.get("all_answers"),
            Some("Happy?: Yes\nDetails: (not answered)")
        );
        assert!(ctx
            .get("all_answers_html")
            .unwrap()
            .contains("<p><strong>Happy?:</strong> Yes</p>"));
        assert!(ctx
            .get("all_answers_markdown")
            .unwrap()
            .contains("**Happy?:** Yes"));

        let json = ctx.answers_json().as_array().unwrap();
        assert_eq!(json.len(), 2);
        assert_eq!(json[0]["question"], "Happy?");
        assert_eq!(json[0]["answer"], "Yes");
    }

    #[test]
    fn long_text_answers_quoted_in_markdown() {
        let mut ans = answers();
        ans.push(Answer {
            response_id: ResponseId::from_string("r1"),
            question_id: QuestionId::from_string("q2"),
            value: AnswerValue::Text("line one\nline two".into()),
            answered_at: Utc::now(),
        });
        let ctx = TemplateContext::build(&definition(), &response(), &ans);
        let md = ctx.get("all_answers_markdown").unwrap();
        assert!(md.contains("**Details:**\n> line one\n> line two"));
    }

    #[test]
    fn html_rendering_escapes_markup() {
        let mut def = definition();
        def.questions[1].kind = QuestionKind::ShortText { max_length: None };
        let mut ans = answers();
        ans.push(Answer {
            response_id: ResponseId::from_string("r1"),
            question_id: QuestionId::from_string("q2"),
            value: AnswerValue::Text("<script>alert(1)</script>".into()),
            answered_at: Utc::now(),
        });
        let ctx = TemplateContext::build(&def, &response(), &ans);
        let html = ctx.get("all_answers_html").unwrap();
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn render_substitutes_variables() {
        let ctx = TemplateContext::build(&definition(), &response(), &answers());
        let out = ctx
            .render("New response #{{response_number}} for {{form_title}}")
            .unwrap();
        assert_eq!(out, "New response #7 for Customer Survey");
    }

    #[test]
    fn sample_context_covers_every_question() {
        let ctx = TemplateContext::sample(&definition());
        assert_eq!(ctx.get("response_number"), Some("1"));
        assert_eq!(ctx.get("q1_answer"), Some("Yes"));
        assert!(ctx.get("q2_answer").is_some());
    }
}
