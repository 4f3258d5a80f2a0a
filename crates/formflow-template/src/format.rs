use formflow_core::types::{format_number, AnswerValue, Question, QuestionKind};

pub const NOT_ANSWERED: &str = "(not answered)";

/// The single source of truth for rendering one answer as text. Every
/// notification handler and preview surface formats through here, so a
/// formatting change never diverges between dispatch and preview.
pub fn format_answer(question: &Question, value: Option<&AnswerValue>) -> String {
    let Some(value) = value else {
        return NOT_ANSWERED.to_string();
    };
    if matches!(value, AnswerValue::Skipped) {
        return NOT_ANSWERED.to_string();
    }

    match (&question.kind, value) {
        (QuestionKind::YesNo { yes_label, no_label }, AnswerValue::Bool(b)) => {
            if *b {
                yes_label.clone()
            } else {
                no_label.clone()
            }
        }
        (QuestionKind::Rating { max, .. }, AnswerValue::Number(n)) => {
            format!("{}/{}", format_number(*n), max)
        }
        (QuestionKind::Date, AnswerValue::Date(d)) => d.format("%B %-d, %Y").to_string(),
        (QuestionKind::MultipleChoice { .. }, AnswerValue::Choices(choices)) => {
            choices.join(", ")
        }
        // Kind/value mismatches (corrupt rows) fall back to the
        // canonical text rather than failing the whole rendering.
        (_, value) => value.canonical_text(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use formflow_core::types::QuestionId;

    fn question(kind: QuestionKind) -> Question {
        Question {
            id: QuestionId::from_string("q"),
            label: "Q".into(),
            description: None,
            required: true,
            position: 0,
            kind,
            logic: None,
        }
    }

    #[test]
    fn yes_no_uses_configured_labels() {
        let q = question(QuestionKind::YesNo {
            yes_label: "Absolutely".into(),
            no_label: "Nope".into(),
        });
        assert_eq!(format_answer(&q, Some(&AnswerValue::Bool(true))), "Absolutely");
        assert_eq!(format_answer(&q, Some(&AnswerValue::Bool(false))), "Nope");
    }

    #[test]
    fn rating_renders_value_over_max() {
        let q = question(QuestionKind::Rating { min: 1, max: 10 });
        assert_eq!(format_answer(&q, Some(&AnswerValue::Number(7.0))), "7/10");
    }

    #[test]
    fn multi_select_comma_joined() {
        let q = question(QuestionKind::MultipleChoice {
            options: vec!["Red".into(), "Blue".into()],
            allow_multiple: true,
        });
        let v = AnswerValue::Choices(vec!["Red".into(), "Blue".into()]);
        assert_eq!(format_answer(&q, Some(&v)), "Red, Blue");
    }

    #[test]
    fn date_is_human_formatted() {
        let q = question(QuestionKind::Date);
        let v = AnswerValue::Date(NaiveDate::from_ymd_opt(2025, 6, 1).unwrap());
        assert_eq!(format_answer(&q, Some(&v)), "June 1, 2025");
    }

    #[test]
    fn unanswered_and_skipped_render_placeholder() {
        let q = question(QuestionKind::LongText);
        assert_eq!(format_answer(&q, None), NOT_ANSWERED);
        assert_eq!(format_answer(&q, Some(&AnswerValue::Skipped)), NOT_ANSWERED);
    }
}
