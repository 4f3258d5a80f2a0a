use chrono::NaiveDate;
use serde_json::Value;

use formflow_core::types::{AnswerValue, ConditionOperator};

/// Evaluate one condition against an answer. Total over all inputs:
/// malformed operands and type mismatches evaluate to "not met", so a
/// bad rule falls through to its question's default action instead of
/// breaking the respondent's flow.
pub fn evaluate(
    operator: ConditionOperator,
    answer: Option<&AnswerValue>,
    comparison: Option<&Value>,
) -> bool {
    use ConditionOperator::*;

    match operator {
        IsEmpty => answer.map_or(true, AnswerValue::is_empty),
        IsNotEmpty => answer.is_some_and(|a| !a.is_empty()),
        Equals => match (answer_text(answer), comparison_text(comparison)) {
            (Some(a), Some(c)) => a == c,
            _ => false,
        },
        NotEquals => match (answer_text(answer), comparison_text(comparison)) {
            (Some(a), Some(c)) => a != c,
            _ => false,
        },
        Contains => contains(answer, comparison),
        NotContains => match (answer, comparison_text(comparison)) {
            (Some(_), Some(_)) => !contains(answer, comparison),
            _ => false,
        },
        GreaterThan => compare_numbers(answer, comparison, |a, c| a > c),
        LessThan => compare_numbers(answer, comparison, |a, c| a < c),
        GreaterThanOrEqual => compare_numbers(answer, comparison, |a, c| a >= c),
        LessThanOrEqual => compare_numbers(answer, comparison, |a, c| a <= c),
        Before => compare_dates(answer, comparison, |a, c| a < c),
        After => compare_dates(answer, comparison, |a, c| a > c),
    }
}

fn contains(answer: Option<&AnswerValue>, comparison: Option<&Value>) -> bool {
    let Some(needle) = comparison_text(comparison) else {
        return false;
    };
    match answer {
        // Multi-select matches within each selected option, not across
        // the joined rendering's separators.
        Some(AnswerValue::Choices(choices)) => choices.iter().any(|c| c.contains(&needle)),
        Some(value) => value.canonical_text().contains(&needle),
        None => false,
    }
}

fn compare_numbers<F: Fn(f64, f64) -> bool>(
    answer: Option<&AnswerValue>,
    comparison: Option<&Value>,
    cmp: F,
) -> bool {
    match (
        answer.and_then(AnswerValue::as_number),
        comparison_number(comparison),
    ) {
        (Some(a), Some(c)) => cmp(a, c),
        _ => false,
    }
}

fn compare_dates<F: Fn(NaiveDate, NaiveDate) -> bool>(
    answer: Option<&AnswerValue>,
    comparison: Option<&Value>,
    cmp: F,
) -> bool {
    match (
        answer.and_then(AnswerValue::as_date),
        comparison_date(comparison),
    ) {
        (Some(a), Some(c)) => cmp(a, c),
        _ => false,
    }
}

fn answer_text(answer: Option<&AnswerValue>) -> Option<String> {
    answer.map(AnswerValue::canonical_text)
}

/// String form of a comparison operand. Arrays, objects, and null have
/// no sensible string reading and fail the comparison.
fn comparison_text(comparison: Option<&Value>) -> Option<String> {
    match comparison? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(formflow_core::types::format_number(n.as_f64()?)),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn comparison_number(comparison: Option<&Value>) -> Option<f64> {
    match comparison? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn comparison_date(comparison: Option<&Value>) -> Option<NaiveDate> {
    match comparison? {
        Value::String(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use ConditionOperator::*;

    fn text(s: &str) -> AnswerValue {
        AnswerValue::Text(s.to_string())
    }

    #[test]
    fn is_empty_semantics() {
        assert!(evaluate(IsEmpty, None, None));
        assert!(evaluate(IsEmpty, Some(&AnswerValue::Skipped), None));
        assert!(evaluate(IsEmpty, Some(&text("")), None));
        assert!(!evaluate(IsEmpty, Some(&text("x")), None));

        assert!(evaluate(IsNotEmpty, Some(&text("x")), None));
        assert!(!evaluate(IsNotEmpty, None, None));
        assert!(!evaluate(IsNotEmpty, Some(&AnswerValue::Skipped), None));
    }

    #[test]
    fn string_equality_is_case_sensitive() {
        assert!(evaluate(Equals, Some(&text("Paris")), Some(&json!("Paris"))));
        assert!(!evaluate(Equals, Some(&text("paris")), Some(&json!("Paris"))));
        assert!(evaluate(NotEquals, Some(&text("paris")), Some(&json!("Paris"))));
    }

    #[test]
    fn contains_substring_match() {
        assert!(evaluate(
            Contains,
            Some(&text("hello world")),
            Some(&json!("world"))
        ));
        assert!(!evaluate(
            Contains,
            Some(&text("hello world")),
            Some(&json!("mars"))
        ));
        assert!(evaluate(
            NotContains,
            Some(&text("hello world")),
            Some(&json!("mars"))
        ));
    }

    #[test]
    fn contains_matches_within_selected_choices() {
        let choices = AnswerValue::Choices(vec!["Light blue".into(), "Red".into()]);
        assert!(evaluate(Contains, Some(&choices), Some(&json!("blue"))));
        assert!(!evaluate(Contains, Some(&choices), Some(&json!("e, R"))));
    }

    #[test]
    fn numeric_comparison_coerces_both_sides() {
        let n = AnswerValue::Number(4.0);
        assert!(evaluate(GreaterThan, Some(&n), Some(&json!(3))));
        assert!(evaluate(GreaterThan, Some(&n), Some(&json!("3"))));
        assert!(evaluate(LessThanOrEqual, Some(&n), Some(&json!(4))));
        assert!(evaluate(GreaterThan, Some(&text("10")), Some(&json!(9))));
    }

    #[test]
    fn non_numeric_input_fails_comparison() {
        assert!(!evaluate(GreaterThan, Some(&text("abc")), Some(&json!(3))));
        assert!(!evaluate(GreaterThan, Some(&AnswerValue::Number(4.0)), Some(&json!("abc"))));
        assert!(!evaluate(LessThan, None, Some(&json!(3))));
    }

    #[test]
    fn date_comparison_is_chronological() {
        let d = AnswerValue::Date(NaiveDate::from_ymd_opt(2025, 6, 1).unwrap());
        assert!(evaluate(Before, Some(&d), Some(&json!("2025-07-01"))));
        assert!(!evaluate(Before, Some(&d), Some(&json!("2025-05-01"))));
        assert!(evaluate(After, Some(&d), Some(&json!("2025-05-01"))));
    }

    #[test]
    fn unparsable_dates_fail_comparison() {
        let d = AnswerValue::Date(NaiveDate::from_ymd_opt(2025, 6, 1).unwrap());
        assert!(!evaluate(Before, Some(&d), Some(&json!("not-a-date"))));
        assert!(!evaluate(After, Some(&text("garbage")), Some(&json!("2025-05-01"))));
    }

    #[test]
    fn missing_operands_never_match_negated_operators() {
        assert!(!evaluate(NotEquals, None, Some(&json!("x"))));
        assert!(!evaluate(NotContains, None, Some(&json!("x"))));
        assert!(!evaluate(NotEquals, Some(&text("x")), None));
    }

    #[test]
    fn structured_comparison_operands_fail_closed() {
        assert!(!evaluate(Equals, Some(&text("x")), Some(&json!(["x"]))));
        assert!(!evaluate(Contains, Some(&text("x")), Some(&json!({"v": "x"}))));
    }
}
