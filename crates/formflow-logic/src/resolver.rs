use formflow_core::types::{
    AnswerValue, ConditionField, ConditionJoin, DefaultAction, LogicRule, Question, QuestionId,
    RuleAction,
};

use crate::condition::evaluate;

/// The next-question decision for one submitted answer. Target
/// validity (membership in the form) is the state machine's concern;
/// it degrades an unknown target to the natural successor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDirective {
    Jump(QuestionId),
    End,
    Next,
}

/// Resolve a question's routing against the answer just submitted.
/// Rules are evaluated in list order and the first match wins; when
/// none match, the default action applies. A question without logic
/// behaves as default_action = next with no target.
pub fn resolve(question: &Question, answer: Option<&AnswerValue>) -> RouteDirective {
    let Some(logic) = &question.logic else {
        return RouteDirective::Next;
    };

    for rule in &logic.rules {
        if rule_matches(question, rule, answer) {
            return match &rule.action {
                RuleAction::End => RouteDirective::End,
                RuleAction::Jump { target_question_id } => match target_question_id {
                    Some(target) => RouteDirective::Jump(target.clone()),
                    None => RouteDirective::Next,
                },
            };
        }
    }

    match logic.default_action {
        DefaultAction::End => RouteDirective::End,
        DefaultAction::Next => match &logic.default_target {
            Some(target) => RouteDirective::Jump(target.clone()),
            None => RouteDirective::Next,
        },
    }
}

fn rule_matches(question: &Question, rule: &LogicRule, answer: Option<&AnswerValue>) -> bool {
    // A rule with no conditions is malformed; it never matches.
    if rule.conditions.is_empty() {
        return false;
    }

    let mut results = rule.conditions.iter().map(|condition| {
        if !condition.operator.allowed_for(&question.kind) {
            return false;
        }
        match condition.field {
            ConditionField::Answer => {
                evaluate(condition.operator, answer, condition.value.as_ref())
            }
        }
    });

    match rule.condition_operator {
        ConditionJoin::And => results.all(|r| r),
        ConditionJoin::Or => results.any(|r| r),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formflow_core::types::{
        ConditionOperator, LogicCondition, QuestionKind, QuestionLogic,
    };
    use serde_json::json;

    fn condition(operator: ConditionOperator, value: serde_json::Value) -> LogicCondition {
        LogicCondition {
            field: ConditionField::Answer,
            operator,
            value: Some(value),
        }
    }

    fn rule(id: &str, conditions: Vec<LogicCondition>, action: RuleAction) -> LogicRule {
        LogicRule {
            id: id.to_string(),
            conditions,
            condition_operator: ConditionJoin::And,
            action,
        }
    }

    fn question(logic: Option<QuestionLogic>) -> Question {
        Question {
            id: QuestionId::from_string("q1"),
            label: "Favorite color?".into(),
            description: None,
            required: true,
            position: 0,
            kind: QuestionKind::ShortText { max_length: None },
            logic,
        }
    }

    fn jump(target: &str) -> RuleAction {
        RuleAction::Jump {
            target_question_id: Some(QuestionId::from_string(target)),
        }
    }

    #[test]
    fn no_logic_falls_through_to_next() {
        let q = question(None);
        assert_eq!(resolve(&q, Some(&AnswerValue::Text("x".into()))), RouteDirective::Next);
    }

    #[test]
    fn first_matching_rule_wins() {
        // rules = [A(false), B(true), C(true)] -> B's action, never C's
        let q = question(Some(QuestionLogic {
            rules: vec![
                rule("a", vec![condition(ConditionOperator::Equals, json!("no"))], jump("qa")),
                rule("b", vec![condition(ConditionOperator::Equals, json!("yes"))], jump("qb")),
                rule("c", vec![condition(ConditionOperator::Equals, json!("yes"))], jump("qc")),
            ],
            default_action: DefaultAction::Next,
            default_target: None,
        }));
        assert_eq!(
            resolve(&q, Some(&AnswerValue::Text("yes".into()))),
            RouteDirective::Jump(QuestionId::from_string("qb"))
        );
    }

    #[test]
    fn and_join_requires_all_conditions() {
        let q = question(Some(QuestionLogic {
            rules: vec![rule(
                "r",
                vec![
                    condition(ConditionOperator::Contains, json!("blue")),
                    condition(ConditionOperator::NotEquals, json!("blueberry")),
                ],
                RuleAction::End,
            )],
            default_action: DefaultAction::Next,
            default_target: None,
        }));
        assert_eq!(resolve(&q, Some(&AnswerValue::Text("blue".into()))), RouteDirective::End);
        assert_eq!(
            resolve(&q, Some(&AnswerValue::Text("blueberry".into()))),
            RouteDirective::Next
        );
    }

    #[test]
    fn or_join_requires_any_condition() {
        let q = question(Some(QuestionLogic {
            rules: vec![LogicRule {
                id: "r".into(),
                conditions: vec![
                    condition(ConditionOperator::Equals, json!("red")),
                    condition(ConditionOperator::Equals, json!("blue")),
                ],
                condition_operator: ConditionJoin::Or,
                action: RuleAction::End,
            }],
            default_action: DefaultAction::Next,
            default_target: None,
        }));
        assert_eq!(resolve(&q, Some(&AnswerValue::Text("blue".into()))), RouteDirective::End);
        assert_eq!(
            resolve(&q, Some(&AnswerValue::Text("green".into()))),
            RouteDirective::Next
        );
    }

    #[test]
    fn jump_without_target_degrades_to_next() {
        let q = question(Some(QuestionLogic {
            rules: vec![rule(
                "r",
                vec![condition(ConditionOperator::Equals, json!("x"))],
                RuleAction::Jump {
                    target_question_id: None,
                },
            )],
            default_action: DefaultAction::End,
            default_target: None,
        }));
        assert_eq!(resolve(&q, Some(&AnswerValue::Text("x".into()))), RouteDirective::Next);
    }

    #[test]
    fn default_action_end_when_no_rule_matches() {
        let q = question(Some(QuestionLogic {
            rules: vec![rule(
                "r",
                vec![condition(ConditionOperator::Equals, json!("never"))],
                jump("qz"),
            )],
            default_action: DefaultAction::End,
            default_target: None,
        }));
        assert_eq!(resolve(&q, Some(&AnswerValue::Text("x".into()))), RouteDirective::End);
    }

    #[test]
    fn default_target_overrides_next() {
        let q = question(Some(QuestionLogic {
            rules: vec![],
            default_action: DefaultAction::Next,
            default_target: Some(QuestionId::from_string("q7")),
        }));
        assert_eq!(
            resolve(&q, Some(&AnswerValue::Text("anything".into()))),
            RouteDirective::Jump(QuestionId::from_string("q7"))
        );
    }

    #[test]
    fn disallowed_operator_never_matches() {
        // greater_than on a short_text question: outside the whitelist,
        // so the rule falls through even with a numeric-looking answer.
        let q = question(Some(QuestionLogic {
            rules: vec![rule(
                "r",
                vec![condition(ConditionOperator::GreaterThan, json!(3))],
                RuleAction::End,
            )],
            default_action: DefaultAction::Next,
            default_target: None,
        }));
        assert_eq!(resolve(&q, Some(&AnswerValue::Text("10".into()))), RouteDirective::Next);
    }

    #[test]
    fn empty_conditions_rule_never_matches() {
        let q = question(Some(QuestionLogic {
            rules: vec![rule("r", vec![], RuleAction::End)],
            default_action: DefaultAction::Next,
            default_target: None,
        }));
        assert_eq!(resolve(&q, Some(&AnswerValue::Text("x".into()))), RouteDirective::Next);
    }
}
