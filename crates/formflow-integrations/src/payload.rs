use serde_json::{json, Value};

use formflow_template::TemplateContext;

/// The payload shape shared by the chat/webhook/automation handlers:
/// form identity, response identity, completion time, and the
/// per-question answer array.
pub fn completion_payload(ctx: &TemplateContext, is_test: bool) -> Value {
    json!({
        "event": "form_completed",
        "form": {
            "id": ctx.get("form_id"),
            "title": ctx.get("form_title"),
            "slug": ctx.get("form_slug"),
        },
        "response": {
            "id": ctx.get("response_id"),
            "number": ctx.get("response_number"),
            "submitted_at": ctx.get("submitted_at"),
        },
        "answers": ctx.answers_json().clone(),
        "test": is_test,
    })
}
