//! Pydantic Logfire conventions (§4.8): `raw_input` attribute plus
//! `gen_ai.choice` events for output.

use crate::extract::helpers::extract_message_text;
use crate::extract::{Extractor, ExtractorContext};
use serde_json::Value as JsonValue;

pub struct LogfireExtractor;

impl Extractor for LogfireExtractor {
    fn id(&self) -> &'static str {
        "logfire"
    }

    fn apply(&self, ctx: &mut ExtractorContext) {
        if !ctx.bag.attrs.has("raw_input") {
            return;
        }
        ctx.record_rule("logfire.detected");
        ctx.set_attr_if_absent("langwatch.span.type", "llm");
        raw_input(ctx);
        choices(ctx);
    }
}

fn raw_input(ctx: &mut ExtractorContext) {
    let Some(v) = ctx.bag.attrs.take("raw_input") else {
        return;
    };
    let json = match v.as_str() {
        Some(s) => crate::extract::helpers::safe_json_parse(s),
        None => v.to_json(),
    };
    let messages = crate::extract::helpers::normalize_to_messages(&json, "user");
    ctx.set_attr("gen_ai.input.messages", JsonValue::Array(messages));
}

fn choices(ctx: &mut ExtractorContext) {
    let events = ctx.bag.events.take_all("gen_ai.choice");
    if events.is_empty() {
        return;
    }
    let mut messages = Vec::new();
    for event in events {
        let content = event
            .attributes
            .get("message")
            .or_else(|| event.attributes.get("content"))
            .and_then(|v| extract_message_text(&v.to_json()));
        if let Some(content) = content {
            messages.push(serde_json::json!({"role": "assistant", "content": content}));
        }
    }
    if !messages.is_empty() {
        ctx.set_attr("gen_ai.output.messages", JsonValue::Array(messages));
    }
}
