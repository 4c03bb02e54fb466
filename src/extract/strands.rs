//! AWS Strands Agents conventions (§4.8): scope
//! `strands.telemetry.tracer` or `gen_ai.system == "strands-agents"`.
//! Input/output messages are reconstructed from role-tagged events rather
//! than attributes.

use crate::extract::helpers::extract_message_text;
use crate::extract::{Extractor, ExtractorContext};
use serde_json::Value as JsonValue;

pub struct StrandsExtractor;

impl Extractor for StrandsExtractor {
    fn id(&self) -> &'static str {
        "strands"
    }

    fn apply(&self, ctx: &mut ExtractorContext) {
        if !detected(ctx) {
            return;
        }
        ctx.record_rule("strands.detected");
        operation(ctx);
        messages_from_events(ctx);
    }
}

fn detected(ctx: &ExtractorContext) -> bool {
    ctx.span.instrumentation_scope.name == "strands.telemetry.tracer"
        || ctx
            .bag
            .attrs
            .get("gen_ai.system")
            .and_then(|v| v.as_str())
            == Some("strands-agents")
}

fn operation(ctx: &mut ExtractorContext) {
    let Some(op) = ctx
        .bag
        .attrs
        .get("gen_ai.operation.name")
        .and_then(|v| v.as_str())
        .map(str::to_string)
    else {
        return;
    };
    let mapped = match op.as_str() {
        "chat" => "llm",
        "execute_tool" => "tool",
        "invoke_agent" => "agent",
        _ => return,
    };
    ctx.set_attr("langwatch.span.type", mapped);
}

fn messages_from_events(ctx: &mut ExtractorContext) {
    let mut input_messages = Vec::new();
    for role_event in ["gen_ai.system.message", "gen_ai.user.message"] {
        for event in ctx.bag.events.take_all(role_event) {
            let role = if role_event == "gen_ai.system.message" {
                "system"
            } else {
                "user"
            };
            if let Some(content) = event
                .attributes
                .get("content")
                .and_then(|v| v.as_str())
                .map(str::to_string)
            {
                input_messages.push(serde_json::json!({"role": role, "content": content}));
            }
        }
    }
    if !input_messages.is_empty() {
        if let Some(instruction) =
            crate::extract::helpers::extract_system_instruction_from_messages(&input_messages)
        {
            ctx.set_attr("gen_ai.request.system_instruction", instruction);
        }
        let stripped: Vec<JsonValue> = input_messages
            .into_iter()
            .filter(|m| m.get("role").and_then(|r| r.as_str()) != Some("system"))
            .collect();
        ctx.set_attr("gen_ai.input.messages", JsonValue::Array(stripped));
    }

    let mut output_messages = Vec::new();
    for event in ctx.bag.events.take_all("gen_ai.assistant.message") {
        if let Some(content) = event.attributes.get("content").and_then(extract_text_attr) {
            output_messages.push(serde_json::json!({"role": "assistant", "content": content}));
        }
    }
    for event in ctx.bag.events.take_all("gen_ai.choice") {
        if let Some(content) = event.attributes.get("message").and_then(extract_text_attr) {
            output_messages.push(serde_json::json!({"role": "assistant", "content": content}));
        }
    }
    if !output_messages.is_empty() {
        ctx.set_attr("gen_ai.output.messages", JsonValue::Array(output_messages));
    }
}

fn extract_text_attr(v: &crate::model::attribute::AttributeValue) -> Option<String> {
    extract_message_text(&v.to_json())
}
