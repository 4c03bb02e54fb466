//! Mastra framework detector (§4.7): scope `@mastra/otel`/`@mastra/otel-bridge`/
//! `@mastra/*`, or `mastra.span.type` present.

use serde_json::Value as JsonValue;

use crate::extract::helpers::extract_system_instruction_from_messages;
use crate::extract::{Extractor, ExtractorContext};
use crate::model::attribute::AttributeValue;

pub struct MastraExtractor;

impl Extractor for MastraExtractor {
    fn id(&self) -> &'static str {
        "mastra"
    }

    fn apply(&self, ctx: &mut ExtractorContext) {
        if !detected(ctx) {
            return;
        }
        ctx.record_rule("mastra.detected");

        let mastra_type = ctx.bag.attrs.take("mastra.span.type");
        let mastra_type_str = mastra_type.as_ref().and_then(|v| v.as_str()).map(str::to_string);

        let input = ctx
            .bag
            .attrs
            .get("mastra.model_step.input")
            .and_then(|v| v.as_str())
            .map(|s| crate::extract::helpers::safe_json_parse(s));
        let is_eval = mastra_type_str.as_deref() == Some("model_step")
            && (ctx.span.parent_span_id.is_none()
                || input
                    .as_ref()
                    .and_then(|v| v.get("body"))
                    .and_then(|b| b.get("response_format"))
                    .map(|v| !v.is_null())
                    .unwrap_or(false));

        let span_type = match mastra_type_str.as_deref() {
            Some("agent_run") => Some("agent"),
            Some(t) if t.starts_with("workflow") => Some("workflow"),
            Some("workflow_step") | Some("processor_run") => Some("component"),
            Some("model_generation") | Some("model_step") => Some("llm"),
            Some("model_chunk") => Some("span"),
            Some("tool_call") | Some("mcp_tool_call") => Some("tool"),
            Some("generic") | Some("default") => Some("span"),
            _ => None,
        };
        if let Some(mut t) = span_type {
            if is_eval {
                t = "evaluation";
            }
            ctx.set_attr("langwatch.span.type", t);
        }

        model(ctx);

        if is_eval {
            eval_io(ctx, input.as_ref());
        } else {
            model_step_io(ctx, input.as_ref());
        }

        agent_input(ctx);
        display_name(ctx, input.as_ref(), mastra_type_str.as_deref(), is_eval);
        thread_id(ctx);
        token_alias(ctx);
    }
}

fn detected(ctx: &ExtractorContext) -> bool {
    let scope = ctx.span.instrumentation_scope.name.as_str();
    scope == "@mastra/otel" || scope == "@mastra/otel-bridge" || scope.starts_with("@mastra/")
        || ctx.bag.attrs.has("mastra.span.type")
}

fn model(ctx: &mut ExtractorContext) {
    if let Some(m) = ctx
        .bag
        .attrs
        .get("mastra.model_step.input")
        .and_then(|v| v.as_str())
        .map(crate::extract::helpers::safe_json_parse)
        .and_then(|v| v.get("body").and_then(|b| b.get("model")).cloned())
    {
        ctx.set_attr_if_absent("gen_ai.request.model", m);
        return;
    }
    if let Some(m) = ctx
        .bag
        .attrs
        .take("mastra.metadata.modelMetadata.modelId")
    {
        ctx.set_attr_if_absent("gen_ai.request.model", m);
    }
}

fn model_step_io(ctx: &mut ExtractorContext, input: Option<&JsonValue>) {
    let Some(input) = input else { return };
    if let Some(messages) = input
        .get("body")
        .and_then(|b| b.get("messages"))
        .and_then(|m| m.as_array())
    {
        if let Some(instruction) = extract_system_instruction_from_messages(messages) {
            ctx.set_attr("gen_ai.request.system_instruction", instruction);
        }
        let stripped: Vec<JsonValue> = messages
            .iter()
            .filter(|m| m.get("role").and_then(|r| r.as_str()) != Some("system"))
            .cloned()
            .collect();
        ctx.set_attr("gen_ai.input.messages", JsonValue::Array(stripped));
    }
    ctx.bag.attrs.take("mastra.model_step.input");

    if let Some(output) = ctx
        .bag
        .attrs
        .take("mastra.model_step.output")
        .and_then(|v| v.as_str().map(str::to_string))
        .map(|s| crate::extract::helpers::safe_json_parse(&s))
    {
        if let Some(text) = output.get("text").and_then(|t| t.as_str()) {
            ctx.set_attr("langwatch.output", text.to_string());
            ctx.set_attr(
                "gen_ai.output.messages",
                serde_json::json!([{"role": "assistant", "content": text}]),
            );
        }
    }
}

fn eval_io(ctx: &mut ExtractorContext, input: Option<&JsonValue>) {
    let system_prompt = input
        .and_then(|i| i.get("body"))
        .and_then(|b| b.get("messages"))
        .and_then(|m| m.as_array())
        .and_then(|msgs| extract_system_instruction_from_messages(msgs));
    if let Some(sp) = &system_prompt {
        ctx.set_attr("langwatch.input", sp.clone());
    }
    ctx.bag.attrs.take("mastra.model_step.input");

    let output = ctx
        .bag
        .attrs
        .take("mastra.model_step.output")
        .and_then(|v| v.as_str().map(str::to_string))
        .map(|s| crate::extract::helpers::safe_json_parse(&s));
    if let Some(output) = output {
        let rendered = match output.get("object") {
            Some(obj) if !obj.is_null() => {
                if let Some(s) = obj.as_str() {
                    Some(s.to_string())
                } else {
                    Some(obj.to_string())
                }
            }
            _ => output.get("text").and_then(|t| t.as_str()).map(str::to_string),
        };
        if let Some(rendered) = rendered {
            ctx.set_attr("langwatch.output", rendered);
        }
    }
}

fn agent_input(ctx: &mut ExtractorContext) {
    let Some(messages) = ctx
        .bag
        .attrs
        .get("mastra.agent.input")
        .and_then(|v| v.as_str())
        .map(crate::extract::helpers::safe_json_parse)
        .and_then(|v| v.as_array().cloned())
    else {
        return;
    };
    let last_user_text = messages
        .iter()
        .rev()
        .find(|m| m.get("role").and_then(|r| r.as_str()) == Some("user"))
        .and_then(|m| m.get("content"))
        .and_then(crate::extract::helpers::extract_message_text);
    if let Some(text) = last_user_text {
        ctx.set_attr("langwatch.input", text);
    }
    ctx.bag.attrs.take("mastra.agent.input");
}

fn display_name(
    ctx: &mut ExtractorContext,
    input: Option<&JsonValue>,
    mastra_type_str: Option<&str>,
    is_eval: bool,
) {
    let model = ctx
        .out_get("gen_ai.request.model")
        .and_then(|v| v.as_str())
        .map(str::to_string);
    let span_type = ctx.out_get("langwatch.span.type").and_then(|v| v.as_str());

    let name = match span_type {
        Some("evaluation") => {
            let excerpt = input
                .and_then(|i| i.get("body"))
                .and_then(|b| b.get("messages"))
                .and_then(|m| m.as_array())
                .and_then(|msgs| extract_system_instruction_from_messages(msgs))
                .or(model.clone());
            excerpt.map(|e| format!("Eval: {}", truncate_excerpt(&e, 60)))
        }
        Some("llm") if is_eval => None,
        Some("llm") => match mastra_type_str {
            Some("model_generation") => model.as_ref().map(|m| format!("LLM: {m}")),
            Some("model_step") => model.as_ref().map(|m| format!("LLM Step: {m}")),
            _ => model.as_ref().map(|m| format!("LLM: {m}")),
        },
        _ => None,
    };
    if let Some(name) = name {
        ctx.span.name = name;
    }
}

fn truncate_excerpt(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let truncated: String = s.chars().take(max - 3).collect();
    format!("{truncated}...")
}

fn thread_id(ctx: &mut ExtractorContext) {
    if let Some(v) = ctx.bag.attrs.take("mastra.metadata.threadId") {
        ctx.set_attr_if_absent("gen_ai.conversation.id", v);
    }
}

fn token_alias(ctx: &mut ExtractorContext) {
    let Some(v) = ctx.bag.attrs.take("gen_ai.usage.cached_input_tokens") else {
        return;
    };
    if let Some(n) = v.as_str().and_then(|s| s.parse::<i64>().ok()) {
        ctx.set_attr_if_absent("gen_ai.usage.cache_read.input_tokens", AttributeValue::Int(n));
    }
}
