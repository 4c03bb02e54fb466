//! Vercel AI SDK conventions (§4.8): only fires under instrumentation scope
//! `"ai"`. Span name maps to span type; `ai.model` carries a structured
//! `{id, provider}` object; `ai.prompt`/`ai.response` carry chat payloads.

use serde_json::Value as JsonValue;

use crate::extract::helpers::{extract_message_text, normalise_model_from_ai_model_object};
use crate::extract::{Extractor, ExtractorContext};
use crate::model::attribute::AttributeValue;

pub struct VercelExtractor;

impl Extractor for VercelExtractor {
    fn id(&self) -> &'static str {
        "vercel"
    }

    fn apply(&self, ctx: &mut ExtractorContext) {
        if ctx.span.instrumentation_scope.name != "ai" {
            return;
        }
        ctx.record_rule("vercel.detected");
        span_type(ctx);
        model(ctx);
        usage(ctx);
        prompt(ctx);
        response(ctx);
    }
}

fn span_type(ctx: &mut ExtractorContext) {
    let mapped = match ctx.span.name.as_str() {
        "ai.generateText" | "ai.streamText" | "ai.generateText.doGenerate"
        | "ai.streamText.doStream" => "llm",
        "ai.toolCall" => "tool",
        "ai.embed" | "ai.embedMany" => "span",
        _ => return,
    };
    ctx.set_attr_if_absent("langwatch.span.type", mapped);
}

fn model(ctx: &mut ExtractorContext) {
    let Some(v) = ctx.bag.attrs.take("ai.model") else {
        return;
    };
    let json = match v.as_str() {
        Some(s) => crate::extract::helpers::safe_json_parse(s),
        None => v.to_json(),
    };
    let (id, provider) = match &json {
        JsonValue::Object(map) => (
            map.get("id").and_then(|v| v.as_str()).unwrap_or_default(),
            map.get("provider")
                .and_then(|v| v.as_str())
                .unwrap_or_default(),
        ),
        JsonValue::String(s) => (s.as_str(), ""),
        _ => return,
    };
    if id.is_empty() {
        return;
    }
    let model = normalise_model_from_ai_model_object(id, provider);
    ctx.record_rule("vercel.model");
    ctx.set_attr_if_absent("gen_ai.request.model", model.clone());
    ctx.set_attr_if_absent("gen_ai.response.model", model);
}

fn usage(ctx: &mut ExtractorContext) {
    let Some(v) = ctx.bag.attrs.take("ai.usage") else {
        return;
    };
    let json = match v.as_str() {
        Some(s) => crate::extract::helpers::safe_json_parse(s),
        None => v.to_json(),
    };
    let JsonValue::Object(map) = json else { return };
    ctx.record_rule("vercel.usage");
    if let Some(n) = map
        .get("promptTokens")
        .or_else(|| map.get("inputTokens"))
        .and_then(|v| v.as_i64())
    {
        ctx.set_attr_if_absent("gen_ai.usage.input_tokens", AttributeValue::Int(n));
    }
    if let Some(n) = map
        .get("completionTokens")
        .or_else(|| map.get("outputTokens"))
        .and_then(|v| v.as_i64())
    {
        ctx.set_attr_if_absent("gen_ai.usage.output_tokens", AttributeValue::Int(n));
    }
}

fn prompt(ctx: &mut ExtractorContext) {
    let Some((_, v)) = ctx
        .bag
        .attrs
        .take_any(&["ai.prompt.messages", "ai.prompt"])
    else {
        return;
    };
    let json = match v.as_str() {
        Some(s) => crate::extract::helpers::safe_json_parse(s),
        None => v.to_json(),
    };
    let messages = match json {
        JsonValue::Array(items) => items,
        JsonValue::String(s) => {
            vec![serde_json::json!({"role": "user", "content": s})]
        }
        other => vec![other],
    };
    ctx.record_rule("vercel.prompt");
    ctx.set_attr("gen_ai.input.messages", JsonValue::Array(messages));
}

fn response(ctx: &mut ExtractorContext) {
    let Some(v) = ctx.bag.attrs.take("ai.response") else {
        return;
    };
    let json = match v.as_str() {
        Some(s) => crate::extract::helpers::safe_json_parse(s),
        None => v.to_json(),
    };
    let JsonValue::Object(map) = &json else { return };
    ctx.record_rule("vercel.response");

    let text = map.get("text").and_then(extract_message_text);
    let tool_calls = map.get("toolCalls").cloned();

    let mut message = serde_json::Map::new();
    message.insert("role".into(), JsonValue::String("assistant".into()));
    if let Some(text) = text {
        message.insert("content".into(), JsonValue::String(text));
    }
    if let Some(tool_calls) = tool_calls {
        message.insert("tool_calls".into(), tool_calls);
    }
    ctx.set_attr(
        "gen_ai.output.messages",
        JsonValue::Array(vec![JsonValue::Object(message)]),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::attribute::AttributeMap;
    use crate::model::event::EventBag;
    use crate::model::span::{InstrumentationScope, SpanDataBag, SpanView};
    use serde_json::json;

    fn run(name: &str, attrs: &[(&str, AttributeValue)]) -> (AttributeMap, SpanView) {
        let mut map = AttributeMap::new();
        for (k, v) in attrs {
            map.set(*k, v.clone());
        }
        let mut bag = SpanDataBag {
            attrs: map,
            events: EventBag::new(),
        };
        let mut span = SpanView {
            name: name.to_string(),
            instrumentation_scope: InstrumentationScope {
                name: "ai".to_string(),
                version: None,
            },
            ..Default::default()
        };
        let extractor = VercelExtractor;
        let mut ctx = ExtractorContext::new(&mut bag, &mut span);
        extractor.apply(&mut ctx);
        let remaining: Vec<(String, AttributeValue)> = ctx
            .out_remaining()
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        let mut merged = ctx.bag.attrs.clone();
        for (k, v) in remaining {
            merged.set(k, v);
        }
        (merged, span.clone())
    }

    #[test]
    fn s3_vercel_generate_text_with_model_and_usage() {
        let (merged, _span) = run(
            "ai.generateText.doGenerate",
            &[
                (
                    "ai.model",
                    AttributeValue::Json(json!({"id": "gpt-4o", "provider": "openai.chat"}).to_string()),
                ),
                (
                    "ai.usage",
                    AttributeValue::Json(json!({"promptTokens": 10, "completionTokens": 5}).to_string()),
                ),
                (
                    "ai.prompt",
                    AttributeValue::Json(json!([{"role": "user", "content": "hi"}]).to_string()),
                ),
            ],
        );
        assert_eq!(
            merged.get("langwatch.span.type"),
            Some(&AttributeValue::String("llm".into()))
        );
        assert_eq!(
            merged.get("gen_ai.request.model"),
            Some(&AttributeValue::String("openai/gpt-4o".into()))
        );
        assert_eq!(
            merged.get("gen_ai.usage.input_tokens"),
            Some(&AttributeValue::Int(10))
        );
        assert_eq!(
            merged.get("gen_ai.usage.output_tokens"),
            Some(&AttributeValue::Int(5))
        );
    }

    #[test]
    fn does_not_fire_outside_ai_scope() {
        let mut map = AttributeMap::new();
        map.set("ai.model", AttributeValue::String("gpt-4o".into()));
        let mut bag = SpanDataBag {
            attrs: map,
            events: EventBag::new(),
        };
        let mut span = SpanView::default();
        let extractor = VercelExtractor;
        let mut ctx = ExtractorContext::new(&mut bag, &mut span);
        extractor.apply(&mut ctx);
        assert!(!ctx.out_has("gen_ai.request.model"));
    }
}
