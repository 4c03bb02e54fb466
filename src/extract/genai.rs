//! OTel GenAI semantic conventions and legacy aliases (§4.6). Runs after
//! LangWatch — semantic-convention attributes are the next most
//! authoritative source.

use serde_json::Value as JsonValue;

use crate::extract::helpers::{
    as_number, coerce_to_string_array, extract_system_instruction_from_messages,
    normalize_to_messages,
};
use crate::extract::{Extractor, ExtractorContext};
use crate::model::attribute::AttributeValue;

/// String-numeric fields coerced in place when present as strings —
/// per Open Question (3), new keys are added here explicitly rather than
/// coerced globally.
const NUMERIC_COERCION_KEYS: &[&str] = &[
    "gen_ai.usage.reasoning_tokens",
    "gen_ai.usage.cache_read.input_tokens",
    "gen_ai.usage.cache_creation.input_tokens",
    "gen_ai.request.temperature",
    "gen_ai.request.max_tokens",
    "gen_ai.request.top_p",
    "gen_ai.request.frequency_penalty",
    "gen_ai.request.presence_penalty",
    "gen_ai.request.seed",
];

pub struct GenAiExtractor;

impl Extractor for GenAiExtractor {
    fn id(&self) -> &'static str {
        "genai"
    }

    fn apply(&self, ctx: &mut ExtractorContext) {
        operation_name(ctx);
        provider(ctx);
        agent_name(ctx);
        model(ctx);
        input_output_messages(ctx);
        usage_tokens(ctx);
        numeric_coercion(ctx);
        invocation_parameters(ctx);
    }
}

fn operation_name(ctx: &mut ExtractorContext) {
    if ctx.bag.attrs.has("gen_ai.operation.name") || ctx.out_has("gen_ai.operation.name") {
        return;
    }
    let span_type = ctx
        .bag
        .attrs
        .get("langwatch.span.type")
        .and_then(|v| v.as_str())
        .or_else(|| ctx.out_get("langwatch.span.type").and_then(|v| v.as_str()));
    let op = match span_type {
        Some("llm") => Some("chat"),
        Some("tool") => Some("tool"),
        Some("agent") => Some("agent"),
        Some("rag") => Some("retrieval"),
        _ => None,
    };
    if let Some(op) = op {
        ctx.set_attr("gen_ai.operation.name", op);
    }
}

fn provider(ctx: &mut ExtractorContext) {
    if let Some(v) = ctx.bag.attrs.take("gen_ai.system") {
        ctx.record_rule("genai.provider");
        ctx.set_attr("gen_ai.provider.name", v);
    }
}

fn agent_name(ctx: &mut ExtractorContext) {
    if let Some((_, v)) =
        ctx.bag
            .attrs
            .take_any(&["gen_ai.agent.name", "gen_ai.agent", "agent.name"])
    {
        ctx.record_rule("genai.agent_name");
        ctx.set_attr("gen_ai.agent.name", v);
    }
}

fn model(ctx: &mut ExtractorContext) {
    let Some(v) = ctx.bag.attrs.take("llm.model_name") else {
        return;
    };
    let neither_present = !ctx.bag.attrs.has("gen_ai.request.model")
        && !ctx.out_has("gen_ai.request.model")
        && !ctx.bag.attrs.has("gen_ai.response.model")
        && !ctx.out_has("gen_ai.response.model");
    if !neither_present {
        return;
    }
    ctx.record_rule("genai.model");
    ctx.set_attr("gen_ai.request.model", v.clone());
    ctx.set_attr("gen_ai.response.model", v);
}

fn input_output_messages(ctx: &mut ExtractorContext) {
    let input_present = ctx.bag.attrs.has("gen_ai.input.messages") || ctx.out_has("gen_ai.input.messages");
    let messages: Option<Vec<JsonValue>> = if input_present {
        ctx.bag
            .attrs
            .get("gen_ai.input.messages")
            .and_then(|v| v.as_str())
            .map(crate::extract::helpers::safe_json_parse)
            .and_then(|v| v.as_array().cloned())
    } else if let Some((source_key, value)) =
        ctx.bag.attrs.take_any(&["gen_ai.prompt", "llm.input_messages"])
    {
        let raw = match value.as_str() {
            Some(s) => crate::extract::helpers::safe_json_parse(s),
            None => value.to_json(),
        };
        let normalized = normalize_to_messages(&raw, "user");
        ctx.record_rule("genai.input_messages");
        ctx.record_value_type(&source_key, "chat_messages");
        Some(normalized)
    } else {
        None
    };

    let Some(messages) = messages else { return };
    if let Some(instruction) = extract_system_instruction_from_messages(&messages) {
        ctx.set_attr("gen_ai.request.system_instruction", instruction);
    }
    let stripped: Vec<JsonValue> = messages
        .into_iter()
        .filter(|m| m.get("role").and_then(|r| r.as_str()) != Some("system"))
        .collect();
    ctx.set_attr("gen_ai.input.messages", JsonValue::Array(stripped));

    if !ctx.bag.attrs.has("gen_ai.output.messages") && !ctx.out_has("gen_ai.output.messages") {
        if let Some((source_key, value)) = ctx
            .bag
            .attrs
            .take_any(&["gen_ai.completion", "llm.output_messages"])
        {
            let raw = match value.as_str() {
                Some(s) => crate::extract::helpers::safe_json_parse(s),
                None => value.to_json(),
            };
            let normalized = normalize_to_messages(&raw, "assistant");
            ctx.record_value_type(&source_key, "chat_messages");
            ctx.set_attr("gen_ai.output.messages", JsonValue::Array(normalized));
        }
    }
}

fn usage_tokens(ctx: &mut ExtractorContext) {
    if let Some((_, v)) = ctx
        .bag
        .attrs
        .take_any(&["gen_ai.usage.input_tokens", "gen_ai.usage.prompt_tokens"])
    {
        ctx.set_attr("gen_ai.usage.input_tokens", v);
    }
    if let Some((_, v)) = ctx.bag.attrs.take_any(&[
        "gen_ai.usage.output_tokens",
        "gen_ai.usage.completion_tokens",
    ]) {
        ctx.set_attr("gen_ai.usage.output_tokens", v);
    }
}

fn numeric_coercion(ctx: &mut ExtractorContext) {
    for key in NUMERIC_COERCION_KEYS {
        let Some(v) = ctx.bag.attrs.get(*key) else {
            continue;
        };
        if v.as_str().is_none() {
            continue;
        }
        let json = v.to_json();
        if let Some(n) = as_number(&json) {
            ctx.bag.attrs.take(key);
            if n.fract() == 0.0 {
                ctx.set_attr(*key, AttributeValue::Int(n as i64));
            } else {
                ctx.set_attr(*key, AttributeValue::Double(n));
            }
        }
    }
}

fn invocation_parameters(ctx: &mut ExtractorContext) {
    let Some(v) = ctx.bag.attrs.take("llm.invocation_parameters") else {
        return;
    };
    let parsed: JsonValue = match v.as_str() {
        Some(s) => crate::extract::helpers::safe_json_parse(s),
        None => v.to_json(),
    };
    let JsonValue::Object(map) = parsed else {
        return;
    };
    ctx.record_rule("genai.invocation_parameters");

    const FIELD_MAP: &[(&str, &str)] = &[
        ("temperature", "gen_ai.request.temperature"),
        ("max_tokens", "gen_ai.request.max_tokens"),
        ("top_p", "gen_ai.request.top_p"),
        ("frequency_penalty", "gen_ai.request.frequency_penalty"),
        ("presence_penalty", "gen_ai.request.presence_penalty"),
        ("seed", "gen_ai.request.seed"),
    ];
    for (src, dst) in FIELD_MAP {
        if let Some(val) = map.get(*src) {
            ctx.set_attr_if_absent(*dst, val.clone());
        }
    }
    if let Some(stop) = map.get("stop") {
        if let Some(arr) = coerce_to_string_array(stop) {
            ctx.set_attr_if_absent("gen_ai.request.stop_sequences", arr);
        }
    }
    if let Some(n) = map.get("n").and_then(|v| v.as_i64()) {
        if n != 1 {
            ctx.set_attr_if_absent("gen_ai.request.n", AttributeValue::Int(n));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::attribute::AttributeMap;
    use crate::model::event::EventBag;
    use crate::model::span::{SpanDataBag, SpanView};
    use serde_json::json;

    fn run(attrs: &[(&str, AttributeValue)]) -> AttributeMap {
        let mut map = AttributeMap::new();
        for (k, v) in attrs {
            map.set(*k, v.clone());
        }
        let mut bag = SpanDataBag {
            attrs: map,
            events: EventBag::new(),
        };
        let mut span = SpanView::default();
        let extractor = GenAiExtractor;
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
        merged
    }

    #[test]
    fn model_sets_request_and_response_when_both_absent() {
        let merged = run(&[("llm.model_name", AttributeValue::String("gpt-4".into()))]);
        assert_eq!(
            merged.get("gen_ai.request.model"),
            Some(&AttributeValue::String("gpt-4".into()))
        );
        assert_eq!(
            merged.get("gen_ai.response.model"),
            Some(&AttributeValue::String("gpt-4".into()))
        );
    }

    #[test]
    fn model_leaves_response_model_untouched_when_request_model_already_present() {
        let merged = run(&[
            ("llm.model_name", AttributeValue::String("gpt-4".into())),
            ("gen_ai.request.model", AttributeValue::String("gpt-3.5".into())),
        ]);
        assert_eq!(
            merged.get("gen_ai.request.model"),
            Some(&AttributeValue::String("gpt-3.5".into()))
        );
        assert_eq!(merged.get("gen_ai.response.model"), None);
    }

    #[test]
    fn input_messages_strip_system_and_extract_instruction() {
        let prompt = json!([
            {"role": "system", "content": "be nice"},
            {"role": "user", "content": "hi"}
        ]);
        let merged = run(&[("gen_ai.prompt", AttributeValue::Json(prompt.to_string()))]);
        assert_eq!(
            merged.get("gen_ai.request.system_instruction"),
            Some(&AttributeValue::String("be nice".into()))
        );
        match merged.get("gen_ai.input.messages") {
            Some(AttributeValue::Json(s)) => {
                let v: JsonValue = serde_json::from_str(s).unwrap();
                assert_eq!(v, json!([{"role": "user", "content": "hi"}]));
            }
            other => panic!("expected json, got {other:?}"),
        }
    }

    #[test]
    fn numeric_coercion_converts_string_temperature() {
        let merged = run(&[(
            "gen_ai.request.temperature",
            AttributeValue::String("0.7".into()),
        )]);
        assert_eq!(
            merged.get("gen_ai.request.temperature"),
            Some(&AttributeValue::Double(0.7))
        );
    }
}
