//! LangWatch SDK-native attributes and the `metadata` blob (§4.5). Runs
//! first in registration order — SDK-native attributes are the most
//! authoritative source for canonical keys.

use serde_json::Value as JsonValue;

use crate::extract::helpers::normalize_to_messages;
use crate::extract::{ALLOWED_SPAN_TYPES, Extractor, ExtractorContext};
use crate::model::attribute::AttributeValue;

const SPAN_TYPE: &str = "langwatch.span.type";

pub struct LangWatchExtractor;

impl Extractor for LangWatchExtractor {
    fn id(&self) -> &'static str {
        "langwatch"
    }

    fn apply(&self, ctx: &mut ExtractorContext) {
        span_type_precedence(ctx);
        thread_id(ctx);
        user_and_customer_id(ctx);
        rag_contexts_and_labels(ctx);
        metadata_blob(ctx);
        structured_wrapper(ctx, "langwatch.input", "gen_ai.input.messages", true);
        structured_wrapper(ctx, "langwatch.output", "gen_ai.output.messages", false);
        metrics_blob(ctx);
    }
}

fn span_type_precedence(ctx: &mut ExtractorContext) {
    if let Some(v) = ctx.bag.attrs.get(SPAN_TYPE).and_then(|v| v.as_str()) {
        if ALLOWED_SPAN_TYPES.contains(&v) {
            let v = v.to_string();
            ctx.record_rule("langwatch.span_type");
            ctx.set_attr(SPAN_TYPE, v);
        }
    }
}

fn thread_id(ctx: &mut ExtractorContext) {
    if let Some((_, value)) = ctx.bag.attrs.take_any(&[
        "langwatch.thread.id",
        "langwatch.thread_id",
        "thread_id",
        "langwatch.langgraph.thread_id",
    ]) {
        if let Some(s) = value.as_str() {
            if !s.is_empty() {
                ctx.record_rule("langwatch.thread_id");
                ctx.set_attr("gen_ai.conversation.id", s.to_string());
            }
        }
    }
}

fn user_and_customer_id(ctx: &mut ExtractorContext) {
    if let Some((_, value)) =
        ctx.bag
            .attrs
            .take_any(&["langwatch.user.id", "langwatch.user_id", "user_id"])
    {
        ctx.record_rule("langwatch.user_id");
        ctx.set_attr("langwatch.user.id", value);
    }
    if let Some((_, value)) = ctx.bag.attrs.take_any(&[
        "langwatch.customer.id",
        "langwatch.customer_id",
        "customer_id",
    ]) {
        ctx.record_rule("langwatch.customer_id");
        ctx.set_attr("langwatch.customer.id", value);
    }
}

fn rag_contexts_and_labels(ctx: &mut ExtractorContext) {
    if let Some((_, value)) = ctx
        .bag
        .attrs
        .take_any(&["langwatch.rag.contexts", "rag.contexts", "rag_contexts"])
    {
        ctx.record_rule("langwatch.rag_contexts");
        ctx.set_attr("langwatch.rag.contexts", value);
    }
    if let Some((_, value)) = ctx.bag.attrs.take_any(&["langwatch.labels", "labels"]) {
        ctx.record_rule("langwatch.labels");
        ctx.set_attr("langwatch.labels", value);
    }
}

fn metadata_blob(ctx: &mut ExtractorContext) {
    let Some((_, value)) = ctx.bag.attrs.take_any(&["metadata", "langwatch.metadata"]) else {
        return;
    };
    let parsed: JsonValue = match value.as_str() {
        Some(s) => crate::extract::helpers::safe_json_parse(s),
        None => value.to_json(),
    };

    let JsonValue::Object(map) = &parsed else {
        ctx.record_rule("langwatch.metadata_raw");
        ctx.set_attr("metadata._raw", parsed);
        return;
    };

    ctx.record_rule("langwatch.metadata_hoist");
    if let Some(user_id) = map.get("user_id").or_else(|| map.get("userId")) {
        ctx.set_attr_if_absent("langwatch.user.id", user_id.clone());
    }
    if let Some(thread_id) = map.get("thread_id").or_else(|| map.get("threadId")) {
        ctx.set_attr_if_absent("gen_ai.conversation.id", thread_id.clone());
    }
    if let Some(customer_id) = map.get("customer_id").or_else(|| map.get("customerId")) {
        ctx.set_attr_if_absent("langwatch.customer.id", customer_id.clone());
    }
    if let Some(labels @ JsonValue::Array(_)) = map.get("labels") {
        ctx.set_attr_if_absent("langwatch.labels", labels.clone());
    }

    const HOISTED: &[&str] = &[
        "user_id", "userId", "thread_id", "threadId", "customer_id", "customerId", "labels",
    ];
    for (k, v) in map {
        if HOISTED.contains(&k.as_str()) {
            continue;
        }
        let key = format!("metadata.{k}");
        match v {
            JsonValue::String(_) | JsonValue::Bool(_) | JsonValue::Number(_) => {
                ctx.set_attr(key, v.clone());
            }
            JsonValue::Null => {}
            other => ctx.set_attr(key, other.to_string()),
        }
    }
}

/// Handles both `langwatch.input` and `langwatch.output`'s structured
/// wrapper form `{type, value}`, falling back to flattening single-element
/// arrays for pre-wrapper payloads.
fn structured_wrapper(ctx: &mut ExtractorContext, key: &str, messages_key: &str, is_input: bool) {
    let Some(value) = ctx.bag.attrs.take(key) else {
        return;
    };
    let parsed: JsonValue = match value.as_str() {
        Some(s) => crate::extract::helpers::safe_json_parse(s),
        None => value.to_json(),
    };

    if let JsonValue::Object(map) = &parsed {
        if let (Some(JsonValue::String(type_)), Some(inner)) = (map.get("type"), map.get("value"))
        {
            ctx.record_rule("langwatch.structured_wrapper");
            ctx.record_value_type(key, type_);

            if type_ == "chat_messages" {
                if let JsonValue::Array(items) = inner {
                    let messages = normalize_to_messages(&JsonValue::Array(items.clone()), "user");
                    if let Some(instruction) =
                        crate::extract::helpers::extract_system_instruction_from_messages(
                            &messages,
                        )
                    {
                        ctx.set_attr("gen_ai.request.system_instruction", instruction);
                    }
                    let stripped: Vec<JsonValue> = messages
                        .into_iter()
                        .filter(|m| m.get("role").and_then(|r| r.as_str()) != Some("system"))
                        .collect();
                    ctx.set_attr(messages_key, JsonValue::Array(stripped));
                    if is_input {
                        ctx.set_attr(SPAN_TYPE, "llm");
                    }
                }
                return;
            }

            if type_ == "json" && !is_input {
                if let JsonValue::Array(items) = inner {
                    let joined = items
                        .iter()
                        .map(|item| match item {
                            JsonValue::String(s) => s.clone(),
                            other => other.to_string(),
                        })
                        .collect::<Vec<_>>()
                        .join("\n");
                    ctx.set_attr(
                        messages_key,
                        serde_json::json!([{"role": "assistant", "content": joined}]),
                    );
                }
                return;
            }

            // text | raw | list: unwrap without coercion.
            ctx.set_attr(key, inner.clone());
            return;
        }
    }

    // Not a structured wrapper: flatten single-element arrays for
    // backward compatibility, then pass through.
    let flattened = match &parsed {
        JsonValue::Array(items) if items.len() == 1 => items[0].clone(),
        other => other.clone(),
    };
    ctx.set_attr(key, flattened);
}

fn metrics_blob(ctx: &mut ExtractorContext) {
    let Some(value) = ctx.bag.attrs.take("langwatch.metrics") else {
        return;
    };
    let parsed: JsonValue = match value.as_str() {
        Some(s) => crate::extract::helpers::safe_json_parse(s),
        None => value.to_json(),
    };
    let JsonValue::Object(map) = &parsed else {
        return;
    };
    if map.get("type").and_then(|v| v.as_str()) != Some("json") {
        return;
    }
    let Some(JsonValue::Object(inner)) = map.get("value") else {
        return;
    };

    ctx.record_rule("langwatch.metrics");
    if let Some(n) = inner.get("promptTokens").and_then(|v| v.as_i64()) {
        if n > 0 {
            ctx.set_attr_if_absent("gen_ai.usage.input_tokens", AttributeValue::Int(n));
        }
    }
    if let Some(n) = inner.get("completionTokens").and_then(|v| v.as_i64()) {
        if n > 0 {
            ctx.set_attr_if_absent("gen_ai.usage.output_tokens", AttributeValue::Int(n));
        }
    }
    if let Some(cost) = inner.get("cost").and_then(|v| v.as_f64()) {
        if cost > 0.0 {
            ctx.set_attr_if_absent("langwatch.span.cost", AttributeValue::Double(cost));
        }
    }
    if inner.get("tokensEstimated").and_then(|v| v.as_bool()) == Some(true) {
        ctx.set_attr("langwatch.tokens.estimated", true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::attribute::AttributeMap;
    use crate::model::event::EventBag;
    use crate::model::span::{SpanDataBag, SpanView};
    use serde_json::json;

    fn run(attrs: &[(&str, AttributeValue)]) -> crate::extract::CanonicalizeResult {
        let mut map = AttributeMap::new();
        for (k, v) in attrs {
            map.set(*k, v.clone());
        }
        let mut bag = SpanDataBag {
            attrs: map,
            events: EventBag::new(),
        };
        let mut span = SpanView::default();
        let extractor = LangWatchExtractor;
        let mut ctx = ExtractorContext::new(&mut bag, &mut span);
        extractor.apply(&mut ctx);
        let applied_rules = ctx.rules().to_vec();
        let remaining: Vec<(String, AttributeValue)> = ctx
            .out_remaining()
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        let mut merged = ctx.bag.attrs.clone();
        for (k, v) in remaining {
            merged.set(k, v);
        }
        crate::extract::CanonicalizeResult {
            attributes: merged,
            events: Vec::new(),
            applied_rules,
        }
    }

    #[test]
    fn s1_langwatch_dspy_chat_messages() {
        let input = json!({
            "type": "chat_messages",
            "value": [
                {"role": "system", "content": "You are helpful."},
                {"role": "user", "content": "Hi"}
            ]
        });
        let result = run(&[("langwatch.input", AttributeValue::Json(input.to_string()))]);
        assert_eq!(
            result.attributes.get("gen_ai.input.messages"),
            Some(&AttributeValue::Json(
                json!([{"role": "user", "content": "Hi"}]).to_string()
            ))
        );
        assert_eq!(
            result.attributes.get("gen_ai.request.system_instruction"),
            Some(&AttributeValue::String("You are helpful.".to_string()))
        );
        assert_eq!(
            result.attributes.get("langwatch.span.type"),
            Some(&AttributeValue::String("llm".to_string()))
        );
        match result.attributes.get("langwatch.reserved.value_types") {
            Some(AttributeValue::Array(items)) => {
                assert!(items.contains(&AttributeValue::String(
                    "langwatch.input=chat_messages".to_string()
                )));
            }
            other => panic!("expected array, got {other:?}"),
        }
    }

    #[test]
    fn s2_metadata_hoist() {
        let metadata = json!({
            "user_id": "u1",
            "thread_id": "t1",
            "customer_id": "c1",
            "labels": ["a", "b"],
            "env": "prod"
        });
        let result = run(&[("metadata", AttributeValue::Json(metadata.to_string()))]);
        assert_eq!(
            result.attributes.get("langwatch.user.id"),
            Some(&AttributeValue::String("u1".to_string()))
        );
        assert_eq!(
            result.attributes.get("gen_ai.conversation.id"),
            Some(&AttributeValue::String("t1".to_string()))
        );
        assert_eq!(
            result.attributes.get("langwatch.customer.id"),
            Some(&AttributeValue::String("c1".to_string()))
        );
        assert_eq!(
            result.attributes.get("metadata.env"),
            Some(&AttributeValue::String("prod".to_string()))
        );
        assert!(!result.attributes.has("metadata"));
    }
}
