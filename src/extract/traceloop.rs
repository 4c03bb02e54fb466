//! Traceloop/OpenLLMetry conventions (§4.8): `traceloop.span.kind`,
//! `traceloop.entity.input`/`traceloop.entity.output`.

use crate::extract::helpers::normalize_to_messages;
use crate::extract::{Extractor, ExtractorContext};

pub struct TraceloopExtractor;

impl Extractor for TraceloopExtractor {
    fn id(&self) -> &'static str {
        "traceloop"
    }

    fn apply(&self, ctx: &mut ExtractorContext) {
        span_kind(ctx);
        entity_io(ctx);
    }
}

fn span_kind(ctx: &mut ExtractorContext) {
    let Some(v) = ctx.bag.attrs.take("traceloop.span.kind") else {
        return;
    };
    let mapped = match v.as_str() {
        Some("workflow") => "agent",
        Some("task") => "component",
        Some("tool") => "tool",
        Some("agent") => "agent",
        _ => "llm",
    };
    ctx.record_rule("traceloop.span_kind");
    ctx.set_attr("langwatch.span.type", mapped);
}

fn entity_io(ctx: &mut ExtractorContext) {
    if let Some(v) = ctx.bag.attrs.take("traceloop.entity.input") {
        ctx.record_rule("traceloop.entity_input");
        let raw = match v.as_str() {
            Some(s) => crate::extract::helpers::safe_json_parse(s),
            None => v.to_json(),
        };
        let messages = normalize_to_messages(&raw, "user");
        ctx.set_attr("gen_ai.input.messages", serde_json::Value::Array(messages));
    }
    if let Some(v) = ctx.bag.attrs.take("traceloop.entity.output") {
        ctx.record_rule("traceloop.entity_output");
        let raw = match v.as_str() {
            Some(s) => crate::extract::helpers::safe_json_parse(s),
            None => v.to_json(),
        };
        let messages = normalize_to_messages(&raw, "assistant");
        ctx.set_attr("gen_ai.output.messages", serde_json::Value::Array(messages));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::attribute::{AttributeMap, AttributeValue};
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
        let extractor = TraceloopExtractor;
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
    fn entity_input_normalizes_to_messages() {
        let merged = run(&[(
            "traceloop.entity.input",
            AttributeValue::Json(json!("hello").to_string()),
        )]);
        assert_eq!(
            merged.get("gen_ai.input.messages"),
            Some(&AttributeValue::Json(
                json!([{"role": "user", "content": "hello"}]).to_string()
            ))
        );
    }
}
