//! OpenInference semantic conventions (§4.8): `openinference.span.kind`,
//! `user.id`, `session.id`, `tag.tags`.

use serde_json::Value as JsonValue;

use crate::extract::{Extractor, ExtractorContext};

pub struct OpenInferenceExtractor;

impl Extractor for OpenInferenceExtractor {
    fn id(&self) -> &'static str {
        "openinference"
    }

    fn apply(&self, ctx: &mut ExtractorContext) {
        span_kind(ctx);
        user_id(ctx);
        session_id(ctx);
        tags(ctx);
    }
}

fn span_kind(ctx: &mut ExtractorContext) {
    let Some(v) = ctx.bag.attrs.take("openinference.span.kind") else {
        return;
    };
    let mapped = match v.as_str() {
        Some("LLM") => "llm",
        Some("TOOL") => "tool",
        Some("AGENT") => "agent",
        Some("RETRIEVER") => "rag",
        Some("CHAIN") | Some("EMBEDDING") | Some("RERANKER") | Some("GUARDRAIL") => "span",
        _ => return,
    };
    ctx.record_rule("openinference.span_kind");
    ctx.set_attr("langwatch.span.type", mapped);
}

fn user_id(ctx: &mut ExtractorContext) {
    if let Some(v) = ctx.bag.attrs.take("user.id") {
        ctx.record_rule("openinference.user_id");
        ctx.set_attr_if_absent("langwatch.user.id", v);
    }
}

fn session_id(ctx: &mut ExtractorContext) {
    if let Some(v) = ctx.bag.attrs.take("session.id") {
        ctx.record_rule("openinference.session_id");
        ctx.set_attr_if_absent("gen_ai.conversation.id", v);
    }
}

fn tags(ctx: &mut ExtractorContext) {
    let Some(v) = ctx.bag.attrs.take("tag.tags") else {
        return;
    };
    ctx.record_rule("openinference.tags");
    let json = match v.as_str() {
        Some(s) => crate::extract::helpers::safe_json_parse(s),
        None => v.to_json(),
    };
    match json {
        JsonValue::Array(_) => ctx.set_attr_if_absent("langwatch.labels", json),
        other => ctx.set_attr_if_absent("langwatch.labels", other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::attribute::{AttributeMap, AttributeValue};
    use crate::model::event::EventBag;
    use crate::model::span::{SpanDataBag, SpanView};

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
        let extractor = OpenInferenceExtractor;
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
    fn maps_llm_kind_and_hoists_ids() {
        let merged = run(&[
            (
                "openinference.span.kind",
                AttributeValue::String("LLM".into()),
            ),
            ("user.id", AttributeValue::String("u1".into())),
            ("session.id", AttributeValue::String("s1".into())),
        ]);
        assert_eq!(
            merged.get("langwatch.span.type"),
            Some(&AttributeValue::String("llm".into()))
        );
        assert_eq!(
            merged.get("langwatch.user.id"),
            Some(&AttributeValue::String("u1".into()))
        );
        assert_eq!(
            merged.get("gen_ai.conversation.id"),
            Some(&AttributeValue::String("s1".into()))
        );
    }
}
