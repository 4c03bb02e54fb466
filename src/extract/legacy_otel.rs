//! Legacy/ad-hoc OTel conventions (§4.8): bare `type`/`span.kind`,
//! `llm.request.type`, `input.value`/`output.value`, `ai.toolCall.args`, and
//! error-field consolidation shared with `FallbackExtractor`.

use crate::extract::{Extractor, ExtractorContext};

pub struct LegacyOtelExtractor;

impl Extractor for LegacyOtelExtractor {
    fn id(&self) -> &'static str {
        "legacy_otel"
    }

    fn apply(&self, ctx: &mut ExtractorContext) {
        span_type(ctx);
        io_values(ctx);
        tool_call_args(ctx);
        consolidate_error(ctx);
    }
}

fn span_type(ctx: &mut ExtractorContext) {
    if ctx.bag.attrs.has("langwatch.span.type") || ctx.out_has("langwatch.span.type") {
        return;
    }
    if let Some(v) = ctx.bag.attrs.take("type") {
        if let Some(s) = v.as_str() {
            ctx.set_attr("langwatch.span.type", s.to_string());
            return;
        }
    }
    if let Some(v) = ctx.bag.attrs.get("span.kind").and_then(|v| v.as_str()) {
        if v.contains("SERVER") {
            ctx.set_attr("langwatch.span.type", "server");
            return;
        }
    }
    if ctx.bag.attrs.get("llm.request.type").and_then(|v| v.as_str()) == Some("chat") {
        ctx.set_attr("langwatch.span.type", "llm");
    }
}

fn io_values(ctx: &mut ExtractorContext) {
    if let Some(v) = ctx.bag.attrs.take("input.value") {
        ctx.set_attr_if_absent("langwatch.input", v);
    }
    if let Some(v) = ctx.bag.attrs.take("output.value") {
        ctx.set_attr_if_absent("langwatch.output", v);
    }
}

fn tool_call_args(ctx: &mut ExtractorContext) {
    let Some(v) = ctx.bag.attrs.take("ai.toolCall.args") else {
        return;
    };
    let json = match v.as_str() {
        Some(s) => crate::extract::helpers::safe_json_parse(s),
        None => v.to_json(),
    };
    ctx.set_attr_if_absent("langwatch.input", json);
}

/// Priority: `span.error.message` > `exception.message` > `status.message`.
fn consolidate_error(ctx: &mut ExtractorContext) {
    let message = ctx
        .bag
        .attrs
        .take("span.error.message")
        .or_else(|| ctx.bag.attrs.take("exception.message"))
        .or_else(|| ctx.bag.attrs.take("status.message"));
    let Some(message) = message else { return };
    let error_type = ctx
        .bag
        .attrs
        .take("span.error.type")
        .or_else(|| ctx.bag.attrs.take("exception.type"));
    ctx.record_rule("legacy_otel.error_consolidation");
    ctx.set_attr("error.message", message);
    if let Some(t) = error_type {
        ctx.set_attr("error.type", t);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::attribute::{AttributeMap, AttributeValue};
    use crate::model::event::EventBag;
    use crate::model::span::{SpanDataBag, SpanView};

    #[test]
    fn server_kind_maps_to_server_type() {
        let mut attrs = AttributeMap::new();
        attrs.set("span.kind", AttributeValue::String("SERVER".into()));
        let mut bag = SpanDataBag {
            attrs,
            events: EventBag::new(),
        };
        let mut span = SpanView::default();
        let extractor = LegacyOtelExtractor;
        let mut ctx = ExtractorContext::new(&mut bag, &mut span);
        extractor.apply(&mut ctx);
        assert_eq!(
            ctx.out_get("langwatch.span.type"),
            Some(&AttributeValue::String("server".into()))
        );
    }

    #[test]
    fn exception_fields_consolidate_into_error_type() {
        let mut attrs = AttributeMap::new();
        attrs.set(
            "exception.message",
            AttributeValue::String("boom".into()),
        );
        attrs.set(
            "exception.type",
            AttributeValue::String("ValueError".into()),
        );
        let mut bag = SpanDataBag {
            attrs,
            events: EventBag::new(),
        };
        let mut span = SpanView::default();
        let extractor = LegacyOtelExtractor;
        let mut ctx = ExtractorContext::new(&mut bag, &mut span);
        extractor.apply(&mut ctx);
        assert_eq!(
            ctx.out_get("error.type"),
            Some(&AttributeValue::String("ValueError".into()))
        );
    }
}
