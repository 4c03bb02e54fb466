//! Last-resort detector (§4.9): runs after every vendor-specific extractor.
//! Classifies `langwatch.span.type` only if still unset, using signal
//! strength tool > agent > llm, then re-applies the same error-field
//! consolidation `LegacyOtelExtractor` uses for spans none of the named
//! vendors touched.

use crate::extract::{Extractor, ExtractorContext};

pub struct FallbackExtractor;

impl Extractor for FallbackExtractor {
    fn id(&self) -> &'static str {
        "fallback"
    }

    fn apply(&self, ctx: &mut ExtractorContext) {
        classify_span_type(ctx);
        consolidate_error(ctx);
    }
}

fn classify_span_type(ctx: &mut ExtractorContext) {
    if ctx.bag.attrs.has("langwatch.span.type") || ctx.out_has("langwatch.span.type") {
        return;
    }

    let is_tool = ctx
        .bag
        .attrs
        .get("operation.name")
        .and_then(|v| v.as_str())
        == Some("ai.toolCall")
        || ctx.bag.attrs.has("ai.toolCall.name")
        || ctx
            .bag
            .attrs
            .get("gen_ai.operation.name")
            .and_then(|v| v.as_str())
            == Some("tool")
        || ctx.out_get("gen_ai.operation.name").and_then(|v| v.as_str()) == Some("tool");
    if is_tool {
        ctx.record_rule("fallback.tool");
        ctx.set_attr("langwatch.span.type", "tool");
        return;
    }

    let is_agent = ctx.bag.attrs.has("gen_ai.agent.name")
        || ctx.bag.attrs.has("agent.name")
        || ctx.bag.attrs.has("gen_ai.agent")
        || ctx.out_has("gen_ai.agent.name");
    if is_agent {
        ctx.record_rule("fallback.agent");
        ctx.set_attr("langwatch.span.type", "agent");
        return;
    }

    let has_llm_signal = ctx.bag.attrs.has("gen_ai.system")
        || ctx.bag.attrs.has("gen_ai.request.model")
        || ctx.bag.attrs.has("llm.model_name")
        || ctx.out_has("gen_ai.request.model");
    if has_llm_signal {
        ctx.record_rule("fallback.llm");
        ctx.set_attr("langwatch.span.type", "llm");
    }
}

/// Same priority as `LegacyOtelExtractor::consolidate_error`, for spans that
/// never went through it (e.g. already matched a vendor extractor earlier
/// but still carry a raw `status.message`).
fn consolidate_error(ctx: &mut ExtractorContext) {
    if ctx.out_has("error.message") {
        return;
    }
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
    ctx.record_rule("fallback.error_consolidation");
    ctx.set_attr("error.message", message);
    if let Some(t) = error_type {
        ctx.set_attr("error.type", t);
    }
}
