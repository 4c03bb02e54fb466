//! Haystack RAG conventions (§4.8): scope
//! `openinference.instrumentation.haystack`, `retrieval.documents` array of
//! `{document: {content, id?}}` hoisted into `langwatch.rag.contexts`.

use crate::extract::{Extractor, ExtractorContext};
use serde_json::Value as JsonValue;

pub struct HaystackExtractor;

impl Extractor for HaystackExtractor {
    fn id(&self) -> &'static str {
        "haystack"
    }

    fn apply(&self, ctx: &mut ExtractorContext) {
        if ctx.span.instrumentation_scope.name != "openinference.instrumentation.haystack" {
            return;
        }
        ctx.record_rule("haystack.detected");
        retrieval_documents(ctx);
    }
}

fn retrieval_documents(ctx: &mut ExtractorContext) {
    let Some(v) = ctx.bag.attrs.take("retrieval.documents") else {
        return;
    };
    let json = match v.as_str() {
        Some(s) => crate::extract::helpers::safe_json_parse(s),
        None => v.to_json(),
    };
    let JsonValue::Array(items) = json else { return };

    let contexts: Vec<JsonValue> = items
        .iter()
        .filter_map(|item| {
            let doc = item.get("document")?;
            let content = doc.get("content")?.as_str()?.to_string();
            let mut ctx_obj = serde_json::Map::new();
            if let Some(id) = doc.get("id").and_then(|v| v.as_str()) {
                ctx_obj.insert("document_id".into(), JsonValue::String(id.to_string()));
            }
            ctx_obj.insert("content".into(), JsonValue::String(content));
            Some(JsonValue::Object(ctx_obj))
        })
        .collect();

    if contexts.is_empty() {
        return;
    }
    ctx.record_rule("haystack.rag_contexts");
    ctx.set_attr("langwatch.rag.contexts", JsonValue::Array(contexts));
    ctx.set_attr_if_absent("langwatch.span.type", "rag");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::attribute::{AttributeMap, AttributeValue};
    use crate::model::event::EventBag;
    use crate::model::span::{InstrumentationScope, SpanDataBag, SpanView};
    use serde_json::json;

    #[test]
    fn s5_haystack_rag_contexts() {
        let documents = json!([
            {"document": {"id": "d1", "content": "Paris is the capital of France."}},
            {"document": {"content": "no id doc"}}
        ]);
        let mut attrs = AttributeMap::new();
        attrs.set(
            "retrieval.documents",
            AttributeValue::Json(documents.to_string()),
        );
        let mut bag = SpanDataBag {
            attrs,
            events: EventBag::new(),
        };
        let mut span = SpanView {
            instrumentation_scope: InstrumentationScope {
                name: "openinference.instrumentation.haystack".to_string(),
                version: None,
            },
            ..Default::default()
        };
        let extractor = HaystackExtractor;
        let mut ctx = ExtractorContext::new(&mut bag, &mut span);
        extractor.apply(&mut ctx);

        assert_eq!(
            ctx.out_get("langwatch.span.type"),
            Some(&AttributeValue::String("rag".into()))
        );
        match ctx.out_get("langwatch.rag.contexts") {
            Some(AttributeValue::Json(s)) => {
                let v: serde_json::Value = serde_json::from_str(s).unwrap();
                assert_eq!(
                    v,
                    json!([
                        {"document_id": "d1", "content": "Paris is the capital of France."},
                        {"content": "no id doc"}
                    ])
                );
            }
            other => panic!("expected json, got {other:?}"),
        }
    }
}
