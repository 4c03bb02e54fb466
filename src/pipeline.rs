//! `SpanNormalizationPipeline` (§4.10): decode → canonicalize → RAG id
//! enrichment → `NormalizedSpan`.

use opentelemetry_proto::tonic::common::v1::InstrumentationScope as OtlpScope;
use opentelemetry_proto::tonic::resource::v1::Resource;
use opentelemetry_proto::tonic::trace::v1::Span as OtlpSpan;
use serde_json::Value as JsonValue;

use crate::core::error::{CoreError, CoreResult};
use crate::extract::CanonicalizeService;
use crate::model::attribute::AttributeValue;
use crate::model::span::NormalizedSpan;
use crate::otlp_decode::decode_span;

pub struct SpanNormalizationPipeline {
    canonicalizer: CanonicalizeService,
}

impl Default for SpanNormalizationPipeline {
    fn default() -> Self {
        Self::new(CanonicalizeService::with_default_extractors())
    }
}

impl SpanNormalizationPipeline {
    pub fn new(canonicalizer: CanonicalizeService) -> Self {
        Self { canonicalizer }
    }

    pub fn normalize(
        &self,
        tenant_id: &str,
        otlp_span: &OtlpSpan,
        otlp_resource: Option<&Resource>,
        otlp_scope: Option<&OtlpScope>,
    ) -> CoreResult<NormalizedSpan> {
        if tenant_id.is_empty() {
            return Err(CoreError::validation("tenant id must not be empty"));
        }

        let mut decoded = decode_span(otlp_resource, otlp_scope, otlp_span);
        let record_id = compute_record_id(
            tenant_id,
            &decoded.trace_id,
            &decoded.span_id,
            decoded.start_time_unix_ms,
        );

        let result = self
            .canonicalizer
            .canonicalize(&mut decoded.bag, &mut decoded.view);
        let mut attributes = result.attributes;
        enrich_rag_context_ids(&mut attributes);

        Ok(NormalizedSpan {
            tenant_id: tenant_id.to_string(),
            record_id,
            trace_id: decoded.trace_id,
            span_id: decoded.span_id,
            parent_span_id: decoded.parent_span_id,
            parent_trace_id: None,
            parent_is_remote: false,
            sampled: true,
            start_time_unix_ms: decoded.start_time_unix_ms,
            end_time_unix_ms: decoded.end_time_unix_ms,
            duration_ms: decoded.end_time_unix_ms - decoded.start_time_unix_ms,
            name: decoded.view.name,
            kind: decoded.view.kind,
            instrumentation_scope: decoded.view.instrumentation_scope,
            status_code: decoded.view.status_code,
            status_message: decoded.view.status_message,
            resource_attributes: decoded.resource_attributes,
            span_attributes: attributes,
            events: result.events,
            links: decoded.links,
            dropped_attributes_count: decoded.dropped_attributes_count,
            dropped_events_count: decoded.dropped_events_count,
            dropped_links_count: decoded.dropped_links_count,
        })
    }
}

/// Deterministic hash of the span's coordinates; MD5 matches the teacher's
/// own content-hashing idiom (see `data/cache/key.rs`) rather than reaching
/// for a dedicated identity hash.
fn compute_record_id(tenant_id: &str, trace_id: &str, span_id: &str, start_time_unix_ms: i64) -> String {
    let input = format!("{tenant_id}\u{0}{trace_id}\u{0}{span_id}\u{0}{start_time_unix_ms}");
    format!("{:x}", md5::compute(input))
}

fn enrich_rag_context_ids(attributes: &mut crate::model::attribute::AttributeMap) {
    let Some(v) = attributes.get("langwatch.rag.contexts") else {
        return;
    };
    let json: JsonValue = match v.as_str() {
        Some(s) => crate::extract::helpers::safe_json_parse(s),
        None => v.to_json(),
    };
    let JsonValue::Array(items) = &json else { return };
    if items.is_empty() {
        return;
    }
    let all_missing_id = items
        .iter()
        .all(|item| item.get("document_id").is_none());
    if !all_missing_id {
        return;
    }

    let rewritten: Vec<JsonValue> = items
        .iter()
        .map(|item| {
            let content = item.get("content").cloned().unwrap_or(item.clone());
            let document_id = compute_document_id(&content);
            let mut obj = serde_json::Map::new();
            obj.insert("document_id".into(), JsonValue::String(document_id));
            obj.insert("content".into(), content);
            JsonValue::Object(obj)
        })
        .collect();

    attributes.set(
        "langwatch.rag.contexts",
        AttributeValue::Json(JsonValue::Array(rewritten).to_string()),
    );
}

fn compute_document_id(content: &JsonValue) -> String {
    let text = extract_chunk_textual_content(content);
    format!("{:x}", md5::compute(text))
}

/// `extractChunkTextualContent` (§4.11).
fn extract_chunk_textual_content(x: &JsonValue) -> String {
    match x {
        JsonValue::String(s) => match serde_json::from_str::<JsonValue>(s) {
            Ok(parsed) => extract_chunk_textual_content(&parsed),
            Err(_) => s.trim().to_string(),
        },
        JsonValue::Array(items) => items
            .iter()
            .map(extract_chunk_textual_content)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
            .trim()
            .to_string(),
        JsonValue::Object(_) => x.to_string(),
        _ => String::new(),
    }
}
