//! OTLP wire decoding (§4.10 steps 1-2): protobuf spans into the mutable
//! `SpanDataBag`/`SpanView` pair the canonicalizer consumes, plus the
//! identity/timing fields that survive untouched into `NormalizedSpan`.

use opentelemetry_proto::tonic::common::v1::{AnyValue, InstrumentationScope as OtlpScope, KeyValue, any_value};
use opentelemetry_proto::tonic::resource::v1::Resource;
use opentelemetry_proto::tonic::trace::v1::{Span as OtlpSpan, span::SpanKind as OtlpSpanKind};
use serde_json::Value as JsonValue;

use crate::model::attribute::{AttributeMap, AttributeValue};
use crate::model::event::{Event, EventBag};
use crate::model::span::{InstrumentationScope, Link, SpanDataBag, SpanKind, SpanView};

/// Everything pulled off one OTLP span before canonicalization runs: the
/// identity/timing fields `NormalizedSpan` needs verbatim, plus the mutable
/// bag and view the extractor pipeline operates on.
pub struct DecodedSpan {
    pub trace_id: String,
    pub span_id: String,
    pub parent_span_id: Option<String>,
    pub start_time_unix_ms: i64,
    pub end_time_unix_ms: i64,
    pub dropped_attributes_count: u32,
    pub dropped_events_count: u32,
    pub dropped_links_count: u32,
    pub links: Vec<Link>,
    pub resource_attributes: AttributeMap,
    pub bag: SpanDataBag,
    pub view: SpanView,
}

pub fn decode_span(resource: Option<&Resource>, scope: Option<&OtlpScope>, span: &OtlpSpan) -> DecodedSpan {
    let trace_id = hex::encode(&span.trace_id);
    let span_id = hex::encode(&span.span_id);
    let parent_span_id = if span.parent_span_id.is_empty() {
        None
    } else {
        Some(hex::encode(&span.parent_span_id))
    };

    let resource_attributes = resource
        .map(|r| attributes_to_map(&r.attributes))
        .unwrap_or_default();

    let instrumentation_scope = InstrumentationScope {
        name: scope.map(|s| s.name.clone()).unwrap_or_default(),
        version: scope.and_then(|s| {
            if s.version.is_empty() {
                None
            } else {
                Some(s.version.clone())
            }
        }),
    };

    let status_code = span.status.as_ref().map(|s| s.code);
    let status_message = span
        .status
        .as_ref()
        .and_then(|s| (!s.message.is_empty()).then(|| s.message.clone()))
        .map(|m| truncate(&m, crate::core::constants::ERROR_MESSAGE_MAX_LEN));

    let view = SpanView {
        name: span.name.clone(),
        kind: SpanKind::from_otlp(otlp_kind_to_i32(span.kind)),
        instrumentation_scope,
        status_code,
        status_message,
        parent_span_id: parent_span_id.clone(),
    };

    let bag = SpanDataBag {
        attrs: attributes_to_map(&span.attributes),
        events: events_to_bag(&span.events),
    };

    let links = span
        .links
        .iter()
        .map(|l| Link {
            trace_id: hex::encode(&l.trace_id),
            span_id: hex::encode(&l.span_id),
            attributes: attributes_to_map(&l.attributes),
        })
        .collect();

    DecodedSpan {
        trace_id,
        span_id,
        parent_span_id,
        start_time_unix_ms: (span.start_time_unix_nano / 1_000_000) as i64,
        end_time_unix_ms: (span.end_time_unix_nano / 1_000_000) as i64,
        dropped_attributes_count: span.dropped_attributes_count,
        dropped_events_count: span.dropped_events_count,
        dropped_links_count: span.dropped_links_count,
        links,
        resource_attributes,
        bag,
        view,
    }
}

fn otlp_kind_to_i32(kind: i32) -> i32 {
    match OtlpSpanKind::try_from(kind).unwrap_or(OtlpSpanKind::Unspecified) {
        OtlpSpanKind::Internal => 1,
        OtlpSpanKind::Server => 2,
        OtlpSpanKind::Client => 3,
        OtlpSpanKind::Producer => 4,
        OtlpSpanKind::Consumer => 5,
        OtlpSpanKind::Unspecified => 0,
    }
}

fn attributes_to_map(attrs: &[KeyValue]) -> AttributeMap {
    let mut map = AttributeMap::new();
    for kv in attrs {
        if let Some(v) = &kv.value {
            if let Some(value) = AttributeValue::from_json(&any_value_to_json(v)) {
                map.set(kv.key.clone(), value);
            }
        }
    }
    map
}

fn events_to_bag(events: &[opentelemetry_proto::tonic::trace::v1::span::Event]) -> EventBag {
    let mut bag = EventBag::new();
    for e in events {
        bag.push(Event {
            name: e.name.clone(),
            time_unix_ms: (e.time_unix_nano / 1_000_000) as i64,
            attributes: attributes_to_map(&e.attributes),
        });
    }
    bag
}

fn any_value_to_json(value: &AnyValue) -> JsonValue {
    match &value.value {
        Some(any_value::Value::StringValue(s)) => serde_json::json!(s),
        Some(any_value::Value::BoolValue(b)) => serde_json::json!(b),
        Some(any_value::Value::IntValue(i)) => serde_json::json!(i),
        Some(any_value::Value::DoubleValue(d)) => serde_json::json!(d),
        Some(any_value::Value::ArrayValue(arr)) => {
            serde_json::json!(arr.values.iter().map(any_value_to_json).collect::<Vec<_>>())
        }
        Some(any_value::Value::KvlistValue(kvlist)) => {
            let map: serde_json::Map<String, JsonValue> = kvlist
                .values
                .iter()
                .filter_map(|kv| kv.value.as_ref().map(|v| (kv.key.clone(), any_value_to_json(v))))
                .collect();
            JsonValue::Object(map)
        }
        Some(any_value::Value::BytesValue(b)) => serde_json::json!(hex::encode(b)),
        None => JsonValue::Null,
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        return s.to_string();
    }
    s.chars().take(max_len).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry_proto::tonic::trace::v1::Status;
    use opentelemetry_proto::tonic::trace::v1::status::StatusCode;

    fn kv(key: &str, value: any_value::Value) -> KeyValue {
        KeyValue {
            key: key.to_string(),
            value: Some(AnyValue { value: Some(value) }),
        }
    }

    #[test]
    fn decode_span_extracts_identity_and_attributes() {
        let span = OtlpSpan {
            trace_id: vec![0xab; 16],
            span_id: vec![0xcd; 8],
            parent_span_id: vec![],
            name: "chat".to_string(),
            kind: OtlpSpanKind::Client as i32,
            start_time_unix_nano: 1_000_000_000,
            end_time_unix_nano: 2_000_000_000,
            attributes: vec![kv(
                "gen_ai.system",
                any_value::Value::StringValue("openai".to_string()),
            )],
            status: Some(Status {
                code: StatusCode::Ok as i32,
                message: String::new(),
            }),
            ..Default::default()
        };
        let decoded = decode_span(None, None, &span);
        assert_eq!(decoded.trace_id, "ab".repeat(16));
        assert_eq!(decoded.span_id, "cd".repeat(8));
        assert_eq!(decoded.parent_span_id, None);
        assert_eq!(decoded.start_time_unix_ms, 1000);
        assert_eq!(decoded.end_time_unix_ms, 2000);
        assert_eq!(decoded.view.kind, SpanKind::Client);
        assert_eq!(
            decoded.bag.attrs.get("gen_ai.system"),
            Some(&AttributeValue::String("openai".to_string()))
        );
    }
}
