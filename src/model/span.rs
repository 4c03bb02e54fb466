//! Per-span data model: the scoped mutable bag an extractor pass consumes,
//! and the normalized span that survives it.

use crate::model::attribute::AttributeMap;
use crate::model::event::{Event, EventBag};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpanKind {
    #[default]
    Unspecified,
    Internal,
    Server,
    Client,
    Producer,
    Consumer,
}

impl SpanKind {
    pub fn from_otlp(kind: i32) -> Self {
        match kind {
            1 => SpanKind::Internal,
            2 => SpanKind::Server,
            3 => SpanKind::Client,
            4 => SpanKind::Producer,
            5 => SpanKind::Consumer,
            _ => SpanKind::Unspecified,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct InstrumentationScope {
    pub name: String,
    pub version: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Link {
    pub trace_id: String,
    pub span_id: String,
    pub attributes: AttributeMap,
}

/// The scoped mutable container consumed by one canonicalization pass.
/// Constructed per span, discarded after the merge.
#[derive(Debug, Clone, Default)]
pub struct SpanDataBag {
    pub attrs: AttributeMap,
    pub events: EventBag,
}

/// A mutable view over the span-level fields an extractor may rewrite.
/// Carried separately from `SpanDataBag` since these aren't attributes.
#[derive(Debug, Clone, Default)]
pub struct SpanView {
    pub name: String,
    pub kind: SpanKind,
    pub instrumentation_scope: InstrumentationScope,
    pub status_code: Option<i32>,
    pub status_message: Option<String>,
    pub parent_span_id: Option<String>,
}

/// The canonicalized span handed to downstream writers.
#[derive(Debug, Clone)]
pub struct NormalizedSpan {
    pub tenant_id: String,
    pub record_id: String,

    pub trace_id: String,
    pub span_id: String,
    pub parent_span_id: Option<String>,
    pub parent_trace_id: Option<String>,
    pub parent_is_remote: bool,
    pub sampled: bool,

    pub start_time_unix_ms: i64,
    pub end_time_unix_ms: i64,
    pub duration_ms: i64,

    pub name: String,
    pub kind: SpanKind,
    pub instrumentation_scope: InstrumentationScope,
    pub status_code: Option<i32>,
    pub status_message: Option<String>,

    pub resource_attributes: AttributeMap,
    pub span_attributes: AttributeMap,
    pub events: Vec<Event>,
    pub links: Vec<Link>,

    pub dropped_attributes_count: u32,
    pub dropped_events_count: u32,
    pub dropped_links_count: u32,
}

impl NormalizedSpan {
    /// `langwatch.span.type` read from the final canonical attributes, used
    /// pervasively by trace-level I/O extraction to exclude evaluation and
    /// guardrail spans.
    pub fn span_type(&self) -> Option<&str> {
        self.span_attributes
            .get("langwatch.span.type")
            .and_then(|v| v.as_str())
    }
}
