//! The canonicalization core: `ExtractorContext`/`Extractor` (§4.2) and
//! `CanonicalizeService` (§4.3), plus the eleven vendor extractors (§4.5-4.9)
//! registered in a fixed, significant order.

pub mod fallback;
pub mod genai;
pub mod haystack;
pub mod helpers;
pub mod langwatch;
pub mod legacy_otel;
pub mod logfire;
pub mod mastra;
pub mod openinference;
pub mod strands;
pub mod traceloop;
pub mod vercel;

use serde_json::Value as JsonValue;

use crate::model::attribute::AttributeValue;
use crate::model::span::{SpanDataBag, SpanView};

/// Allowed values of `langwatch.span.type`; any extractor setting a span
/// type MUST use one of these, per §4.5.
pub const ALLOWED_SPAN_TYPES: &[&str] = &[
    "span", "llm", "tool", "agent", "rag", "server", "client", "producer", "consumer",
];

/// Either an already-typed `AttributeValue` or a raw `JsonValue` pending
/// `toAttributeValue` coercion — lets call sites pass whichever is more
/// natural without extractors hand-rolling the coercion each time.
pub enum AttrInput {
    Value(AttributeValue),
    Json(JsonValue),
}

impl From<AttributeValue> for AttrInput {
    fn from(v: AttributeValue) -> Self {
        AttrInput::Value(v)
    }
}
impl From<JsonValue> for AttrInput {
    fn from(v: JsonValue) -> Self {
        AttrInput::Json(v)
    }
}
impl From<&JsonValue> for AttrInput {
    fn from(v: &JsonValue) -> Self {
        AttrInput::Json(v.clone())
    }
}
impl From<String> for AttrInput {
    fn from(s: String) -> Self {
        AttrInput::Value(AttributeValue::String(s))
    }
}
impl From<&str> for AttrInput {
    fn from(s: &str) -> Self {
        AttrInput::Value(AttributeValue::String(s.to_string()))
    }
}
impl From<i64> for AttrInput {
    fn from(i: i64) -> Self {
        AttrInput::Value(AttributeValue::Int(i))
    }
}
impl From<f64> for AttrInput {
    fn from(d: f64) -> Self {
        AttrInput::Value(AttributeValue::Double(d))
    }
}
impl From<bool> for AttrInput {
    fn from(b: bool) -> Self {
        AttrInput::Value(AttributeValue::Bool(b))
    }
}
impl From<Vec<String>> for AttrInput {
    fn from(items: Vec<String>) -> Self {
        AttrInput::Value(AttributeValue::Array(
            items.into_iter().map(AttributeValue::String).collect(),
        ))
    }
}

fn resolve(input: impl Into<AttrInput>) -> Option<AttributeValue> {
    match input.into() {
        AttrInput::Value(v) => Some(v),
        AttrInput::Json(j) => AttributeValue::from_json(&j),
    }
}

/// The read/write surface passed to each extractor's `apply`.
pub struct ExtractorContext<'a> {
    pub bag: &'a mut SpanDataBag,
    pub span: &'a mut SpanView,
    out: crate::model::attribute::AttributeMap,
    rules: Vec<String>,
}

impl<'a> ExtractorContext<'a> {
    pub fn new(bag: &'a mut SpanDataBag, span: &'a mut SpanView) -> Self {
        Self {
            bag,
            span,
            out: crate::model::attribute::AttributeMap::new(),
            rules: Vec::new(),
        }
    }

    pub fn record_rule(&mut self, id: impl Into<String>) {
        self.rules.push(id.into());
    }

    /// Coerce `value`; a null coercion is a no-op. Overwrites `out[key]`.
    pub fn set_attr(&mut self, key: impl Into<String>, value: impl Into<AttrInput>) {
        if let Some(v) = resolve(value) {
            self.out.set(key, v);
        }
    }

    /// Like `set_attr`, but only writes if the key is absent from both the
    /// remaining bag and the output map.
    pub fn set_attr_if_absent(&mut self, key: impl Into<String>, value: impl Into<AttrInput>) {
        let key = key.into();
        if self.bag.attrs.has(&key) || self.out.has(&key) {
            return;
        }
        if let Some(v) = resolve(value) {
            self.out.set(key, v);
        }
    }

    pub fn out_has(&self, key: &str) -> bool {
        self.out.has(key)
    }

    pub fn out_get(&self, key: &str) -> Option<&AttributeValue> {
        self.out.get(key)
    }

    /// Test/composition helper: snapshot of everything written via
    /// `set_attr`/`set_attr_if_absent` so far.
    pub fn out_remaining(&self) -> Vec<(&str, &AttributeValue)> {
        self.out.remaining()
    }

    pub fn rules(&self) -> &[String] {
        &self.rules
    }

    /// Append `"<key>=<type>"` to `langwatch.reserved.value_types`, per the
    /// invariant that entries accumulate across extractors rather than
    /// overwrite.
    pub fn record_value_type(&mut self, key: &str, value_type: &str) {
        const VALUE_TYPES_KEY: &str = "langwatch.reserved.value_types";
        let mut entries: Vec<String> = match self.out.get(VALUE_TYPES_KEY) {
            Some(AttributeValue::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(|s| s.to_string()))
                .collect(),
            _ => Vec::new(),
        };
        entries.push(format!("{key}={value_type}"));
        self.set_attr(
            VALUE_TYPES_KEY,
            AttributeValue::Array(entries.into_iter().map(AttributeValue::String).collect()),
        );
    }

}

pub trait Extractor {
    fn id(&self) -> &'static str;
    fn apply(&self, ctx: &mut ExtractorContext);
}

/// Result of one canonicalization pass over a span.
pub struct CanonicalizeResult {
    pub attributes: crate::model::attribute::AttributeMap,
    pub events: Vec<crate::model::event::Event>,
    pub applied_rules: Vec<String>,
}

/// Orders and runs extractors, then merges the remaining bag with the
/// output map — output wins every collision. Owns an immutable,
/// process-wide extractor list; `register_extractor` appends custom
/// extractors at the end, and per §5 this MUST happen before first use.
pub struct CanonicalizeService {
    extractors: Vec<Box<dyn Extractor + Send + Sync>>,
}

impl Default for CanonicalizeService {
    fn default() -> Self {
        Self::with_default_extractors()
    }
}

impl CanonicalizeService {
    /// The fixed registration order from §4.3: LangWatch SDK-native
    /// attributes are most authoritative, GenAI semantic conventions next,
    /// framework-specific detectors follow, Fallback runs last.
    pub fn with_default_extractors() -> Self {
        let mut svc = Self {
            extractors: Vec::new(),
        };
        svc.register_extractor(Box::new(langwatch::LangWatchExtractor));
        svc.register_extractor(Box::new(genai::GenAiExtractor));
        svc.register_extractor(Box::new(mastra::MastraExtractor));
        svc.register_extractor(Box::new(openinference::OpenInferenceExtractor));
        svc.register_extractor(Box::new(traceloop::TraceloopExtractor));
        svc.register_extractor(Box::new(vercel::VercelExtractor));
        svc.register_extractor(Box::new(strands::StrandsExtractor));
        svc.register_extractor(Box::new(logfire::LogfireExtractor));
        svc.register_extractor(Box::new(haystack::HaystackExtractor));
        svc.register_extractor(Box::new(legacy_otel::LegacyOtelExtractor));
        svc.register_extractor(Box::new(fallback::FallbackExtractor));
        svc
    }

    pub fn register_extractor(&mut self, extractor: Box<dyn Extractor + Send + Sync>) {
        self.extractors.push(extractor);
    }

    pub fn canonicalize(&self, bag: &mut SpanDataBag, span: &mut SpanView) -> CanonicalizeResult {
        let mut ctx = ExtractorContext::new(bag, span);
        for extractor in &self.extractors {
            tracing::debug!(extractor = extractor.id(), "applying extractor");
            extractor.apply(&mut ctx);
        }

        let applied_rules = ctx.rules().to_vec();
        let mut merged = ctx.bag.attrs.clone();
        for (key, value) in ctx.out.remaining() {
            merged.set(key, value.clone());
        }
        let events = ctx.bag.events.remaining().to_vec();

        CanonicalizeResult {
            attributes: merged,
            events,
            applied_rules,
        }
    }
}
