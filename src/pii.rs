//! `PiiRedactionService` (§4.12): scans a span's PII-bearing attributes and
//! replaces their string values via an injected external clearer, running
//! every redaction for a span concurrently.

use std::env;

use futures::future::BoxFuture;

use crate::core::config::{PiiConfig, PiiRedactionLevel};
use crate::core::constants;
use crate::core::error::{CoreError, CoreResult};
use crate::model::attribute::{AttributeMap, AttributeValue};
use crate::model::span::NormalizedSpan;

/// The external PII-clearing backend (e.g. Presidio). Mutates nothing
/// itself — returns the redacted string, which the service writes back.
pub trait PiiClearer: Send + Sync {
    fn clear<'a>(&'a self, value: &'a str) -> BoxFuture<'a, CoreResult<String>>;
}

pub struct PiiRedactionService<C: PiiClearer> {
    clearer: C,
    config: PiiConfig,
}

/// Where a scanned value lives, so the result can be written back after the
/// concurrent batch of clearer calls completes.
enum Target {
    Span(String),
    Event(usize, String),
    Link(usize, String),
}

impl<C: PiiClearer> PiiRedactionService<C> {
    pub fn new(clearer: C, config: PiiConfig) -> Self {
        Self { clearer, config }
    }

    pub async fn redact_span(&self, span: &mut NormalizedSpan) -> CoreResult<()> {
        if env_disabled() || self.config.level == PiiRedactionLevel::Disabled {
            return Ok(());
        }

        if !self.config.backend_configured {
            if self.config.is_production {
                return Err(CoreError::pii_backend_unavailable(
                    "PII backend not configured in production",
                ));
            }
            return Ok(());
        }

        let mut any_skipped = false;
        let mut targets: Vec<(Target, String)> = Vec::new();

        scan_container(&span.span_attributes, &self.config, &mut any_skipped, |key, value| {
            targets.push((Target::Span(key.to_string()), value));
        });
        for (idx, event) in span.events.iter().enumerate() {
            scan_container(&event.attributes, &self.config, &mut any_skipped, |key, value| {
                targets.push((Target::Event(idx, key.to_string()), value));
            });
        }
        for (idx, link) in span.links.iter().enumerate() {
            scan_container(&link.attributes, &self.config, &mut any_skipped, |key, value| {
                targets.push((Target::Link(idx, key.to_string()), value));
            });
        }

        let redacted_count = targets.len();
        let futures = targets
            .iter()
            .map(|(_, value)| self.clearer.clear(value))
            .collect::<Vec<_>>();
        let results = futures::future::join_all(futures).await;

        for ((target, _), result) in targets.into_iter().zip(results) {
            let redacted = result?;
            target.write_back(span, redacted);
        }

        if any_skipped {
            let status = if redacted_count > 0 { "partial" } else { "none" };
            span.span_attributes.set(
                "langwatch.reserved.pii_redaction_status",
                AttributeValue::String(status.to_string()),
            );
        }
        Ok(())
    }
}

impl Target {
    fn write_back(&self, span: &mut NormalizedSpan, value: String) {
        match self {
            Target::Span(key) => {
                span.span_attributes.set(key.clone(), AttributeValue::String(value));
            }
            Target::Event(idx, key) => {
                span.events[*idx].attributes.set(key.clone(), AttributeValue::String(value));
            }
            Target::Link(idx, key) => {
                span.links[*idx].attributes.set(key.clone(), AttributeValue::String(value));
            }
        }
    }
}

/// Visit every PII-bearing key present as a non-empty string in `attrs`,
/// invoking `on_target(key, value)` for values within the size guard and
/// flipping `any_skipped` for values that exceed it.
fn scan_container(
    attrs: &AttributeMap,
    config: &PiiConfig,
    any_skipped: &mut bool,
    mut on_target: impl FnMut(&str, String),
) {
    for key in &config.bearing_keys {
        let Some(value) = attrs.get(key).and_then(|v| v.as_str()) else {
            continue;
        };
        if value.len() > config.max_attribute_length {
            *any_skipped = true;
            continue;
        }
        on_target(key, value.to_string());
    }
}

fn env_disabled() -> bool {
    env::var(constants::ENV_DISABLE_PII_REDACTION)
        .map(|v| !v.is_empty() && v != "0" && v.to_lowercase() != "false")
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::attribute::AttributeMap;
    use crate::model::event::EventBag;
    use crate::model::span::{InstrumentationScope, SpanKind};

    struct UppercaseClearer;
    impl PiiClearer for UppercaseClearer {
        fn clear<'a>(&'a self, value: &'a str) -> BoxFuture<'a, CoreResult<String>> {
            Box::pin(async move { Ok(value.to_uppercase()) })
        }
    }

    struct FailingClearer;
    impl PiiClearer for FailingClearer {
        fn clear<'a>(&'a self, _value: &'a str) -> BoxFuture<'a, CoreResult<String>> {
            Box::pin(async move { Err(CoreError::pii_backend_failure("backend exploded")) })
        }
    }

    fn test_span(attrs: &[(&str, &str)]) -> NormalizedSpan {
        let mut span_attributes = AttributeMap::new();
        for (k, v) in attrs {
            span_attributes.set(*k, AttributeValue::String(v.to_string()));
        }
        NormalizedSpan {
            tenant_id: "t".into(),
            record_id: "r".into(),
            trace_id: "trace".into(),
            span_id: "span".into(),
            parent_span_id: None,
            parent_trace_id: None,
            parent_is_remote: false,
            sampled: true,
            start_time_unix_ms: 0,
            end_time_unix_ms: 1,
            duration_ms: 1,
            name: "span".into(),
            kind: SpanKind::Internal,
            instrumentation_scope: InstrumentationScope::default(),
            status_code: None,
            status_message: None,
            resource_attributes: AttributeMap::new(),
            span_attributes,
            events: Vec::new(),
            links: Vec::new(),
            dropped_attributes_count: 0,
            dropped_events_count: 0,
            dropped_links_count: 0,
        }
    }

    fn enabled_config() -> PiiConfig {
        let mut config = PiiConfig::default();
        config.backend_configured = true;
        config
    }

    #[tokio::test]
    async fn redacts_pii_bearing_keys_without_marking_status_when_nothing_skipped() {
        let mut span = test_span(&[
            ("gen_ai.input.messages", "my ssn is 123-45-6789"),
            ("not.a.pii.key", "untouched"),
        ]);
        let service = PiiRedactionService::new(UppercaseClearer, enabled_config());
        service.redact_span(&mut span).await.unwrap();

        assert_eq!(
            span.span_attributes.get("gen_ai.input.messages"),
            Some(&AttributeValue::String("MY SSN IS 123-45-6789".into()))
        );
        assert_eq!(
            span.span_attributes.get("not.a.pii.key"),
            Some(&AttributeValue::String("untouched".into()))
        );
        assert!(!span.span_attributes.has("langwatch.reserved.pii_redaction_status"));
    }

    #[tokio::test]
    async fn marks_partial_when_some_values_redacted_and_others_skipped() {
        let huge = "x".repeat(300_000);
        let mut span = test_span(&[
            ("gen_ai.input.messages", "my ssn is 123-45-6789"),
            ("langwatch.input", huge.as_str()),
        ]);
        let service = PiiRedactionService::new(UppercaseClearer, enabled_config());
        service.redact_span(&mut span).await.unwrap();

        assert_eq!(
            span.span_attributes.get("gen_ai.input.messages"),
            Some(&AttributeValue::String("MY SSN IS 123-45-6789".into()))
        );
        assert_eq!(
            span.span_attributes.get("langwatch.input"),
            Some(&AttributeValue::String(huge))
        );
        assert_eq!(
            span.span_attributes.get("langwatch.reserved.pii_redaction_status"),
            Some(&AttributeValue::String("partial".into()))
        );
    }

    #[tokio::test]
    async fn oversized_value_is_skipped_not_redacted() {
        let huge = "x".repeat(300_000);
        let mut span = test_span(&[("langwatch.input", huge.as_str())]);
        let service = PiiRedactionService::new(UppercaseClearer, enabled_config());
        service.redact_span(&mut span).await.unwrap();

        assert_eq!(
            span.span_attributes.get("langwatch.input"),
            Some(&AttributeValue::String(huge))
        );
        assert_eq!(
            span.span_attributes.get("langwatch.reserved.pii_redaction_status"),
            Some(&AttributeValue::String("none".into()))
        );
    }

    #[tokio::test]
    async fn disabled_level_is_a_noop() {
        let mut span = test_span(&[("langwatch.input", "secret")]);
        let mut config = enabled_config();
        config.level = PiiRedactionLevel::Disabled;
        let service = PiiRedactionService::new(UppercaseClearer, config);
        service.redact_span(&mut span).await.unwrap();
        assert_eq!(
            span.span_attributes.get("langwatch.input"),
            Some(&AttributeValue::String("secret".into()))
        );
        assert!(!span.span_attributes.has("langwatch.reserved.pii_redaction_status"));
    }

    #[tokio::test]
    async fn backend_failure_propagates() {
        let mut span = test_span(&[("langwatch.input", "secret")]);
        let service = PiiRedactionService::new(FailingClearer, enabled_config());
        let result = service.redact_span(&mut span).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn unconfigured_backend_outside_production_is_noop() {
        let mut span = test_span(&[("langwatch.input", "secret")]);
        let config = PiiConfig::default();
        let service = PiiRedactionService::new(UppercaseClearer, config);
        service.redact_span(&mut span).await.unwrap();
        assert_eq!(
            span.span_attributes.get("langwatch.input"),
            Some(&AttributeValue::String("secret".into()))
        );
    }

    #[tokio::test]
    async fn unconfigured_backend_in_production_fails() {
        let mut span = test_span(&[("langwatch.input", "secret")]);
        let mut config = PiiConfig::default();
        config.is_production = true;
        let service = PiiRedactionService::new(UppercaseClearer, config);
        let result = service.redact_span(&mut span).await;
        assert!(matches!(result, Err(CoreError::PiiBackendUnavailable(_))));
    }
}
