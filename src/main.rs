//! CLI entry point: reads an OTLP trace export (JSON), canonicalizes every
//! span for a tenant, and prints a one-line summary per span.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use opentelemetry_proto::tonic::collector::trace::v1::ExportTraceServiceRequest;

use spancanon::core::config::AppConfig;
use spancanon::SpanNormalizationPipeline;

#[derive(Parser, Debug)]
#[command(name = "spancanon", about = "Canonicalize OTLP spans into vendor-agnostic attributes")]
struct Cli {
    /// Path to an OTLP ExportTraceServiceRequest, JSON-encoded.
    input: PathBuf,

    /// Tenant id stamped onto every normalized span.
    #[arg(long)]
    tenant_id: String,

    /// Path to a JSON config file (defaults to ./spancanon.json if present).
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let app_config = AppConfig::load(cli.config.as_deref())?;
    init_tracing(app_config.debug);

    let contents = std::fs::read_to_string(&cli.input)
        .with_context(|| format!("reading {}", cli.input.display()))?;
    let request: ExportTraceServiceRequest =
        serde_json::from_str(&contents).context("parsing OTLP trace export JSON")?;

    let pipeline = SpanNormalizationPipeline::default();
    let mut count = 0usize;
    for resource_spans in &request.resource_spans {
        let resource = resource_spans.resource.as_ref();
        for scope_spans in &resource_spans.scope_spans {
            let scope = scope_spans.scope.as_ref();
            for span in &scope_spans.spans {
                let normalized = pipeline
                    .normalize(&cli.tenant_id, span, resource, scope)
                    .with_context(|| format!("normalizing span {}", hex::encode(&span.span_id)))?;
                tracing::info!(
                    trace_id = %normalized.trace_id,
                    span_id = %normalized.span_id,
                    span_type = normalized.span_type().unwrap_or("unknown"),
                    name = %normalized.name,
                    attribute_count = normalized.span_attributes.len(),
                    "normalized span"
                );
                count += 1;
            }
        }
    }

    tracing::info!(count, "canonicalization complete");
    Ok(())
}

fn init_tracing(debug: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if debug { "debug" } else { "info" })
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
