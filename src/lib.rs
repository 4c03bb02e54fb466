//! Span canonicalization and trace I/O extraction core.
//!
//! A pure, per-span transformation from OTLP-shaped spans into a normalized,
//! vendor-agnostic attribute set, plus an auxiliary per-trace analysis that
//! extracts a trace's overall input and output.

pub mod core;
pub mod extract;
pub mod model;
pub mod otlp_decode;
pub mod pii;
pub mod pipeline;
pub mod trace_io;

pub use core::error::{CoreError, CoreResult};
pub use extract::CanonicalizeService;
pub use model::span::NormalizedSpan;
pub use pipeline::SpanNormalizationPipeline;
pub use trace_io::{TraceIo, TraceIoExtractionService};
