//! Unified error type for the canonicalization core.
//!
//! Only the kinds spec'd as actual errors get a variant here — malformed
//! JSON/UTF-8 and oversized PII attributes degrade silently and never reach
//! this type (see §7).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    /// Empty tenant id at pipeline entry; fatal for the span being processed.
    #[error("validation error: {0}")]
    Validation(String),

    /// External PII backend not configured/reachable, surfaced only when
    /// running under enforcement (production).
    #[error("PII backend unavailable: {0}")]
    PiiBackendUnavailable(String),

    /// External PII backend call returned an error.
    #[error("PII backend failure: {0}")]
    PiiBackendFailure(String),

    /// Programming error — an extractor violated its contract. Fails loud so
    /// operators investigate; never caught and downgraded.
    #[error("internal invariant violated: {0}")]
    InternalInvariant(String),
}

impl CoreError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn pii_backend_unavailable(msg: impl Into<String>) -> Self {
        Self::PiiBackendUnavailable(msg.into())
    }

    pub fn pii_backend_failure(msg: impl Into<String>) -> Self {
        Self::PiiBackendFailure(msg.into())
    }

    pub fn internal_invariant(msg: impl Into<String>) -> Self {
        Self::InternalInvariant(msg.into())
    }

    /// Whether the pipeline should abort the whole span on this error, as
    /// opposed to one that's already been absorbed as a degraded value.
    pub fn is_fatal_for_span(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::InternalInvariant(_) | Self::PiiBackendFailure(_)
        )
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_display() {
        let err = CoreError::validation("tenant id empty");
        assert_eq!(err.to_string(), "validation error: tenant id empty");
    }

    #[test]
    fn fatal_classification() {
        assert!(CoreError::validation("x").is_fatal_for_span());
        assert!(CoreError::internal_invariant("x").is_fatal_for_span());
        assert!(CoreError::pii_backend_failure("x").is_fatal_for_span());
        assert!(!CoreError::pii_backend_unavailable("x").is_fatal_for_span());
    }
}
