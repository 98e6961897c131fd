//! Audit error types.
//!
//! Raised at the boundaries where marks are parsed and scores are recorded.
//! The scoring pass itself never fails.

use thiserror::Error;

/// A mark value outside the closed `Mark` enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid mark '{0}' (expected yes, no, acceptable or not_applicable)")]
pub struct MarkError(pub String);

/// Errors that can occur while assembling an audit graph.
#[derive(Debug, Error)]
pub enum AuditError {
    /// A score referenced a field that is not part of the audit's form.
    #[error("field '{field}' is not part of form '{form}'")]
    UnknownField { form: String, field: String },

    /// An audit referenced a form that was never loaded.
    #[error("form not found: {0}")]
    UnknownForm(String),

    /// Two loaded forms share the same id.
    #[error("duplicate form id: {0}")]
    DuplicateForm(String),

    /// A field id appears more than once within one form.
    #[error("duplicate field id '{field}' in form '{form}'")]
    DuplicateField { form: String, field: String },

    /// A percentage string could not be parsed.
    #[error("invalid percentage: {0}")]
    InvalidPercentage(String),
}

impl AuditError {
    /// Returns `true` if this error means the audit graph breaks the
    /// "every score belongs to the audit's form" invariant.
    pub fn is_foreign_reference(&self) -> bool {
        matches!(
            self,
            AuditError::UnknownField { .. } | AuditError::UnknownForm(_)
        )
    }
}
