//! Annotation errors.

use thiserror::Error;

use crate::plan::PlanError;

/// Result type for annotation operations.
pub type AnnotateResult<T> = Result<T, AnnotateError>;

/// Errors that abort an annotation pass.
#[derive(Debug, Error)]
pub enum AnnotateError {
    #[error("plan error: {0}")]
    Plan(#[from] PlanError),

    /// More than one WHERE condition matched the reconstructed join
    /// conditions of a plan node that carries none.
    #[error("ambiguous implicit join for {subtype}: {candidates} conditions matched")]
    AmbiguousHeuristicMatch { subtype: String, candidates: usize },

    #[error("unrecognized construct in WHERE: {0}")]
    UnrecognizedConstruct(String),
}
