//! Plan errors.

use thiserror::Error;

/// Result type for plan operations.
pub type PlanResult<T> = Result<T, PlanError>;

/// Errors raised while loading or normalizing an execution plan.
#[derive(Debug, Error)]
pub enum PlanError {
    /// A node breaks the contract of its type (child count or required field).
    /// Every later match would be meaningless, so this is fatal.
    #[error("structural violation in {node_type} node: {detail}")]
    StructuralViolation { node_type: String, detail: String },

    #[error("invalid plan document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("plan provider failed: {0}")]
    Provider(String),
}

impl PlanError {
    pub(crate) fn violation(node_type: &str, detail: impl Into<String>) -> Self {
        PlanError::StructuralViolation {
            node_type: node_type.to_string(),
            detail: detail.into(),
        }
    }
}
