//! Catalog errors.

use thiserror::Error;

/// Result type for catalog operations.
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Errors raised while looking up relation columns.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The catalog has no entry for the relation. The resolver treats
    /// this as "contributes no columns".
    #[error("relation not found: {0}")]
    RelationNotFound(String),

    #[error("duplicate column '{column}' in relation '{relation}'")]
    DuplicateColumn { relation: String, column: String },

    #[error("invalid catalog document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("catalog provider failed: {0}")]
    Provider(String),
}
