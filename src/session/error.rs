//! Session errors.

use std::fmt;

use thiserror::Error;

use crate::annotate::AnnotateError;
use crate::catalog::CatalogError;
use crate::plan::{PlanError, PlanNode};
use crate::sql::{ParseError, Query};

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Errors raised by the annotation pipeline.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("plan error: {0}")]
    Plan(#[from] PlanError),

    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// The annotation pass failed; nothing was annotated.
    #[error("annotation failed for `{}`: {source}", .context.sql)]
    Annotate {
        source: AnnotateError,
        context: Box<FailureContext>,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Everything needed to reproduce a failed annotation pass.
#[derive(Debug, Clone)]
pub struct FailureContext {
    /// Query text as parsed and planned.
    pub sql: String,
    /// Structural tree, after column resolution.
    pub query: Query,
    pub plan: PlanNode,
}

impl fmt::Display for FailureContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "query: {}", self.sql)?;
        writeln!(f, "tree: {}", self.query)?;
        write!(f, "plan:\n{}", self.plan)
    }
}

impl SessionError {
    /// The failure context, for annotation failures.
    pub fn context(&self) -> Option<&FailureContext> {
        match self {
            SessionError::Annotate { context, .. } => Some(context),
            _ => None,
        }
    }
}
