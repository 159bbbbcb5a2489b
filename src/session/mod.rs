//! The annotation pipeline: query text in, annotated tree out.

mod api;
mod error;
mod render;

pub use api::{AnnotatedQuery, Session, SessionConfig};
pub use error::{FailureContext, SessionError, SessionResult};
pub use render::render;
