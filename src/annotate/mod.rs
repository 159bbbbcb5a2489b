//! Plan-to-query annotation.
//!
//! Matches the events of a normalized plan against a query's structural
//! tree and writes the operator that realized each node onto it.

mod annotator;
pub mod codec;
mod coverage;
mod error;

pub use annotator::{BetweenMode, Outcome, QueryAnnotator};
pub use coverage::CoverageCounters;
pub use error::{AnnotateError, AnnotateResult};
