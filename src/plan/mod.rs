//! Execution plans.
//!
//! Loads PostgreSQL EXPLAIN output into [`PlanNode`] trees and normalizes
//! them into the join and scan events the annotator consumes.

mod error;
mod event;
mod node;
mod normalizer;
mod provider;

pub use error::{PlanError, PlanResult};
pub use event::{JoinCandidates, JoinEvent, PlanEvent, ScanEvent};
pub use node::PlanNode;
pub use normalizer::{normalize, PlanNormalizer};
pub use provider::{explain_statement, PlanProvider, PlanSet, StaticPlan};
