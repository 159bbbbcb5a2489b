//! Plan sources.

use std::collections::BTreeMap;
use std::path::Path;

use super::error::{PlanError, PlanResult};
use super::node::PlanNode;

/// Options the plan must be produced with: VERBOSE for the `Output`
/// lists, no costs, and JSON so it can be deserialized.
const EXPLAIN_OPTIONS: &str = "VERBOSE TRUE, COSTS FALSE, FORMAT JSON";

/// Build the EXPLAIN statement that yields a plan for `sql`.
pub fn explain_statement(sql: &str) -> String {
    format!("EXPLAIN ({}) {}", EXPLAIN_OPTIONS, statement_key(sql))
}

/// Query text with surrounding whitespace and trailing `;` removed.
fn statement_key(sql: &str) -> &str {
    sql.trim().trim_end_matches(';').trim_end()
}

/// Something that can produce the execution plan of a query.
///
/// Implementations typically run [`explain_statement`] against a live
/// database and feed the returned document to [`PlanNode::from_json`].
pub trait PlanProvider {
    fn explain(&self, sql: &str) -> PlanResult<PlanNode>;
}

impl<F> PlanProvider for F
where
    F: Fn(&str) -> PlanResult<PlanNode>,
{
    fn explain(&self, sql: &str) -> PlanResult<PlanNode> {
        self(sql)
    }
}

/// A provider that returns a fixed plan for any query.
#[derive(Debug, Clone)]
pub struct StaticPlan {
    plan: PlanNode,
}

impl StaticPlan {
    pub fn new(plan: PlanNode) -> Self {
        Self { plan }
    }

    /// Load the plan from an EXPLAIN JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> PlanResult<Self> {
        Ok(Self::new(PlanNode::from_json_file(path)?))
    }

    pub fn plan(&self) -> &PlanNode {
        &self.plan
    }
}

impl PlanProvider for StaticPlan {
    fn explain(&self, _sql: &str) -> PlanResult<PlanNode> {
        Ok(self.plan.clone())
    }
}

/// A provider holding one plan per query text. Queries without a plan
/// are a [`PlanError::Provider`] error.
#[derive(Debug, Clone, Default)]
pub struct PlanSet {
    plans: BTreeMap<String, PlanNode>,
}

impl PlanSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the plan for `sql`. Keys ignore surrounding whitespace and a
    /// trailing `;`.
    pub fn with_plan(mut self, sql: &str, plan: PlanNode) -> Self {
        self.plans.insert(statement_key(sql).to_string(), plan);
        self
    }

    pub fn len(&self) -> usize {
        self.plans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }
}

impl PlanProvider for PlanSet {
    fn explain(&self, sql: &str) -> PlanResult<PlanNode> {
        self.plans
            .get(statement_key(sql))
            .cloned()
            .ok_or_else(|| PlanError::Provider(format!("no plan for query: {}", statement_key(sql))))
    }
}
