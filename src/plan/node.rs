//! Raw execution plan nodes.
//!
//! Mirrors the node objects of PostgreSQL's
//! `EXPLAIN (VERBOSE, COSTS FALSE, FORMAT JSON)` output. Only the fields
//! the normalizer reads are kept; everything else is ignored on load.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::error::PlanResult;

/// One operator node of an execution plan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanNode {
    #[serde(rename = "Node Type")]
    pub node_type: String,

    /// How this node feeds its parent (`Outer`, `Inner`, `InitPlan`, `SubPlan`, ...).
    #[serde(rename = "Parent Relationship", default, skip_serializing_if = "Option::is_none")]
    pub parent_relationship: Option<String>,

    #[serde(rename = "Relation Name", default, skip_serializing_if = "Option::is_none")]
    pub relation_name: Option<String>,

    #[serde(rename = "Alias", default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,

    #[serde(rename = "Index Name", default, skip_serializing_if = "Option::is_none")]
    pub index_name: Option<String>,

    #[serde(rename = "Filter", default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,

    #[serde(rename = "Join Filter", default, skip_serializing_if = "Option::is_none")]
    pub join_filter: Option<String>,

    #[serde(rename = "Hash Cond", default, skip_serializing_if = "Option::is_none")]
    pub hash_cond: Option<String>,

    #[serde(rename = "Merge Cond", default, skip_serializing_if = "Option::is_none")]
    pub merge_cond: Option<String>,

    #[serde(rename = "Index Cond", default, skip_serializing_if = "Option::is_none")]
    pub index_cond: Option<String>,

    /// Output column expressions (present with VERBOSE).
    #[serde(rename = "Output", default, skip_serializing_if = "Vec::is_empty")]
    pub output: Vec<String>,

    #[serde(rename = "Plans", default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<PlanNode>,
}

/// One entry of an EXPLAIN JSON document.
#[derive(Debug, Deserialize)]
struct ExplainEntry {
    #[serde(rename = "Plan")]
    plan: PlanNode,
}

/// The accepted shapes of a plan document.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ExplainDocument {
    List(Vec<ExplainEntry>),
    Entry(ExplainEntry),
    Node(PlanNode),
}

impl PlanNode {
    /// Create a node of the given type with no fields set.
    pub fn new(node_type: impl Into<String>) -> Self {
        Self {
            node_type: node_type.into(),
            ..Default::default()
        }
    }

    /// Create a scan node over a relation, aliased to its own name.
    pub fn scan(node_type: impl Into<String>, relation: impl Into<String>) -> Self {
        let relation = relation.into();
        Self::new(node_type)
            .with_alias(relation.clone())
            .with_relation(relation)
    }

    /// Set the relation name.
    pub fn with_relation(mut self, name: impl Into<String>) -> Self {
        self.relation_name = Some(name.into());
        self
    }

    /// Set the alias.
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Set the index name.
    pub fn with_index(mut self, name: impl Into<String>) -> Self {
        self.index_name = Some(name.into());
        self
    }

    /// Set the row filter.
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Set the join filter.
    pub fn with_join_filter(mut self, filter: impl Into<String>) -> Self {
        self.join_filter = Some(filter.into());
        self
    }

    /// Set the hash condition.
    pub fn with_hash_cond(mut self, cond: impl Into<String>) -> Self {
        self.hash_cond = Some(cond.into());
        self
    }

    /// Set the merge condition.
    pub fn with_merge_cond(mut self, cond: impl Into<String>) -> Self {
        self.merge_cond = Some(cond.into());
        self
    }

    /// Set the index condition.
    pub fn with_index_cond(mut self, cond: impl Into<String>) -> Self {
        self.index_cond = Some(cond.into());
        self
    }

    /// Set the output column list.
    pub fn with_output<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Mark this node as a subplan of its parent.
    pub fn as_subplan(mut self) -> Self {
        self.parent_relationship = Some("SubPlan".into());
        self
    }

    /// Whether this node is an InitPlan or SubPlan rather than an input
    /// of its parent operator.
    pub fn is_subplan(&self) -> bool {
        matches!(self.parent_relationship.as_deref(), Some("InitPlan" | "SubPlan"))
    }

    /// Children that are inputs of this operator, in order.
    pub fn inputs(&self) -> impl Iterator<Item = &PlanNode> {
        self.children.iter().filter(|c| !c.is_subplan())
    }

    /// Children that are InitPlans or SubPlans, in order.
    pub fn subplans(&self) -> impl Iterator<Item = &PlanNode> {
        self.children.iter().filter(|c| c.is_subplan())
    }

    /// Add a child node.
    pub fn with_child(mut self, child: PlanNode) -> Self {
        self.children.push(child);
        self
    }

    /// Parse a plan from EXPLAIN JSON text. Accepts the full
    /// `[{"Plan": ...}]` document, a single `{"Plan": ...}` entry, or a
    /// bare node object.
    pub fn from_json(text: &str) -> PlanResult<Self> {
        let doc: ExplainDocument = serde_json::from_str(text)?;
        match doc {
            ExplainDocument::List(entries) => entries
                .into_iter()
                .next()
                .map(|e| e.plan)
                .ok_or_else(|| super::PlanError::Provider("EXPLAIN document has no plan".into())),
            ExplainDocument::Entry(entry) => Ok(entry.plan),
            ExplainDocument::Node(node) => Ok(node),
        }
    }

    /// Load a plan from an EXPLAIN JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> PlanResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Total number of nodes in this subtree.
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(|c| c.node_count()).sum::<usize>()
    }

    fn format_node(&self, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
        let pad = "  ".repeat(indent);
        write!(f, "{}{}", pad, self.node_type)?;
        if let Some(rel) = &self.relation_name {
            write!(f, " on {}", rel)?;
            if let Some(alias) = self.alias.as_ref().filter(|a| *a != rel) {
                write!(f, " {}", alias)?;
            }
        }
        if let Some(index) = &self.index_name {
            write!(f, " using {}", index)?;
        }
        writeln!(f)?;

        let details = [
            ("Hash Cond", &self.hash_cond),
            ("Merge Cond", &self.merge_cond),
            ("Index Cond", &self.index_cond),
            ("Join Filter", &self.join_filter),
            ("Filter", &self.filter),
        ];
        for (label, value) in details {
            if let Some(value) = value {
                writeln!(f, "{}  {}: {}", pad, label, value)?;
            }
        }

        for child in &self.children {
            child.format_node(f, indent + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for PlanNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.format_node(f, 0)
    }
}
