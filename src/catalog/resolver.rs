//! Column qualification.
//!
//! Plans print every column qualified with its relation (`nation.n_name`),
//! while queries often use bare names. The resolver rewrites bare column
//! references whose owner is unambiguous so the codec can match them.

use std::collections::BTreeSet;

use log::debug;

use super::columns::ColumnCatalog;
use super::error::{CatalogError, CatalogResult};
use super::provider::CatalogProvider;
use crate::sql::{Condition, FromItem, MembershipSet, Operand, Query};

/// A base relation referenced by a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationRef {
    /// Relation name as the catalog knows it.
    pub name: String,
    /// Name used to qualify its columns: the alias, or the relation name.
    pub reference: String,
}

/// What a resolution pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolveReport {
    /// Column references that were qualified.
    pub rewritten: usize,
    /// Bare names owned by two or more relations.
    pub ambiguous: BTreeSet<String>,
    /// Bare names owned by no known relation.
    pub unknown: BTreeSet<String>,
}

impl ResolveReport {
    /// Whether every bare column reference was qualified.
    pub fn is_complete(&self) -> bool {
        self.ambiguous.is_empty() && self.unknown.is_empty()
    }
}

/// Qualifies bare column references using a [`CatalogProvider`].
pub struct ColumnResolver<'a> {
    catalog: &'a dyn CatalogProvider,
}

impl<'a> ColumnResolver<'a> {
    pub fn new(catalog: &'a dyn CatalogProvider) -> Self {
        Self { catalog }
    }

    /// Build the column map for `relations`. Relations the catalog does not
    /// know contribute nothing.
    pub fn build_column_map(&self, relations: &[RelationRef]) -> CatalogResult<ColumnCatalog> {
        let mut columns = ColumnCatalog::new();
        for relation in relations {
            match self.catalog.columns_of(&relation.name) {
                Ok(names) => {
                    for name in names {
                        columns.insert(name, relation.reference.clone());
                    }
                }
                Err(CatalogError::RelationNotFound(name)) => {
                    debug!("relation '{}' not in catalog, skipping", name);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(columns)
    }

    /// Qualify every bare column in `query` that has exactly one owner.
    pub fn resolve(&self, query: &mut Query) -> CatalogResult<ResolveReport> {
        let relations = collect_relations(query);
        let columns = self.build_column_map(&relations)?;
        let report = rewrite_unqualified(query, &columns);

        for name in &report.ambiguous {
            debug!("column '{}' is ambiguous: {:?}", name, columns.owners(name));
        }
        for name in &report.unknown {
            debug!("column '{}' has no known owner", name);
        }
        Ok(report)
    }
}

/// Every base relation referenced anywhere in `query`, in tree order:
/// FROM slots, derived tables, and queries nested in the projection and
/// WHERE region.
pub fn collect_relations(query: &Query) -> Vec<RelationRef> {
    let mut out = Vec::new();
    collect_from_query(query, &mut out);
    out
}

fn collect_from_query(query: &Query, out: &mut Vec<RelationRef>) {
    for operand in &query.projection {
        collect_from_operand(operand, out);
    }
    if let Some(from) = &query.from {
        for item in from.items() {
            match item {
                FromItem::Relation { name, alias, .. } => out.push(RelationRef {
                    name: name.clone(),
                    reference: alias.clone().unwrap_or_else(|| name.clone()),
                }),
                FromItem::Subquery { query, .. } => collect_from_query(query, out),
            }
        }
    }
    if let Some(cond) = &query.selection {
        collect_from_condition(cond, out);
    }
}

fn collect_from_condition(cond: &Condition, out: &mut Vec<RelationRef>) {
    match cond {
        Condition::Comparison { lhs, rhs, .. } => {
            collect_from_operand(lhs, out);
            collect_from_operand(rhs, out);
        }
        Condition::Conjunction { children, .. } => {
            for child in children {
                collect_from_condition(child, out);
            }
        }
        Condition::Between { value, lo, hi, .. } => {
            for operand in [value, lo, hi] {
                collect_from_operand(operand, out);
            }
        }
        Condition::Exists { subquery, .. } => collect_from_query(subquery, out),
        Condition::Membership { lhs, set, .. } => {
            collect_from_operand(lhs, out);
            match set {
                MembershipSet::Subquery(query) => collect_from_query(query, out),
                MembershipSet::List(items) => {
                    for item in items {
                        collect_from_operand(item, out);
                    }
                }
            }
        }
        Condition::Not { inner, .. } => collect_from_condition(inner, out),
        Condition::Unrecognized { .. } => {}
    }
}

fn collect_from_operand(operand: &Operand, out: &mut Vec<RelationRef>) {
    if let Operand::Subquery(query) = operand {
        collect_from_query(query, out);
    }
}

/// Rewrite bare column references with a unique owner to `owner.column`.
/// Literals and computed expressions are never touched.
pub fn rewrite_unqualified(query: &mut Query, columns: &ColumnCatalog) -> ResolveReport {
    let mut report = ResolveReport::default();
    rewrite_query(query, columns, &mut report);
    report
}

fn rewrite_query(query: &mut Query, columns: &ColumnCatalog, report: &mut ResolveReport) {
    for operand in query.projection.iter_mut() {
        rewrite_operand(operand, columns, report);
    }
    if let Some(from) = query.from.as_mut() {
        for item in from.items_mut() {
            if let FromItem::Subquery { query, .. } = item {
                rewrite_query(query, columns, report);
            }
        }
    }
    if let Some(cond) = query.selection.as_mut() {
        rewrite_condition(cond, columns, report);
    }
}

fn rewrite_condition(cond: &mut Condition, columns: &ColumnCatalog, report: &mut ResolveReport) {
    match cond {
        Condition::Comparison { lhs, rhs, .. } => {
            rewrite_operand(lhs, columns, report);
            rewrite_operand(rhs, columns, report);
        }
        Condition::Conjunction { children, .. } => {
            for child in children.iter_mut() {
                rewrite_condition(child, columns, report);
            }
        }
        Condition::Between { value, lo, hi, .. } => {
            for operand in [value, lo, hi] {
                rewrite_operand(operand, columns, report);
            }
        }
        Condition::Exists { subquery, .. } => rewrite_query(subquery, columns, report),
        Condition::Membership { lhs, set, .. } => {
            rewrite_operand(lhs, columns, report);
            match set {
                MembershipSet::Subquery(query) => rewrite_query(query, columns, report),
                MembershipSet::List(items) => {
                    for item in items.iter_mut() {
                        rewrite_operand(item, columns, report);
                    }
                }
            }
        }
        Condition::Not { inner, .. } => rewrite_condition(inner, columns, report),
        Condition::Unrecognized { .. } => {}
    }
}

fn rewrite_operand(operand: &mut Operand, columns: &ColumnCatalog, report: &mut ResolveReport) {
    match operand {
        Operand::Column(name) if !name.contains('.') => match columns.owners(name) {
            [owner] => {
                *name = format!("{}.{}", owner, name);
                report.rewritten += 1;
            }
            [] => {
                report.unknown.insert(name.clone());
            }
            _ => {
                report.ambiguous.insert(name.clone());
            }
        },
        Operand::Subquery(query) => rewrite_query(query, columns, report),
        Operand::Column(_) | Operand::Literal(_) | Operand::Opaque(_) => {}
    }
}
