//! Relation columns and column qualification.
//!
//! A [`CatalogProvider`] supplies the columns of base relations; the
//! [`ColumnResolver`] uses them to qualify bare column references before
//! the query is matched against a plan.

mod columns;
mod error;
mod provider;
mod resolver;

pub use columns::ColumnCatalog;
pub use error::{CatalogError, CatalogResult};
pub use provider::{CatalogProvider, StaticCatalog};
pub use resolver::{collect_relations, rewrite_unqualified, ColumnResolver, RelationRef, ResolveReport};
