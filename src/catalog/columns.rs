//! Column ownership map.

use std::collections::BTreeMap;

/// Maps a column name to the relations (by reference name) that have it.
/// Owners are kept in insertion order and duplicates are retained, so a
/// relation referenced twice makes its columns ambiguous.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnCatalog {
    owners: BTreeMap<String, Vec<String>>,
}

impl ColumnCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `owner` has a column named `column`.
    pub fn insert(&mut self, column: impl Into<String>, owner: impl Into<String>) {
        self.owners.entry(column.into()).or_default().push(owner.into());
    }

    /// Every owner of `column`.
    pub fn owners(&self, column: &str) -> &[String] {
        self.owners.get(column).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The owner of `column` if there is exactly one.
    pub fn unique_owner(&self, column: &str) -> Option<&str> {
        match self.owners(column) {
            [owner] => Some(owner),
            _ => None,
        }
    }

    /// Number of distinct column names.
    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }
}
