//! Column sources.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::error::{CatalogError, CatalogResult};

/// Something that knows the columns of base relations.
pub trait CatalogProvider {
    /// Column names of `relation`, in definition order. Returns
    /// [`CatalogError::RelationNotFound`] for relations it does not know.
    fn columns_of(&self, relation: &str) -> CatalogResult<Vec<String>>;
}

/// An in-memory `relation -> columns` map.
///
/// Serializes as a plain JSON object:
/// `{"nation": ["n_nationkey", "n_name", "n_regionkey"]}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StaticCatalog {
    tables: BTreeMap<String, Vec<String>>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a relation and its columns.
    pub fn with_table<I, S>(mut self, name: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tables.insert(name.into(), columns.into_iter().map(Into::into).collect());
        self
    }

    /// Parse a catalog from JSON text.
    pub fn from_json(text: &str) -> CatalogResult<Self> {
        let catalog: Self = serde_json::from_str(text)?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Load a catalog from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> CatalogResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Relation names, sorted.
    pub fn relation_names(&self) -> Vec<&str> {
        self.tables.keys().map(String::as_str).collect()
    }

    /// Reject relations that list the same column twice.
    pub fn validate(&self) -> CatalogResult<()> {
        for (relation, columns) in &self.tables {
            let mut seen = std::collections::HashSet::new();
            for column in columns {
                if !seen.insert(column.as_str()) {
                    return Err(CatalogError::DuplicateColumn {
                        relation: relation.clone(),
                        column: column.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

impl CatalogProvider for StaticCatalog {
    fn columns_of(&self, relation: &str) -> CatalogResult<Vec<String>> {
        self.tables
            .get(relation)
            .cloned()
            .ok_or_else(|| CatalogError::RelationNotFound(relation.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        let catalog = StaticCatalog::new()
            .with_table("nation", ["n_nationkey", "n_name"])
            .with_table("region", ["r_regionkey"]);

        assert_eq!(catalog.columns_of("nation").unwrap(), vec!["n_nationkey", "n_name"]);
        assert!(matches!(catalog.columns_of("orders"), Err(CatalogError::RelationNotFound(_))));
        assert_eq!(catalog.relation_names(), vec!["nation", "region"]);
    }

    #[test]
    fn test_from_json() {
        let catalog = StaticCatalog::from_json(r#"{"nation": ["n_nationkey", "n_regionkey"]}"#).unwrap();
        assert_eq!(catalog, StaticCatalog::new().with_table("nation", ["n_nationkey", "n_regionkey"]));

        let dup = StaticCatalog::from_json(r#"{"nation": ["n_name", "n_name"]}"#);
        assert!(matches!(dup, Err(CatalogError::DuplicateColumn { .. })));
        assert!(matches!(StaticCatalog::from_json("[1, 2]"), Err(CatalogError::Json(_))));
    }

    #[test]
    fn test_from_json_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("catalog.json");
        std::fs::write(&path, r#"{"region": ["r_regionkey", "r_name"]}"#).unwrap();

        let catalog = StaticCatalog::from_json_file(&path).unwrap();
        assert_eq!(catalog.columns_of("region").unwrap().len(), 2);
        assert!(matches!(
            StaticCatalog::from_json_file(dir.path().join("missing.json")),
            Err(CatalogError::Io(_))
        ));
    }
}
