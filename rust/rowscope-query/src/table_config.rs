use rowscope_common::{Result, error::Error};
use rowscope_document::{ColumnPath, Document};
use serde::Deserialize;

use crate::index_def::parse_index_definition;

/// Status of one secondary index as reported by the store.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IndexStatus {
    #[serde(rename = "index")]
    pub name: String,
    #[serde(default)]
    pub ready: bool,
    #[serde(default)]
    pub geo: bool,
    #[serde(default)]
    pub multi: bool,
    #[serde(default)]
    pub outdated: bool,
    /// Source text of the index function.
    #[serde(rename = "query", default)]
    pub definition: String,
}

impl IndexStatus {
    /// The field chain the index extracts, if its definition is a plain field
    /// chain.
    pub fn indexed_path(&self) -> Option<ColumnPath> {
        parse_index_definition(&self.definition)
    }

    /// Whether range scans on this index return every row with a value in
    /// the range, in index order.
    pub fn is_usable_for_ordering(&self) -> bool {
        self.ready && !self.geo && !self.multi && !self.outdated
    }
}

/// Table configuration needed to plan ordered scans.
///
/// Expected shape:
///
/// ```text
/// {
///   "primary_key": "id",
///   "indexes": [
///     { "index": "age", "ready": true, "geo": false, "multi": false,
///       "outdated": false,
///       "query": "indexCreate('age', function(_var1) { return _var1(\"age\"); })" }
///   ]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TableConfig {
    pub primary_key: String,
    #[serde(default)]
    pub indexes: Vec<IndexStatus>,
}

impl TableConfig {
    /// Validates and converts a raw configuration document.
    pub fn from_document(doc: &Document) -> Result<TableConfig> {
        let config: TableConfig = serde_json::from_value(serde_json::Value::from(doc))
            .map_err(|e| Error::invalid_format("table configuration", e.to_string()))?;
        if config.primary_key.is_empty() {
            return Err(Error::invalid_format(
                "table configuration",
                "empty primary key",
            ));
        }
        Ok(config)
    }

    pub fn primary_key_path(&self) -> ColumnPath {
        ColumnPath::field(self.primary_key.as_str())
    }

    pub fn is_primary_key(&self, path: &ColumnPath) -> bool {
        path.is_field(&self.primary_key)
    }

    /// Returns the first index whose definition extracts exactly `path`.
    /// Indexes defined by arbitrary functions are skipped.
    pub fn find_index(&self, path: &ColumnPath) -> Option<&IndexStatus> {
        self.indexes
            .iter()
            .find(|status| status.indexed_path().as_ref() == Some(path))
    }

    /// Returns the index to scan when ordering by `path`, if one can serve it.
    /// Unusable indexes on the same path are skipped, whatever their position.
    pub fn ordering_index(&self, path: &ColumnPath) -> Option<&IndexStatus> {
        self.indexes.iter().find(|status| {
            status.is_usable_for_ordering() && status.indexed_path().as_ref() == Some(path)
        })
    }

    /// Whether an ordered range scan on `path` is available, either through
    /// the primary key or a usable secondary index.
    pub fn can_seek(&self, path: &ColumnPath) -> bool {
        self.is_primary_key(path) || self.ordering_index(path).is_some()
    }
}
