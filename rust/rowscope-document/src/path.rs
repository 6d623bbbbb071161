use crate::Document;

/// A chain of field names addressing a (possibly nested) column.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnPath(Vec<String>);

impl ColumnPath {
    pub fn new<S: Into<String>>(fields: impl IntoIterator<Item = S>) -> ColumnPath {
        ColumnPath(fields.into_iter().map(Into::into).collect())
    }

    /// A path consisting of a single top-level field.
    pub fn field(name: impl Into<String>) -> ColumnPath {
        ColumnPath(vec![name.into()])
    }

    /// Splits a dotted column name (`"address.city"`) into its fields.
    pub fn parse(dotted: &str) -> ColumnPath {
        ColumnPath::new(dotted.split('.'))
    }

    pub fn fields(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns `true` if the path is exactly the single top-level field `name`.
    pub fn is_field(&self, name: &str) -> bool {
        self.0.len() == 1 && self.0[0] == name
    }

    /// Follows the path through nested objects.
    ///
    /// Returns `None` when a field is absent or an intermediate value is not an
    /// object.
    pub fn extract<'a>(&self, doc: &'a Document) -> Option<&'a Document> {
        self.0
            .iter()
            .try_fold(doc, |current, field| current.get(field))
    }
}

impl std::fmt::Display for ColumnPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0.join("."))
    }
}
