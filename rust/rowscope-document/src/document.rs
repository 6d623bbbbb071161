use std::collections::BTreeMap;

use rowscope_common::{Result, error::Error};

/// A semi-structured value.
///
/// Objects keep their keys in a `BTreeMap`: key order carries no meaning, and
/// a sorted map gives the comparator its key-sorted flattening for free (byte
/// order of UTF-8 strings equals code point order).
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Document {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<Document>),
    Object(BTreeMap<String, Document>),
}

impl Document {
    /// Parses a JSON text into a document.
    pub fn parse_json(text: &str) -> Result<Document> {
        let value: serde_json::Value =
            serde_json::from_str(text).map_err(|e| Error::json("document", e))?;
        Ok(Document::from(value))
    }

    /// Builds an object document from `(key, value)` pairs.
    pub fn object<K, I>(fields: I) -> Document
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Document)>,
    {
        Document::Object(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Document::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Document::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Document::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Document::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Document]> {
        match self {
            Document::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&BTreeMap<String, Document>> {
        match self {
            Document::Object(fields) => Some(fields),
            _ => None,
        }
    }

    /// Returns the value of `key` if this is an object containing it.
    pub fn get(&self, key: &str) -> Option<&Document> {
        self.as_object().and_then(|fields| fields.get(key))
    }

    /// Serializes the document as compact JSON.
    pub fn to_json_string(&self) -> String {
        serde_json::Value::from(self).to_string()
    }
}

impl From<serde_json::Value> for Document {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Document::Null,
            serde_json::Value::Bool(b) => Document::Bool(b),
            serde_json::Value::Number(n) => Document::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Document::String(s),
            serde_json::Value::Array(items) => {
                Document::Array(items.into_iter().map(Document::from).collect())
            }
            serde_json::Value::Object(fields) => Document::Object(
                fields
                    .into_iter()
                    .map(|(k, v)| (k, Document::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<&Document> for serde_json::Value {
    fn from(doc: &Document) -> Self {
        match doc {
            Document::Null => serde_json::Value::Null,
            Document::Bool(b) => serde_json::Value::Bool(*b),
            Document::Number(n) => number_to_json(*n),
            Document::String(s) => serde_json::Value::String(s.clone()),
            Document::Array(items) => {
                serde_json::Value::Array(items.iter().map(serde_json::Value::from).collect())
            }
            Document::Object(fields) => serde_json::Value::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), serde_json::Value::from(v)))
                    .collect(),
            ),
        }
    }
}

/// Integral values within the exactly representable range print without a
/// fractional part, matching what the store sends over the wire.
fn number_to_json(n: f64) -> serde_json::Value {
    const MAX_EXACT: f64 = 9_007_199_254_740_992.0;
    if n.fract() == 0.0 && n.abs() <= MAX_EXACT {
        serde_json::Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null)
    }
}

impl std::fmt::Display for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_json_string())
    }
}

impl From<bool> for Document {
    fn from(b: bool) -> Self {
        Document::Bool(b)
    }
}

impl From<f64> for Document {
    fn from(n: f64) -> Self {
        Document::Number(n)
    }
}

impl From<i64> for Document {
    fn from(n: i64) -> Self {
        Document::Number(n as f64)
    }
}

impl From<i32> for Document {
    fn from(n: i32) -> Self {
        Document::Number(n as f64)
    }
}

impl From<&str> for Document {
    fn from(s: &str) -> Self {
        Document::String(s.to_string())
    }
}

impl From<String> for Document {
    fn from(s: String) -> Self {
        Document::String(s)
    }
}

impl From<Vec<Document>> for Document {
    fn from(items: Vec<Document>) -> Self {
        Document::Array(items)
    }
}

#[cfg(test)]
mod tests {
    use super::Document;

    #[test]
    fn test_parse_json_object() {
        let doc = Document::parse_json(r#"{"id": 7, "name": "ada", "tags": ["x", null]}"#).unwrap();
        assert_eq!(doc.get("id"), Some(&Document::Number(7.0)));
        assert_eq!(doc.get("name").and_then(Document::as_str), Some("ada"));
        assert_eq!(
            doc.get("tags").and_then(Document::as_array).map(|a| a.len()),
            Some(2)
        );
        assert!(doc.get("missing").is_none());
    }

    #[test]
    fn test_parse_json_rejects_garbage() {
        assert!(Document::parse_json("{not json").is_err());
    }

    #[test]
    fn test_display_is_compact_json() {
        let doc = Document::object([
            ("b", Document::from(1.5)),
            ("a", Document::from(2)),
            ("c", Document::from("x")),
        ]);
        assert_eq!(doc.to_string(), r#"{"a":2,"b":1.5,"c":"x"}"#);
    }
}
