use crate::Document;

/// Fixed cost charged for every value, including each object key.
pub const VALUE_OVERHEAD: usize = 8;

/// Estimates the serialized footprint of a document.
///
/// This is a heuristic for memory budgeting, not an exact byte count: every
/// value costs [`VALUE_OVERHEAD`], strings add one unit per character, and
/// containers add the estimates of their elements (object keys are charged
/// like string values).
pub fn estimate_size(doc: &Document) -> usize {
    VALUE_OVERHEAD
        + match doc {
            Document::Null | Document::Bool(_) | Document::Number(_) => 0,
            Document::String(s) => s.chars().count(),
            Document::Array(items) => items.iter().map(estimate_size).sum(),
            Document::Object(fields) => fields
                .iter()
                .map(|(key, value)| VALUE_OVERHEAD + key.chars().count() + estimate_size(value))
                .sum(),
        }
}

#[cfg(test)]
mod tests {
    use super::{VALUE_OVERHEAD, estimate_size};
    use crate::Document;

    #[test]
    fn test_scalar_sizes() {
        assert_eq!(estimate_size(&Document::Null), VALUE_OVERHEAD);
        assert_eq!(estimate_size(&Document::from(12345.0)), VALUE_OVERHEAD);
        assert_eq!(estimate_size(&Document::from("héllo")), VALUE_OVERHEAD + 5);
    }

    #[test]
    fn test_nested_sizes() {
        let doc = Document::parse_json(r#"{"id": 1, "tags": ["ab", true]}"#).unwrap();
        let id = VALUE_OVERHEAD + 2 + VALUE_OVERHEAD;
        let tags =
            VALUE_OVERHEAD + 4 + (VALUE_OVERHEAD + (VALUE_OVERHEAD + 2) + VALUE_OVERHEAD);
        assert_eq!(estimate_size(&doc), VALUE_OVERHEAD + id + tags);
    }
}
