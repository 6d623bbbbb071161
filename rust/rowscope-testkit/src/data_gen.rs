//! Data generation utilities for testing.
//!
//! This module provides functions to generate synthetic tables with a known
//! shape, so that tests can state expected orderings without listing rows.

use std::io::{Seek, SeekFrom, Write};

use rowscope_document::{ColumnPath, Document};
use rowscope_query::TableId;

use crate::{MemoryDriver, MemoryTable};

/// Generates `count` "people" rows with ids `0..count`.
///
/// Each row looks like:
///
/// ```text
/// { "id": 7, "name": "person-00007", "age": 27, "address": { "city": "city-7" } }
/// ```
///
/// - `age` is `20 + (i * 7) % 50`, and is absent for every tenth row
///   (`i % 10 == 0`), which exercises the missing-value tail of orderings.
/// - `address.city` cycles through eight values.
pub fn people(count: usize) -> Vec<Document> {
    (0..count)
        .map(|i| {
            let mut fields = vec![
                ("id", Document::from(i as i64)),
                ("name", Document::from(format!("person-{i:05}"))),
                (
                    "address",
                    Document::object([("city", Document::from(format!("city-{}", i % 8)))]),
                ),
            ];
            if i % 10 != 0 {
                fields.push(("age", Document::from(20 + ((i * 7) % 50) as i64)));
            }
            Document::object(fields)
        })
        .collect()
}

/// A people table keyed by `id`, with a ready index on `age`, a ready index
/// on `address.city` and one index defined by an arbitrary function.
pub fn people_table(count: usize) -> MemoryTable {
    MemoryTable::new("id")
        .with_rows(people(count))
        .with_index("age", ColumnPath::field("age"))
        .with_index("city", ColumnPath::new(["address", "city"]))
        .with_function_index("age_plus_city")
}

/// Rows `{ "id": i, "value": values[i] }`.
pub fn numbers(values: &[i64]) -> Vec<Document> {
    values
        .iter()
        .enumerate()
        .map(|(i, value)| {
            Document::object([
                ("id", Document::from(i as i64)),
                ("value", Document::from(*value)),
            ])
        })
        .collect()
}

/// Creates a driver holding `table` under `test.<name>`.
pub fn driver_with(name: &str, table: MemoryTable) -> (MemoryDriver, TableId) {
    let id = TableId::new("test", name);
    let driver = MemoryDriver::new();
    driver.add_table(id.clone(), table);
    (driver, id)
}

/// Writes `rows` to a temporary file as newline-delimited JSON, positioned
/// at the start of the file.
pub fn write_ndjson(rows: &[Document]) -> anyhow::Result<tempfile::NamedTempFile> {
    let mut file = tempfile::NamedTempFile::new()?;
    for row in rows {
        writeln!(file, "{}", row.to_json_string())?;
    }
    file.seek(SeekFrom::Start(0))?;
    Ok(file)
}

#[cfg(test)]
mod tests {
    use rowscope_document::ColumnPath;

    use super::{people, write_ndjson};

    #[test]
    fn test_people_shape() {
        let rows = people(25);
        assert_eq!(rows.len(), 25);
        let ages = rows
            .iter()
            .filter(|row| ColumnPath::field("age").extract(row).is_some())
            .count();
        assert_eq!(ages, 22);
        assert_eq!(
            ColumnPath::parse("address.city")
                .extract(&rows[9])
                .and_then(|c| c.as_str()),
            Some("city-1")
        );
    }

    #[test]
    fn test_write_ndjson() {
        let file = write_ndjson(&people(3)).unwrap();
        let text = std::fs::read_to_string(file.path()).unwrap();
        assert_eq!(text.lines().count(), 3);
        assert!(text.starts_with(r#"{"address":{"city":"city-0"},"id":0,"name":"person-00000"}"#));
    }
}
