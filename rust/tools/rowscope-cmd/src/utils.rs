//! Common utilities for rowscope-cmd

use anyhow::{Context, Result};
use rowscope_document::{ColumnPath, Document};
use std::path::Path;

/// Checks if a file exists and is readable
pub fn validate_file_exists(path: &str) -> Result<()> {
    let file_path = Path::new(path);
    if !file_path.exists() {
        anyhow::bail!("File does not exist: {}", path);
    }
    if !file_path.is_file() {
        anyhow::bail!("Path is not a file: {}", path);
    }
    Ok(())
}

/// Reads table rows from a file holding either one JSON array or one JSON
/// document per line.
pub fn read_rows(path: &str) -> Result<Vec<Document>> {
    let text = std::fs::read_to_string(path).with_context(|| format!("Failed to read {path}"))?;
    if text.trim_start().starts_with('[') {
        let doc = Document::parse_json(&text)
            .with_context(|| format!("Failed to parse JSON array in {path}"))?;
        return match doc {
            Document::Array(rows) => Ok(rows),
            _ => anyhow::bail!("Expected a JSON array in {path}"),
        };
    }

    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            Document::parse_json(line).with_context(|| format!("{path}:{}: invalid JSON", i + 1))
        })
        .collect()
}

/// Parses an index argument of the form `name=dotted.path`. A bare path
/// names the index after the path.
pub fn parse_index_arg(arg: &str) -> Result<(String, ColumnPath)> {
    let (name, path) = arg.split_once('=').unwrap_or((arg, arg));
    if name.is_empty() || path.is_empty() {
        anyhow::bail!("Invalid index argument: {arg:?}");
    }
    Ok((name.to_string(), ColumnPath::parse(path)))
}
