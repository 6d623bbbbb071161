//! Reserved-shape ("pseudo-typed") documents.
//!
//! The store represents values JSON has no syntax for as objects carrying a
//! `$reql_type$` key: timestamps (`TIME`, with an `epoch_time` field), binary
//! blobs (`BINARY`, with base64 `data`) and geometry (`GEOMETRY`).

use base64::{Engine as _, engine::general_purpose::STANDARD};

use crate::Document;

pub const REQL_TYPE_KEY: &str = "$reql_type$";

pub const TIME_TYPE: &str = "TIME";
pub const BINARY_TYPE: &str = "BINARY";
pub const GEOMETRY_TYPE: &str = "GEOMETRY";

/// A pseudo type that has its own comparison rules.
///
/// Geometry is deliberately absent: it orders as a plain object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparablePseudoType {
    Time,
    Binary,
}

impl ComparablePseudoType {
    pub fn name(self) -> &'static str {
        match self {
            ComparablePseudoType::Time => TIME_TYPE,
            ComparablePseudoType::Binary => BINARY_TYPE,
        }
    }

    /// The kind label used when a pseudo-typed value meets a value of another
    /// kind.
    pub fn label(self) -> &'static str {
        match self {
            ComparablePseudoType::Time => "PTYPE<TIME>",
            ComparablePseudoType::Binary => "PTYPE<BINARY>",
        }
    }
}

impl Document {
    /// Returns the `$reql_type$` name of an object, if present.
    pub fn pseudo_type_name(&self) -> Option<&str> {
        self.get(REQL_TYPE_KEY).and_then(Document::as_str)
    }

    pub fn comparable_pseudo_type(&self) -> Option<ComparablePseudoType> {
        match self.pseudo_type_name()? {
            TIME_TYPE => Some(ComparablePseudoType::Time),
            BINARY_TYPE => Some(ComparablePseudoType::Binary),
            _ => None,
        }
    }

    /// Builds a `TIME` pseudo-typed document.
    pub fn time(epoch_time: f64, timezone: &str) -> Document {
        Document::object([
            (REQL_TYPE_KEY, Document::from(TIME_TYPE)),
            ("epoch_time", Document::from(epoch_time)),
            ("timezone", Document::from(timezone)),
        ])
    }

    /// Builds a `BINARY` pseudo-typed document holding `bytes`.
    pub fn binary(bytes: &[u8]) -> Document {
        Document::object([
            (REQL_TYPE_KEY, Document::from(BINARY_TYPE)),
            ("data", Document::from(STANDARD.encode(bytes))),
        ])
    }

    /// Seconds since the epoch of a `TIME` document. A missing or non-numeric
    /// field reads as zero.
    pub fn epoch_time(&self) -> f64 {
        self.get("epoch_time")
            .and_then(Document::as_f64)
            .unwrap_or(0.0)
    }

    /// Decoded content of a `BINARY` document. Data that is not valid base64
    /// is taken verbatim.
    pub fn binary_content(&self) -> Vec<u8> {
        let data = self.get("data").and_then(Document::as_str).unwrap_or("");
        STANDARD
            .decode(data)
            .unwrap_or_else(|_| data.as_bytes().to_vec())
    }
}
