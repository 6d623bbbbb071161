//! Semi-structured documents as returned by the query driver, together with
//! the total ordering the backing store applies to them.
//!
//! # Key Components
//!
//! - [`Document`] - the recursive value type (null, bool, number, string,
//!   array, object), convertible to and from `serde_json::Value`.
//! - [`pseudo`] - recognition of reserved-shape objects (`TIME`, `BINARY`,
//!   `GEOMETRY`) that stand in for values JSON cannot express natively.
//! - [`compare`] - the document comparator. Rows returned by an ordered index
//!   scan are already sorted under this ordering, which is what allows binary
//!   searches over partially loaded result sets.
//! - [`size`] - a heuristic footprint estimate used for memory budgeting.
//! - [`path`] - column paths (chains of field names) and field extraction.

pub mod compare;
pub mod document;
pub mod path;
pub mod pseudo;
pub mod size;

pub use compare::{compare, compare_optional};
pub use document::Document;
pub use path::ColumnPath;
pub use size::estimate_size;
