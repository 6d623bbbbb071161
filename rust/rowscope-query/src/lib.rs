//! The query driver contract consumed by the row loading pipeline.
//!
//! Queries are composed as plain values ([`query::Query`], [`query::Expr`])
//! and handed to a [`driver::Driver`] for execution; the driver answers with
//! a cursor or a single document. Table configuration (primary key and
//! secondary index statuses) is fetched through the same driver and parsed by
//! [`table_config`]; [`index_def`] recovers the indexed field chain from an
//! index's textual definition.

pub mod driver;
pub mod index_def;
pub mod query;
pub mod table_config;

pub use driver::{Cursor, Driver, QueryResult};
pub use query::{BoundKind, CompareOp, Direction, Expr, Key, KeyRange, OrderKey, Query, TableId};
pub use table_config::{IndexStatus, TableConfig};
