//! In-memory query driver and data generators.
//!
//! [`memory_driver::MemoryDriver`] evaluates [`rowscope_query::Query`] values
//! against tables held in memory, with the same ordering and index semantics
//! the row loading pipeline expects from a real store. It can also pause
//! requests and inject failures, which is what the loader and row source
//! tests are built on.

pub mod data_gen;
mod eval;
pub mod memory_driver;

pub use memory_driver::{MemoryDriver, MemoryTable};
