//! Core definitions (errors, results and local task spawning), relied upon by all
//! rowscope-* crates.

pub mod async_runtime;
pub mod error;
pub mod result;

pub use result::Result;
