//! Windowed row loading for table views.
//!
//! This crate turns an ordered, possibly unbounded result set into a small
//! sliding window of materialized rows that follows a scrolling viewport.
//! Rows are fetched incrementally and asynchronously in both directions
//! from a pivot, and a value can be located by binary search over the rows
//! loaded so far.
//!
//! # Key Components
//!
//! - [`window::BidirectionalRowWindow`] - signed-offset view over the rows
//!   loaded on either side of the pivot.
//! - [`loader::SegmentLoader`] - batched, cancellable loading of one
//!   direction, with at most one request in flight.
//! - [`source::WindowedRowSource`] - plans the queries for both directions
//!   from the table configuration and triggers loads on demand.
//! - [`reframe::ViewportReframer`] - moves the rendered range with the
//!   viewport and decides when to load.
//! - [`seek`] - seek targets and match resolution.
//! - [`viewer::TableViewer`] - ties the above together around one update
//!   channel.
//!
//! Everything runs on a single thread. Loads are spawned on a local
//! executor and report back through [`notify::UpdateEvent`]s, which the
//! owner drains on its own schedule.

pub mod cancel;
pub mod loader;
pub mod notify;
pub mod options;
pub mod reframe;
pub mod seek;
pub mod source;
pub mod viewer;
pub mod window;

#[cfg(test)]
mod tests;

pub use loader::{CANCELLED_MESSAGE, EndState, LoadContext, SegmentLoader};
pub use options::ViewerOptions;
pub use reframe::{RenderedRange, Viewport};
pub use seek::HighlightInfo;
pub use source::{RowOrder, WindowedRowSource};
pub use viewer::TableViewer;
pub use window::BidirectionalRowWindow;
