use rowscope_common::{Result, verify_arg};
use serde::Deserialize;

/// Default per-direction memory budget, in [`estimate_size`] units.
///
/// [`estimate_size`]: rowscope_document::estimate_size
pub const DEFAULT_MEM_BUDGET: usize = 4 * 1024 * 1024;

/// Tuning knobs for loading and windowing.
///
/// Deserializes from a partial JSON object; absent fields keep their
/// defaults:
///
/// ```text
/// { "batch_size": 100, "mem_budget": null, "row_height": 24.0 }
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ViewerOptions {
    /// Maximum number of rows requested from a cursor per load.
    pub batch_size: usize,
    /// Per-direction memory budget. `None` is unlimited.
    pub mem_budget: Option<usize>,
    /// Rows are preloaded this many viewport heights beyond the visible area.
    pub preload_ratio: f64,
    /// Rendered rows further than this many viewport heights from the
    /// visible area are dropped from the rendered range.
    pub kickout_ratio: f64,
    /// Maximum number of rows a rendered-range edge moves per reframe.
    pub render_step: usize,
    /// Height of one rendered row, in the same unit as the viewport.
    pub row_height: f64,
}

impl Default for ViewerOptions {
    fn default() -> Self {
        ViewerOptions {
            batch_size: 60,
            mem_budget: Some(DEFAULT_MEM_BUDGET),
            preload_ratio: 1.0,
            kickout_ratio: 2.0,
            render_step: 60,
            row_height: 24.0,
        }
    }
}

impl ViewerOptions {
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_mem_budget(mut self, mem_budget: Option<usize>) -> Self {
        self.mem_budget = mem_budget;
        self
    }

    pub fn with_preload_ratio(mut self, preload_ratio: f64) -> Self {
        self.preload_ratio = preload_ratio;
        self
    }

    pub fn with_kickout_ratio(mut self, kickout_ratio: f64) -> Self {
        self.kickout_ratio = kickout_ratio;
        self
    }

    pub fn with_render_step(mut self, render_step: usize) -> Self {
        self.render_step = render_step;
        self
    }

    pub fn with_row_height(mut self, row_height: f64) -> Self {
        self.row_height = row_height;
        self
    }

    pub fn validate(&self) -> Result<()> {
        verify_arg!(batch_size, self.batch_size > 0);
        verify_arg!(render_step, self.render_step > 0);
        verify_arg!(row_height, self.row_height > 0.0);
        verify_arg!(preload_ratio, self.preload_ratio >= 0.0);
        verify_arg!(kickout_ratio, self.kickout_ratio >= self.preload_ratio);
        Ok(())
    }
}
