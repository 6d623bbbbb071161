//! Viewport-driven windowing.
//!
//! The rendered range `[front, back)` is the part of the materialized rows
//! handed to the renderer. Each reframe cycle moves its edges toward the
//! viewport with hysteresis: an edge grows once it comes within
//! `preload_ratio` viewport heights of the visible area, and shrinks only
//! once rows are more than `kickout_ratio` heights away. Edges move at most
//! `render_step` rows per cycle, so a large jump settles over several
//! cycles instead of rendering (or loading) everything at once.

use rowscope_document::Document;

use crate::{
    options::ViewerOptions,
    seek::{HighlightInfo, SeekPhase, SeekResolution, SeekingState, resolve_seek},
    window::BidirectionalRowWindow,
};

/// Returns the smallest `i` in `[lo, hi]` for which `pred(i)` holds.
///
/// `pred` must be monotonic (false, then true) over the range and is
/// assumed true at `hi`, which is returned when it holds nowhere below.
/// Works for negative bounds.
pub fn binary_search(mut lo: i64, mut hi: i64, pred: impl Fn(i64) -> bool) -> i64 {
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        if pred(mid) {
            hi = mid;
        } else {
            lo = mid + 1;
        }
    }
    lo
}

/// The visible area, in the coordinate space of [`RowLayout`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub scroll_top: f64,
    pub height: f64,
}

impl Viewport {
    pub fn new(scroll_top: f64, height: f64) -> Viewport {
        Viewport { scroll_top, height }
    }
}

/// Vertical positions of rows. Offset 0 starts at position 0, and
/// positions increase with the offset.
pub trait RowLayout {
    fn row_top(&self, offset: i64) -> f64;

    fn row_bottom(&self, offset: i64) -> f64 {
        self.row_top(offset + 1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UniformRowLayout {
    pub row_height: f64,
}

impl RowLayout for UniformRowLayout {
    fn row_top(&self, offset: i64) -> f64 {
        offset as f64 * self.row_height
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderedRange {
    pub front: i64,
    pub back: i64,
}

impl RenderedRange {
    pub fn new(front: i64, back: i64) -> RenderedRange {
        RenderedRange { front, back }
    }

    pub fn len(&self) -> usize {
        (self.back - self.front).max(0) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.back <= self.front
    }
}

/// What a reframe cycle looks at.
#[derive(Debug, Clone, Copy)]
pub struct ReframeInput<'a> {
    pub rows: BidirectionalRowWindow<'a, Document>,
    pub hit_end_low: bool,
    pub hit_end_high: bool,
    pub click_to_load_high: bool,
    pub rendered: RenderedRange,
    pub viewport: Viewport,
}

/// What a reframe cycle decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    pub rendered: RenderedRange,
    pub load_low: bool,
    pub load_high: bool,
    /// Set on the cycle in which a seek completes.
    pub seek_completed: Option<HighlightInfo>,
}

#[derive(Debug, Clone)]
pub struct ViewportReframer<L = UniformRowLayout> {
    layout: L,
    preload_ratio: f64,
    kickout_ratio: f64,
    render_step: i64,
}

impl ViewportReframer<UniformRowLayout> {
    pub fn uniform(options: &ViewerOptions) -> Self {
        ViewportReframer::new(
            UniformRowLayout {
                row_height: options.row_height,
            },
            options,
        )
    }
}

impl<L: RowLayout> ViewportReframer<L> {
    pub fn new(layout: L, options: &ViewerOptions) -> Self {
        ViewportReframer {
            layout,
            preload_ratio: options.preload_ratio,
            kickout_ratio: options.kickout_ratio,
            render_step: options.render_step.max(1) as i64,
        }
    }

    pub fn layout(&self) -> &L {
        &self.layout
    }

    /// Runs one cycle: moves the rendered range toward the viewport, decides
    /// which sides need more rows, and advances an in-progress seek.
    ///
    /// While a seek is in progress its needs replace the geometric load
    /// decisions. When it completes, the rendered range immediately covers
    /// the highlighted rows.
    pub fn reframe(
        &self,
        input: &ReframeInput<'_>,
        seeking: Option<&mut SeekingState>,
    ) -> Frame {
        let layout = &self.layout;
        let step = self.render_step;
        let window_front = input.rows.front_offset();
        let window_back = input.rows.back_offset();
        let front = input.rendered.front.clamp(window_front, window_back);
        let back = input.rendered.back.clamp(front, window_back);

        let Viewport { scroll_top, height } = input.viewport;
        let preload_top = scroll_top - self.preload_ratio * height;
        let preload_bottom = scroll_top + height + self.preload_ratio * height;
        let kickout_top = scroll_top - self.kickout_ratio * height;
        let kickout_bottom = scroll_top + height + self.kickout_ratio * height;

        let mut new_front = if layout.row_top(front) > preload_top {
            binary_search((front - step).max(window_front), front, |i| {
                layout.row_bottom(i) > preload_top
            })
        } else {
            binary_search(front, (front + step).min(back), |i| {
                layout.row_bottom(i) > kickout_top
            })
        };
        let mut new_back = if layout.row_top(back) < preload_bottom {
            binary_search(back, (back + step).min(window_back), |i| {
                layout.row_top(i) >= preload_bottom
            })
        } else {
            binary_search((back - step).max(new_front), back, |i| {
                layout.row_top(i) >= kickout_bottom
            })
        };

        let mut load_low = new_front == window_front
            && layout.row_top(window_front) > preload_top
            && !input.hit_end_low;
        let mut load_high = new_back == window_back
            && layout.row_top(window_back) < preload_bottom
            && !input.hit_end_high
            && !input.click_to_load_high;

        let mut seek_completed = None;
        if let Some(seek) = seeking.filter(|seek| seek.phase == SeekPhase::InProgress) {
            match resolve_seek(
                &input.rows,
                input.hit_end_low,
                input.hit_end_high,
                &seek.sort,
                &seek.target,
            ) {
                SeekResolution::Found(highlight) => {
                    seek.phase = SeekPhase::Complete;
                    seek.highlight = Some(highlight);
                    seek_completed = Some(highlight);
                    if highlight.start <= new_back && highlight.end() >= new_front {
                        new_front = new_front.min(highlight.start);
                        new_back = new_back.max(highlight.end());
                    } else {
                        new_front = highlight.start;
                        new_back = highlight.end();
                    }
                }
                SeekResolution::Pending {
                    need_low,
                    need_high,
                } => {
                    load_low = need_low;
                    load_high = need_high;
                }
            }
        }

        Frame {
            rendered: RenderedRange::new(new_front, new_back),
            load_low,
            load_high,
            seek_completed,
        }
    }
}

#[cfg(test)]
mod tests {
    use rowscope_document::Document;
    use rowscope_query::Direction;

    use super::{Frame, ReframeInput, RenderedRange, Viewport, ViewportReframer, binary_search};
    use crate::{
        options::ViewerOptions,
        seek::{HighlightInfo, SeekPhase, SeekingState, SortKey},
        window::BidirectionalRowWindow,
    };

    fn reframer() -> ViewportReframer {
        ViewportReframer::uniform(
            &ViewerOptions::default()
                .with_row_height(10.0)
                .with_render_step(20),
        )
    }

    fn numbers(count: i64) -> Vec<Document> {
        (0..count).map(Document::from).collect()
    }

    fn input<'a>(
        before: &'a [Document],
        after: &'a [Document],
        rendered: RenderedRange,
        scroll_top: f64,
    ) -> ReframeInput<'a> {
        ReframeInput {
            rows: BidirectionalRowWindow::new(before, after),
            hit_end_low: true,
            hit_end_high: false,
            click_to_load_high: false,
            rendered,
            viewport: Viewport::new(scroll_top, 100.0),
        }
    }

    #[test]
    fn test_binary_search() {
        assert_eq!(binary_search(0, 10, |i| i >= 4), 4);
        assert_eq!(binary_search(-10, 10, |i| i >= -3), -3);
        assert_eq!(binary_search(-5, -1, |_| false), -1);
        assert_eq!(binary_search(-5, 5, |_| true), -5);
        assert_eq!(binary_search(3, 3, |_| false), 3);
    }

    #[test]
    fn test_initial_frame_grows_by_step_and_requests_rows() {
        let after = numbers(100);
        let initial = input(&[], &after, RenderedRange::default(), 0.0);
        let frame = reframer().reframe(&initial, None);
        // Preload reaches 200 units below the viewport top: 20 rows of 10,
        // which is also the step.
        assert_eq!(frame.rendered, RenderedRange::new(0, 20));
        assert!(!frame.load_low);
        assert!(!frame.load_high);

        let short = numbers(5);
        let initial = input(&[], &short, RenderedRange::default(), 0.0);
        let frame = reframer().reframe(&initial, None);
        assert_eq!(frame.rendered, RenderedRange::new(0, 5));
        assert!(frame.load_high);
    }

    #[test]
    fn test_scrolling_down_kicks_out_rows_with_hysteresis() {
        let after = numbers(200);
        let rendered = RenderedRange::new(0, 40);
        // Viewport at rows 25..35: preload covers 15..45, kickout 5..55.
        let frame = reframer().reframe(&input(&[], &after, rendered, 250.0), None);
        assert_eq!(frame.rendered, RenderedRange::new(5, 45));

        // Within the kickout margin nothing is dropped.
        let near = input(&[], &after, RenderedRange::new(0, 40), 120.0);
        let frame = reframer().reframe(&near, None);
        assert_eq!(frame.rendered.front, 0);
    }

    #[test]
    fn test_step_bounds_each_cycle() {
        let after = numbers(1000);
        let mut rendered = RenderedRange::new(0, 20);
        let mut cycles = 0;
        loop {
            let frame: Frame = reframer().reframe(&input(&[], &after, rendered, 5000.0), None);
            assert!(frame.rendered.back - rendered.back <= 20);
            assert!(frame.rendered.front - rendered.front <= 20);
            if frame.rendered == rendered {
                break;
            }
            rendered = frame.rendered;
            cycles += 1;
        }
        assert!(cycles > 10);
        // Viewport at rows 500..510: kickout keeps 480.., preload ends at 520.
        assert_eq!(rendered, RenderedRange::new(480, 520));
    }

    #[test]
    fn test_low_side_extends_into_negative_offsets() {
        let before = numbers(50);
        let after = numbers(50);
        let mut input = input(&before, &after, RenderedRange::new(0, 20), 0.0);
        input.hit_end_low = false;
        let frame = reframer().reframe(&input, None);
        assert_eq!(frame.rendered, RenderedRange::new(-10, 20));
        assert!(!frame.load_low);
    }

    #[test]
    fn test_seek_overrides_loads_and_widens_on_completion() {
        let after: Vec<Document> = [1, 3, 3, 5].into_iter().map(Document::from).collect();
        let mut seeking = SeekingState::new(
            Document::from(5),
            SortKey {
                column: None,
                direction: Direction::Ascending,
            },
        );

        let mut pending = input(&[], &after, RenderedRange::new(0, 0), 0.0);
        pending.hit_end_low = false;
        let frame = reframer().reframe(&pending, Some(&mut seeking));
        assert!(frame.load_high);
        assert!(!frame.load_low);
        assert_eq!(frame.seek_completed, None);
        assert_eq!(seeking.phase, SeekPhase::InProgress);

        let mut done = pending;
        done.hit_end_high = true;
        let frame = reframer().reframe(&done, Some(&mut seeking));
        let highlight = HighlightInfo { start: 3, count: 1 };
        assert_eq!(frame.seek_completed, Some(highlight));
        assert_eq!(seeking.highlight, Some(highlight));
        assert!(frame.rendered.front <= 3 && frame.rendered.back >= 4);

        // A completed seek no longer drives loading.
        let frame = reframer().reframe(&done, Some(&mut seeking));
        assert_eq!(frame.seek_completed, None);
    }
}
