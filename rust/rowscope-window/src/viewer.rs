use std::rc::Rc;

use futures::{executor::LocalPool, task::LocalSpawn};
use log::{debug, error};
use rowscope_common::{Result, async_runtime::LocalScheduler, error::Error};
use rowscope_document::Document;
use rowscope_query::{Driver, Query, TableId};

use crate::{
    loader::{EndState, LoadContext},
    notify::{UpdateReceiver, update_channel},
    options::ViewerOptions,
    reframe::{Frame, ReframeInput, RenderedRange, RowLayout, Viewport, ViewportReframer},
    seek::{HighlightInfo, SeekingState, SortKey, parse_seek_value},
    source::{RowOrder, WindowedRowSource},
};

/// Upper bound on reframe cycles per refresh. Every cycle either moves an
/// edge of the rendered range or ends the refresh, and edges are bounded by
/// the materialized rows, so this is only reached with huge windows.
const MAX_REFRAME_CYCLES: usize = 1024;

/// End states and the load-more affordance, for rendering status rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewerStatus {
    pub hit_end_low: EndState,
    pub hit_end_high: EndState,
    pub click_to_load_high: bool,
}

/// A scrolling view over one table (or a fixed row list).
///
/// Owns the row source, the viewport and rendered range, any active seek,
/// and the receiving end of the loaders' update channel. Loads progress on
/// the local executor behind the scheduler; [`process_updates`] must be
/// called once they have run to fold their rows into the view.
///
/// [`process_updates`]: TableViewer::process_updates
#[derive(Debug)]
pub struct TableViewer {
    ctx: Option<LoadContext>,
    options: ViewerOptions,
    source: WindowedRowSource,
    reframer: ViewportReframer,
    viewport: Viewport,
    rendered: RenderedRange,
    seeking: Option<SeekingState>,
    /// Seek target held back until the table configuration arrives.
    deferred_seek: Option<Document>,
    updates: UpdateReceiver,
}

impl TableViewer {
    /// Opens a view over `table`, ordered by `order`.
    ///
    /// Nothing is requested until the first [`refresh`](Self::refresh).
    pub fn open(
        driver: Rc<dyn Driver>,
        spawner: impl LocalSpawn + 'static,
        table: TableId,
        order: RowOrder,
        viewport: Viewport,
        options: ViewerOptions,
    ) -> Result<TableViewer> {
        options.validate()?;
        let (notifier, updates) = update_channel();
        let ctx = LoadContext {
            driver,
            scheduler: LocalScheduler::new(spawner),
            notifier,
            batch_size: options.batch_size,
        };
        let source =
            WindowedRowSource::for_table(ctx.clone(), table, order, None, options.mem_budget);
        Ok(TableViewer {
            ctx: Some(ctx),
            reframer: ViewportReframer::uniform(&options),
            options,
            source,
            viewport,
            rendered: RenderedRange::default(),
            seeking: None,
            deferred_seek: None,
            updates,
        })
    }

    /// A view over rows that are already materialized and ordered.
    pub fn fixed(
        rows: Vec<Document>,
        order: RowOrder,
        viewport: Viewport,
        options: ViewerOptions,
    ) -> Result<TableViewer> {
        options.validate()?;
        let (_, updates) = update_channel();
        Ok(TableViewer {
            ctx: None,
            reframer: ViewportReframer::uniform(&options),
            options,
            source: WindowedRowSource::fixed(rows, order),
            viewport,
            rendered: RenderedRange::default(),
            seeking: None,
            deferred_seek: None,
            updates,
        })
    }

    pub fn source(&self) -> &WindowedRowSource {
        &self.source
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn rendered(&self) -> RenderedRange {
        self.rendered
    }

    pub fn seeking(&self) -> Option<&SeekingState> {
        self.seeking.as_ref()
    }

    pub fn highlight(&self) -> Option<HighlightInfo> {
        self.seeking.as_ref().and_then(|seek| seek.highlight)
    }

    /// Clones of the rendered rows with their offsets.
    pub fn rendered_rows(&self) -> Vec<(i64, Document)> {
        let snapshot = self.source.rows_and_offset();
        let window = snapshot.rows();
        (self.rendered.front..self.rendered.back)
            .filter_map(|offset| window.get(offset).map(|row| (offset, row.clone())))
            .collect()
    }

    pub fn status(&self) -> ViewerStatus {
        let snapshot = self.source.rows_and_offset();
        ViewerStatus {
            hit_end_low: snapshot.hit_end_low,
            hit_end_high: snapshot.hit_end_high,
            click_to_load_high: snapshot.click_to_load_high,
        }
    }

    /// Moves the viewport and reframes.
    pub fn scroll(&mut self, viewport: Viewport) -> Result<()> {
        self.viewport = viewport;
        self.refresh()
    }

    /// Folds completed loads into the view. Returns the number of update
    /// notifications that were pending.
    pub fn process_updates(&mut self) -> Result<usize> {
        let events = self.updates.drain();
        if !events.is_empty() {
            debug!("processing {} update notifications", events.len());
            self.refresh()?;
        }
        Ok(events.len())
    }

    /// Runs `pool` and processes updates until no load makes progress.
    pub fn settle(&mut self, pool: &mut LocalPool) -> Result<()> {
        loop {
            pool.run_until_stalled();
            if self.process_updates()? == 0 {
                return Ok(());
            }
        }
    }

    /// Reframes until the rendered range is stable, issuing load requests
    /// along the way.
    pub fn refresh(&mut self) -> Result<()> {
        let configured = !self.source.config_pending();
        if let Some(target) = self.deferred_seek.take_if(|_| configured) {
            return self.seek_to(target);
        }
        for _ in 0..MAX_REFRAME_CYCLES {
            if !self.reframe_once()? {
                return Ok(());
            }
        }
        debug!("reframe did not settle after {MAX_REFRAME_CYCLES} cycles");
        Ok(())
    }

    /// Returns whether the view changed.
    fn reframe_once(&mut self) -> Result<bool> {
        if self.source.is_table_backed() && self.source.config_loaded().is_none() {
            let (front, back) = {
                let snapshot = self.source.rows_and_offset();
                let rows = snapshot.rows();
                (rows.front_offset(), rows.back_offset())
            };
            if front < back {
                error!("rows are materialized but the table configuration is not loaded");
                self.reload_source();
                return Ok(true);
            }
        }

        let frame: Frame = {
            let snapshot = self.source.rows_and_offset();
            let input = ReframeInput {
                rows: snapshot.rows(),
                hit_end_low: snapshot.hit_end_low.is_end(),
                hit_end_high: snapshot.hit_end_high.is_end(),
                click_to_load_high: snapshot.click_to_load_high,
                rendered: self.rendered,
                viewport: self.viewport,
            };
            self.reframer.reframe(&input, self.seeking.as_mut())
        };

        let mut changed = frame.rendered != self.rendered;
        self.rendered = frame.rendered;
        if let Some(highlight) = frame.seek_completed {
            debug!(
                "seek complete: {} rows at offset {}",
                highlight.count, highlight.start
            );
            self.viewport.scroll_top = self.reframer.layout().row_top(highlight.start);
            changed = true;
        }
        self.source.reframe(
            frame.rendered.front,
            frame.load_low,
            frame.rendered.back,
            frame.load_high,
        )?;
        Ok(changed)
    }

    /// Seeks to the rows whose ordering value equals `raw`.
    ///
    /// `raw` is parsed as JSON, falling back to a plain string. When an
    /// index can serve the ordering and the value lies outside the
    /// materialized rows, the row source is replaced by one that starts at
    /// the value. Otherwise the seek proceeds in place, loading more rows
    /// until the match boundaries are known.
    ///
    /// Until the table configuration is known there is no primary key to
    /// compare by, so the seek waits for it. A `null` target never matches,
    /// since null ordering values count as absent.
    pub fn seek(&mut self, raw: &str) -> Result<()> {
        let target = parse_seek_value(raw);
        if self.source.config_pending() {
            debug!("seek to {target} waits for the table configuration");
            self.seeking = None;
            self.deferred_seek = Some(target);
            return self.refresh();
        }
        self.seek_to(target)
    }

    fn seek_to(&mut self, target: Document) -> Result<()> {
        let config = self.source.config_loaded();
        let order = self.source.order().clone();
        let sort = SortKey {
            column: match (&order.column, &config) {
                (Some(column), _) => Some(column.clone()),
                (None, Some(config)) => Some(config.primary_key_path()),
                (None, None) => None,
            },
            direction: order.direction,
        };

        let indexed = match (&config, &sort.column) {
            (Some(config), Some(column)) => config.can_seek(column),
            _ => false,
        };
        let reset = indexed && !self.might_be_materialized(&sort, &target);

        let keyed_source = match (&self.ctx, self.source.table(), config) {
            (Some(ctx), Some(table), Some(config)) if reset => {
                debug!("seeking to {target} through an index");
                let source = WindowedRowSource::for_table(
                    ctx.clone(),
                    table.clone(),
                    order,
                    Some(target.clone()),
                    self.options.mem_budget,
                );
                Some(source.with_config(config))
            }
            _ => {
                debug!("seeking to {target} in place");
                None
            }
        };
        if let Some(source) = keyed_source {
            self.replace_source(source);
        }
        self.seeking = Some(SeekingState::new(target, sort));
        self.refresh()
    }

    fn might_be_materialized(&self, sort: &SortKey, target: &Document) -> bool {
        let snapshot = self.source.rows_and_offset();
        let window = snapshot.rows();
        let first = window.get(window.front_offset());
        let last = window.get(window.back_offset() - 1);
        let below = snapshot.hit_end_low.is_end()
            || first.is_some_and(|row| sort.position(row, target).is_le());
        let above = snapshot.hit_end_high.is_end()
            || last.is_some_and(|row| sort.position(row, target).is_ge());
        below && above
    }

    /// Reorders the view, restarting from the top.
    pub fn set_order(&mut self, order: RowOrder) -> Result<()> {
        let Some(ctx) = &self.ctx else {
            return Err(Error::invalid_operation("set_order on a fixed row source"));
        };
        let Some(table) = self.source.table().cloned() else {
            return Err(Error::invalid_operation("set_order"));
        };
        let mut source =
            WindowedRowSource::for_table(ctx.clone(), table, order, None, self.options.mem_budget);
        if let Some(config) = self.source.config_loaded() {
            source = source.with_config(config);
        }
        self.replace_source(source);
        self.seeking = None;
        self.refresh()
    }

    /// Discards the loaded rows and the cached table configuration, then
    /// loads again around the same pivot. An active seek starts over.
    pub fn reload(&mut self) -> Result<()> {
        self.reload_source();
        self.refresh()
    }

    fn reload_source(&mut self) {
        self.source.reload();
        self.rendered = RenderedRange::default();
        self.viewport.scroll_top = 0.0;
        if let Some(seek) = self.seeking.take() {
            self.seeking = Some(SeekingState::new(seek.target, seek.sort));
        }
    }

    /// Lifts the memory budget on both sides and continues loading.
    pub fn load_more(&mut self) -> Result<()> {
        self.source.unlimit_mem_usage();
        self.refresh()
    }

    /// Abandons in-flight loads. The view keeps the rows it has.
    pub fn cancel(&mut self) {
        self.source.cancel_pending_requests();
    }

    /// Looks up a single row by primary key.
    pub async fn fetch_row(&self, key: Document) -> Result<Option<Document>> {
        let (Some(ctx), Some(table)) = (&self.ctx, self.source.table()) else {
            return Ok(None);
        };
        let query = Query::get(table.clone(), key);
        ctx.driver.run(&query).await?.into_single().await
    }

    fn replace_source(&mut self, source: WindowedRowSource) {
        self.source.cancel_pending_requests();
        self.source = source;
        self.deferred_seek = None;
        self.rendered = RenderedRange::default();
        self.viewport.scroll_top = 0.0;
    }
}
