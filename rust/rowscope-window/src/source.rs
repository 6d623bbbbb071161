//! A table's rows in a given order, loaded outward from a pivot.
//!
//! [`WindowedRowSource`] owns two [`SegmentLoader`]s. The high loader
//! produces offsets `0, 1, 2, ...` in the requested order, starting at the
//! seek key (inclusive) if there is one. The low loader produces offsets
//! `-1, -2, ...` by scanning the opposite way from the seek key (exclusive).
//! Without a seek key the pivot is the start of the table and the low side
//! is empty.
//!
//! Loaders can only be planned once the table configuration (primary key
//! and secondary indexes) is known. Until then each side is an
//! [`DirectionLoader::Unconfigured`] spec, and the configuration is fetched
//! on the first [`reframe`](WindowedRowSource::reframe).

use std::{
    cell::{Ref, RefCell},
    rc::Rc,
};

use log::{debug, error, warn};
use rowscope_common::{Result, error::Error};
use rowscope_document::{ColumnPath, Document};
use rowscope_query::{
    BoundKind, CompareOp, Direction, Expr, KeyRange, OrderKey, Query, TableConfig, TableId,
};

use crate::{
    cancel::CancellationToken,
    loader::{CANCELLED_MESSAGE, EndState, LoadContext, SegmentLoader},
    notify::{LoadSide, UpdateEvent},
    window::BidirectionalRowWindow,
};

/// The ordering rows are presented in.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RowOrder {
    /// Column to order by. `None` orders by the primary key.
    pub column: Option<ColumnPath>,
    pub direction: Direction,
}

impl RowOrder {
    pub fn by_primary_key(direction: Direction) -> RowOrder {
        RowOrder {
            column: None,
            direction,
        }
    }

    pub fn by_column(column: ColumnPath, direction: Direction) -> RowOrder {
        RowOrder {
            column: Some(column),
            direction,
        }
    }

    /// The column actually ordered by under `config`.
    pub fn resolved_column(&self, config: &TableConfig) -> ColumnPath {
        self.column
            .clone()
            .unwrap_or_else(|| config.primary_key_path())
    }
}

/// Parameters of a loader whose queries cannot be planned yet.
#[derive(Debug, Clone, PartialEq)]
pub struct PreloaderSpec {
    pub side: LoadSide,
    /// Scan direction of this side, relative to the key.
    pub scan: Direction,
    pub key: Option<Document>,
    pub bound: BoundKind,
    pub mem_budget: Option<usize>,
}

#[derive(Debug)]
pub enum DirectionLoader {
    Unconfigured(PreloaderSpec),
    Active(SegmentLoader),
}

impl DirectionLoader {
    fn active(&self) -> Option<&SegmentLoader> {
        match self {
            DirectionLoader::Active(loader) => Some(loader),
            DirectionLoader::Unconfigured(_) => None,
        }
    }

    fn trigger_load(&self) {
        if let Some(loader) = self.active() {
            loader.trigger_load();
        }
    }

    fn hit_end(&self) -> EndState {
        self.active()
            .map_or(EndState::NotYet, SegmentLoader::hit_end)
    }

    fn rows(&self) -> Option<Ref<'_, [Document]>> {
        self.active().map(SegmentLoader::rows)
    }
}

#[derive(Debug, Clone)]
enum ConfigState {
    NotRequested,
    Loading,
    Ready(Rc<TableConfig>),
    /// The driver could not produce a configuration.
    Unavailable(String),
    /// The driver produced something that is not a table configuration.
    Malformed(String),
}

#[derive(Debug)]
struct TableBacking {
    table: TableId,
    ctx: LoadContext,
    config: Rc<RefCell<ConfigState>>,
    config_token: CancellationToken,
    /// Pivot and budget the source was opened with, for [`WindowedRowSource::reload`].
    seek_key: Option<Document>,
    mem_budget: Option<usize>,
}

impl TableBacking {
    fn request_config(&self) {
        *self.config.borrow_mut() = ConfigState::Loading;
        debug!("loading table configuration for {}", self.table);

        let driver = self.ctx.driver.clone();
        let notifier = self.ctx.notifier.clone();
        let table = self.table.clone();
        let state = self.config.clone();
        let token = self.config_token.clone();
        let task = async move {
            let result = driver.table_config(&table).await;
            if token.is_cancelled() {
                return;
            }
            let next = match result {
                Ok(doc) => match TableConfig::from_document(&doc) {
                    Ok(config) => ConfigState::Ready(Rc::new(config)),
                    Err(e) => {
                        error!("malformed table configuration for {table}: {e}");
                        ConfigState::Malformed(e.to_string())
                    }
                },
                Err(e) => {
                    warn!("table configuration for {table} unavailable: {e}");
                    ConfigState::Unavailable(e.to_string())
                }
            };
            *state.borrow_mut() = next;
            notifier.notify(UpdateEvent::Configured);
        };
        if let Err(e) = self.ctx.scheduler.spawn(task) {
            *self.config.borrow_mut() = ConfigState::Unavailable(e.to_string());
        }
    }
}

/// Snapshot of a row source's rows and end states.
pub struct RowsAndOffset<'a> {
    low: Option<Ref<'a, [Document]>>,
    high: Option<Ref<'a, [Document]>>,
    pub hit_end_low: EndState,
    pub hit_end_high: EndState,
    /// The high side stopped at its memory budget and needs an explicit
    /// request to continue.
    pub click_to_load_high: bool,
}

impl RowsAndOffset<'_> {
    pub fn rows(&self) -> BidirectionalRowWindow<'_, Document> {
        BidirectionalRowWindow::new(
            self.low.as_deref().unwrap_or(&[]),
            self.high.as_deref().unwrap_or(&[]),
        )
    }
}

/// Rows of a table (or a fixed row list) in a given order, materialized
/// on demand around a pivot.
#[derive(Debug)]
pub struct WindowedRowSource {
    backing: Option<TableBacking>,
    order: RowOrder,
    low: DirectionLoader,
    high: DirectionLoader,
}

impl WindowedRowSource {
    /// A row source over `table`, pivoting at `seek_key` in the ordering
    /// column, or at the start of the table when there is no key.
    pub fn for_table(
        ctx: LoadContext,
        table: TableId,
        order: RowOrder,
        seek_key: Option<Document>,
        mem_budget: Option<usize>,
    ) -> WindowedRowSource {
        let (low, high) = unconfigured_loaders(&order, seek_key.as_ref(), mem_budget);
        WindowedRowSource {
            backing: Some(TableBacking {
                table,
                ctx,
                config: Rc::new(RefCell::new(ConfigState::NotRequested)),
                config_token: CancellationToken::new(),
                seek_key,
                mem_budget,
            }),
            order,
            low,
            high,
        }
    }

    /// Seeds the configuration cache, skipping the configuration request.
    pub fn with_config(self, config: Rc<TableConfig>) -> WindowedRowSource {
        if let Some(backing) = &self.backing {
            *backing.config.borrow_mut() = ConfigState::Ready(config);
        }
        self
    }

    /// A row source over rows that are already materialized, in order.
    /// Both sides are terminal from the start.
    pub fn fixed(rows: Vec<Document>, order: RowOrder) -> WindowedRowSource {
        WindowedRowSource {
            backing: None,
            order,
            low: DirectionLoader::Active(SegmentLoader::fixed(Vec::new())),
            high: DirectionLoader::Active(SegmentLoader::fixed(rows)),
        }
    }

    pub fn order(&self) -> &RowOrder {
        &self.order
    }

    pub fn table(&self) -> Option<&TableId> {
        self.backing.as_ref().map(|backing| &backing.table)
    }

    pub fn is_table_backed(&self) -> bool {
        self.backing.is_some()
    }

    pub fn low_loader(&self) -> &DirectionLoader {
        &self.low
    }

    pub fn high_loader(&self) -> &DirectionLoader {
        &self.high
    }

    /// The table configuration, once loaded.
    pub fn config_loaded(&self) -> Option<Rc<TableConfig>> {
        let backing = self.backing.as_ref()?;
        match &*backing.config.borrow() {
            ConfigState::Ready(config) => Some(config.clone()),
            _ => None,
        }
    }

    /// Whether the table configuration has not arrived yet. Settled
    /// failures do not count as pending.
    pub fn config_pending(&self) -> bool {
        self.backing.as_ref().is_some_and(|backing| {
            matches!(
                *backing.config.borrow(),
                ConfigState::NotRequested | ConfigState::Loading
            )
        })
    }

    /// Drops the loaded rows and the cached configuration, and starts over
    /// from the original pivot. The configuration is requested again
    /// immediately. Fixed sources are left as they are.
    pub fn reload(&mut self) {
        let Some(backing) = &mut self.backing else {
            return;
        };
        debug!("reloading {}", backing.table);
        backing.config_token.cancel();
        backing.config_token = CancellationToken::new();
        for side in [&mut self.low, &mut self.high] {
            if let DirectionLoader::Active(loader) = side {
                loader.cancel_pending_requests();
            }
        }
        let (low, high) =
            unconfigured_loaders(&self.order, backing.seek_key.as_ref(), backing.mem_budget);
        self.low = low;
        self.high = high;
        backing.request_config();
    }

    /// Requests rows so that offsets `low..high` can be materialized.
    ///
    /// The low loader is triggered if `low` lies below the materialized
    /// rows or `scroll_low` is set, and symmetrically for the high loader.
    /// While the table configuration is loading this only makes sure the
    /// request is in flight. A malformed configuration is returned as an
    /// error from every call.
    pub fn reframe(
        &mut self,
        low: i64,
        scroll_low: bool,
        high: i64,
        scroll_high: bool,
    ) -> Result<()> {
        if let Some(backing) = &self.backing {
            let state = backing.config.borrow().clone();
            match state {
                ConfigState::NotRequested => {
                    backing.request_config();
                    return Ok(());
                }
                ConfigState::Loading => return Ok(()),
                ConfigState::Malformed(message) => {
                    return Err(Error::invalid_format("table configuration", message));
                }
                ConfigState::Unavailable(message) => self.fail_unconfigured(&message),
                ConfigState::Ready(config) => self.activate(&config),
            }
        }

        let (front, back) = {
            let snapshot = self.rows_and_offset();
            let window = snapshot.rows();
            (window.front_offset(), window.back_offset())
        };
        if low < front || scroll_low {
            self.low.trigger_load();
        }
        if high > back || scroll_high {
            self.high.trigger_load();
        }
        Ok(())
    }

    pub fn rows_and_offset(&self) -> RowsAndOffset<'_> {
        let click_to_load_high = self.high.active().is_some_and(|loader| {
            loader.hit_mem_usage_limit() && !loader.hit_end().is_end()
        });
        RowsAndOffset {
            low: self.low.rows(),
            high: self.high.rows(),
            hit_end_low: self.low.hit_end(),
            hit_end_high: self.high.hit_end(),
            click_to_load_high,
        }
    }

    pub fn cancel_pending_requests(&mut self) {
        if let Some(backing) = &self.backing {
            backing.config_token.cancel();
        }
        for side in [&mut self.low, &mut self.high] {
            if let DirectionLoader::Active(loader) = side {
                loader.cancel_pending_requests();
            } else {
                *side = DirectionLoader::Active(SegmentLoader::failed(CANCELLED_MESSAGE));
            }
        }
    }

    pub fn unlimit_mem_usage(&mut self) {
        for side in [&mut self.low, &mut self.high] {
            match side {
                DirectionLoader::Active(loader) => loader.unlimit_mem_usage(),
                DirectionLoader::Unconfigured(spec) => spec.mem_budget = None,
            }
        }
    }

    fn activate(&mut self, config: &TableConfig) {
        let Some(backing) = &self.backing else {
            return;
        };
        for side in [&mut self.low, &mut self.high] {
            if let DirectionLoader::Unconfigured(spec) = side {
                let queries = make_queries(config, &backing.table, &self.order, spec);
                debug!(
                    "{} loader configured with {} queries",
                    spec.side,
                    queries.len()
                );
                let loader = SegmentLoader::new(
                    backing.ctx.clone(),
                    spec.side,
                    queries,
                    spec.mem_budget,
                );
                *side = DirectionLoader::Active(loader);
            }
        }
    }

    fn fail_unconfigured(&mut self, message: &str) {
        for side in [&mut self.low, &mut self.high] {
            if matches!(side, DirectionLoader::Unconfigured(_)) {
                *side = DirectionLoader::Active(SegmentLoader::failed(message));
            }
        }
    }
}

/// Both sides of a table-backed source before its configuration is known.
/// Without a key the low side is empty from the start.
fn unconfigured_loaders(
    order: &RowOrder,
    seek_key: Option<&Document>,
    mem_budget: Option<usize>,
) -> (DirectionLoader, DirectionLoader) {
    let low = match seek_key {
        Some(key) => DirectionLoader::Unconfigured(PreloaderSpec {
            side: LoadSide::Low,
            scan: order.direction.reverse(),
            key: Some(key.clone()),
            bound: BoundKind::Open,
            mem_budget,
        }),
        None => DirectionLoader::Active(SegmentLoader::fixed(Vec::new())),
    };
    let high = DirectionLoader::Unconfigured(PreloaderSpec {
        side: LoadSide::High,
        scan: order.direction,
        key: seek_key.cloned(),
        bound: BoundKind::Closed,
        mem_budget,
    });
    (low, high)
}

/// Plans the queries that produce one side of a row source.
///
/// - Ordering by the primary key: one range scan of the primary index.
/// - Ordering by a column with a usable secondary index: a range scan of
///   that index. Indexes omit rows where the column is absent or null, so
///   the high side, which ends where those rows belong, also gets a second
///   query selecting exactly them.
/// - Anything else: one query ordering the whole table by the column's
///   value, with absent values replaced by the extremum that sorts them
///   last. A key bound is applied as a filter.
pub fn make_queries(
    config: &TableConfig,
    table: &TableId,
    order: &RowOrder,
    spec: &PreloaderSpec,
) -> Vec<Query> {
    let column = order.resolved_column(config);
    let range = || match (&spec.key, spec.scan) {
        (None, _) => KeyRange::all(),
        (Some(key), Direction::Ascending) => KeyRange::starting_at(key.clone(), spec.bound),
        (Some(key), Direction::Descending) => KeyRange::ending_at(key.clone(), spec.bound),
    };

    if config.is_primary_key(&column) {
        return vec![
            Query::table(table.clone())
                .between(range(), None)
                .order_by(OrderKey::Index(config.primary_key.clone()), spec.scan),
        ];
    }

    if let Some(index) = config.ordering_index(&column) {
        let mut queries = vec![
            Query::table(table.clone())
                .between(range(), Some(index.name.clone()))
                .order_by(OrderKey::Index(index.name.clone()), spec.scan),
        ];
        if spec.side == LoadSide::High {
            queries.push(
                Query::table(table.clone()).filter(Expr::row().has_fields(column).not()),
            );
        }
        return queries;
    }

    let last = match order.direction {
        Direction::Ascending => Expr::MaxVal,
        Direction::Descending => Expr::MinVal,
    };
    let value = Expr::field_or(&column, last);
    let mut query = Query::table(table.clone());
    if let Some(key) = &spec.key {
        warn!(
            "ordering {table} by `{column}` from a key without an index; scanning the whole table"
        );
        let op = match (spec.scan, spec.bound) {
            (Direction::Ascending, BoundKind::Closed) => CompareOp::Ge,
            (Direction::Ascending, BoundKind::Open) => CompareOp::Gt,
            (Direction::Descending, BoundKind::Closed) => CompareOp::Le,
            (Direction::Descending, BoundKind::Open) => CompareOp::Lt,
        };
        query = query.filter(value.clone().compare(op, Expr::Literal(key.clone())));
    }
    vec![query.order_by(OrderKey::Expr(value), spec.scan)]
}

#[cfg(test)]
mod tests {
    use rowscope_document::{ColumnPath, Document};
    use rowscope_query::{
        BoundKind, Direction, Expr, KeyRange, OrderKey, Query, TableConfig, TableId,
    };

    use super::{PreloaderSpec, RowOrder, make_queries};
    use crate::notify::LoadSide;

    fn config() -> TableConfig {
        TableConfig::from_document(
            &Document::parse_json(
                r#"{
                    "primary_key": "id",
                    "indexes": [
                        {"index": "age", "ready": true,
                         "query": "indexCreate('age', function(v) { return v(\"age\"); })"},
                        {"index": "slow", "ready": false,
                         "query": "indexCreate('slow', function(v) { return v(\"slow\"); })"}
                    ]
                }"#,
            )
            .unwrap(),
        )
        .unwrap()
    }

    fn spec(side: LoadSide, scan: Direction, key: Option<i32>, bound: BoundKind) -> PreloaderSpec {
        PreloaderSpec {
            side,
            scan,
            key: key.map(Document::from),
            bound,
            mem_budget: None,
        }
    }

    #[test]
    fn test_primary_key_plan() {
        let table = TableId::new("test", "t");
        let queries = make_queries(
            &config(),
            &table,
            &RowOrder::by_primary_key(Direction::Descending),
            &spec(LoadSide::Low, Direction::Ascending, Some(5), BoundKind::Open),
        );
        assert_eq!(
            queries,
            vec![
                Query::table(table)
                    .between(KeyRange::starting_at(Document::from(5), BoundKind::Open), None)
                    .order_by(OrderKey::Index("id".to_string()), Direction::Ascending)
            ]
        );
    }

    #[test]
    fn test_secondary_index_plan_appends_absent_rows_on_high_side() {
        let table = TableId::new("test", "t");
        let order = RowOrder::by_column(ColumnPath::field("age"), Direction::Ascending);

        let high = make_queries(
            &config(),
            &table,
            &order,
            &spec(LoadSide::High, Direction::Ascending, None, BoundKind::Closed),
        );
        assert_eq!(high.len(), 2);
        assert_eq!(
            high[0],
            Query::table(table.clone())
                .between(KeyRange::all(), Some("age".to_string()))
                .order_by(OrderKey::Index("age".to_string()), Direction::Ascending)
        );
        assert_eq!(
            high[1],
            Query::table(table.clone())
                .filter(Expr::row().has_fields(ColumnPath::field("age")).not())
        );

        let low = make_queries(
            &config(),
            &table,
            &order,
            &spec(LoadSide::Low, Direction::Descending, Some(30), BoundKind::Open),
        );
        assert_eq!(low.len(), 1);
    }

    #[test]
    fn test_unindexed_plan_orders_by_expression() {
        let table = TableId::new("test", "t");
        let order = RowOrder::by_column(ColumnPath::field("slow"), Direction::Descending);
        let queries = make_queries(
            &config(),
            &table,
            &order,
            &spec(LoadSide::High, Direction::Descending, None, BoundKind::Closed),
        );
        let value = Expr::field_or(&ColumnPath::field("slow"), Expr::MinVal);
        assert_eq!(
            queries,
            vec![Query::table(table).order_by(OrderKey::Expr(value), Direction::Descending)]
        );
    }

    #[test]
    fn test_unindexed_plan_with_key_filters() {
        let table = TableId::new("test", "t");
        let order = RowOrder::by_column(ColumnPath::field("name"), Direction::Ascending);
        let queries = make_queries(
            &config(),
            &table,
            &order,
            &spec(LoadSide::High, Direction::Ascending, Some(1), BoundKind::Closed),
        );
        assert_eq!(queries.len(), 1);
        assert!(matches!(
            &queries[0],
            Query::OrderBy { source, .. } if matches!(**source, Query::Filter { .. })
        ));
    }
}
