use std::{
    cell::{Cell, RefCell},
    collections::{HashMap, VecDeque},
    rc::Rc,
};

use async_trait::async_trait;
use futures::channel::oneshot;
use rowscope_common::{Result, error::Error};
use rowscope_document::{ColumnPath, Document, compare};
use rowscope_query::{
    Cursor, Driver, IndexStatus, OrderKey, Query, QueryResult, TableId,
};

use crate::eval::{Datum, eval, in_range, indexed_value, sort_keyed};

/// A secondary index over an in-memory table.
#[derive(Debug, Clone)]
pub struct MemoryIndex {
    pub status: IndexStatus,
    /// The field chain the index covers; `None` for indexes defined by an
    /// arbitrary function, which this driver cannot scan.
    pub path: Option<ColumnPath>,
}

#[derive(Debug, Clone)]
pub struct MemoryTable {
    primary_key: String,
    rows: Vec<Document>,
    indexes: Vec<MemoryIndex>,
    raw_config: Option<Document>,
}

impl MemoryTable {
    pub fn new(primary_key: impl Into<String>) -> MemoryTable {
        MemoryTable {
            primary_key: primary_key.into(),
            rows: Vec::new(),
            indexes: Vec::new(),
            raw_config: None,
        }
    }

    pub fn with_rows(mut self, rows: impl IntoIterator<Item = Document>) -> Self {
        self.rows.extend(rows);
        self
    }

    /// Adds a ready index over the field chain `path`.
    pub fn with_index(self, name: &str, path: ColumnPath) -> Self {
        let accessors: String = path
            .fields()
            .iter()
            .map(|field| format!("(\"{}\")", field.replace('\\', "\\\\").replace('"', "\\\"")))
            .collect();
        let status = IndexStatus {
            name: name.to_string(),
            ready: true,
            geo: false,
            multi: false,
            outdated: false,
            definition: format!(
                "indexCreate('{name}', function(_var1) {{ return _var1{accessors}; }})"
            ),
        };
        self.with_index_status(status, Some(path))
    }

    /// Adds an index defined by an arbitrary function.
    pub fn with_function_index(self, name: &str) -> Self {
        let status = IndexStatus {
            name: name.to_string(),
            ready: true,
            geo: false,
            multi: false,
            outdated: false,
            definition: format!(
                "indexCreate('{name}', function(_var1) {{ return _var1(\"a\").add(_var1(\"b\")); }})"
            ),
        };
        self.with_index_status(status, None)
    }

    pub fn with_index_status(mut self, status: IndexStatus, path: Option<ColumnPath>) -> Self {
        self.indexes.push(MemoryIndex { status, path });
        self
    }

    /// Replaces the configuration document the driver reports for this table.
    pub fn with_raw_config(mut self, config: Document) -> Self {
        self.raw_config = Some(config);
        self
    }

    pub fn rows(&self) -> &[Document] {
        &self.rows
    }

    fn config_document(&self) -> Document {
        if let Some(raw) = &self.raw_config {
            return raw.clone();
        }
        let indexes = self
            .indexes
            .iter()
            .map(|index| {
                Document::object([
                    ("index", Document::from(index.status.name.as_str())),
                    ("ready", Document::from(index.status.ready)),
                    ("geo", Document::from(index.status.geo)),
                    ("multi", Document::from(index.status.multi)),
                    ("outdated", Document::from(index.status.outdated)),
                    ("query", Document::from(index.status.definition.as_str())),
                ])
            })
            .collect::<Vec<_>>();
        Document::object([
            ("primary_key", Document::from(self.primary_key.as_str())),
            ("indexes", Document::Array(indexes)),
        ])
    }

    fn index_path(&self, index: Option<&str>) -> Result<ColumnPath> {
        match index {
            None => Ok(ColumnPath::field(self.primary_key.as_str())),
            Some(name) if name == self.primary_key => Ok(ColumnPath::field(name)),
            Some(name) => {
                let index = self
                    .indexes
                    .iter()
                    .find(|index| index.status.name == name)
                    .ok_or_else(|| Error::query(format!("Index `{name}` was not found.")))?;
                if !index.status.ready {
                    return Err(Error::query(format!("Index `{name}` is not ready.")));
                }
                index
                    .path
                    .clone()
                    .ok_or_else(|| Error::query(format!("Index `{name}` cannot be scanned.")))
            }
        }
    }

    /// Rows ordered by `path`, omitting rows without a value for it.
    fn index_scan(&self, path: &ColumnPath) -> Vec<(Datum, Document)> {
        let mut keyed = self
            .rows
            .iter()
            .filter_map(|row| {
                indexed_value(path, row).map(|key| (Datum::Value(key.clone()), row.clone()))
            })
            .collect::<Vec<_>>();
        sort_keyed(&mut keyed, rowscope_query::Direction::Ascending);
        keyed
    }
}

#[derive(Default)]
struct Faults {
    fail_next_run: Option<String>,
    fail_cursor_after: Option<(usize, String)>,
    fail_config: Option<String>,
}

#[derive(Default)]
struct DriverState {
    tables: RefCell<HashMap<TableId, MemoryTable>>,
    paused: Cell<bool>,
    waiters: RefCell<Vec<oneshot::Sender<()>>>,
    faults: RefCell<Faults>,
    run_calls: Cell<usize>,
    next_calls: Cell<usize>,
    config_calls: Cell<usize>,
    closed_cursors: Cell<usize>,
}

impl DriverState {
    async fn wait_if_paused(&self) {
        if !self.paused.get() {
            return;
        }
        let (tx, rx) = oneshot::channel();
        self.waiters.borrow_mut().push(tx);
        // A dropped sender (driver gone) releases the request as well.
        let _ = rx.await;
    }
}

/// In-memory [`Driver`] implementation.
///
/// Clones share the same tables, statistics and fault settings.
#[derive(Clone, Default)]
pub struct MemoryDriver(Rc<DriverState>);

impl MemoryDriver {
    pub fn new() -> MemoryDriver {
        MemoryDriver::default()
    }

    pub fn add_table(&self, id: TableId, table: MemoryTable) {
        self.0.tables.borrow_mut().insert(id, table);
    }

    /// Holds every subsequent request (query, cursor read, configuration
    /// lookup) until [`resume`](Self::resume) is called.
    pub fn pause(&self) {
        self.0.paused.set(true);
    }

    pub fn resume(&self) {
        self.0.paused.set(false);
        for waiter in self.0.waiters.borrow_mut().drain(..) {
            let _ = waiter.send(());
        }
    }

    /// Number of requests currently held by [`pause`](Self::pause).
    pub fn held_requests(&self) -> usize {
        self.0.waiters.borrow().len()
    }

    pub fn fail_next_run(&self, message: impl Into<String>) {
        self.0.faults.borrow_mut().fail_next_run = Some(message.into());
    }

    /// The next cursor opened fails after yielding `rows` documents.
    pub fn fail_cursor_after(&self, rows: usize, message: impl Into<String>) {
        self.0.faults.borrow_mut().fail_cursor_after = Some((rows, message.into()));
    }

    pub fn fail_config(&self, message: impl Into<String>) {
        self.0.faults.borrow_mut().fail_config = Some(message.into());
    }

    pub fn run_calls(&self) -> usize {
        self.0.run_calls.get()
    }

    pub fn next_calls(&self) -> usize {
        self.0.next_calls.get()
    }

    pub fn config_calls(&self) -> usize {
        self.0.config_calls.get()
    }

    pub fn closed_cursors(&self) -> usize {
        self.0.closed_cursors.get()
    }

    /// Evaluates `query` to completion.
    pub fn evaluate(&self, query: &Query) -> Result<Vec<Document>> {
        Ok(self
            .evaluate_keyed(query)?
            .into_iter()
            .map(|(_, row)| row)
            .collect())
    }

    fn with_table<R>(&self, id: &TableId, f: impl FnOnce(&MemoryTable) -> R) -> Result<R> {
        let tables = self.0.tables.borrow();
        let table = tables
            .get(id)
            .ok_or_else(|| Error::query(format!("Table `{id}` does not exist.")))?;
        Ok(f(table))
    }

    fn evaluate_keyed(&self, query: &Query) -> Result<Vec<(Datum, Document)>> {
        match query {
            Query::Table(id) => self.with_table(id, |table| {
                let primary_key = ColumnPath::field(table.primary_key.as_str());
                table.index_scan(&primary_key)
            }),
            Query::Between {
                source,
                range,
                index,
            } => {
                let Query::Table(id) = source.as_ref() else {
                    return Err(Error::query("`between` can only be applied to a table."));
                };
                self.with_table(id, |table| -> Result<Vec<(Datum, Document)>> {
                    let path = table.index_path(index.as_deref())?;
                    Ok(table
                        .index_scan(&path)
                        .into_iter()
                        .filter(|(key, _)| match key {
                            Datum::Value(key) => in_range(key, range),
                            _ => false,
                        })
                        .collect())
                })?
            }
            Query::OrderBy {
                source,
                key,
                direction,
            } => {
                let rows = self.evaluate_keyed(source)?;
                let mut keyed = match key {
                    OrderKey::Index(name) => {
                        let path = self
                            .with_table(source.table_id(), |table| table.index_path(Some(name)))??;
                        rows.into_iter()
                            .filter_map(|(_, row)| {
                                indexed_value(&path, &row)
                                    .cloned()
                                    .map(|key| (Datum::Value(key), row))
                            })
                            .collect::<Vec<_>>()
                    }
                    OrderKey::Expr(expr) => rows
                        .into_iter()
                        .map(|(_, row)| Ok((eval(expr, &row)?, row)))
                        .collect::<Result<Vec<_>>>()?,
                };
                sort_keyed(&mut keyed, *direction);
                Ok(keyed)
            }
            Query::Filter { source, predicate } => {
                let rows = self.evaluate_keyed(source)?;
                Ok(rows
                    .into_iter()
                    .filter(|(_, row)| {
                        matches!(
                            eval(predicate, row),
                            Ok(Datum::Value(ref value)) if !matches!(value, Document::Null | Document::Bool(false))
                        )
                    })
                    .collect())
            }
            Query::Get { table, key } => Ok(self
                .lookup(table, key)?
                .into_iter()
                .map(|row| (Datum::Value(key.clone()), row))
                .collect()),
        }
    }

    fn lookup(&self, id: &TableId, key: &Document) -> Result<Option<Document>> {
        self.with_table(id, |table| {
            let primary_key = ColumnPath::field(table.primary_key.as_str());
            table
                .rows
                .iter()
                .find(|row| {
                    primary_key
                        .extract(row)
                        .is_some_and(|value| compare(value, key).is_eq())
                })
                .cloned()
        })
    }
}

#[async_trait(?Send)]
impl Driver for MemoryDriver {
    async fn run(&self, query: &Query) -> Result<QueryResult> {
        self.0.run_calls.set(self.0.run_calls.get() + 1);
        self.0.wait_if_paused().await;

        if let Some(message) = self.0.faults.borrow_mut().fail_next_run.take() {
            return Err(Error::query(message));
        }
        if let Query::Get { table, key } = query {
            return Ok(QueryResult::Single(self.lookup(table, key)?));
        }

        let rows = self.evaluate(query)?;
        let fail_at = self.0.faults.borrow_mut().fail_cursor_after.take();
        Ok(QueryResult::Cursor(Box::new(MemoryCursor {
            state: self.0.clone(),
            rows: rows.into(),
            yielded: 0,
            fail_at,
            closed: false,
        })))
    }

    async fn table_config(&self, table: &TableId) -> Result<Document> {
        self.0.config_calls.set(self.0.config_calls.get() + 1);
        self.0.wait_if_paused().await;

        if let Some(message) = self.0.faults.borrow_mut().fail_config.take() {
            return Err(Error::query(message));
        }
        self.with_table(table, MemoryTable::config_document)
    }
}

struct MemoryCursor {
    state: Rc<DriverState>,
    rows: VecDeque<Document>,
    yielded: usize,
    fail_at: Option<(usize, String)>,
    closed: bool,
}

#[async_trait(?Send)]
impl Cursor for MemoryCursor {
    async fn next(&mut self) -> Result<Option<Document>> {
        self.state.next_calls.set(self.state.next_calls.get() + 1);
        self.state.wait_if_paused().await;

        if self.closed {
            return Ok(None);
        }
        if let Some((at, message)) = &self.fail_at {
            if self.yielded == *at {
                return Err(Error::query(message.clone()));
            }
        }
        let row = self.rows.pop_front();
        if row.is_some() {
            self.yielded += 1;
        }
        Ok(row)
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.rows.clear();
            self.state
                .closed_cursors
                .set(self.state.closed_cursors.get() + 1);
        }
    }
}

#[cfg(test)]
mod tests {
    use futures::executor::block_on;
    use rowscope_document::{ColumnPath, Document};
    use rowscope_query::{
        BoundKind, Direction, Driver, Expr, KeyRange, OrderKey, Query, TableConfig, TableId,
    };

    use super::{MemoryDriver, MemoryTable};

    fn driver() -> (MemoryDriver, TableId) {
        let id = TableId::new("test", "t");
        let rows = [
            r#"{"id": 3, "a": {"b": 30}}"#,
            r#"{"id": 1, "a": {"b": 10}}"#,
            r#"{"id": 2}"#,
            r#"{"id": 4, "a": {"b": null}}"#,
            r#"{"id": 5, "a": {"b": 20}}"#,
        ]
        .map(|text| Document::parse_json(text).unwrap());
        let driver = MemoryDriver::new();
        driver.add_table(
            id.clone(),
            MemoryTable::new("id")
                .with_rows(rows)
                .with_index("ab", ColumnPath::parse("a.b")),
        );
        (driver, id)
    }

    fn ids(rows: &[Document]) -> Vec<f64> {
        rows.iter()
            .map(|row| row.get("id").and_then(Document::as_f64).unwrap())
            .collect()
    }

    #[test]
    fn test_primary_key_range_scan() {
        let (driver, id) = driver();
        let query = Query::table(id)
            .between(KeyRange::ending_at(Document::from(4), BoundKind::Open), None)
            .order_by(OrderKey::Index("id".to_string()), Direction::Descending);
        assert_eq!(ids(&driver.evaluate(&query).unwrap()), vec![3.0, 2.0, 1.0]);
    }

    #[test]
    fn test_secondary_index_skips_missing_values() {
        let (driver, id) = driver();
        let query = Query::table(id.clone())
            .between(KeyRange::all(), Some("ab".to_string()))
            .order_by(OrderKey::Index("ab".to_string()), Direction::Ascending);
        assert_eq!(ids(&driver.evaluate(&query).unwrap()), vec![1.0, 5.0, 3.0]);

        let absent = Query::table(id).filter(
            Expr::row()
                .has_fields(ColumnPath::parse("a.b"))
                .not(),
        );
        assert_eq!(ids(&driver.evaluate(&absent).unwrap()), vec![2.0, 4.0]);
    }

    #[test]
    fn test_order_by_expression_puts_missing_last() {
        let (driver, id) = driver();
        let path = ColumnPath::parse("a.b");
        let query = Query::table(id).order_by(
            OrderKey::Expr(Expr::field_or(&path, Expr::MinVal)),
            Direction::Descending,
        );
        assert_eq!(
            ids(&driver.evaluate(&query).unwrap()),
            vec![3.0, 5.0, 1.0, 2.0, 4.0]
        );
    }

    #[test]
    fn test_config_document_parses() {
        let (driver, id) = driver();
        let doc = block_on(driver.table_config(&id)).unwrap();
        let config = TableConfig::from_document(&doc).unwrap();
        assert_eq!(config.primary_key, "id");
        assert_eq!(
            config
                .find_index(&ColumnPath::parse("a.b"))
                .map(|s| s.name.as_str()),
            Some("ab")
        );
        assert_eq!(driver.config_calls(), 1);
    }

    #[test]
    fn test_get_and_cursor_failure() {
        let (driver, id) = driver();
        let found = block_on(async {
            driver
                .run(&Query::get(id.clone(), Document::from(5)))
                .await
                .unwrap()
                .into_single()
                .await
                .unwrap()
        });
        assert_eq!(found.and_then(|row| row.get("id").cloned()), Some(Document::from(5)));

        driver.fail_cursor_after(2, "connection lost");
        block_on(async {
            let mut cursor = driver.run(&Query::table(id)).await.unwrap().into_cursor();
            assert!(cursor.next().await.unwrap().is_some());
            assert!(cursor.next().await.unwrap().is_some());
            assert!(cursor.next().await.is_err());
        });
    }
}
