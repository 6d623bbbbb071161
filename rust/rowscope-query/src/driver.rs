use async_trait::async_trait;
use rowscope_common::Result;
use rowscope_document::Document;

use crate::query::{Query, TableId};

/// Executes queries against the backing store.
///
/// Futures returned by a driver are polled on a single-threaded local
/// executor and need not be `Send`. There is no timeout layer: a caller that
/// needs one wraps the driver.
#[async_trait(?Send)]
pub trait Driver {
    /// Runs `query`, yielding either a cursor over its rows or, for
    /// single-document queries, the document itself.
    async fn run(&self, query: &Query) -> Result<QueryResult>;

    /// Fetches the raw configuration of `table`: its primary key name and the
    /// status of every secondary index. The shape is validated by
    /// [`TableConfig::from_document`](crate::TableConfig::from_document).
    async fn table_config(&self, table: &TableId) -> Result<Document>;
}

/// A stream of documents produced by a query.
#[async_trait(?Send)]
pub trait Cursor {
    /// Returns the next document, or `None` once the result set is exhausted.
    async fn next(&mut self) -> Result<Option<Document>>;

    /// Releases the server-side resources held by the cursor. Further calls to
    /// `next` return `None`.
    fn close(&mut self);
}

pub enum QueryResult {
    Cursor(Box<dyn Cursor>),
    Single(Option<Document>),
}

impl QueryResult {
    /// Presents either result shape as a cursor.
    pub fn into_cursor(self) -> Box<dyn Cursor> {
        match self {
            QueryResult::Cursor(cursor) => cursor,
            QueryResult::Single(doc) => Box::new(SingleCursor(doc)),
        }
    }

    /// Returns the single document of the result, draining a cursor result
    /// up to its first row.
    pub async fn into_single(self) -> Result<Option<Document>> {
        match self {
            QueryResult::Single(doc) => Ok(doc),
            QueryResult::Cursor(mut cursor) => {
                let first = cursor.next().await;
                cursor.close();
                first
            }
        }
    }
}

impl std::fmt::Debug for QueryResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueryResult::Cursor(_) => f.write_str("QueryResult::Cursor"),
            QueryResult::Single(doc) => f.debug_tuple("QueryResult::Single").field(doc).finish(),
        }
    }
}

/// Cursor over at most one document.
struct SingleCursor(Option<Document>);

#[async_trait(?Send)]
impl Cursor for SingleCursor {
    async fn next(&mut self) -> Result<Option<Document>> {
        Ok(self.0.take())
    }

    fn close(&mut self) {
        self.0 = None;
    }
}
