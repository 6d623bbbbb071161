//! Composable query values.
//!
//! Nothing here executes anything: builders only assemble a tree that a
//! [`Driver`](crate::Driver) evaluates.

use rowscope_document::{ColumnPath, Document};

/// Identifies a table within a database.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableId {
    pub db: String,
    pub table: String,
}

impl TableId {
    pub fn new(db: impl Into<String>, table: impl Into<String>) -> TableId {
        TableId {
            db: db.into(),
            table: table.into(),
        }
    }
}

impl std::fmt::Display for TableId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.db, self.table)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Direction {
    #[default]
    Ascending,
    Descending,
}

impl Direction {
    pub fn reverse(self) -> Direction {
        match self {
            Direction::Ascending => Direction::Descending,
            Direction::Descending => Direction::Ascending,
        }
    }
}

/// One end of a key range. `MinVal`/`MaxVal` are the store's extrema, below
/// and above every document.
#[derive(Debug, Clone, PartialEq)]
pub enum Key {
    MinVal,
    Value(Document),
    MaxVal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundKind {
    Open,
    Closed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct KeyRange {
    pub lower: Key,
    pub lower_bound: BoundKind,
    pub upper: Key,
    pub upper_bound: BoundKind,
}

impl KeyRange {
    /// The range covering every indexed key.
    pub fn all() -> KeyRange {
        KeyRange {
            lower: Key::MinVal,
            lower_bound: BoundKind::Closed,
            upper: Key::MaxVal,
            upper_bound: BoundKind::Open,
        }
    }

    /// Keys from `key` upward.
    pub fn starting_at(key: Document, bound: BoundKind) -> KeyRange {
        KeyRange {
            lower: Key::Value(key),
            lower_bound: bound,
            upper: Key::MaxVal,
            upper_bound: BoundKind::Open,
        }
    }

    /// Keys from the bottom up to `key`.
    pub fn ending_at(key: Document, bound: BoundKind) -> KeyRange {
        KeyRange {
            lower: Key::MinVal,
            lower_bound: BoundKind::Closed,
            upper: Key::Value(key),
            upper_bound: bound,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Lt,
    Le,
    Gt,
    Ge,
}

/// A row-level expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// The row being evaluated.
    Row,
    Literal(Document),
    MinVal,
    MaxVal,
    Field {
        target: Box<Expr>,
        name: String,
    },
    /// Evaluates `expr`, falling back to `fallback` when it is null or raises
    /// a non-existence error.
    Default {
        expr: Box<Expr>,
        fallback: Box<Expr>,
    },
    Branch {
        condition: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    IsObject(Box<Expr>),
    /// `true` if every field along `path` exists with a non-null value.
    HasFields {
        target: Box<Expr>,
        path: ColumnPath,
    },
    Not(Box<Expr>),
    Compare {
        op: CompareOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

impl Expr {
    pub fn row() -> Expr {
        Expr::Row
    }

    pub fn literal(value: impl Into<Document>) -> Expr {
        Expr::Literal(value.into())
    }

    pub fn field(self, name: impl Into<String>) -> Expr {
        Expr::Field {
            target: Box::new(self),
            name: name.into(),
        }
    }

    pub fn default(self, fallback: Expr) -> Expr {
        Expr::Default {
            expr: Box::new(self),
            fallback: Box::new(fallback),
        }
    }

    pub fn branch(condition: Expr, then: Expr, otherwise: Expr) -> Expr {
        Expr::Branch {
            condition: Box::new(condition),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        }
    }

    pub fn is_object(self) -> Expr {
        Expr::IsObject(Box::new(self))
    }

    pub fn has_fields(self, path: ColumnPath) -> Expr {
        Expr::HasFields {
            target: Box::new(self),
            path,
        }
    }

    pub fn not(self) -> Expr {
        Expr::Not(Box::new(self))
    }

    pub fn compare(self, op: CompareOp, other: Expr) -> Expr {
        Expr::Compare {
            op,
            left: Box::new(self),
            right: Box::new(other),
        }
    }

    /// Reads `path` from the row, yielding `fallback` wherever the path is
    /// absent, null, or crosses a value that is not an object.
    pub fn field_or(path: &ColumnPath, fallback: Expr) -> Expr {
        path.fields().iter().fold(Expr::Row, |value, name| {
            Expr::branch(
                value.clone().is_object(),
                value.field(name.as_str()).default(fallback.clone()),
                fallback.clone(),
            )
        })
    }
}

/// How an `OrderBy` sorts its input.
#[derive(Debug, Clone, PartialEq)]
pub enum OrderKey {
    /// By an index (the primary key's name designates the primary index).
    Index(String),
    /// By a computed expression.
    Expr(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    /// All rows of a table.
    Table(TableId),
    /// Rows whose index key lies in `range`. `index: None` scans the primary
    /// key.
    Between {
        source: Box<Query>,
        range: KeyRange,
        index: Option<String>,
    },
    OrderBy {
        source: Box<Query>,
        key: OrderKey,
        direction: Direction,
    },
    Filter {
        source: Box<Query>,
        predicate: Expr,
    },
    /// A single document looked up by primary key.
    Get { table: TableId, key: Document },
}

impl Query {
    pub fn table(table: TableId) -> Query {
        Query::Table(table)
    }

    pub fn get(table: TableId, key: Document) -> Query {
        Query::Get { table, key }
    }

    pub fn between(self, range: KeyRange, index: Option<String>) -> Query {
        Query::Between {
            source: Box::new(self),
            range,
            index,
        }
    }

    pub fn order_by(self, key: OrderKey, direction: Direction) -> Query {
        Query::OrderBy {
            source: Box::new(self),
            key,
            direction,
        }
    }

    pub fn filter(self, predicate: Expr) -> Query {
        Query::Filter {
            source: Box::new(self),
            predicate,
        }
    }

    /// The table this query ultimately reads from.
    pub fn table_id(&self) -> &TableId {
        match self {
            Query::Table(table) | Query::Get { table, .. } => table,
            Query::Between { source, .. }
            | Query::OrderBy { source, .. }
            | Query::Filter { source, .. } => source.table_id(),
        }
    }
}
