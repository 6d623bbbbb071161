//! Evaluation of query trees over in-memory rows.

use std::cmp::Ordering;

use rowscope_common::error::Error;
use rowscope_document::{ColumnPath, Document, compare};
use rowscope_query::{BoundKind, CompareOp, Direction, Expr, Key, KeyRange};

/// A value produced by an expression: a document or one of the extrema.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Datum {
    MinVal,
    Value(Document),
    MaxVal,
}

impl Datum {
    fn truthy(&self) -> bool {
        !matches!(
            self,
            Datum::Value(Document::Null) | Datum::Value(Document::Bool(false))
        )
    }
}

pub(crate) fn compare_datums(a: &Datum, b: &Datum) -> Ordering {
    match (a, b) {
        (Datum::Value(a), Datum::Value(b)) => compare(a, b),
        (Datum::MinVal, Datum::MinVal) | (Datum::MaxVal, Datum::MaxVal) => Ordering::Equal,
        (Datum::MinVal, _) | (_, Datum::MaxVal) => Ordering::Less,
        (_, Datum::MinVal) | (Datum::MaxVal, _) => Ordering::Greater,
    }
}

#[derive(Debug)]
pub(crate) enum EvalError {
    /// A field did not exist; `default` recovers from these.
    NonExistence(String),
    Type(String),
}

impl From<EvalError> for Error {
    fn from(e: EvalError) -> Self {
        match e {
            EvalError::NonExistence(message) | EvalError::Type(message) => Error::query(message),
        }
    }
}

pub(crate) fn eval(expr: &Expr, row: &Document) -> std::result::Result<Datum, EvalError> {
    Ok(match expr {
        Expr::Row => Datum::Value(row.clone()),
        Expr::Literal(doc) => Datum::Value(doc.clone()),
        Expr::MinVal => Datum::MinVal,
        Expr::MaxVal => Datum::MaxVal,
        Expr::Field { target, name } => match eval(target, row)? {
            Datum::Value(Document::Object(mut fields)) => fields
                .remove(name)
                .map(Datum::Value)
                .ok_or_else(|| EvalError::NonExistence(format!("No attribute `{name}`.")))?,
            other => {
                return Err(EvalError::Type(format!(
                    "Cannot perform get_field on a non-object: {other:?}"
                )));
            }
        },
        Expr::Default { expr, fallback } => match eval(expr, row) {
            Ok(Datum::Value(Document::Null)) | Err(EvalError::NonExistence(_)) => {
                eval(fallback, row)?
            }
            other => other?,
        },
        Expr::Branch {
            condition,
            then,
            otherwise,
        } => {
            if eval(condition, row)?.truthy() {
                eval(then, row)?
            } else {
                eval(otherwise, row)?
            }
        }
        Expr::IsObject(target) => Datum::Value(Document::Bool(matches!(
            eval(target, row)?,
            Datum::Value(Document::Object(_))
        ))),
        Expr::HasFields { target, path } => {
            let present = match eval(target, row)? {
                Datum::Value(doc) => indexed_value(path, &doc).is_some(),
                _ => false,
            };
            Datum::Value(Document::Bool(present))
        }
        Expr::Not(target) => Datum::Value(Document::Bool(!eval(target, row)?.truthy())),
        Expr::Compare { op, left, right } => {
            let ordering = compare_datums(&eval(left, row)?, &eval(right, row)?);
            let result = match op {
                CompareOp::Eq => ordering == Ordering::Equal,
                CompareOp::Lt => ordering == Ordering::Less,
                CompareOp::Le => ordering != Ordering::Greater,
                CompareOp::Gt => ordering == Ordering::Greater,
                CompareOp::Ge => ordering != Ordering::Less,
            };
            Datum::Value(Document::Bool(result))
        }
    })
}

/// The value a field index stores for `row`. Absent and null values are not
/// indexed.
pub(crate) fn indexed_value<'a>(path: &ColumnPath, row: &'a Document) -> Option<&'a Document> {
    path.extract(row).filter(|value| !value.is_null())
}

pub(crate) fn in_range(key: &Document, range: &KeyRange) -> bool {
    let above_lower = match &range.lower {
        Key::MinVal => true,
        Key::MaxVal => false,
        Key::Value(lower) => match range.lower_bound {
            BoundKind::Closed => compare(key, lower) != Ordering::Less,
            BoundKind::Open => compare(key, lower) == Ordering::Greater,
        },
    };
    let below_upper = match &range.upper {
        Key::MaxVal => true,
        Key::MinVal => false,
        Key::Value(upper) => match range.upper_bound {
            BoundKind::Closed => compare(key, upper) != Ordering::Greater,
            BoundKind::Open => compare(key, upper) == Ordering::Less,
        },
    };
    above_lower && below_upper
}

/// Stable sort of keyed rows.
pub(crate) fn sort_keyed(rows: &mut [(Datum, Document)], direction: Direction) {
    match direction {
        Direction::Ascending => rows.sort_by(|(a, _), (b, _)| compare_datums(a, b)),
        Direction::Descending => rows.sort_by(|(a, _), (b, _)| compare_datums(b, a)),
    }
}
