//! Locating the rows equal to a value within partially loaded rows.

use std::cmp::Ordering;

use rowscope_document::{ColumnPath, Document, compare};
use rowscope_query::Direction;

use crate::{reframe::binary_search, window::BidirectionalRowWindow};

/// Interprets user input as a seek target: JSON when it parses, otherwise
/// the literal text as a string.
pub fn parse_seek_value(raw: &str) -> Document {
    Document::parse_json(raw).unwrap_or_else(|_| Document::from(raw))
}

/// The contiguous offsets `[start, start + count)` holding rows equal to a
/// seek target. `count` is zero when no row matches; `start` is then where
/// the target would be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HighlightInfo {
    pub start: i64,
    pub count: i64,
}

impl HighlightInfo {
    pub fn end(&self) -> i64 {
        self.start + self.count
    }
}

/// How rows are compared against a seek target.
#[derive(Debug, Clone, PartialEq)]
pub struct SortKey {
    /// `None` compares whole rows.
    pub column: Option<ColumnPath>,
    pub direction: Direction,
}

impl SortKey {
    /// The row's value in the ordering column. Null values count as absent,
    /// like in a secondary index, so a `Document::Null` target matches no
    /// row and resolves to an empty highlight where null would sort.
    pub fn extract<'a>(&self, row: &'a Document) -> Option<&'a Document> {
        match &self.column {
            Some(column) => column.extract(row).filter(|value| !value.is_null()),
            None => Some(row),
        }
    }

    /// Where `row` sits relative to `target` in presentation order. Rows
    /// without a value are after everything, in either direction.
    pub fn position(&self, row: &Document, target: &Document) -> Ordering {
        match self.extract(row) {
            None => Ordering::Greater,
            Some(value) => match self.direction {
                Direction::Ascending => compare(value, target),
                Direction::Descending => compare(target, value),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekPhase {
    InProgress,
    Complete,
}

/// An active seek. Lives until a new seek or a new row source replaces it.
#[derive(Debug, Clone, PartialEq)]
pub struct SeekingState {
    pub target: Document,
    pub sort: SortKey,
    pub phase: SeekPhase,
    pub highlight: Option<HighlightInfo>,
}

impl SeekingState {
    pub fn new(target: Document, sort: SortKey) -> SeekingState {
        SeekingState {
            target,
            sort,
            phase: SeekPhase::InProgress,
            highlight: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekResolution {
    Found(HighlightInfo),
    /// The materialized rows do not determine the match yet; more rows are
    /// needed on the flagged sides.
    Pending { need_low: bool, need_high: bool },
}

/// Binary-searches the materialized rows for the range equal to `target`.
///
/// The low boundary is known once a row before it is materialized, or the
/// low side has no more rows. The high boundary likewise.
pub fn resolve_seek(
    window: &BidirectionalRowWindow<'_, Document>,
    hit_end_low: bool,
    hit_end_high: bool,
    sort: &SortKey,
    target: &Document,
) -> SeekResolution {
    let front = window.front_offset();
    let back = window.back_offset();
    let position = |offset: i64| {
        window
            .get(offset)
            .map_or(Ordering::Greater, |row| sort.position(row, target))
    };

    let low_point = binary_search(front, back, |i| position(i) != Ordering::Less);
    let high_point = binary_search(low_point, back, |i| position(i) == Ordering::Greater);

    let low_known = low_point > front || hit_end_low;
    let high_known = high_point < back || hit_end_high;
    if low_known && high_known {
        SeekResolution::Found(HighlightInfo {
            start: low_point,
            count: high_point - low_point,
        })
    } else {
        SeekResolution::Pending {
            need_low: !low_known,
            need_high: !high_known,
        }
    }
}

#[cfg(test)]
mod tests {
    use rowscope_document::{ColumnPath, Document};
    use rowscope_query::Direction;

    use super::{HighlightInfo, SeekResolution, SortKey, parse_seek_value, resolve_seek};
    use crate::window::BidirectionalRowWindow;

    fn values(values: &[i64]) -> Vec<Document> {
        values.iter().map(|v| Document::from(*v)).collect()
    }

    fn whole_row(direction: Direction) -> SortKey {
        SortKey {
            column: None,
            direction,
        }
    }

    #[test]
    fn test_parse_seek_value() {
        assert_eq!(parse_seek_value("3"), Document::from(3));
        assert_eq!(parse_seek_value(r#""x""#), Document::from("x"));
        assert_eq!(parse_seek_value("hello world"), Document::from("hello world"));
        assert_eq!(parse_seek_value("{bad"), Document::from("{bad"));
    }

    #[test]
    fn test_fully_loaded_match() {
        let after = values(&[1, 3, 3, 5]);
        let window = BidirectionalRowWindow::new(&[], &after);
        let resolution = resolve_seek(
            &window,
            true,
            true,
            &whole_row(Direction::Ascending),
            &Document::from(3),
        );
        assert_eq!(
            resolution,
            SeekResolution::Found(HighlightInfo { start: 1, count: 2 })
        );
    }

    #[test]
    fn test_match_across_pivot() {
        let before = values(&[3, 1]);
        let after = values(&[3, 4]);
        let window = BidirectionalRowWindow::new(&before, &after);
        let resolution = resolve_seek(
            &window,
            false,
            false,
            &whole_row(Direction::Ascending),
            &Document::from(3),
        );
        assert_eq!(
            resolution,
            SeekResolution::Found(HighlightInfo { start: -1, count: 2 })
        );
    }

    #[test]
    fn test_boundary_at_window_edge_is_pending() {
        let after = values(&[3, 3]);
        let window = BidirectionalRowWindow::new(&[], &after);
        let sort = whole_row(Direction::Ascending);
        assert_eq!(
            resolve_seek(&window, false, false, &sort, &Document::from(3)),
            SeekResolution::Pending {
                need_low: true,
                need_high: true
            }
        );
        assert_eq!(
            resolve_seek(&window, true, false, &sort, &Document::from(3)),
            SeekResolution::Pending {
                need_low: false,
                need_high: true
            }
        );
        assert_eq!(
            resolve_seek(&window, true, true, &sort, &Document::from(3)),
            SeekResolution::Found(HighlightInfo { start: 0, count: 2 })
        );
    }

    #[test]
    fn test_descending_with_missing_values() {
        let after: Vec<Document> = [
            r#"{"v": 5}"#,
            r#"{"v": 3}"#,
            r#"{"v": 1}"#,
            "{}",
            r#"{"v": null}"#,
        ]
        .iter()
        .map(|text| Document::parse_json(text).unwrap())
        .collect();
        let window = BidirectionalRowWindow::new(&[], &after);
        let sort = SortKey {
            column: Some(ColumnPath::field("v")),
            direction: Direction::Descending,
        };
        assert_eq!(
            resolve_seek(&window, true, true, &sort, &Document::from(3)),
            SeekResolution::Found(HighlightInfo { start: 1, count: 1 })
        );
        assert_eq!(
            resolve_seek(&window, true, true, &sort, &Document::from(4)),
            SeekResolution::Found(HighlightInfo { start: 1, count: 0 })
        );
    }

    #[test]
    fn test_null_target_matches_nothing() {
        let after: Vec<Document> = [r#"{"v": true}"#, r#"{"v": 1}"#, r#"{"v": null}"#, "{}"]
            .iter()
            .map(|text| Document::parse_json(text).unwrap())
            .collect();
        let window = BidirectionalRowWindow::new(&[], &after);
        let sort = SortKey {
            column: Some(ColumnPath::field("v")),
            direction: Direction::Ascending,
        };
        assert_eq!(sort.extract(&after[2]), None);
        assert_eq!(
            resolve_seek(&window, true, true, &sort, &Document::Null),
            SeekResolution::Found(HighlightInfo { start: 1, count: 0 })
        );
    }
}
