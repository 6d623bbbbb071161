/// A read-only view over rows materialized on both sides of a pivot.
///
/// Offsets are signed: the row at offset 0 is the pivot, rows at non-negative
/// offsets come from `after` (`after[i]` is offset `i`), and rows at negative
/// offsets come from `before`, stored nearest-first (`before[0]` is offset
/// -1, `before[1]` is offset -2, and so on).
///
/// The window never owns its rows. It is rebuilt from the loaders' row lists
/// whenever a snapshot is taken, so growing either list simply means taking a
/// new view.
#[derive(Debug)]
pub struct BidirectionalRowWindow<'a, T> {
    before: &'a [T],
    after: &'a [T],
}

impl<T> Clone for BidirectionalRowWindow<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for BidirectionalRowWindow<'_, T> {}

impl<'a, T> BidirectionalRowWindow<'a, T> {
    pub fn new(before: &'a [T], after: &'a [T]) -> Self {
        BidirectionalRowWindow { before, after }
    }

    pub fn empty() -> Self {
        BidirectionalRowWindow {
            before: &[],
            after: &[],
        }
    }

    /// The lowest materialized offset, `-before.len()`.
    pub fn front_offset(&self) -> i64 {
        -(self.before.len() as i64)
    }

    /// One past the highest materialized offset, `after.len()`.
    pub fn back_offset(&self) -> i64 {
        self.after.len() as i64
    }

    pub fn len(&self) -> usize {
        self.before.len() + self.after.len()
    }

    pub fn is_empty(&self) -> bool {
        self.before.is_empty() && self.after.is_empty()
    }

    pub fn contains(&self, offset: i64) -> bool {
        offset >= self.front_offset() && offset < self.back_offset()
    }

    pub fn get(&self, offset: i64) -> Option<&'a T> {
        if offset >= 0 {
            self.after.get(offset as usize)
        } else {
            self.before.get((-1 - offset) as usize)
        }
    }

    /// Returns the rows at offsets `lo..hi` in ascending offset order.
    ///
    /// The range is clamped to the materialized offsets, so the result may be
    /// shorter than `hi - lo`.
    pub fn slice(&self, lo: i64, hi: i64) -> Vec<&'a T> {
        let lo = lo.max(self.front_offset());
        let hi = hi.min(self.back_offset());
        if lo >= hi {
            return Vec::new();
        }

        let mut rows = Vec::with_capacity((hi - lo) as usize);
        if lo < 0 {
            // Offsets lo..min(hi, 0) live in before[-min(hi, 0)..=-1-lo],
            // nearest-first, so walk that range backwards.
            let first = (-hi.min(0)) as usize;
            let last = (-1 - lo) as usize;
            rows.extend(self.before[first..=last].iter().rev());
        }
        if hi > 0 {
            rows.extend(&self.after[lo.max(0) as usize..hi as usize]);
        }
        rows
    }

    /// Iterates `(offset, row)` pairs in ascending offset order.
    pub fn iter(&self) -> impl Iterator<Item = (i64, &'a T)> {
        let before = self.before;
        let after = self.after;
        before
            .iter()
            .enumerate()
            .rev()
            .map(|(i, row)| (-1 - i as i64, row))
            .chain(after.iter().enumerate().map(|(i, row)| (i as i64, row)))
    }
}
