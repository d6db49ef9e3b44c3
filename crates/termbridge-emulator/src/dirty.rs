//! Set of cells changed since the last claim.

use std::collections::BTreeSet;

use termbridge_core::{Dimensions, Position};

/// Coordinates changed since a consumer last claimed them.
///
/// Repeated writes to one coordinate coalesce into a single entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirtySet {
    cells: BTreeSet<Position>,
}

impl DirtySet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark one cell.
    pub fn mark(&mut self, pos: Position) {
        self.cells.insert(pos);
    }

    /// Mark columns `[start, end)` of a row.
    pub fn mark_cols(&mut self, row: u16, start: u16, end: u16) {
        for col in start..end {
            self.cells.insert(Position::new(row, col));
        }
    }

    /// Mark whole rows `[start, end)`.
    pub fn mark_rows(&mut self, start: u16, end: u16, cols: u16) {
        for row in start..end {
            self.mark_cols(row, 0, cols);
        }
    }

    /// Mark every cell of a screen.
    pub fn mark_all(&mut self, dims: Dimensions) {
        self.mark_rows(0, dims.rows, dims.cols);
    }

    /// Drop entries outside the given dimensions.
    pub fn retain_within(&mut self, dims: Dimensions) {
        self.cells.retain(|p| dims.contains(*p));
    }

    /// Whether a cell is marked.
    pub fn contains(&self, pos: Position) -> bool {
        self.cells.contains(&pos)
    }

    /// Number of marked cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether nothing is marked.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Take all marked cells in row-major order and clear the set.
    pub fn claim(&mut self) -> Vec<Position> {
        std::mem::take(&mut self.cells).into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicates_coalesce() {
        let mut dirty = DirtySet::new();
        dirty.mark(Position::new(0, 0));
        dirty.mark(Position::new(0, 0));
        dirty.mark(Position::new(1, 3));
        assert_eq!(dirty.len(), 2);
    }

    #[test]
    fn test_claim_clears() {
        let mut dirty = DirtySet::new();
        dirty.mark(Position::new(2, 0));
        dirty.mark(Position::new(0, 5));
        let claimed = dirty.claim();
        assert_eq!(claimed, vec![Position::new(0, 5), Position::new(2, 0)]);
        assert!(dirty.is_empty());
        assert!(dirty.claim().is_empty());
    }

    #[test]
    fn test_mark_all_and_retain() {
        let mut dirty = DirtySet::new();
        dirty.mark_all(Dimensions::new(4, 5));
        assert_eq!(dirty.len(), 20);

        dirty.retain_within(Dimensions::new(2, 2));
        assert_eq!(dirty.len(), 4);
        assert!(dirty.contains(Position::new(1, 1)));
        assert!(!dirty.contains(Position::new(3, 3)));
    }
}
