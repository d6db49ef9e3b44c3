//! Geometry types for terminal coordinates and regions.

use serde::{Deserialize, Serialize};

/// Position in the terminal grid (row, column).
///
/// Positions order row-major, so a sorted set of positions walks the screen
/// top to bottom, left to right.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    /// Row index (0-based)
    pub row: u16,
    /// Column index (0-based)
    pub col: u16,
}

impl Position {
    /// Create a new position.
    pub fn new(row: u16, col: u16) -> Self {
        Self { row, col }
    }

    /// Origin position (0, 0).
    pub fn origin() -> Self {
        Self { row: 0, col: 0 }
    }

    /// Clamp this position into the given dimensions.
    pub fn clamp_to(self, dims: Dimensions) -> Self {
        Self {
            row: self.row.min(dims.rows.saturating_sub(1)),
            col: self.col.min(dims.cols.saturating_sub(1)),
        }
    }
}

/// Dimensions of a terminal or region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimensions {
    /// Number of rows
    pub rows: u16,
    /// Number of columns
    pub cols: u16,
}

impl Dimensions {
    /// Create new dimensions.
    pub fn new(rows: u16, cols: u16) -> Self {
        Self { rows, cols }
    }

    /// Width in columns.
    pub fn width(&self) -> u16 {
        self.cols
    }

    /// Height in rows.
    pub fn height(&self) -> u16 {
        self.rows
    }

    /// Total cell count (rows * cols).
    pub fn cell_count(&self) -> usize {
        self.rows as usize * self.cols as usize
    }

    /// Whether both sides are non-zero.
    pub fn is_valid(&self) -> bool {
        self.rows > 0 && self.cols > 0
    }

    /// Replace zero sides with the 80x24 fallback.
    pub fn or_default(self) -> Self {
        let fallback = Self::default();
        Self {
            rows: if self.rows == 0 { fallback.rows } else { self.rows },
            cols: if self.cols == 0 { fallback.cols } else { self.cols },
        }
    }

    /// Whether a position lies inside these dimensions.
    pub fn contains(&self, pos: Position) -> bool {
        pos.row < self.rows && pos.col < self.cols
    }
}

impl Default for Dimensions {
    fn default() -> Self {
        Self::new(24, 80)
    }
}

/// Bounding box for a terminal region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Bounds {
    /// Starting row
    pub row: u16,
    /// Starting column
    pub col: u16,
    /// Width in columns
    pub width: u16,
    /// Height in rows
    pub height: u16,
}

impl Bounds {
    /// Create new bounds.
    pub fn new(row: u16, col: u16, width: u16, height: u16) -> Self {
        Self {
            row,
            col,
            width,
            height,
        }
    }

    /// Bounds covering a whole screen of the given dimensions.
    pub fn screen(dims: Dimensions) -> Self {
        Self::new(0, 0, dims.cols, dims.rows)
    }

    /// Check if a position is contained within these bounds.
    pub fn contains(&self, pos: &Position) -> bool {
        pos.row >= self.row
            && pos.row < self.row + self.height
            && pos.col >= self.col
            && pos.col < self.col + self.width
    }

    /// Overlapping region of two bounds, if any.
    pub fn intersection(&self, other: &Bounds) -> Option<Bounds> {
        let row = self.row.max(other.row);
        let col = self.col.max(other.col);
        let bottom = (self.row + self.height).min(other.row + other.height);
        let right = (self.col + self.width).min(other.col + other.width);
        if bottom <= row || right <= col {
            return None;
        }
        Some(Bounds::new(row, col, right - col, bottom - row))
    }
}
