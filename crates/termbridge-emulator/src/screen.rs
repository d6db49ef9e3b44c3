//! Character-cell screen buffer.

use termbridge_core::{Bounds, Cell, Color, Dimensions};

/// A rows x cols grid of cells stored row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenBuffer {
    cells: Vec<Cell>,
    dimensions: Dimensions,
}

impl ScreenBuffer {
    /// Create a blank buffer.
    pub fn new(dimensions: Dimensions) -> Self {
        Self {
            cells: vec![Cell::default(); dimensions.cell_count()],
            dimensions,
        }
    }

    fn index(&self, row: u16, col: u16) -> Option<usize> {
        if row < self.dimensions.rows && col < self.dimensions.cols {
            Some(row as usize * self.dimensions.cols as usize + col as usize)
        } else {
            None
        }
    }

    /// Buffer dimensions.
    pub fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// Get cell at position. Returns None if out of bounds.
    pub fn cell(&self, row: u16, col: u16) -> Option<&Cell> {
        self.index(row, col).map(|i| &self.cells[i])
    }

    /// Get mutable cell at position. Returns None if out of bounds.
    pub fn cell_mut(&mut self, row: u16, col: u16) -> Option<&mut Cell> {
        self.index(row, col).map(move |i| &mut self.cells[i])
    }

    /// Replace a cell. Out-of-bounds writes are ignored.
    pub fn set(&mut self, row: u16, col: u16, cell: Cell) {
        if let Some(i) = self.index(row, col) {
            self.cells[i] = cell;
        }
    }

    /// Get entire row as a slice.
    pub fn row(&self, row: u16) -> Option<&[Cell]> {
        if row < self.dimensions.rows {
            let start = row as usize * self.dimensions.cols as usize;
            let end = start + self.dimensions.cols as usize;
            Some(&self.cells[start..end])
        } else {
            None
        }
    }

    fn row_mut(&mut self, row: u16) -> &mut [Cell] {
        let start = row as usize * self.dimensions.cols as usize;
        let end = start + self.dimensions.cols as usize;
        &mut self.cells[start..end]
    }

    /// Text of one row with trailing whitespace trimmed.
    pub fn line_text(&self, row: u16) -> Option<String> {
        self.row(row).map(|cells| {
            let mut text = String::with_capacity(cells.len());
            for cell in cells.iter().filter(|c| !c.is_continuation()) {
                text.push(cell.character);
                text.extend(cell.combining.iter());
            }
            text.trim_end().to_string()
        })
    }

    /// Extract text from a region, trimming trailing whitespace per line.
    pub fn extract_text(&self, bounds: &Bounds) -> String {
        let mut lines = Vec::with_capacity(bounds.height as usize);
        for row in bounds.row..bounds.row.saturating_add(bounds.height) {
            let mut line = String::new();
            for col in bounds.col..bounds.col.saturating_add(bounds.width) {
                if let Some(cell) = self.cell(row, col) {
                    if !cell.is_continuation() {
                        line.push(cell.character);
                        line.extend(cell.combining.iter());
                    }
                }
            }
            lines.push(line.trim_end().to_string());
        }
        lines.join("\n")
    }

    /// Convert the whole buffer to plain text.
    pub fn to_plain_text(&self) -> String {
        self.extract_text(&Bounds::screen(self.dimensions))
    }

    /// Blank every cell, keeping `bg`.
    pub fn clear(&mut self, bg: Color) {
        self.cells.fill(Cell::blank(bg));
    }

    /// Blank columns `[start, end)` of a row.
    pub fn erase_cols(&mut self, row: u16, start: u16, end: u16, bg: Color) {
        if row >= self.dimensions.rows {
            return;
        }
        let end = end.min(self.dimensions.cols);
        let start = start.min(end);
        self.row_mut(row)[start as usize..end as usize].fill(Cell::blank(bg));
    }

    /// Blank whole rows `[start, end)`.
    pub fn erase_rows(&mut self, start: u16, end: u16, bg: Color) {
        for row in start..end.min(self.dimensions.rows) {
            self.erase_cols(row, 0, self.dimensions.cols, bg);
        }
    }

    /// Move rows `[top, bottom)` up by `n`, blanking the exposed rows.
    pub fn scroll_up_region(&mut self, top: u16, bottom: u16, n: u16, bg: Color) {
        let bottom = bottom.min(self.dimensions.rows);
        if top >= bottom || n == 0 {
            return;
        }
        let n = n.min(bottom - top);
        let cols = self.dimensions.cols as usize;
        let start = top as usize * cols;
        let end = bottom as usize * cols;
        self.cells[start..end].rotate_left(n as usize * cols);
        self.erase_rows(bottom - n, bottom, bg);
    }

    /// Move rows `[top, bottom)` down by `n`, blanking the exposed rows.
    pub fn scroll_down_region(&mut self, top: u16, bottom: u16, n: u16, bg: Color) {
        let bottom = bottom.min(self.dimensions.rows);
        if top >= bottom || n == 0 {
            return;
        }
        let n = n.min(bottom - top);
        let cols = self.dimensions.cols as usize;
        let start = top as usize * cols;
        let end = bottom as usize * cols;
        self.cells[start..end].rotate_right(n as usize * cols);
        self.erase_rows(top, top + n, bg);
    }

    /// Scroll the whole buffer up by `n` rows.
    pub fn scroll_up(&mut self, n: u16, bg: Color) {
        self.scroll_up_region(0, self.dimensions.rows, n, bg);
    }

    /// Scroll the whole buffer down by `n` rows.
    pub fn scroll_down(&mut self, n: u16, bg: Color) {
        self.scroll_down_region(0, self.dimensions.rows, n, bg);
    }

    /// Insert `n` blank cells at `col`, shifting the rest of the row right.
    pub fn insert_cells(&mut self, row: u16, col: u16, n: u16, bg: Color) {
        if row >= self.dimensions.rows || col >= self.dimensions.cols {
            return;
        }
        let cols = self.dimensions.cols;
        let n = n.min(cols - col) as usize;
        let slice = &mut self.row_mut(row)[col as usize..];
        slice.rotate_right(n);
        slice[..n].fill(Cell::blank(bg));
    }

    /// Delete `n` cells at `col`, shifting the rest of the row left.
    pub fn delete_cells(&mut self, row: u16, col: u16, n: u16, bg: Color) {
        if row >= self.dimensions.rows || col >= self.dimensions.cols {
            return;
        }
        let cols = self.dimensions.cols;
        let n = n.min(cols - col) as usize;
        let slice = &mut self.row_mut(row)[col as usize..];
        slice.rotate_left(n);
        let len = slice.len();
        slice[len - n..].fill(Cell::blank(bg));
    }

    /// Resize, keeping the top-left region that fits.
    ///
    /// Cells outside the new bounds are dropped; new cells are blank. A wide
    /// glyph cut in half by a narrower width is blanked.
    pub fn resize(&mut self, new_dimensions: Dimensions) {
        let mut new_cells = vec![Cell::default(); new_dimensions.cell_count()];

        let copy_rows = self.dimensions.rows.min(new_dimensions.rows);
        let copy_cols = self.dimensions.cols.min(new_dimensions.cols) as usize;

        for row in 0..copy_rows as usize {
            let old_start = row * self.dimensions.cols as usize;
            let new_start = row * new_dimensions.cols as usize;
            new_cells[new_start..new_start + copy_cols]
                .clone_from_slice(&self.cells[old_start..old_start + copy_cols]);
            // A wide glyph whose right half fell off the edge cannot stay.
            if copy_cols > 0 {
                let last = &mut new_cells[new_start + copy_cols - 1];
                if last.width == 2 {
                    *last = Cell::blank(last.bg);
                }
            }
        }

        self.cells = new_cells;
        self.dimensions = new_dimensions;
    }
}
