//! Authoritative terminal state: buffers, cursor, modes and dirty set.
//!
//! [`TerminalState::apply`] is the single transition function. It is called
//! by exactly one logical writer (the output pump, or the test harness when no
//! workload is attached); every other consumer only reads.

use serde::{Deserialize, Serialize};
use unicode_width::UnicodeWidthChar;

use termbridge_core::{
    Cell, CellAttributes, Color, Dimensions, Error, MouseProtocol, MouseTracking, Position,
    Result,
};

use crate::dirty::DirtySet;
use crate::event::{
    ControlCode, CursorMove, EditOp, EraseScope, Mode, ScrollDirection, SgrAttribute,
    TerminalEvent,
};
use crate::screen::ScreenBuffer;

const TAB_WIDTH: u16 = 8;

/// Cursor position and visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    /// Current position, always inside the screen
    pub position: Position,
    /// DECTCEM visibility
    pub visible: bool,
}

impl Default for Cursor {
    fn default() -> Self {
        Self {
            position: Position::origin(),
            visible: true,
        }
    }
}

/// Attributes applied to newly printed cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Pen {
    /// Foreground color
    pub fg: Color,
    /// Background color
    pub bg: Color,
    /// Text attributes
    pub attrs: CellAttributes,
}

impl Pen {
    fn apply(&mut self, attr: SgrAttribute) {
        match attr {
            SgrAttribute::Reset => *self = Pen::default(),
            SgrAttribute::Bold => self.attrs.insert(CellAttributes::BOLD),
            SgrAttribute::Dim => self.attrs.insert(CellAttributes::DIM),
            SgrAttribute::Italic => self.attrs.insert(CellAttributes::ITALIC),
            SgrAttribute::Underline => self.attrs.insert(CellAttributes::UNDERLINE),
            SgrAttribute::Blink => self.attrs.insert(CellAttributes::BLINK),
            SgrAttribute::Reverse => self.attrs.insert(CellAttributes::REVERSE),
            SgrAttribute::Hidden => self.attrs.insert(CellAttributes::HIDDEN),
            SgrAttribute::Strikethrough => self.attrs.insert(CellAttributes::STRIKETHROUGH),
            SgrAttribute::NormalIntensity => {
                self.attrs.remove(CellAttributes::BOLD | CellAttributes::DIM)
            }
            SgrAttribute::NoItalic => self.attrs.remove(CellAttributes::ITALIC),
            SgrAttribute::NoUnderline => self.attrs.remove(CellAttributes::UNDERLINE),
            SgrAttribute::NoBlink => self.attrs.remove(CellAttributes::BLINK),
            SgrAttribute::NoReverse => self.attrs.remove(CellAttributes::REVERSE),
            SgrAttribute::NoHidden => self.attrs.remove(CellAttributes::HIDDEN),
            SgrAttribute::NoStrikethrough => self.attrs.remove(CellAttributes::STRIKETHROUGH),
            SgrAttribute::Foreground(c) => self.fg = c,
            SgrAttribute::Background(c) => self.bg = c,
        }
    }

    fn cell(&self, character: char, width: u8) -> Cell {
        Cell {
            character,
            combining: Vec::new(),
            width,
            fg: self.fg,
            bg: self.bg,
            attrs: self.attrs,
        }
    }
}

/// Mode flags toggled by escape sequences or the explicit API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeFlags {
    /// Alternate screen is active
    pub alternate_screen: bool,
    /// Which mouse activity is reported
    pub mouse_tracking: MouseTracking,
    /// SGR (1006) mouse encoding requested
    pub sgr_mouse: bool,
    /// Bracketed paste (2004)
    pub bracketed_paste: bool,
    /// Application cursor keys (DECCKM)
    pub application_cursor: bool,
    /// Auto-wrap (DECAWM)
    pub auto_wrap: bool,
}

impl Default for ModeFlags {
    fn default() -> Self {
        Self {
            alternate_screen: false,
            mouse_tracking: MouseTracking::Off,
            sgr_mouse: false,
            bracketed_paste: false,
            application_cursor: false,
            auto_wrap: true,
        }
    }
}

impl ModeFlags {
    /// Effective mouse protocol: off, basic or SGR.
    pub fn mouse_protocol(&self) -> MouseProtocol {
        match (self.mouse_tracking, self.sgr_mouse) {
            (MouseTracking::Off, _) => MouseProtocol::Off,
            (_, true) => MouseProtocol::Sgr,
            (_, false) => MouseProtocol::Basic,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SavedCursor {
    position: Position,
    pen: Pen,
    pending_wrap: bool,
}

/// Which buffer is receiving output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActiveBuffer {
    /// Normal screen
    Primary,
    /// Alternate screen
    Alternate,
}

/// Complete screen model of one terminal.
#[derive(Debug, Clone)]
pub struct TerminalState {
    primary: ScreenBuffer,
    alternate: ScreenBuffer,
    dimensions: Dimensions,
    cursor: Cursor,
    // Set after printing in the last column; the next print wraps first.
    pending_wrap: bool,
    // DECSTBM margins, inclusive.
    scroll_top: u16,
    scroll_bottom: u16,
    saved_cursor: Option<SavedCursor>,
    alt_saved_cursor: Option<SavedCursor>,
    pen: Pen,
    modes: ModeFlags,
    default_auto_wrap: bool,
    dirty: DirtySet,
    title: String,
    bell_count: u64,
    generation: u64,
}

impl TerminalState {
    /// Create a blank state. Zero sides fall back to 80x24.
    pub fn new(dimensions: Dimensions) -> Self {
        Self::with_auto_wrap(dimensions, true)
    }

    /// Create a blank state with the given initial DECAWM setting.
    pub fn with_auto_wrap(dimensions: Dimensions, auto_wrap: bool) -> Self {
        let dimensions = dimensions.or_default();
        let modes = ModeFlags {
            auto_wrap,
            ..ModeFlags::default()
        };
        Self {
            primary: ScreenBuffer::new(dimensions),
            alternate: ScreenBuffer::new(dimensions),
            dimensions,
            cursor: Cursor::default(),
            pending_wrap: false,
            scroll_top: 0,
            scroll_bottom: dimensions.rows - 1,
            saved_cursor: None,
            alt_saved_cursor: None,
            pen: Pen::default(),
            modes,
            default_auto_wrap: auto_wrap,
            dirty: DirtySet::new(),
            title: String::new(),
            bell_count: 0,
            generation: 0,
        }
    }

    // ---- queries -------------------------------------------------------

    /// Current dimensions.
    pub fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// Width in columns.
    pub fn width(&self) -> u16 {
        self.dimensions.cols
    }

    /// Height in rows.
    pub fn height(&self) -> u16 {
        self.dimensions.rows
    }

    /// The buffer currently receiving output.
    pub fn active(&self) -> &ScreenBuffer {
        if self.modes.alternate_screen {
            &self.alternate
        } else {
            &self.primary
        }
    }

    fn active_mut(&mut self) -> &mut ScreenBuffer {
        if self.modes.alternate_screen {
            &mut self.alternate
        } else {
            &mut self.primary
        }
    }

    /// Which buffer is active.
    pub fn active_buffer(&self) -> ActiveBuffer {
        if self.modes.alternate_screen {
            ActiveBuffer::Alternate
        } else {
            ActiveBuffer::Primary
        }
    }

    /// The primary buffer, whether active or not.
    pub fn primary(&self) -> &ScreenBuffer {
        &self.primary
    }

    /// The alternate buffer, whether active or not.
    pub fn alternate(&self) -> &ScreenBuffer {
        &self.alternate
    }

    /// Cell of the active buffer. None outside the screen.
    pub fn cell(&self, row: u16, col: u16) -> Option<&Cell> {
        self.active().cell(row, col)
    }

    /// Text of one row of the active buffer.
    pub fn line(&self, row: u16) -> Option<String> {
        self.active().line_text(row)
    }

    /// Whole active screen as text.
    pub fn text(&self) -> String {
        self.active().to_plain_text()
    }

    /// Whether the active screen contains `needle`.
    pub fn contains_text(&self, needle: &str) -> bool {
        self.text().contains(needle)
    }

    /// Cursor state.
    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    /// Current mode flags.
    pub fn modes(&self) -> ModeFlags {
        self.modes
    }

    /// Current pen.
    pub fn pen(&self) -> Pen {
        self.pen
    }

    /// Window title set by OSC 0/2.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Number of BEL characters received.
    pub fn bell_count(&self) -> u64 {
        self.bell_count
    }

    /// Counter bumped by every mutation.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Dirty cells not yet claimed.
    pub fn dirty(&self) -> &DirtySet {
        &self.dirty
    }

    /// Claim and clear the dirty set.
    pub fn take_dirty(&mut self) -> Vec<Position> {
        self.dirty.claim()
    }

    // ---- mutation ------------------------------------------------------

    /// Apply a sequence of events in order.
    pub fn apply_all<'a, I>(&mut self, events: I)
    where
        I: IntoIterator<Item = &'a TerminalEvent>,
    {
        for event in events {
            self.apply(event);
        }
    }

    /// Apply one event.
    pub fn apply(&mut self, event: &TerminalEvent) {
        match event {
            TerminalEvent::Print(c) => self.print(*c),
            TerminalEvent::Control(code) => self.control(*code),
            TerminalEvent::CursorMove(mv) => self.move_cursor(*mv),
            TerminalEvent::SetGraphicRendition(attrs) => {
                for attr in attrs {
                    self.pen.apply(*attr);
                }
            }
            TerminalEvent::SetMode { mode, enabled } => self.set_mode_inner(*mode, *enabled),
            TerminalEvent::EraseRegion(scope) => self.erase(*scope),
            TerminalEvent::Edit(op) => self.edit(*op),
            TerminalEvent::DeviceAttributesQuery(_) => {}
            TerminalEvent::OscCommand { code, payload } => {
                if matches!(code, 0 | 2) {
                    self.title = payload.clone();
                }
            }
            TerminalEvent::Index => self.linefeed(),
            TerminalEvent::ReverseIndex => self.reverse_index(),
            TerminalEvent::NextLine => {
                self.carriage_return();
                self.linefeed();
            }
            TerminalEvent::SaveCursor => {
                self.saved_cursor = Some(self.save());
            }
            TerminalEvent::RestoreCursor => {
                let saved = self.saved_cursor.unwrap_or(SavedCursor {
                    position: Position::origin(),
                    pen: Pen::default(),
                    pending_wrap: false,
                });
                self.restore(saved);
            }
            TerminalEvent::SetScrollRegion { top, bottom } => {
                self.set_scroll_region(*top, *bottom)
            }
            TerminalEvent::Scroll { direction, lines } => match direction {
                ScrollDirection::Up => self.scroll_region_up(self.scroll_top, *lines),
                ScrollDirection::Down => self.scroll_region_down(self.scroll_top, *lines),
            },
            TerminalEvent::FullReset => self.full_reset(),
        }
        self.generation += 1;
    }

    /// Toggle a mode through the explicit API.
    pub fn set_mode(&mut self, mode: Mode, enabled: bool) {
        self.set_mode_inner(mode, enabled);
        self.generation += 1;
    }

    /// Resize both buffers, clamping the cursor into the new bounds.
    pub fn resize(&mut self, dimensions: Dimensions) -> Result<()> {
        if !dimensions.is_valid() {
            return Err(Error::InvalidDimensions {
                rows: dimensions.rows,
                cols: dimensions.cols,
            });
        }
        if dimensions == self.dimensions {
            return Ok(());
        }

        self.primary.resize(dimensions);
        self.alternate.resize(dimensions);
        self.dimensions = dimensions;

        self.cursor.position = self.cursor.position.clamp_to(dimensions);
        self.pending_wrap = false;
        self.scroll_top = 0;
        self.scroll_bottom = dimensions.rows - 1;
        for saved in [&mut self.saved_cursor, &mut self.alt_saved_cursor]
            .into_iter()
            .flatten()
        {
            saved.position = saved.position.clamp_to(dimensions);
            saved.pending_wrap = false;
        }

        self.dirty.retain_within(dimensions);
        self.dirty.mark_all(dimensions);
        self.generation += 1;
        Ok(())
    }

    fn save(&self) -> SavedCursor {
        SavedCursor {
            position: self.cursor.position,
            pen: self.pen,
            pending_wrap: self.pending_wrap,
        }
    }

    fn restore(&mut self, saved: SavedCursor) {
        self.cursor.position = saved.position.clamp_to(self.dimensions);
        self.pen = saved.pen;
        self.pending_wrap = saved.pending_wrap;
    }

    fn mark(&mut self, row: u16, col: u16) {
        self.dirty.mark(Position::new(row, col));
    }

    fn print(&mut self, c: char) {
        let width = match c.width() {
            Some(w) => w,
            None => return,
        };
        if width == 0 {
            self.attach_combining(c);
            return;
        }

        let cols = self.dimensions.cols;
        // A wide glyph needs two columns; on a one-column screen print it narrow.
        let width = if width >= 2 && cols >= 2 { 2u16 } else { 1u16 };

        if self.pending_wrap && self.modes.auto_wrap {
            self.carriage_return();
            self.linefeed();
        }
        self.pending_wrap = false;

        if width == 2 && self.cursor.position.col == cols - 1 {
            if self.modes.auto_wrap {
                let row = self.cursor.position.row;
                self.clear_wide_overlap(row, cols - 1);
                let bg = self.pen.bg;
                self.active_mut().set(row, cols - 1, Cell::blank(bg));
                self.mark(row, cols - 1);
                self.carriage_return();
                self.linefeed();
            } else {
                self.cursor.position.col = cols - 2;
            }
        }

        let Position { row, col } = self.cursor.position;
        self.clear_wide_overlap(row, col);
        if width == 2 {
            self.clear_wide_overlap(row, col + 1);
        }

        let cell = self.pen.cell(c, width as u8);
        self.active_mut().set(row, col, cell);
        self.mark(row, col);
        if width == 2 {
            let cont = Cell::continuation(self.pen.fg, self.pen.bg, self.pen.attrs);
            self.active_mut().set(row, col + 1, cont);
            self.mark(row, col + 1);
        }

        let next = col + width;
        if next >= cols {
            self.cursor.position.col = cols - 1;
            self.pending_wrap = self.modes.auto_wrap;
        } else {
            self.cursor.position.col = next;
        }
    }

    /// Blank the other half of a wide glyph that a write at (row, col) splits.
    fn clear_wide_overlap(&mut self, row: u16, col: u16) {
        let Some(cell) = self.active().cell(row, col) else {
            return;
        };
        let bg = self.pen.bg;
        if cell.is_continuation() && col > 0 {
            self.active_mut().set(row, col - 1, Cell::blank(bg));
            self.mark(row, col - 1);
        } else if cell.width == 2 && col + 1 < self.dimensions.cols {
            self.active_mut().set(row, col + 1, Cell::blank(bg));
            self.mark(row, col + 1);
        }
    }

    fn attach_combining(&mut self, c: char) {
        let Position { row, mut col } = self.cursor.position;
        if !self.pending_wrap {
            if col == 0 {
                return;
            }
            col -= 1;
        }
        if col > 0 && self.active().cell(row, col).map_or(false, Cell::is_continuation) {
            col -= 1;
        }
        if let Some(cell) = self.active().cell(row, col) {
            let mut updated = cell.clone();
            updated.combining.push(c);
            self.active_mut().set(row, col, updated);
            self.mark(row, col);
        }
    }

    fn control(&mut self, code: ControlCode) {
        match code {
            ControlCode::Bell => self.bell_count += 1,
            ControlCode::Backspace => {
                self.pending_wrap = false;
                self.cursor.position.col = self.cursor.position.col.saturating_sub(1);
            }
            ControlCode::Tab => {
                self.pending_wrap = false;
                let next = (self.cursor.position.col / TAB_WIDTH + 1) * TAB_WIDTH;
                self.cursor.position.col = next.min(self.dimensions.cols - 1);
            }
            ControlCode::LineFeed => self.linefeed(),
            ControlCode::CarriageReturn => self.carriage_return(),
        }
    }

    fn carriage_return(&mut self) {
        self.pending_wrap = false;
        self.cursor.position.col = 0;
    }

    /// Scroll margins as an inclusive `(top, bottom)` row pair.
    pub fn scroll_region(&self) -> (u16, u16) {
        (self.scroll_top, self.scroll_bottom)
    }

    /// DECSTBM. An empty or inverted region resets to the full screen; the
    /// cursor always homes.
    fn set_scroll_region(&mut self, top: u16, bottom: Option<u16>) {
        let last = self.dimensions.rows - 1;
        let bottom = bottom.unwrap_or(last).min(last);
        if top < bottom {
            self.scroll_top = top;
            self.scroll_bottom = bottom;
        } else {
            self.scroll_top = 0;
            self.scroll_bottom = last;
        }
        self.pending_wrap = false;
        self.cursor.position = Position::origin();
    }

    // Scroll rows `from..=scroll_bottom` up by `n`.
    fn scroll_region_up(&mut self, from: u16, n: u16) {
        let end = self.scroll_bottom + 1;
        let bg = self.pen.bg;
        self.active_mut().scroll_up_region(from, end, n, bg);
        self.dirty.mark_rows(from, end, self.dimensions.cols);
    }

    // Scroll rows `from..=scroll_bottom` down by `n`.
    fn scroll_region_down(&mut self, from: u16, n: u16) {
        let end = self.scroll_bottom + 1;
        let bg = self.pen.bg;
        self.active_mut().scroll_down_region(from, end, n, bg);
        self.dirty.mark_rows(from, end, self.dimensions.cols);
    }

    fn in_scroll_region(&self) -> bool {
        (self.scroll_top..=self.scroll_bottom).contains(&self.cursor.position.row)
    }

    /// Move down one row, scrolling the region when at its bottom margin.
    fn linefeed(&mut self) {
        self.pending_wrap = false;
        let row = self.cursor.position.row;
        if row == self.scroll_bottom {
            self.scroll_region_up(self.scroll_top, 1);
        } else if row + 1 < self.dimensions.rows {
            self.cursor.position.row += 1;
        }
    }

    fn reverse_index(&mut self) {
        self.pending_wrap = false;
        let row = self.cursor.position.row;
        if row == self.scroll_top {
            self.scroll_region_down(self.scroll_top, 1);
        } else if row > 0 {
            self.cursor.position.row -= 1;
        }
    }

    fn move_cursor(&mut self, mv: CursorMove) {
        self.pending_wrap = false;
        let max_row = self.dimensions.rows - 1;
        let max_col = self.dimensions.cols - 1;
        let pos = &mut self.cursor.position;
        match mv {
            CursorMove::Up(n) => pos.row = pos.row.saturating_sub(n),
            CursorMove::Down(n) => pos.row = pos.row.saturating_add(n).min(max_row),
            CursorMove::Forward(n) => pos.col = pos.col.saturating_add(n).min(max_col),
            CursorMove::Back(n) => pos.col = pos.col.saturating_sub(n),
            CursorMove::NextLine(n) => {
                pos.row = pos.row.saturating_add(n).min(max_row);
                pos.col = 0;
            }
            CursorMove::PrevLine(n) => {
                pos.row = pos.row.saturating_sub(n);
                pos.col = 0;
            }
            CursorMove::Column(c) => pos.col = c.min(max_col),
            CursorMove::Row(r) => pos.row = r.min(max_row),
            CursorMove::To { row, col } => {
                pos.row = row.min(max_row);
                pos.col = col.min(max_col);
            }
        }
    }

    fn set_mode_inner(&mut self, mode: Mode, enabled: bool) {
        match mode {
            Mode::ApplicationCursor => self.modes.application_cursor = enabled,
            Mode::AutoWrap => {
                self.modes.auto_wrap = enabled;
                if !enabled {
                    self.pending_wrap = false;
                }
            }
            Mode::CursorVisible => self.cursor.visible = enabled,
            Mode::AlternateScreen => {
                if enabled && !self.modes.alternate_screen {
                    self.alt_saved_cursor = Some(self.save());
                    self.modes.alternate_screen = true;
                    self.dirty.mark_all(self.dimensions);
                } else if !enabled && self.modes.alternate_screen {
                    self.modes.alternate_screen = false;
                    if let Some(saved) = self.alt_saved_cursor.take() {
                        self.restore(saved);
                    }
                    self.dirty.mark_all(self.dimensions);
                }
            }
            Mode::MouseTracking(level) => {
                if enabled {
                    self.modes.mouse_tracking = level;
                } else if self.modes.mouse_tracking == level {
                    self.modes.mouse_tracking = MouseTracking::Off;
                }
            }
            Mode::SgrMouse => self.modes.sgr_mouse = enabled,
            Mode::BracketedPaste => self.modes.bracketed_paste = enabled,
        }
    }

    fn erase(&mut self, scope: EraseScope) {
        self.pending_wrap = false;
        let Position { row, col } = self.cursor.position;
        let Dimensions { rows, cols } = self.dimensions;
        let bg = self.pen.bg;

        let (line_range, row_range) = match scope {
            EraseScope::ToEndOfLine => (Some((col, cols)), None),
            EraseScope::ToStartOfLine => (Some((0, col + 1)), None),
            EraseScope::Line => (Some((0, cols)), None),
            EraseScope::ToEndOfScreen => (Some((col, cols)), Some((row + 1, rows))),
            EraseScope::ToStartOfScreen => (Some((0, col + 1)), Some((0, row))),
            EraseScope::Screen => (None, Some((0, rows))),
        };

        if let Some((start, end)) = line_range {
            self.active_mut().erase_cols(row, start, end, bg);
            self.dirty.mark_cols(row, start, end);
        }
        if let Some((start, end)) = row_range {
            self.active_mut().erase_rows(start, end, bg);
            self.dirty.mark_rows(start, end, cols);
        }
    }

    fn edit(&mut self, op: EditOp) {
        self.pending_wrap = false;
        let Position { row, col } = self.cursor.position;
        let cols = self.dimensions.cols;
        let bg = self.pen.bg;

        match op {
            EditOp::InsertChars(n) => {
                self.active_mut().insert_cells(row, col, n, bg);
                self.dirty.mark_cols(row, col, cols);
            }
            EditOp::DeleteChars(n) => {
                self.active_mut().delete_cells(row, col, n, bg);
                self.dirty.mark_cols(row, col, cols);
            }
            EditOp::EraseChars(n) => {
                let end = col.saturating_add(n).min(cols);
                self.active_mut().erase_cols(row, col, end, bg);
                self.dirty.mark_cols(row, col, end);
            }
            // IL/DL outside the margins are ignored.
            EditOp::InsertLines(n) => {
                if self.in_scroll_region() {
                    self.scroll_region_down(row, n);
                    self.cursor.position.col = 0;
                }
            }
            EditOp::DeleteLines(n) => {
                if self.in_scroll_region() {
                    self.scroll_region_up(row, n);
                    self.cursor.position.col = 0;
                }
            }
        }
    }

    fn full_reset(&mut self) {
        let dims = self.dimensions;
        self.primary = ScreenBuffer::new(dims);
        self.alternate = ScreenBuffer::new(dims);
        self.cursor = Cursor::default();
        self.pending_wrap = false;
        self.scroll_top = 0;
        self.scroll_bottom = dims.rows - 1;
        self.saved_cursor = None;
        self.alt_saved_cursor = None;
        self.pen = Pen::default();
        self.modes = ModeFlags {
            auto_wrap: self.default_auto_wrap,
            ..ModeFlags::default()
        };
        self.title.clear();
        self.dirty.mark_all(dims);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::AnsiParser;

    fn state_with(dims: Dimensions, bytes: &[u8]) -> TerminalState {
        let mut state = TerminalState::new(dims);
        let events = AnsiParser::new().feed(bytes);
        state.apply_all(&events);
        state
    }

    #[test]
    fn test_print_advances_cursor() {
        let state = state_with(Dimensions::new(24, 80), b"Hello");
        assert_eq!(state.line(0).unwrap(), "Hello");
        assert_eq!(state.cursor().position, Position::new(0, 5));
        assert_eq!(state.dirty().len(), 5);
    }

    #[test]
    fn test_sgr_applies_to_following_prints() {
        let state = state_with(Dimensions::new(24, 80), b"AB\x1b[31mC\x1b[0mD");
        assert_eq!(state.cell(0, 0).unwrap().character, 'A');
        assert_eq!(state.cell(0, 1).unwrap().character, 'B');
        let c = state.cell(0, 2).unwrap();
        assert_eq!(c.character, 'C');
        assert_eq!(c.fg, Color::Red);
        let d = state.cell(0, 3).unwrap();
        assert_eq!(d.character, 'D');
        assert_eq!(d.fg, Color::Default);
        assert!(d.attrs.is_default());
    }

    #[test]
    fn test_deferred_wrap_keeps_cursor_in_bounds() {
        let mut state = state_with(Dimensions::new(3, 5), b"abcde");
        assert_eq!(state.cursor().position, Position::new(0, 4));

        state.apply(&TerminalEvent::Print('f'));
        assert_eq!(state.line(1).unwrap(), "f");
        assert_eq!(state.cursor().position, Position::new(1, 1));
    }

    #[test]
    fn test_cr_after_full_line_does_not_wrap() {
        let state = state_with(Dimensions::new(3, 5), b"abcde\r\nx");
        assert_eq!(state.line(0).unwrap(), "abcde");
        assert_eq!(state.line(1).unwrap(), "x");
    }

    #[test]
    fn test_no_autowrap_overwrites_last_column() {
        let state = state_with(Dimensions::new(3, 5), b"\x1b[?7labcdefg");
        assert_eq!(state.line(0).unwrap(), "abcdg");
        assert_eq!(state.line(1).unwrap(), "");
    }

    #[test]
    fn test_linefeed_scrolls_at_bottom() {
        let mut state = state_with(Dimensions::new(3, 5), b"1\r\n2\r\n3");
        state.take_dirty();
        state.apply(&TerminalEvent::Control(ControlCode::LineFeed));
        assert_eq!(state.text(), "2\n3\n");
        assert_eq!(state.cursor().position.row, 2);
        assert_eq!(state.dirty().len(), 15);
    }

    #[test]
    fn test_cursor_moves_clamp() {
        let state = state_with(Dimensions::new(10, 20), b"\x1b[100;100H");
        assert_eq!(state.cursor().position, Position::new(9, 19));

        let state = state_with(Dimensions::new(10, 20), b"\x1b[5;5H\x1b[50A\x1b[50D");
        assert_eq!(state.cursor().position, Position::new(0, 0));
    }

    #[test]
    fn test_erase_uses_current_background() {
        let state = state_with(Dimensions::new(2, 5), b"abcde\x1b[44m\x1b[1;3H\x1b[K");
        assert_eq!(state.line(0).unwrap(), "ab");
        assert_eq!(state.cell(0, 2).unwrap().bg, Color::Blue);
        assert_eq!(state.cell(0, 1).unwrap().bg, Color::Default);
    }

    #[test]
    fn test_erase_scopes() {
        let fill = b"aaaaa\r\nbbbbb\r\nccccc\x1b[2;3H";
        let mut bytes = fill.to_vec();
        bytes.extend_from_slice(b"\x1b[1K");
        assert_eq!(state_with(Dimensions::new(3, 5), &bytes).text(), "aaaaa\n   bb\nccccc");

        let mut bytes = fill.to_vec();
        bytes.extend_from_slice(b"\x1b[J");
        assert_eq!(state_with(Dimensions::new(3, 5), &bytes).text(), "aaaaa\nbb\n");

        let mut bytes = fill.to_vec();
        bytes.extend_from_slice(b"\x1b[1J");
        assert_eq!(state_with(Dimensions::new(3, 5), &bytes).text(), "\n   bb\nccccc");

        let mut bytes = fill.to_vec();
        bytes.extend_from_slice(b"\x1b[2K");
        assert_eq!(state_with(Dimensions::new(3, 5), &bytes).text(), "aaaaa\n\nccccc");

        let mut bytes = fill.to_vec();
        bytes.extend_from_slice(b"\x1b[2J");
        assert_eq!(state_with(Dimensions::new(3, 5), &bytes).text(), "\n\n");
    }

    #[test]
    fn test_alternate_screen_round_trip() {
        let mut state = state_with(Dimensions::new(5, 10), b"primary\r\nline2");
        let before_text = state.text();
        let before_cursor = state.cursor();

        let events = AnsiParser::new().feed(b"\x1b[?1049h");
        state.apply_all(&events);
        assert_eq!(state.active_buffer(), ActiveBuffer::Alternate);
        assert_eq!(state.text(), "\n\n\n\n");

        let events = AnsiParser::new().feed(b"\x1b[?1049l");
        state.apply_all(&events);
        assert_eq!(state.active_buffer(), ActiveBuffer::Primary);
        assert_eq!(state.text(), before_text);
        assert_eq!(state.cursor(), before_cursor);
    }

    #[test]
    fn test_alternate_screen_is_lossless() {
        let mut parser = AnsiParser::new();
        let mut state = TerminalState::new(Dimensions::new(3, 10));
        state.apply_all(&parser.feed(b"main\x1b[?47h\x1b[Halt"));
        assert_eq!(state.line(0).unwrap(), "alt");
        assert_eq!(state.primary().line_text(0).unwrap(), "main");

        state.apply_all(&parser.feed(b"\x1b[?47l\x1b[?47h"));
        assert_eq!(state.line(0).unwrap(), "alt");
    }

    #[test]
    fn test_every_alternate_mode_restores_cursor() {
        for mode in ["47", "1047", "1049"] {
            let mut state = state_with(Dimensions::new(5, 10), b"ab\r\ncd");
            let before = state.cursor();
            let toggle = format!("\x1b[?{mode}h\x1b[4;8Hx\x1b[?{mode}l");
            state.apply_all(&AnsiParser::new().feed(toggle.as_bytes()));
            assert_eq!(state.cursor(), before, "mode {mode}");
        }
    }

    #[test]
    fn test_wide_characters() {
        let state = state_with(Dimensions::new(2, 5), "a世b".as_bytes());
        assert_eq!(state.cell(0, 1).unwrap().width, 2);
        assert!(state.cell(0, 2).unwrap().is_continuation());
        assert_eq!(state.cell(0, 3).unwrap().character, 'b');
        assert_eq!(state.line(0).unwrap(), "a世b");
        assert_eq!(state.cursor().position.col, 4);
    }

    #[test]
    fn test_wide_character_wraps_at_last_column() {
        let state = state_with(Dimensions::new(2, 5), "abcd世".as_bytes());
        assert_eq!(state.line(0).unwrap(), "abcd");
        assert_eq!(state.cell(1, 0).unwrap().character, '世');
    }

    #[test]
    fn test_overwriting_half_of_wide_char() {
        let state = state_with(Dimensions::new(2, 5), "世\x1b[1;2Hx".as_bytes());
        assert_eq!(state.cell(0, 0).unwrap().character, ' ');
        assert_eq!(state.cell(0, 1).unwrap().character, 'x');
        assert!(!state.cell(0, 1).unwrap().is_continuation());
    }

    #[test]
    fn test_combining_mark_attaches_to_previous_cell() {
        let state = state_with(Dimensions::new(2, 10), "e\u{0301}x".as_bytes());
        assert_eq!(state.cell(0, 0).unwrap().text(), "e\u{0301}");
        assert_eq!(state.cell(0, 1).unwrap().character, 'x');
    }

    #[test]
    fn test_resize_shrink_and_grow() {
        let mut state = state_with(Dimensions::new(24, 80), b"\x1b[5;5HX\x1b[20;70HY");
        state.resize(Dimensions::new(12, 40)).unwrap();
        assert_eq!(state.width(), 40);
        assert_eq!(state.height(), 12);
        assert_eq!(state.cell(4, 4).unwrap().character, 'X');
        assert!(state.cell(19, 69).is_none());
        assert_eq!(state.cursor().position, Position::new(11, 39));

        state.resize(Dimensions::new(24, 80)).unwrap();
        assert_eq!(state.cell(4, 4).unwrap().character, 'X');
        assert_eq!(state.cell(19, 69).unwrap().character, ' ');
    }

    #[test]
    fn test_resize_rejects_zero() {
        let mut state = TerminalState::new(Dimensions::new(24, 80));
        assert!(matches!(
            state.resize(Dimensions::new(0, 10)),
            Err(Error::InvalidDimensions { .. })
        ));
    }

    #[test]
    fn test_save_restore_cursor() {
        let state = state_with(Dimensions::new(10, 10), b"\x1b[3;4H\x1b[31m\x1b7\x1b[H\x1b[0m\x1b8X");
        let cell = state.cell(2, 3).unwrap();
        assert_eq!(cell.character, 'X');
        assert_eq!(cell.fg, Color::Red);
    }

    #[test]
    fn test_modes_and_title() {
        let state = state_with(
            Dimensions::new(10, 10),
            b"\x1b[?1h\x1b[?25l\x1b[?2004h\x1b[?1002h\x1b[?1006h\x1b]2;hello\x07",
        );
        let modes = state.modes();
        assert!(modes.application_cursor);
        assert!(modes.bracketed_paste);
        assert_eq!(modes.mouse_tracking, MouseTracking::ButtonMotion);
        assert_eq!(modes.mouse_protocol(), MouseProtocol::Sgr);
        assert!(!state.cursor().visible);
        assert_eq!(state.title(), "hello");
    }

    #[test]
    fn test_mouse_protocol_basic() {
        let mut state = TerminalState::new(Dimensions::new(10, 10));
        assert_eq!(state.modes().mouse_protocol(), MouseProtocol::Off);
        state.set_mode(Mode::MouseTracking(MouseTracking::Press), true);
        assert_eq!(state.modes().mouse_protocol(), MouseProtocol::Basic);
        state.set_mode(Mode::MouseTracking(MouseTracking::Press), false);
        assert_eq!(state.modes().mouse_protocol(), MouseProtocol::Off);
    }

    #[test]
    fn test_insert_delete_lines_and_chars() {
        let mut state = state_with(Dimensions::new(3, 5), b"aaaaa\r\nbbbbb\r\nccccc");
        let mut parser = AnsiParser::new();
        state.apply_all(&parser.feed(b"\x1b[2;1H\x1b[L"));
        assert_eq!(state.text(), "aaaaa\n\nbbbbb");

        state.apply_all(&parser.feed(b"\x1b[M\x1b[1;2H\x1b[2P"));
        assert_eq!(state.text(), "aaa\nbbbbb\n");

        state.apply_all(&parser.feed(b"\x1b[2;2H\x1b[2X"));
        assert_eq!(state.line(1).unwrap(), "b  bb");
    }

    #[test]
    fn test_reverse_index_scrolls_down_at_top() {
        let state = state_with(Dimensions::new(3, 5), b"top\x1bM");
        assert_eq!(state.text(), "\ntop\n");
    }

    #[test]
    fn test_linefeed_scrolls_inside_region() {
        let state = state_with(
            Dimensions::new(4, 5),
            b"top\r\nr1\r\nr2\r\nbot\x1b[2;3r\x1b[3;1H\n",
        );
        assert_eq!(state.text(), "top\nr2\n\nbot");
        assert_eq!(state.cursor().position, Position::new(2, 0));
        assert_eq!(state.scroll_region(), (1, 2));
    }

    #[test]
    fn test_reverse_index_and_su_sd_respect_region() {
        let mut state = state_with(Dimensions::new(4, 5), b"a\r\nb\r\nc\r\nd\x1b[2;3r");
        assert_eq!(state.cursor().position, Position::origin());

        state.apply_all(&AnsiParser::new().feed(b"\x1b[2;1H\x1bM"));
        assert_eq!(state.text(), "a\n\nb\nd");

        state.apply_all(&AnsiParser::new().feed(b"\x1b[S"));
        assert_eq!(state.text(), "a\nb\n\nd");
        state.apply_all(&AnsiParser::new().feed(b"\x1b[2T"));
        assert_eq!(state.text(), "a\n\n\nd");
    }

    #[test]
    fn test_insert_delete_lines_stop_at_bottom_margin() {
        let mut state = state_with(Dimensions::new(4, 5), b"a\r\nb\r\nc\r\nd\x1b[1;3r");
        state.apply_all(&AnsiParser::new().feed(b"\x1b[2;1H\x1b[L"));
        assert_eq!(state.text(), "a\n\nb\nd");
        state.apply_all(&AnsiParser::new().feed(b"\x1b[M"));
        assert_eq!(state.text(), "a\nb\n\nd");

        // Outside the margins IL does nothing.
        state.apply_all(&AnsiParser::new().feed(b"\x1b[4;1H\x1b[L"));
        assert_eq!(state.text(), "a\nb\n\nd");
    }

    #[test]
    fn test_linefeed_below_region_stops_at_last_row() {
        let state = state_with(Dimensions::new(4, 5), b"a\x1b[1;2r\x1b[4;1Hz\n\n");
        assert_eq!(state.text(), "a\n\n\nz");
        assert_eq!(state.cursor().position.row, 3);
    }

    #[test]
    fn test_invalid_region_resets_and_resize_clears_it() {
        let mut state = state_with(Dimensions::new(4, 5), b"\x1b[2;3r");
        assert_eq!(state.scroll_region(), (1, 2));
        state.apply_all(&AnsiParser::new().feed(b"\x1b[3;2r"));
        assert_eq!(state.scroll_region(), (0, 3));

        state.apply_all(&AnsiParser::new().feed(b"\x1b[2;3r"));
        state.resize(Dimensions::new(6, 5)).unwrap();
        assert_eq!(state.scroll_region(), (0, 5));
    }

    #[test]
    fn test_full_reset() {
        let mut state = state_with(Dimensions::new(3, 5), b"\x1b[31mabc\x1b[?1049h\x1b]0;t\x07");
        state.apply(&TerminalEvent::FullReset);
        assert_eq!(state.text(), "\n\n");
        assert_eq!(state.pen(), Pen::default());
        assert!(!state.modes().alternate_screen);
        assert_eq!(state.title(), "");
    }

    #[test]
    fn test_generation_and_bell() {
        let mut state = TerminalState::new(Dimensions::new(3, 5));
        let g0 = state.generation();
        state.apply(&TerminalEvent::Control(ControlCode::Bell));
        assert_eq!(state.bell_count(), 1);
        assert!(state.generation() > g0);
    }

    #[test]
    fn test_zero_dimensions_fall_back() {
        let state = TerminalState::new(Dimensions::new(0, 0));
        assert_eq!(state.dimensions(), Dimensions::new(24, 80));
    }
}
