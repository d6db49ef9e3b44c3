//! ANSI renderer for dirty cells.
//!
//! Produces the byte stream a real terminal needs to mirror the active
//! buffer. Used by the delta output transform, which repaints only what the
//! workload changed instead of forwarding its raw output.

use std::fmt::Write as _;

use termbridge_core::{CellAttributes, Color, Position};

use crate::state::{Pen, TerminalState};

const SGR_ATTRS: [(CellAttributes, u8); 8] = [
    (CellAttributes::BOLD, 1),
    (CellAttributes::DIM, 2),
    (CellAttributes::ITALIC, 3),
    (CellAttributes::UNDERLINE, 4),
    (CellAttributes::BLINK, 5),
    (CellAttributes::REVERSE, 7),
    (CellAttributes::HIDDEN, 8),
    (CellAttributes::STRIKETHROUGH, 9),
];

fn push_color(out: &mut String, color: Color, foreground: bool) {
    let base = if foreground { 30 } else { 40 };
    match color {
        Color::Default => {}
        Color::Indexed(n) => {
            let _ = write!(out, ";{};5;{}", base + 8, n);
        }
        Color::Rgb { r, g, b } => {
            let _ = write!(out, ";{};2;{};{};{}", base + 8, r, g, b);
        }
        named => {
            if let Some(i) = named.ansi_index() {
                let code = if i < 8 { base + i } else { base + 60 + (i - 8) };
                let _ = write!(out, ";{code}");
            }
        }
    }
}

/// SGR sequence selecting `pen` from a reset state.
pub fn sgr_sequence(pen: &Pen) -> String {
    let mut out = String::from("\x1b[0");
    for (flag, code) in SGR_ATTRS {
        if pen.attrs.contains(flag) {
            let _ = write!(out, ";{code}");
        }
    }
    push_color(&mut out, pen.fg, true);
    push_color(&mut out, pen.bg, false);
    out.push('m');
    out
}

fn cup(out: &mut String, pos: Position) {
    let _ = write!(out, "\x1b[{};{}H", pos.row + 1, pos.col + 1);
}

/// Render the given cells of the active buffer, then place the cursor.
///
/// `dirty` is expected in row-major order, as returned by
/// [`TerminalState::take_dirty`]. Continuation cells are skipped; their
/// leading wide glyph paints both columns.
pub fn render_delta(state: &TerminalState, dirty: &[Position]) -> Vec<u8> {
    let mut out = String::new();
    let mut expected: Option<Position> = None;
    let mut pen: Option<Pen> = None;

    for &pos in dirty {
        let Some(cell) = state.cell(pos.row, pos.col) else {
            continue;
        };
        if cell.is_continuation() {
            continue;
        }
        if expected != Some(pos) {
            cup(&mut out, pos);
        }
        let cell_pen = Pen {
            fg: cell.fg,
            bg: cell.bg,
            attrs: cell.attrs,
        };
        if pen != Some(cell_pen) {
            out.push_str(&sgr_sequence(&cell_pen));
            pen = Some(cell_pen);
        }
        out.push(cell.character);
        out.extend(cell.combining.iter());
        expected = Some(Position::new(pos.row, pos.col + u16::from(cell.width)));
    }

    if pen.is_some() {
        out.push_str("\x1b[0m");
    }
    let cursor = state.cursor();
    cup(&mut out, cursor.position);
    out.push_str(if cursor.visible { "\x1b[?25h" } else { "\x1b[?25l" });
    out.into_bytes()
}

/// Clear the display and render every cell of the active buffer.
pub fn render_full(state: &TerminalState) -> Vec<u8> {
    let dims = state.dimensions();
    let all: Vec<Position> = (0..dims.rows)
        .flat_map(|row| (0..dims.cols).map(move |col| Position::new(row, col)))
        .collect();
    let mut out = b"\x1b[0m\x1b[2J".to_vec();
    out.extend(render_delta(state, &all));
    out
}
