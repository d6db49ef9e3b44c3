//! Property-based tests for the parser and screen state.
//!
//! Uses proptest to generate byte streams, sizes and coordinates and checks
//! the invariants the pumps rely on.

use proptest::prelude::*;
use std::collections::BTreeSet;

use termbridge_core::{Dimensions, Position};
use termbridge_emulator::{AnsiParser, TerminalState};

/// One fragment of realistic terminal output.
fn output_fragment() -> impl Strategy<Value = Vec<u8>> {
    prop_oneof![
        "[a-zA-Z0-9 ]{1,12}".prop_map(String::into_bytes),
        Just(b"\r\n".to_vec()),
        Just(b"\t".to_vec()),
        Just(b"\x08".to_vec()),
        (0u8..110).prop_map(|n| format!("\x1b[{n}m").into_bytes()),
        (1u16..40, 1u16..100).prop_map(|(r, c)| format!("\x1b[{r};{c}H").into_bytes()),
        (0u8..3).prop_map(|n| format!("\x1b[{n}J").into_bytes()),
        (0u8..3).prop_map(|n| format!("\x1b[{n}K").into_bytes()),
        Just("世界".as_bytes().to_vec()),
        Just("e\u{0301}".as_bytes().to_vec()),
        Just(b"\x1b[?1049h".to_vec()),
        Just(b"\x1b[?1049l".to_vec()),
        Just(b"\x1b]0;title\x07".to_vec()),
        Just(b"\x1b[38;2;10;20;30m".to_vec()),
        Just(b"\x1b[3L\x1b[2M\x1b[4@\x1b[2P".to_vec()),
        Just(b"\x1bM\x1bD\x1b7\x1b8".to_vec()),
    ]
}

fn output_stream() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(output_fragment(), 1..40).prop_map(|parts| parts.concat())
}

fn dims() -> impl Strategy<Value = (u16, u16)> {
    (2u16..40, 2u16..100)
}

fn run_chunks(dimensions: Dimensions, chunks: &[&[u8]]) -> TerminalState {
    let mut parser = AnsiParser::new();
    let mut state = TerminalState::new(dimensions);
    for chunk in chunks {
        state.apply_all(&parser.feed(chunk));
    }
    state
}

fn split_at_points<'a>(bytes: &'a [u8], points: &[usize]) -> Vec<&'a [u8]> {
    let mut cuts: Vec<usize> = points.iter().map(|p| p % (bytes.len() + 1)).collect();
    cuts.sort_unstable();
    cuts.dedup();
    let mut chunks = Vec::new();
    let mut start = 0;
    for cut in cuts {
        chunks.push(&bytes[start..cut]);
        start = cut;
    }
    chunks.push(&bytes[start..]);
    chunks
}

fn fill(state: &mut TerminalState, rows: u16, cols: u16) {
    let mut parser = AnsiParser::new();
    for row in 0..rows {
        let line: String = (0..cols)
            .map(|c| char::from(b'a' + ((row + c) % 26) as u8))
            .collect();
        let bytes = format!("\x1b[{};1H{}", row + 1, line);
        state.apply_all(&parser.feed(bytes.as_bytes()));
    }
}

proptest! {
    /// Splitting a stream at arbitrary byte boundaries never changes the result.
    #[test]
    fn chunking_does_not_change_final_state(
        (rows, cols) in dims(),
        stream in output_stream(),
        points in prop::collection::vec(any::<usize>(), 0..12),
    ) {
        let dimensions = Dimensions::new(rows, cols);
        let whole = run_chunks(dimensions, &[stream.as_slice()]);
        let chunked = run_chunks(dimensions, &split_at_points(&stream, &points));

        prop_assert_eq!(whole.primary(), chunked.primary());
        prop_assert_eq!(whole.alternate(), chunked.alternate());
        prop_assert_eq!(whole.cursor(), chunked.cursor());
        prop_assert_eq!(whole.modes(), chunked.modes());
        prop_assert_eq!(whole.pen(), chunked.pen());
        prop_assert_eq!(whole.title(), chunked.title());
    }

    /// Byte-at-a-time delivery matches whole delivery.
    #[test]
    fn single_byte_chunks_match(stream in output_stream()) {
        let dimensions = Dimensions::new(24, 80);
        let whole = run_chunks(dimensions, &[stream.as_slice()]);
        let bytes: Vec<&[u8]> = stream.chunks(1).collect();
        let chunked = run_chunks(dimensions, &bytes);
        prop_assert_eq!(whole.text(), chunked.text());
        prop_assert_eq!(whole.cursor(), chunked.cursor());
    }

    /// The cursor stays inside the screen whatever the stream does.
    #[test]
    fn cursor_always_in_bounds((rows, cols) in dims(), stream in output_stream()) {
        let state = run_chunks(Dimensions::new(rows, cols), &[stream.as_slice()]);
        let pos = state.cursor().position;
        prop_assert!(pos.row < rows);
        prop_assert!(pos.col < cols);
    }

    /// Resizing away and back keeps the common sub-rectangle intact.
    #[test]
    fn resize_round_trip_preserves_common_cells(
        (r1, c1) in dims(),
        (r2, c2) in dims(),
    ) {
        let mut state = TerminalState::new(Dimensions::new(r1, c1));
        fill(&mut state, r1, c1);
        let before = state.clone();

        state.resize(Dimensions::new(r2, c2)).unwrap();
        state.resize(Dimensions::new(r1, c1)).unwrap();

        for row in 0..r1.min(r2) {
            for col in 0..c1.min(c2) {
                prop_assert_eq!(state.cell(row, col), before.cell(row, col));
            }
        }
    }

    /// Dirty entries coalesce per coordinate and claiming empties the set.
    #[test]
    fn dirty_set_counts_distinct_cells(
        targets in prop::collection::vec((0u16..24, 0u16..80), 1..60),
    ) {
        let mut parser = AnsiParser::new();
        let mut state = TerminalState::new(Dimensions::new(24, 80));

        for (row, col) in &targets {
            let bytes = format!("\x1b[{};{}HX", row + 1, col + 1);
            state.apply_all(&parser.feed(bytes.as_bytes()));
        }

        let distinct: BTreeSet<Position> = targets
            .iter()
            .map(|&(row, col)| Position::new(row, col))
            .collect();
        prop_assert_eq!(state.dirty().len(), distinct.len());

        let claimed = state.take_dirty();
        prop_assert_eq!(claimed.len(), distinct.len());
        prop_assert!(state.take_dirty().is_empty());
    }

    /// Entering and leaving the alternate screen restores content and cursor.
    #[test]
    fn alternate_screen_round_trip(stream in output_stream(), (rows, cols) in dims()) {
        let mut parser = AnsiParser::new();
        let mut state = TerminalState::new(Dimensions::new(rows, cols));
        state.apply_all(&parser.feed(&stream));
        state.apply_all(&parser.feed(b"\x1b[?1049l"));

        let text = state.text();
        let cursor = state.cursor();
        let primary = state.primary().clone();

        state.apply_all(&parser.feed(b"\x1b[?1049h\x1b[?1049l"));

        prop_assert_eq!(state.text(), text);
        prop_assert_eq!(state.cursor(), cursor);
        prop_assert_eq!(state.primary(), &primary);
    }

    /// An unknown sequence is skipped and the next printable still lands.
    #[test]
    fn unknown_sequences_do_not_corrupt_parsing(
        params in "[0-9;]{0,8}",
        final_byte in prop::sample::select(vec![b'y', b'z', b'~', b'p', b'q', b'w']),
        osc_code in 100u16..999,
    ) {
        let mut bytes = format!("\x1b[{params}").into_bytes();
        bytes.push(final_byte);
        bytes.extend_from_slice(format!("\x1b]{osc_code};junk\x07").as_bytes());
        bytes.extend_from_slice(b"\x1bZX");

        let state = run_chunks(Dimensions::new(24, 80), &[bytes.as_slice()]);
        prop_assert_eq!(state.cell(0, 0).map(|c| c.character), Some('X'));
        prop_assert_eq!(state.cursor().position, Position::new(0, 1));
    }
}
