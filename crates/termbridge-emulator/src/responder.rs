//! Replies to device queries (DA, DSR) found in the workload's output.

use tracing::trace;

use crate::event::{DeviceQuery, TerminalEvent};
use crate::state::TerminalState;

/// Answers DA1, DA2 and DSR queries on behalf of a virtual terminal.
///
/// Call [`QueryResponder::respond`] after the event has been applied so a
/// cursor position report reflects every earlier byte of the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryResponder {
    enabled: bool,
}

impl Default for QueryResponder {
    fn default() -> Self {
        Self::new(true)
    }
}

impl QueryResponder {
    /// Create a responder. A disabled responder never replies.
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    /// Whether replies are produced.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Reply bytes for `event`, or None if it needs no reply.
    pub fn respond(&self, event: &TerminalEvent, state: &TerminalState) -> Option<Vec<u8>> {
        if !self.enabled {
            return None;
        }
        let TerminalEvent::DeviceAttributesQuery(query) = event else {
            return None;
        };
        let reply = match query {
            // VT100 with advanced video option
            DeviceQuery::Primary => b"\x1b[?1;2c".to_vec(),
            DeviceQuery::Secondary => b"\x1b[>0;10;1c".to_vec(),
            DeviceQuery::Status => b"\x1b[0n".to_vec(),
            DeviceQuery::CursorPosition => {
                let pos = state.cursor().position;
                format!("\x1b[{};{}R", pos.row + 1, pos.col + 1).into_bytes()
            }
        };
        trace!(?query, "answering device query");
        Some(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::AnsiParser;
    use termbridge_core::Dimensions;

    fn replies(input: &[u8]) -> Vec<Vec<u8>> {
        let mut parser = AnsiParser::new();
        let mut state = TerminalState::new(Dimensions::new(24, 80));
        let responder = QueryResponder::default();
        let mut out = Vec::new();
        for event in parser.feed(input) {
            state.apply(&event);
            if let Some(reply) = responder.respond(&event, &state) {
                out.push(reply);
            }
        }
        out
    }

    #[test]
    fn test_device_attributes() {
        assert_eq!(replies(b"\x1b[c"), vec![b"\x1b[?1;2c".to_vec()]);
        assert_eq!(replies(b"\x1b[>c"), vec![b"\x1b[>0;10;1c".to_vec()]);
        assert_eq!(replies(b"\x1b[5n"), vec![b"\x1b[0n".to_vec()]);
    }

    #[test]
    fn test_cursor_report_follows_stream_order() {
        let out = replies(b"\x1b[6nabc\x1b[3;7H\x1b[6n");
        assert_eq!(out, vec![b"\x1b[1;1R".to_vec(), b"\x1b[3;7R".to_vec()]);
    }

    #[test]
    fn test_disabled_never_replies() {
        let state = TerminalState::new(Dimensions::new(24, 80));
        let responder = QueryResponder::new(false);
        let event = TerminalEvent::DeviceAttributesQuery(DeviceQuery::Primary);
        assert!(responder.respond(&event, &state).is_none());
    }

    #[test]
    fn test_plain_output_needs_no_reply() {
        assert!(replies(b"hello\r\n").is_empty());
    }
}
