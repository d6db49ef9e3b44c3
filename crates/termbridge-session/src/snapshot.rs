//! Point-in-time copies of terminal state.

use serde::{Deserialize, Serialize};

use termbridge_core::{Dimensions, Position, Result, TerminalId};
use termbridge_emulator::{ActiveBuffer, ModeFlags, TerminalState};

/// Serializable copy of what the screen shows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerminalSnapshot {
    /// Terminal this was taken from
    pub terminal_id: TerminalId,
    /// Screen size
    pub dimensions: Dimensions,
    /// Cursor position
    pub cursor: Position,
    /// Whether the cursor is shown
    pub cursor_visible: bool,
    /// Window title set by the workload
    pub title: String,
    /// Mode flags
    pub modes: ModeFlags,
    /// Visible lines, trailing whitespace trimmed
    pub lines: Vec<String>,
    /// Lines joined with newlines
    pub text: String,
    /// Whether the alternate screen was active
    pub alternate_screen: bool,
    /// Workload exit code, once known
    pub exit_code: Option<i32>,
    /// Capture time (RFC 3339)
    pub timestamp: String,
}

impl TerminalSnapshot {
    /// Capture `state`.
    pub fn capture(terminal_id: TerminalId, state: &TerminalState, exit_code: Option<i32>) -> Self {
        let lines: Vec<String> = (0..state.height())
            .map(|row| state.line(row).unwrap_or_default())
            .collect();
        let cursor = state.cursor();
        Self {
            terminal_id,
            dimensions: state.dimensions(),
            cursor: cursor.position,
            cursor_visible: cursor.visible,
            title: state.title().to_string(),
            modes: state.modes(),
            text: lines.join("\n"),
            lines,
            alternate_screen: state.active_buffer() == ActiveBuffer::Alternate,
            exit_code,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Pretty JSON rendering.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
