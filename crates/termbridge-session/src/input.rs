//! Encoding decoded input events into the bytes a workload expects.

use termbridge_core::InputEvent;
use termbridge_emulator::ModeFlags;

const PASTE_START: &[u8] = b"\x1b[200~";
const PASTE_END: &[u8] = b"\x1b[201~";

/// Encode `event` for a byte-oriented workload under the current modes.
///
/// Mouse events the workload has not asked for, and resize events, encode
/// to nothing.
pub fn encode_input(event: &InputEvent, modes: &ModeFlags) -> Vec<u8> {
    match event {
        InputEvent::Key { key } => key.to_escape_sequence(modes.application_cursor),
        InputEvent::Text { text } => text.as_bytes().to_vec(),
        InputEvent::Mouse { event } => {
            if modes.mouse_tracking.reports(event.kind) {
                event.encode(modes.mouse_protocol())
            } else {
                Vec::new()
            }
        }
        InputEvent::Paste { text } => {
            if modes.bracketed_paste {
                let mut out = Vec::with_capacity(text.len() + 12);
                out.extend_from_slice(PASTE_START);
                out.extend_from_slice(text.as_bytes());
                out.extend_from_slice(PASTE_END);
                out
            } else {
                text.as_bytes().to_vec()
            }
        }
        InputEvent::Resize { .. } => Vec::new(),
        InputEvent::Raw { bytes } => bytes.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use termbridge_core::{Dimensions, Key, MouseButton, MouseEvent, MouseEventKind, MouseTracking};

    #[test]
    fn test_keys_follow_cursor_mode() {
        let mut modes = ModeFlags::default();
        let up = InputEvent::key(Key::Up);
        assert_eq!(encode_input(&up, &modes), b"\x1b[A");
        modes.application_cursor = true;
        assert_eq!(encode_input(&up, &modes), b"\x1bOA");
    }

    #[test]
    fn test_text_and_raw() {
        let modes = ModeFlags::default();
        assert_eq!(encode_input(&InputEvent::text("hi"), &modes), b"hi");
        let raw = InputEvent::Raw {
            bytes: vec![0x1b, b'x'],
        };
        assert_eq!(encode_input(&raw, &modes), vec![0x1b, b'x']);
    }

    #[test]
    fn test_paste_brackets_only_when_enabled() {
        let mut modes = ModeFlags::default();
        let paste = InputEvent::Paste {
            text: "ls".to_string(),
        };
        assert_eq!(encode_input(&paste, &modes), b"ls");
        modes.bracketed_paste = true;
        assert_eq!(encode_input(&paste, &modes), b"\x1b[200~ls\x1b[201~");
    }

    #[test]
    fn test_mouse_respects_tracking() {
        let mut modes = ModeFlags::default();
        let click = InputEvent::Mouse {
            event: MouseEvent::new(MouseEventKind::Down(MouseButton::Left), 4, 2),
        };
        assert!(encode_input(&click, &modes).is_empty());

        modes.mouse_tracking = MouseTracking::Press;
        modes.sgr_mouse = true;
        assert_eq!(encode_input(&click, &modes), b"\x1b[<0;5;3M");

        let motion = InputEvent::Mouse {
            event: MouseEvent::new(MouseEventKind::Moved, 4, 2),
        };
        assert!(encode_input(&motion, &modes).is_empty());
    }

    #[test]
    fn test_resize_encodes_nothing() {
        let resize = InputEvent::Resize {
            dimensions: Dimensions::new(10, 10),
        };
        assert!(encode_input(&resize, &ModeFlags::default()).is_empty());
    }
}
