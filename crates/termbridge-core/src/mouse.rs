//! Mouse events and their X10/SGR wire encodings.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Keyboard modifiers held during an input event.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct Modifiers: u8 {
        /// Shift
        const SHIFT = 1 << 0;
        /// Alt / Meta
        const ALT = 1 << 1;
        /// Control
        const CTRL = 1 << 2;
    }
}

/// Physical mouse button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MouseButton {
    /// Left button
    Left,
    /// Middle button / wheel click
    Middle,
    /// Right button
    Right,
}

impl MouseButton {
    fn code(self) -> u16 {
        match self {
            MouseButton::Left => 0,
            MouseButton::Middle => 1,
            MouseButton::Right => 2,
        }
    }
}

/// What happened to the mouse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MouseEventKind {
    /// Button pressed
    Down(MouseButton),
    /// Button released
    Up(MouseButton),
    /// Moved with a button held
    Drag(MouseButton),
    /// Moved with no button held
    Moved,
    /// Wheel up
    ScrollUp,
    /// Wheel down
    ScrollDown,
}

/// How mouse reports are encoded, from DECSET 1000/1002/1003 and 1006.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MouseProtocol {
    /// Mouse reporting disabled
    #[default]
    Off,
    /// Legacy X10-style `ESC [ M` reports
    Basic,
    /// SGR 1006 `ESC [ <` reports
    Sgr,
}

/// Which mouse activity the workload asked to receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MouseTracking {
    /// No tracking
    #[default]
    Off,
    /// Presses and releases (1000)
    Press,
    /// Presses, releases and drags (1002)
    ButtonMotion,
    /// Every motion event (1003)
    AnyMotion,
}

impl MouseTracking {
    /// Whether this tracking level reports the given event kind.
    pub fn reports(&self, kind: MouseEventKind) -> bool {
        match (self, kind) {
            (MouseTracking::Off, _) => false,
            (MouseTracking::AnyMotion, _) => true,
            (MouseTracking::ButtonMotion, MouseEventKind::Moved) => false,
            (MouseTracking::ButtonMotion, _) => true,
            (MouseTracking::Press, MouseEventKind::Moved | MouseEventKind::Drag(_)) => false,
            (MouseTracking::Press, _) => true,
        }
    }
}

/// A mouse event at a 0-based cell position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MouseEvent {
    /// Event kind
    pub kind: MouseEventKind,
    /// Column (0-based)
    pub col: u16,
    /// Row (0-based)
    pub row: u16,
    /// Modifiers held
    #[serde(default)]
    pub modifiers: Modifiers,
}

impl MouseEvent {
    /// Create a mouse event with no modifiers.
    pub fn new(kind: MouseEventKind, col: u16, row: u16) -> Self {
        Self {
            kind,
            col,
            row,
            modifiers: Modifiers::empty(),
        }
    }

    /// Encode this event for a workload using the given protocol.
    ///
    /// Returns an empty vector when the protocol is off or when the position
    /// cannot be represented in the basic encoding (beyond column/row 223).
    pub fn encode(&self, protocol: MouseProtocol) -> Vec<u8> {
        let (button, pressed) = match self.kind {
            MouseEventKind::Down(b) => (b.code(), true),
            MouseEventKind::Up(b) => (b.code(), false),
            MouseEventKind::Drag(b) => (b.code() + 32, true),
            MouseEventKind::Moved => (35, true),
            MouseEventKind::ScrollUp => (64, true),
            MouseEventKind::ScrollDown => (65, true),
        };

        let mut cb = button;
        if self.modifiers.contains(Modifiers::SHIFT) {
            cb += 4;
        }
        if self.modifiers.contains(Modifiers::ALT) {
            cb += 8;
        }
        if self.modifiers.contains(Modifiers::CTRL) {
            cb += 16;
        }

        let x = self.col.saturating_add(1);
        let y = self.row.saturating_add(1);

        match protocol {
            MouseProtocol::Off => Vec::new(),
            MouseProtocol::Sgr => {
                let suffix = if pressed { 'M' } else { 'm' };
                format!("\x1b[<{cb};{x};{y}{suffix}").into_bytes()
            }
            MouseProtocol::Basic => {
                if x > 223 || y > 223 {
                    return Vec::new();
                }
                // X10 cannot say which button was released.
                let cb = if pressed { cb } else { (cb & !0b11) | 3 };
                vec![
                    0x1b,
                    b'[',
                    b'M',
                    (cb + 32) as u8,
                    (x + 32) as u8,
                    (y + 32) as u8,
                ]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sgr_press_and_release() {
        let down = MouseEvent::new(MouseEventKind::Down(MouseButton::Left), 9, 4);
        assert_eq!(down.encode(MouseProtocol::Sgr), b"\x1b[<0;10;5M");

        let up = MouseEvent::new(MouseEventKind::Up(MouseButton::Left), 9, 4);
        assert_eq!(up.encode(MouseProtocol::Sgr), b"\x1b[<0;10;5m");
    }

    #[test]
    fn test_sgr_modifiers_and_scroll() {
        let mut ev = MouseEvent::new(MouseEventKind::ScrollDown, 0, 0);
        ev.modifiers = Modifiers::CTRL | Modifiers::SHIFT;
        assert_eq!(ev.encode(MouseProtocol::Sgr), b"\x1b[<85;1;1M");
    }

    #[test]
    fn test_basic_encoding() {
        let down = MouseEvent::new(MouseEventKind::Down(MouseButton::Right), 0, 0);
        assert_eq!(down.encode(MouseProtocol::Basic), vec![0x1b, b'[', b'M', 34, 33, 33]);

        let up = MouseEvent::new(MouseEventKind::Up(MouseButton::Right), 0, 0);
        assert_eq!(up.encode(MouseProtocol::Basic), vec![0x1b, b'[', b'M', 35, 33, 33]);
    }

    #[test]
    fn test_basic_out_of_range() {
        let ev = MouseEvent::new(MouseEventKind::Down(MouseButton::Left), 300, 0);
        assert!(ev.encode(MouseProtocol::Basic).is_empty());
        assert!(!ev.encode(MouseProtocol::Sgr).is_empty());
    }

    #[test]
    fn test_off_encodes_nothing() {
        let ev = MouseEvent::new(MouseEventKind::Down(MouseButton::Left), 1, 1);
        assert!(ev.encode(MouseProtocol::Off).is_empty());
    }

    #[test]
    fn test_tracking_filters() {
        let drag = MouseEventKind::Drag(MouseButton::Left);
        assert!(!MouseTracking::Press.reports(drag));
        assert!(MouseTracking::ButtonMotion.reports(drag));
        assert!(!MouseTracking::ButtonMotion.reports(MouseEventKind::Moved));
        assert!(MouseTracking::AnyMotion.reports(MouseEventKind::Moved));
        assert!(!MouseTracking::Off.reports(MouseEventKind::ScrollUp));
    }
}
