//! Structured terminal events produced by the parser.
//!
//! Every event is a plain value: the parser never touches screen state, it
//! only describes what the byte stream asked for. [`crate::TerminalState`]
//! applies the events in order.

use serde::{Deserialize, Serialize};

use termbridge_core::{Color, MouseTracking};

/// C0 control characters the state machine acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlCode {
    /// BEL (0x07)
    Bell,
    /// BS (0x08)
    Backspace,
    /// HT (0x09)
    Tab,
    /// LF, VT or FF (0x0A-0x0C)
    LineFeed,
    /// CR (0x0D)
    CarriageReturn,
}

/// Cursor movement. Relative counts are at least 1; absolute targets are 0-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CursorMove {
    /// CUU
    Up(u16),
    /// CUD
    Down(u16),
    /// CUF
    Forward(u16),
    /// CUB
    Back(u16),
    /// CNL: down and to column 0
    NextLine(u16),
    /// CPL: up and to column 0
    PrevLine(u16),
    /// CHA / HPA
    Column(u16),
    /// VPA
    Row(u16),
    /// CUP / HVP
    To {
        /// Target row
        row: u16,
        /// Target column
        col: u16,
    },
}

/// Scope of an ED/EL erase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EraseScope {
    /// EL 0
    ToEndOfLine,
    /// EL 1
    ToStartOfLine,
    /// EL 2
    Line,
    /// ED 0
    ToEndOfScreen,
    /// ED 1
    ToStartOfScreen,
    /// ED 2 / ED 3
    Screen,
}

/// Private (DEC) modes the state tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// DECCKM (1)
    ApplicationCursor,
    /// DECAWM (7)
    AutoWrap,
    /// DECTCEM (25)
    CursorVisible,
    /// 47, 1047 and 1049
    AlternateScreen,
    /// 1000, 1002 and 1003
    MouseTracking(MouseTracking),
    /// 1006
    SgrMouse,
    /// 2004
    BracketedPaste,
}

impl Mode {
    /// Map a DEC private mode number to a tracked mode.
    pub fn from_private(code: u16) -> Option<Self> {
        match code {
            1 => Some(Mode::ApplicationCursor),
            7 => Some(Mode::AutoWrap),
            25 => Some(Mode::CursorVisible),
            47 | 1047 | 1049 => Some(Mode::AlternateScreen),
            1000 => Some(Mode::MouseTracking(MouseTracking::Press)),
            1002 => Some(Mode::MouseTracking(MouseTracking::ButtonMotion)),
            1003 => Some(Mode::MouseTracking(MouseTracking::AnyMotion)),
            1006 => Some(Mode::SgrMouse),
            2004 => Some(Mode::BracketedPaste),
            _ => None,
        }
    }
}

/// Device queries a workload can send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceQuery {
    /// DA1 (`CSI c`)
    Primary,
    /// DA2 (`CSI > c`)
    Secondary,
    /// DSR 5 (`CSI 5 n`)
    Status,
    /// DSR 6 (`CSI 6 n`)
    CursorPosition,
}

/// One SGR parameter, already decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SgrAttribute {
    /// 0
    Reset,
    /// 1
    Bold,
    /// 2
    Dim,
    /// 3
    Italic,
    /// 4
    Underline,
    /// 5 / 6
    Blink,
    /// 7
    Reverse,
    /// 8
    Hidden,
    /// 9
    Strikethrough,
    /// 22
    NormalIntensity,
    /// 23
    NoItalic,
    /// 24
    NoUnderline,
    /// 25
    NoBlink,
    /// 27
    NoReverse,
    /// 28
    NoHidden,
    /// 29
    NoStrikethrough,
    /// 30-37, 38, 39, 90-97
    Foreground(Color),
    /// 40-47, 48, 49, 100-107
    Background(Color),
}

/// Direction of a whole-screen scroll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrollDirection {
    /// SU: content moves up
    Up,
    /// SD: content moves down
    Down,
}

/// In-line and line-level editing operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditOp {
    /// ICH
    InsertChars(u16),
    /// DCH
    DeleteChars(u16),
    /// ECH
    EraseChars(u16),
    /// IL
    InsertLines(u16),
    /// DL
    DeleteLines(u16),
}

/// A structured event decoded from the workload's byte stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalEvent {
    /// Printable character
    Print(char),
    /// C0 control
    Control(ControlCode),
    /// Cursor movement
    CursorMove(CursorMove),
    /// SGR with its decoded parameters
    SetGraphicRendition(Vec<SgrAttribute>),
    /// DECSET / DECRST
    SetMode {
        /// Mode being changed
        mode: Mode,
        /// New value
        enabled: bool,
    },
    /// ED / EL
    EraseRegion(EraseScope),
    /// Character and line editing
    Edit(EditOp),
    /// DA / DSR request expecting a reply
    DeviceAttributesQuery(DeviceQuery),
    /// OSC with numeric code
    OscCommand {
        /// Numeric OSC code
        code: u16,
        /// Remaining fields joined by `;`
        payload: String,
    },
    /// IND (`ESC D`)
    Index,
    /// RI (`ESC M`)
    ReverseIndex,
    /// NEL (`ESC E`)
    NextLine,
    /// DECSC (`ESC 7`) or SCOSC (`CSI s`)
    SaveCursor,
    /// DECRC (`ESC 8`) or SCORC (`CSI u`)
    RestoreCursor,
    /// DECSTBM, zero-based inclusive rows. `None` for bottom means the last row.
    SetScrollRegion {
        /// First row of the region
        top: u16,
        /// Last row of the region
        bottom: Option<u16>,
    },
    /// SU / SD
    Scroll {
        /// Which way
        direction: ScrollDirection,
        /// Line count
        lines: u16,
    },
    /// RIS (`ESC c`)
    FullReset,
}
