//! Streaming ANSI/VT parser built on the VTE state machine.
//!
//! The parser owns one [`vte::Parser`] for its whole life, so a sequence
//! split across two `feed` calls resumes where it stopped. It is pure: bytes
//! in, [`TerminalEvent`]s out. Unknown or malformed sequences are dropped
//! and logged at trace level.

use tracing::trace;
use vte::{Params, Perform};

use termbridge_core::Color;

use crate::event::{
    ControlCode, CursorMove, DeviceQuery, EditOp, EraseScope, Mode, ScrollDirection,
    SgrAttribute, TerminalEvent,
};

/// Coarse position of the parser's state machine.
///
/// `Ground` means no sequence is in progress; anything else means the next
/// chunk continues a partially received sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParsePhase {
    /// No sequence in progress
    Ground,
    /// After ESC, possibly with intermediates
    Escape,
    /// Inside a control sequence
    Csi,
    /// Inside an operating system command string
    Osc,
    /// Inside a device control (or SOS/PM/APC) string
    Dcs,
}

impl ParsePhase {
    fn next(self, byte: u8) -> Self {
        match byte {
            0x18 | 0x1A => return ParsePhase::Ground,
            0x1B => return ParsePhase::Escape,
            _ => {}
        }
        match self {
            ParsePhase::Ground => ParsePhase::Ground,
            ParsePhase::Escape => match byte {
                b'[' => ParsePhase::Csi,
                b']' => ParsePhase::Osc,
                b'P' | b'X' | b'^' | b'_' => ParsePhase::Dcs,
                0x20..=0x2F | 0x00..=0x1F | 0x7F => ParsePhase::Escape,
                _ => ParsePhase::Ground,
            },
            ParsePhase::Csi => match byte {
                0x40..=0x7E => ParsePhase::Ground,
                _ => ParsePhase::Csi,
            },
            ParsePhase::Osc => match byte {
                0x07 => ParsePhase::Ground,
                _ => ParsePhase::Osc,
            },
            ParsePhase::Dcs => ParsePhase::Dcs,
        }
    }
}

/// Collects events emitted by the VTE callbacks.
#[derive(Debug, Default)]
struct EventSink {
    events: Vec<TerminalEvent>,
}

/// Streaming ANSI/VT parser.
pub struct AnsiParser {
    machine: vte::Parser,
    sink: EventSink,
    phase: ParsePhase,
}

impl std::fmt::Debug for AnsiParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnsiParser")
            .field("phase", &self.phase)
            .finish_non_exhaustive()
    }
}

impl Default for AnsiParser {
    fn default() -> Self {
        Self::new()
    }
}

impl AnsiParser {
    /// Create a parser in the ground state.
    pub fn new() -> Self {
        Self {
            machine: vte::Parser::new(),
            sink: EventSink::default(),
            phase: ParsePhase::Ground,
        }
    }

    /// Feed a chunk of bytes and return the events it completed.
    ///
    /// A trailing partial sequence is kept and finished by a later call.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<TerminalEvent> {
        for &byte in bytes {
            self.machine.advance(&mut self.sink, byte);
            self.phase = self.phase.next(byte);
        }
        std::mem::take(&mut self.sink.events)
    }

    /// Where the state machine currently is.
    pub fn phase(&self) -> ParsePhase {
        self.phase
    }

    /// Whether no partial sequence is pending.
    pub fn is_ground(&self) -> bool {
        self.phase == ParsePhase::Ground
    }

    /// Discard any partially received sequence.
    pub fn reset(&mut self) {
        self.machine = vte::Parser::new();
        self.sink.events.clear();
        self.phase = ParsePhase::Ground;
    }
}

/// First value of parameter `idx`, with `default` for omitted or zero.
fn param(params: &Params, idx: usize, default: u16) -> u16 {
    match params.iter().nth(idx).and_then(|p| p.first().copied()) {
        Some(0) | None => default,
        Some(v) => v,
    }
}

fn color_from_extended(values: &[u16]) -> Option<Color> {
    match *values.first()? {
        5 => values.get(1).map(|&i| Color::from_index(i.min(255) as u8)),
        2 => {
            // Colon form may carry a colorspace id before r:g:b.
            let rgb = if values.len() >= 5 {
                &values[values.len() - 3..]
            } else {
                values.get(1..4)?
            };
            Some(Color::Rgb {
                r: rgb[0].min(255) as u8,
                g: rgb[1].min(255) as u8,
                b: rgb[2].min(255) as u8,
            })
        }
        _ => None,
    }
}

/// Decode SGR parameters, accepting both `38;5;n` and `38:5:n` forms.
fn parse_sgr(params: &Params) -> Vec<SgrAttribute> {
    let groups: Vec<&[u16]> = params.iter().collect();
    if groups.is_empty() {
        return vec![SgrAttribute::Reset];
    }

    let mut out = Vec::with_capacity(groups.len());
    let mut i = 0;
    while i < groups.len() {
        let group = groups[i];
        let code = group.first().copied().unwrap_or(0);
        i += 1;

        let attr = match code {
            0 => SgrAttribute::Reset,
            1 => SgrAttribute::Bold,
            2 => SgrAttribute::Dim,
            3 => SgrAttribute::Italic,
            4 => SgrAttribute::Underline,
            5 | 6 => SgrAttribute::Blink,
            7 => SgrAttribute::Reverse,
            8 => SgrAttribute::Hidden,
            9 => SgrAttribute::Strikethrough,
            21 | 22 => SgrAttribute::NormalIntensity,
            23 => SgrAttribute::NoItalic,
            24 => SgrAttribute::NoUnderline,
            25 => SgrAttribute::NoBlink,
            27 => SgrAttribute::NoReverse,
            28 => SgrAttribute::NoHidden,
            29 => SgrAttribute::NoStrikethrough,
            30..=37 => SgrAttribute::Foreground(Color::from_index((code - 30) as u8)),
            39 => SgrAttribute::Foreground(Color::Default),
            40..=47 => SgrAttribute::Background(Color::from_index((code - 40) as u8)),
            49 => SgrAttribute::Background(Color::Default),
            90..=97 => SgrAttribute::Foreground(Color::from_index((code - 90 + 8) as u8)),
            100..=107 => SgrAttribute::Background(Color::from_index((code - 100 + 8) as u8)),
            38 | 48 => {
                let color = if group.len() > 1 {
                    color_from_extended(&group[1..])
                } else {
                    let kind = groups.get(i).and_then(|g| g.first().copied());
                    let needed = match kind {
                        Some(5) => 2,
                        Some(2) => 4,
                        _ => 1,
                    };
                    let values: Vec<u16> = groups[i..]
                        .iter()
                        .take(needed)
                        .filter_map(|g| g.first().copied())
                        .collect();
                    i += values.len();
                    color_from_extended(&values)
                };
                match (code, color) {
                    (38, Some(c)) => SgrAttribute::Foreground(c),
                    (48, Some(c)) => SgrAttribute::Background(c),
                    _ => {
                        trace!("Dropping malformed extended color SGR {}", code);
                        continue;
                    }
                }
            }
            _ => {
                trace!("Ignoring unsupported SGR code {}", code);
                continue;
            }
        };
        out.push(attr);
    }
    out
}

impl EventSink {
    fn push(&mut self, event: TerminalEvent) {
        self.events.push(event);
    }

    fn cursor(&mut self, mv: CursorMove) {
        self.push(TerminalEvent::CursorMove(mv));
    }
}

impl Perform for EventSink {
    fn print(&mut self, c: char) {
        self.push(TerminalEvent::Print(c));
    }

    fn execute(&mut self, byte: u8) {
        let code = match byte {
            0x07 => ControlCode::Bell,
            0x08 => ControlCode::Backspace,
            0x09 => ControlCode::Tab,
            0x0A..=0x0C => ControlCode::LineFeed,
            0x0D => ControlCode::CarriageReturn,
            _ => {
                trace!("Ignoring C0 control 0x{:02x}", byte);
                return;
            }
        };
        self.push(TerminalEvent::Control(code));
    }

    fn hook(&mut self, _params: &Params, intermediates: &[u8], _ignore: bool, action: char) {
        trace!(
            "Ignoring DCS sequence: intermediates={:?} action={:?}",
            intermediates,
            action
        );
    }

    fn osc_dispatch(&mut self, params: &[&[u8]], _bell_terminated: bool) {
        let Some(code) = params
            .first()
            .and_then(|p| std::str::from_utf8(p).ok())
            .and_then(|s| s.parse::<u16>().ok())
        else {
            trace!("Dropping OSC with non-numeric code");
            return;
        };

        let payload = params[1..]
            .iter()
            .map(|p| String::from_utf8_lossy(p).into_owned())
            .collect::<Vec<_>>()
            .join(";");
        self.push(TerminalEvent::OscCommand { code, payload });
    }

    fn csi_dispatch(&mut self, params: &Params, intermediates: &[u8], ignore: bool, c: char) {
        if ignore {
            trace!("Dropping overlong CSI sequence ending in {:?}", c);
            return;
        }

        match (intermediates, c) {
            ([], 'A') => self.cursor(CursorMove::Up(param(params, 0, 1))),
            ([], 'B') | ([], 'e') => self.cursor(CursorMove::Down(param(params, 0, 1))),
            ([], 'C') | ([], 'a') => self.cursor(CursorMove::Forward(param(params, 0, 1))),
            ([], 'D') => self.cursor(CursorMove::Back(param(params, 0, 1))),
            ([], 'E') => self.cursor(CursorMove::NextLine(param(params, 0, 1))),
            ([], 'F') => self.cursor(CursorMove::PrevLine(param(params, 0, 1))),
            ([], 'G') | ([], '`') => self.cursor(CursorMove::Column(param(params, 0, 1) - 1)),
            ([], 'd') => self.cursor(CursorMove::Row(param(params, 0, 1) - 1)),
            ([], 'H') | ([], 'f') => self.cursor(CursorMove::To {
                row: param(params, 0, 1) - 1,
                col: param(params, 1, 1) - 1,
            }),

            ([], 'J') => {
                let scope = match param(params, 0, 0) {
                    0 => EraseScope::ToEndOfScreen,
                    1 => EraseScope::ToStartOfScreen,
                    2 | 3 => EraseScope::Screen,
                    other => {
                        trace!("Ignoring ED {}", other);
                        return;
                    }
                };
                self.push(TerminalEvent::EraseRegion(scope));
            }
            ([], 'K') => {
                let scope = match param(params, 0, 0) {
                    0 => EraseScope::ToEndOfLine,
                    1 => EraseScope::ToStartOfLine,
                    2 => EraseScope::Line,
                    other => {
                        trace!("Ignoring EL {}", other);
                        return;
                    }
                };
                self.push(TerminalEvent::EraseRegion(scope));
            }

            ([], '@') => self.push(TerminalEvent::Edit(EditOp::InsertChars(param(params, 0, 1)))),
            ([], 'P') => self.push(TerminalEvent::Edit(EditOp::DeleteChars(param(params, 0, 1)))),
            ([], 'X') => self.push(TerminalEvent::Edit(EditOp::EraseChars(param(params, 0, 1)))),
            ([], 'L') => self.push(TerminalEvent::Edit(EditOp::InsertLines(param(params, 0, 1)))),
            ([], 'M') => self.push(TerminalEvent::Edit(EditOp::DeleteLines(param(params, 0, 1)))),

            ([], 'S') => self.push(TerminalEvent::Scroll {
                direction: ScrollDirection::Up,
                lines: param(params, 0, 1),
            }),
            ([], 'T') => self.push(TerminalEvent::Scroll {
                direction: ScrollDirection::Down,
                lines: param(params, 0, 1),
            }),

            ([], 'm') => self.push(TerminalEvent::SetGraphicRendition(parse_sgr(params))),

            ([], 'c') if param(params, 0, 0) == 0 => {
                self.push(TerminalEvent::DeviceAttributesQuery(DeviceQuery::Primary))
            }
            ([b'>'], 'c') => {
                self.push(TerminalEvent::DeviceAttributesQuery(DeviceQuery::Secondary))
            }
            ([], 'n') => match param(params, 0, 0) {
                5 => self.push(TerminalEvent::DeviceAttributesQuery(DeviceQuery::Status)),
                6 => self.push(TerminalEvent::DeviceAttributesQuery(
                    DeviceQuery::CursorPosition,
                )),
                other => trace!("Ignoring DSR {}", other),
            },

            ([], 'r') => self.push(TerminalEvent::SetScrollRegion {
                top: param(params, 0, 1) - 1,
                bottom: match param(params, 1, 0) {
                    0 => None,
                    b => Some(b - 1),
                },
            }),

            ([], 's') => self.push(TerminalEvent::SaveCursor),
            ([], 'u') => self.push(TerminalEvent::RestoreCursor),

            ([b'?'], 'h') | ([b'?'], 'l') => {
                let enabled = c == 'h';
                for p in params.iter() {
                    let code = p.first().copied().unwrap_or(0);
                    match Mode::from_private(code) {
                        Some(mode) => self.push(TerminalEvent::SetMode { mode, enabled }),
                        None => trace!("Ignoring private mode {}", code),
                    }
                }
            }

            _ => trace!(
                "Ignoring CSI sequence: intermediates={:?} action={:?}",
                intermediates,
                c
            ),
        }
    }

    fn esc_dispatch(&mut self, intermediates: &[u8], _ignore: bool, byte: u8) {
        match (intermediates, byte) {
            ([], b'D') => self.push(TerminalEvent::Index),
            ([], b'M') => self.push(TerminalEvent::ReverseIndex),
            ([], b'E') => self.push(TerminalEvent::NextLine),
            ([], b'7') => self.push(TerminalEvent::SaveCursor),
            ([], b'8') => self.push(TerminalEvent::RestoreCursor),
            ([], b'c') => self.push(TerminalEvent::FullReset),
            // String terminator after OSC/DCS
            ([], b'\\') => {}
            _ => trace!(
                "Ignoring ESC sequence: intermediates={:?} byte=0x{:02x}",
                intermediates,
                byte
            ),
        }
    }
}
