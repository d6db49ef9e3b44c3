//! Keyboard keys and their encoding toward a workload.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Keyboard key delivered to a workload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Key {
    /// Regular character
    Char(char),

    /// Up arrow
    Up,
    /// Down arrow
    Down,
    /// Left arrow
    Left,
    /// Right arrow
    Right,
    /// Home key
    Home,
    /// End key
    End,
    /// Page Up
    PageUp,
    /// Page Down
    PageDown,

    /// Enter/Return key
    Enter,
    /// Tab key
    Tab,
    /// Escape key
    Escape,
    /// Backspace key
    Backspace,
    /// Delete key
    Delete,
    /// Insert key
    Insert,

    /// Function key F1-F12
    F(u8),

    /// Ctrl + character
    Ctrl(char),
    /// Alt + key
    Alt(Box<Key>),
    /// Shift + key
    Shift(Box<Key>),
}

/// Cursor keys in normal (`ESC [`) and application (`ESC O`) form.
fn cursor_key(final_byte: u8, application_cursor: bool) -> Vec<u8> {
    let intro = if application_cursor { b'O' } else { b'[' };
    vec![0x1B, intro, final_byte]
}

fn ctrl_code(c: char) -> Option<u8> {
    match c {
        'a'..='z' => Some(c as u8 - b'a' + 1),
        'A'..='Z' => Some(c as u8 - b'A' + 1),
        '@' | ' ' | '2' => Some(0x00),
        '[' | '3' => Some(0x1B),
        '\\' | '4' => Some(0x1C),
        ']' | '5' => Some(0x1D),
        '^' | '6' => Some(0x1E),
        '_' | '7' | '/' => Some(0x1F),
        '?' | '8' => Some(0x7F),
        _ => None,
    }
}

impl Key {
    /// Parse key from string representation.
    ///
    /// Examples:
    /// - "a" -> Key::Char('a')
    /// - "Ctrl+c" -> Key::Ctrl('c')
    /// - "Alt+f" -> Key::Alt(Box::new(Key::Char('f')))
    /// - "Enter" -> Key::Enter
    /// - "F5" -> Key::F(5)
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();

        if let Some(rest) = s.strip_prefix("Ctrl+") {
            let mut chars = rest.chars();
            return match (chars.next(), chars.next()) {
                (Some(ch), None) if ctrl_code(ch).is_some() => Ok(Key::Ctrl(ch.to_ascii_lowercase())),
                _ => Err(Error::InvalidKey(s.to_string())),
            };
        }

        if let Some(rest) = s.strip_prefix("Alt+") {
            if rest.is_empty() {
                return Err(Error::InvalidKey(s.to_string()));
            }
            return Ok(Key::Alt(Box::new(Key::parse(rest)?)));
        }

        if let Some(rest) = s.strip_prefix("Shift+") {
            if rest.is_empty() {
                return Err(Error::InvalidKey(s.to_string()));
            }
            return Ok(Key::Shift(Box::new(Key::parse(rest)?)));
        }

        match s {
            "Enter" | "Return" => Ok(Key::Enter),
            "Tab" => Ok(Key::Tab),
            "Escape" | "Esc" => Ok(Key::Escape),
            "Backspace" => Ok(Key::Backspace),
            "Delete" | "Del" => Ok(Key::Delete),
            "Space" => Ok(Key::Char(' ')),
            "Insert" | "Ins" => Ok(Key::Insert),
            "Up" => Ok(Key::Up),
            "Down" => Ok(Key::Down),
            "Left" => Ok(Key::Left),
            "Right" => Ok(Key::Right),
            "Home" => Ok(Key::Home),
            "End" => Ok(Key::End),
            "PageUp" | "PgUp" => Ok(Key::PageUp),
            "PageDown" | "PgDn" => Ok(Key::PageDown),
            _ => {
                if let Some(n) = s.strip_prefix('F').and_then(|n| n.parse::<u8>().ok()) {
                    if (1..=12).contains(&n) {
                        return Ok(Key::F(n));
                    }
                }
                let mut chars = s.chars();
                match (chars.next(), chars.next()) {
                    (Some(ch), None) => Ok(Key::Char(ch)),
                    _ => Err(Error::InvalidKey(s.to_string())),
                }
            }
        }
    }

    /// Convert key to the bytes a terminal sends for it.
    ///
    /// `application_cursor` selects the DECCKM form of the arrow, Home and
    /// End keys.
    pub fn to_escape_sequence(&self, application_cursor: bool) -> Vec<u8> {
        match self {
            Key::Char(c) => c.to_string().into_bytes(),
            Key::Enter => vec![0x0D],
            Key::Tab => vec![0x09],
            Key::Escape => vec![0x1B],
            Key::Backspace => vec![0x7F],
            Key::Delete => b"\x1b[3~".to_vec(),
            Key::Insert => b"\x1b[2~".to_vec(),
            Key::Up => cursor_key(b'A', application_cursor),
            Key::Down => cursor_key(b'B', application_cursor),
            Key::Right => cursor_key(b'C', application_cursor),
            Key::Left => cursor_key(b'D', application_cursor),
            Key::Home => cursor_key(b'H', application_cursor),
            Key::End => cursor_key(b'F', application_cursor),
            Key::PageUp => b"\x1b[5~".to_vec(),
            Key::PageDown => b"\x1b[6~".to_vec(),
            Key::F(n) => match n {
                1 => b"\x1bOP".to_vec(),
                2 => b"\x1bOQ".to_vec(),
                3 => b"\x1bOR".to_vec(),
                4 => b"\x1bOS".to_vec(),
                5 => b"\x1b[15~".to_vec(),
                6 => b"\x1b[17~".to_vec(),
                7 => b"\x1b[18~".to_vec(),
                8 => b"\x1b[19~".to_vec(),
                9 => b"\x1b[20~".to_vec(),
                10 => b"\x1b[21~".to_vec(),
                11 => b"\x1b[23~".to_vec(),
                12 => b"\x1b[24~".to_vec(),
                _ => Vec::new(),
            },
            Key::Ctrl(c) => ctrl_code(*c).map(|b| vec![b]).unwrap_or_default(),
            Key::Alt(inner) => {
                let mut seq = vec![0x1B];
                seq.extend(inner.to_escape_sequence(application_cursor));
                seq
            }
            Key::Shift(inner) => match inner.as_ref() {
                Key::Tab => b"\x1b[Z".to_vec(),
                Key::Up => b"\x1b[1;2A".to_vec(),
                Key::Down => b"\x1b[1;2B".to_vec(),
                Key::Right => b"\x1b[1;2C".to_vec(),
                Key::Left => b"\x1b[1;2D".to_vec(),
                Key::Char(c) => c.to_uppercase().collect::<String>().into_bytes(),
                other => other.to_escape_sequence(application_cursor),
            },
        }
    }
}

impl Key {
    /// Canonical name of a key without modifiers, as accepted by [`Key::parse`].
    fn name(&self) -> Option<&'static str> {
        Some(match self {
            Key::Up => "Up",
            Key::Down => "Down",
            Key::Left => "Left",
            Key::Right => "Right",
            Key::Home => "Home",
            Key::End => "End",
            Key::PageUp => "PageUp",
            Key::PageDown => "PageDown",
            Key::Enter => "Enter",
            Key::Tab => "Tab",
            Key::Escape => "Escape",
            Key::Backspace => "Backspace",
            Key::Delete => "Delete",
            Key::Insert => "Insert",
            Key::Char(' ') => "Space",
            _ => return None,
        })
    }
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(name) = self.name() {
            return f.write_str(name);
        }
        match self {
            Key::F(n) => write!(f, "F{n}"),
            Key::Ctrl(c) => write!(f, "Ctrl+{c}"),
            Key::Alt(inner) => write!(f, "Alt+{inner}"),
            Key::Shift(inner) => write!(f, "Shift+{inner}"),
            Key::Char(c) => write!(f, "{c}"),
            _ => Ok(()),
        }
    }
}
