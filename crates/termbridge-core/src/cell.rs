//! Cell and color types for the screen model.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Terminal color supporting ANSI, 256-color palette, and true RGB.
///
/// `Default` means "unset": the cell inherits whatever the presentation
/// considers its default foreground or background.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Color {
    /// Default terminal color
    #[default]
    Default,

    /// Standard ANSI colors (0-7)
    Black,
    /// ANSI Red
    Red,
    /// ANSI Green
    Green,
    /// ANSI Yellow
    Yellow,
    /// ANSI Blue
    Blue,
    /// ANSI Magenta
    Magenta,
    /// ANSI Cyan
    Cyan,
    /// ANSI White
    White,

    /// Bright ANSI colors (8-15)
    BrightBlack,
    /// Bright Red
    BrightRed,
    /// Bright Green
    BrightGreen,
    /// Bright Yellow
    BrightYellow,
    /// Bright Blue
    BrightBlue,
    /// Bright Magenta
    BrightMagenta,
    /// Bright Cyan
    BrightCyan,
    /// Bright White
    BrightWhite,

    /// 256-color palette index (16-255)
    Indexed(u8),

    /// True color RGB (24-bit)
    Rgb {
        /// Red component
        r: u8,
        /// Green component
        g: u8,
        /// Blue component
        b: u8,
    },
}

const NAMED: [Color; 16] = [
    Color::Black,
    Color::Red,
    Color::Green,
    Color::Yellow,
    Color::Blue,
    Color::Magenta,
    Color::Cyan,
    Color::White,
    Color::BrightBlack,
    Color::BrightRed,
    Color::BrightGreen,
    Color::BrightYellow,
    Color::BrightBlue,
    Color::BrightMagenta,
    Color::BrightCyan,
    Color::BrightWhite,
];

impl Color {
    /// Color for a 256-palette index; the first 16 map onto the named colors.
    pub fn from_index(index: u8) -> Self {
        NAMED
            .get(index as usize)
            .copied()
            .unwrap_or(Color::Indexed(index))
    }

    /// Palette index of a named color (0-15), if this is one.
    pub fn ansi_index(&self) -> Option<u8> {
        NAMED.iter().position(|c| c == self).map(|i| i as u8)
    }

    /// Whether this is the unset color.
    pub fn is_default(&self) -> bool {
        matches!(self, Color::Default)
    }
}

bitflags! {
    /// Text attributes for a terminal cell.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct CellAttributes: u8 {
        /// Bold/bright text
        const BOLD = 1 << 0;
        /// Dimmed text
        const DIM = 1 << 1;
        /// Italic text
        const ITALIC = 1 << 2;
        /// Underlined text
        const UNDERLINE = 1 << 3;
        /// Blinking text
        const BLINK = 1 << 4;
        /// Reverse video (swap fg/bg)
        const REVERSE = 1 << 5;
        /// Hidden text
        const HIDDEN = 1 << 6;
        /// Strikethrough text
        const STRIKETHROUGH = 1 << 7;
    }
}

impl CellAttributes {
    /// Check if attributes are all default (no formatting).
    pub fn is_default(&self) -> bool {
        self.is_empty()
    }
}

/// Single character cell in the screen buffer.
///
/// A wide glyph occupies two cells: the leading cell has `width == 2` and the
/// cell to its right is a continuation with `width == 0`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    /// Unicode character (space if empty)
    pub character: char,
    /// Combining marks attached to `character`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub combining: Vec<char>,
    /// Display width: 1, 2 for a wide glyph, 0 for its continuation
    pub width: u8,
    /// Foreground color
    pub fg: Color,
    /// Background color
    pub bg: Color,
    /// Text attributes
    pub attrs: CellAttributes,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            character: ' ',
            combining: Vec::new(),
            width: 1,
            fg: Color::Default,
            bg: Color::Default,
            attrs: CellAttributes::empty(),
        }
    }
}

impl Cell {
    /// Create a new cell with a character and default styling.
    pub fn new(character: char) -> Self {
        Self {
            character,
            ..Default::default()
        }
    }

    /// Create a cell with character and foreground color.
    pub fn with_fg(character: char, fg: Color) -> Self {
        Self {
            character,
            fg,
            ..Default::default()
        }
    }

    /// A blank cell carrying only a background color, as left by erase.
    pub fn blank(bg: Color) -> Self {
        Self {
            bg,
            ..Default::default()
        }
    }

    /// Continuation cell to the right of a wide glyph.
    pub fn continuation(fg: Color, bg: Color, attrs: CellAttributes) -> Self {
        Self {
            character: ' ',
            combining: Vec::new(),
            width: 0,
            fg,
            bg,
            attrs,
        }
    }

    /// Check if cell is empty (space with default attributes).
    pub fn is_empty(&self) -> bool {
        self.character == ' ' && self.attrs.is_default() && self.bg.is_default()
    }

    /// Whether this is the trailing half of a wide glyph.
    pub fn is_continuation(&self) -> bool {
        self.width == 0
    }

    /// Check if cell is whitespace.
    pub fn is_whitespace(&self) -> bool {
        self.character.is_whitespace()
    }

    /// The cell's text: base character followed by combining marks.
    pub fn text(&self) -> String {
        let mut s = String::with_capacity(1 + self.combining.len());
        s.push(self.character);
        s.extend(self.combining.iter());
        s
    }
}
