//! Capability descriptor for a presentation.
//!
//! Capabilities are queried once when a presentation is attached and are not
//! renegotiated for the rest of the session.

use serde::{Deserialize, Serialize};

/// What a presentation surface can display or deliver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Capabilities {
    /// Mouse reports can be delivered
    pub mouse: bool,
    /// 24-bit color output is understood
    pub true_color: bool,
    /// 256-color palette output is understood
    pub colors_256: bool,
    /// An alternate screen can be entered
    pub alternate_screen: bool,
    /// Bracketed paste can be enabled
    pub bracketed_paste: bool,
    /// Incremental (delta) redraws are accepted
    pub delta_protocol: bool,
}

impl Capabilities {
    /// Capabilities of a virtual surface: everything on.
    pub fn virtual_default() -> Self {
        Self {
            mouse: true,
            true_color: true,
            colors_256: true,
            alternate_screen: true,
            bracketed_paste: true,
            delta_protocol: true,
        }
    }

    /// A surface with no optional capabilities.
    pub fn none() -> Self {
        Self {
            mouse: false,
            true_color: false,
            colors_256: false,
            alternate_screen: false,
            bracketed_paste: false,
            delta_protocol: false,
        }
    }

    /// Detect capabilities of the controlling terminal from `TERM`,
    /// `COLORTERM` and `NO_COLOR`.
    pub fn from_env() -> Self {
        let term = std::env::var("TERM").unwrap_or_default();
        let colorterm = std::env::var("COLORTERM").unwrap_or_default();
        let no_color = std::env::var_os("NO_COLOR").is_some();
        Self::from_vars(&term, &colorterm, no_color)
    }

    /// Detection logic behind [`Capabilities::from_env`].
    pub fn from_vars(term: &str, colorterm: &str, no_color: bool) -> Self {
        let is_dumb = term == "dumb" || term.is_empty();
        if is_dumb {
            return Self::none();
        }

        let colorterm = colorterm.to_ascii_lowercase();
        let true_color = !no_color
            && (colorterm.contains("truecolor")
                || colorterm.contains("24bit")
                || term.contains("direct"));
        let colors_256 = !no_color && (true_color || term.contains("256color"));

        Self {
            mouse: true,
            true_color,
            colors_256,
            alternate_screen: true,
            bracketed_paste: true,
            delta_protocol: true,
        }
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::virtual_default()
    }
}
