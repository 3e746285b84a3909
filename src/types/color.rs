//! Outcome colors and color groups

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{DEFAULT_GREEN_MAX, DEFAULT_RED_MAX};

/// One classified outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Red,
    Green,
    Yellow,
}

impl Color {
    /// Wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            Color::Red => "red",
            Color::Green => "green",
            Color::Yellow => "yellow",
        }
    }

    /// Yellow collapses to green when the rule asks for it
    pub fn normalize(self, treat_yellow_as_green: bool) -> Color {
        if treat_yellow_as_green && self == Color::Yellow {
            Color::Green
        } else {
            self
        }
    }

    /// Get ANSI color code for terminal display
    pub fn color_code(&self) -> &'static str {
        match self {
            Color::Red => "\x1b[31m",
            Color::Green => "\x1b[32m",
            Color::Yellow => "\x1b[33m",
        }
    }

    /// Reset ANSI color
    pub fn color_reset() -> &'static str {
        "\x1b[0m"
    }

    /// Single-cell marker for compact sequence display
    pub fn symbol(&self) -> char {
        match self {
            Color::Red => 'R',
            Color::Green => 'G',
            Color::Yellow => 'Y',
        }
    }
}

impl std::fmt::Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Color {
    type Err = String;

    /// Accepts full names and single-letter shorthands, case-insensitive
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "red" | "r" => Ok(Color::Red),
            "green" | "g" => Ok(Color::Green),
            "yellow" | "y" => Ok(Color::Yellow),
            other => Err(format!("unknown color '{}'", other)),
        }
    }
}

/// A member of a step's color set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorGroup {
    Red,
    Green,
    Yellow,
    /// Green or yellow, regardless of normalisation
    GreenYellow,
}

impl ColorGroup {
    /// Wire token
    pub fn as_str(&self) -> &'static str {
        match self {
            ColorGroup::Red => "red",
            ColorGroup::Green => "green",
            ColorGroup::Yellow => "yellow",
            ColorGroup::GreenYellow => "green_yellow",
        }
    }

    /// Parse a wire token. Only exact lowercase tokens are recognised.
    pub fn from_token(token: &str) -> Option<ColorGroup> {
        match token {
            "red" => Some(ColorGroup::Red),
            "green" => Some(ColorGroup::Green),
            "yellow" => Some(ColorGroup::Yellow),
            "green_yellow" => Some(ColorGroup::GreenYellow),
            _ => None,
        }
    }

    /// Does `color` belong to this member?
    ///
    /// Literal members match the normalised color or the raw one.
    pub fn admits(&self, color: Color, treat_yellow_as_green: bool) -> bool {
        let normalized = color.normalize(treat_yellow_as_green);
        match self {
            ColorGroup::GreenYellow => {
                matches!(normalized, Color::Green | Color::Yellow)
                    || matches!(color, Color::Green | Color::Yellow)
            }
            ColorGroup::Red => normalized == Color::Red || color == Color::Red,
            ColorGroup::Green => normalized == Color::Green || color == Color::Green,
            ColorGroup::Yellow => normalized == Color::Yellow || color == Color::Yellow,
        }
    }
}

impl std::fmt::Display for ColorGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Thresholds turning a numeric result into a color
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorThresholds {
    /// Values below this are red
    pub red_max: f64,
    /// Values below this are green, the rest yellow
    pub green_max: f64,
}

impl Default for ColorThresholds {
    fn default() -> Self {
        Self {
            red_max: DEFAULT_RED_MAX,
            green_max: DEFAULT_GREEN_MAX,
        }
    }
}

impl ColorThresholds {
    /// Three-way classification
    pub fn classify(&self, value: f64) -> Color {
        if value < self.red_max {
            Color::Red
        } else if value < self.green_max {
            Color::Green
        } else {
            Color::Yellow
        }
    }
}
