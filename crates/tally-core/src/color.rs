//! Player colors.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// RGB color, stored in the room document as `#rrggbb`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid color '{0}', expected #rrggbb")]
pub struct ParseColorError(pub String);

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub const RED: Color = Color::rgb(0xef, 0x44, 0x44);
    pub const BLUE: Color = Color::rgb(0x3b, 0x82, 0xf6);
    pub const GREEN: Color = Color::rgb(0x22, 0xc5, 0x5e);
    pub const YELLOW: Color = Color::rgb(0xea, 0xb3, 0x08);
    pub const PURPLE: Color = Color::rgb(0xa8, 0x55, 0xf7);
    pub const PINK: Color = Color::rgb(0xec, 0x48, 0x99);
    pub const ORANGE: Color = Color::rgb(0xf9, 0x73, 0x16);
    pub const CYAN: Color = Color::rgb(0x06, 0xb6, 0xd4);
    pub const LIME: Color = Color::rgb(0x84, 0xcc, 0x16);
    pub const INDIGO: Color = Color::rgb(0x63, 0x66, 0xf1);

    /// The colors offered when picking a player color.
    pub const PALETTE: [(&'static str, Color); 10] = [
        ("Red", Self::RED),
        ("Blue", Self::BLUE),
        ("Green", Self::GREEN),
        ("Yellow", Self::YELLOW),
        ("Purple", Self::PURPLE),
        ("Pink", Self::PINK),
        ("Orange", Self::ORANGE),
        ("Cyan", Self::CYAN),
        ("Lime", Self::LIME),
        ("Indigo", Self::INDIGO),
    ];

    /// Palette name, or `None` for a custom color.
    pub fn name(&self) -> Option<&'static str> {
        Self::PALETTE
            .iter()
            .find(|(_, color)| color == self)
            .map(|(name, _)| *name)
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::RED
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl FromStr for Color {
    type Err = ParseColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseColorError(s.to_string());
        let hex = s.strip_prefix('#').ok_or_else(invalid)?;
        if hex.len() != 6 || !hex.is_ascii() {
            return Err(invalid());
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&hex[range], 16).map_err(|_| invalid())
        };
        Ok(Color::rgb(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }
}

impl TryFrom<String> for Color {
    type Error = ParseColorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_roundtrip() {
        assert_eq!(Color::RED.to_string(), "#ef4444");
        assert_eq!("#06B6D4".parse::<Color>().unwrap(), Color::CYAN);
    }

    #[test]
    fn test_rejects_malformed() {
        assert!("ef4444".parse::<Color>().is_err());
        assert!("#ef44".parse::<Color>().is_err());
        assert!("#gg4444".parse::<Color>().is_err());
    }

    #[test]
    fn test_palette_names() {
        assert_eq!(Color::LIME.name(), Some("Lime"));
        assert_eq!(Color::rgb(1, 2, 3).name(), None);
    }
}
