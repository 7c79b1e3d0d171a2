//! Core types for driving the LED visor.
//!
//! This module provides what every other module builds on:
//! - Panel geometry (dimensions and wiring topology)
//! - The `Color` type and its hex representations
//! - Stateless color normalization for editor input
//!
//! It also declares the mapping, codec, preset, protocol, transport,
//! device, and server modules used by the main binary.

pub mod codec;
pub mod device;
pub mod mapping;
pub mod presets;
pub mod protocol;
pub mod server;
pub mod transport;

use std::fmt;
use std::str::FromStr;

// ── Panel geometry ─────────────────────────────────────────────────

/// Panel rotation relative to its wiring origin.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Rotation {
    #[default]
    Deg0,
    Deg180,
}

impl Rotation {
    pub fn degrees(self) -> u16 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg180 => 180,
        }
    }
}

/// Parses `"0"` or `"180"`, which lets clap accept `--rotation 180` directly.
impl FromStr for Rotation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "0" => Ok(Rotation::Deg0),
            "180" => Ok(Rotation::Deg180),
            other => Err(format!("rotation must be 0 or 180, got {other:?}")),
        }
    }
}

/// Dimensions and wiring topology of the LED panel.
///
/// # Rust concept: Copy configuration
/// Geometry is fixed when the process starts and never mutated, so it is
/// a small `Copy` value passed around explicitly instead of global state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PanelGeometry {
    pub columns: usize,
    pub rows: usize,
    /// Every other strand runs in the opposite direction.
    pub serpentine: bool,
    /// Strands run down columns rather than across rows.
    pub column_major: bool,
    pub rotation: Rotation,
}

impl PanelGeometry {
    pub fn new(
        columns: usize,
        rows: usize,
        serpentine: bool,
        column_major: bool,
        rotation: Rotation,
    ) -> Self {
        Self {
            columns,
            rows,
            serpentine,
            column_major,
            rotation,
        }
    }

    /// Total number of pixels on the panel.
    pub fn pixel_count(&self) -> usize {
        self.columns * self.rows
    }

    /// Length of a hex-encoded frame (6 hex digits per pixel).
    pub fn hex_len(&self) -> usize {
        self.pixel_count() * 6
    }

    /// Row-major grid index for an in-bounds coordinate.
    pub fn grid_index(&self, x: usize, y: usize) -> Option<usize> {
        (x < self.columns && y < self.rows).then(|| y * self.columns + x)
    }
}

/// The visor: a 32x8 panel wired as one serpentine strand running down the columns.
impl Default for PanelGeometry {
    fn default() -> Self {
        Self::new(32, 8, true, true, Rotation::Deg0)
    }
}

// ── Color ──────────────────────────────────────────────────────────

/// A 24-bit RGB color.
///
/// On the wire a color is 6 uppercase hex digits (`FF8000`); the editor
/// side uses the CSS form (`#FF8000`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Color = Color::new(0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Build a color from the low 24 bits of `value` (`0xRRGGBB`).
    pub const fn from_u24(value: u32) -> Self {
        Self::new((value >> 16) as u8, (value >> 8) as u8, value as u8)
    }

    pub const fn to_u24(self) -> u32 {
        ((self.r as u32) << 16) | ((self.g as u32) << 8) | self.b as u32
    }

    /// Parse exactly six hex digits, no prefix.
    pub fn from_hex(hex: &str) -> Option<Self> {
        if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        u32::from_str_radix(hex, 16).ok().map(Self::from_u24)
    }

    /// Wire form: `RRGGBB`, uppercase.
    pub fn to_hex(self) -> String {
        self.to_string()
    }

    /// Editor form: `#RRGGBB`, uppercase.
    pub fn to_css(self) -> String {
        format!("#{self}")
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

/// Normalize an editor color string into a `Color`.
///
/// Accepts `#RRGGBB`, `RRGGBB` and the `#RGB` shorthand in any case,
/// ignoring surrounding whitespace. Anything else is rejected.
pub fn normalize_color(input: &str) -> Option<Color> {
    let trimmed = input.trim();
    let digits = trimmed.strip_prefix('#').unwrap_or(trimmed);

    match digits.len() {
        6 => Color::from_hex(digits),
        3 if trimmed.starts_with('#') => {
            let expanded: String = digits.chars().flat_map(|c| [c, c]).collect();
            Color::from_hex(&expanded)
        }
        _ => None,
    }
}

// ── Tests ──────────────────────────────────────────────────────────
