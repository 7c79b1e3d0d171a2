//! Frame codec: grid-ordered colors to and from hardware-ordered hex payloads.
//!
//! A hardware payload is `pixel_count * 6` uppercase hex digits, one
//! `RRGGBB` triple per LED in strand order, no separators. This is what
//! the device receives in `FRAME <slot> <hex>` and what presets store.

use crate::Color;
use crate::mapping::IndexMaps;
use thiserror::Error;

/// A frame that cannot be encoded or decoded.
///
/// These are expected for user-supplied data and never panic; callers
/// surface them as "invalid data".
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("invalid frame data: expected {expected} hex digits, got {actual}")]
    Length { expected: usize, actual: usize },
    #[error("invalid frame data: expected {expected} pixels, got {actual}")]
    PixelCount { expected: usize, actual: usize },
}

/// Strip every non-hex character and uppercase the rest.
pub fn clean_hex_payload(input: &str) -> String {
    input
        .chars()
        .filter(char::is_ascii_hexdigit)
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Clean a payload and require exactly one triple per pixel.
fn clean_frame_hex(maps: &IndexMaps, input: &str) -> Result<String, FrameError> {
    let cleaned = clean_hex_payload(input);
    let expected = maps.len() * 6;
    if cleaned.len() != expected {
        return Err(FrameError::Length {
            expected,
            actual: cleaned.len(),
        });
    }
    Ok(cleaned)
}

/// Encode grid-ordered colors as a hardware-ordered hex payload.
pub fn encode_frame(maps: &IndexMaps, grid_colors: &[Color]) -> Result<String, FrameError> {
    if grid_colors.len() != maps.len() {
        return Err(FrameError::PixelCount {
            expected: maps.len(),
            actual: grid_colors.len(),
        });
    }

    let mut hardware = vec![Color::BLACK; maps.len()];
    for (color, &index) in grid_colors.iter().zip(maps.grid_to_hardware_table()) {
        hardware[index] = *color;
    }

    Ok(hardware.iter().map(|c| c.to_hex()).collect())
}

/// Decode a hardware-ordered hex payload into grid-ordered colors.
///
/// Non-hex characters are stripped before the length check, so
/// whitespace or separators in stored data are tolerated.
pub fn decode_frame(maps: &IndexMaps, hex: &str) -> Result<Vec<Color>, FrameError> {
    let cleaned = clean_frame_hex(maps, hex)?;

    let mut grid = vec![Color::BLACK; maps.len()];
    for (slot, &grid_index) in cleaned
        .as_bytes()
        .chunks_exact(6)
        .zip(maps.hardware_to_grid_table())
    {
        // Cleaned input is ASCII hex, so every chunk is valid UTF-8 and a valid color.
        let triple = std::str::from_utf8(slot).unwrap_or_default();
        grid[grid_index] = Color::from_hex(triple).unwrap_or_default();
    }

    Ok(grid)
}

/// Reorder a row-major hex payload (the pre-mapping storage layout) into
/// hardware order.
///
/// This is `encode_frame` on data already known to be in grid order,
/// done hex-to-hex.
pub fn migrate_legacy_frame(maps: &IndexMaps, row_major_hex: &str) -> Result<String, FrameError> {
    let cleaned = clean_frame_hex(maps, row_major_hex)?;

    let mut hardware = vec![""; maps.len()];
    for (grid_index, &hardware_index) in maps.grid_to_hardware_table().iter().enumerate() {
        let start = grid_index * 6;
        hardware[hardware_index] = &cleaned[start..start + 6];
    }

    Ok(hardware.concat())
}
