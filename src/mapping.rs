//! Index mapping between the editor's row-major grid and the panel's wiring order.
//!
//! The visor is wired as a single strand that snakes through the panel.
//! Pixels are edited in grid order (`y * columns + x`) but the device
//! expects them in the order the LEDs appear on the strand. `IndexMaps`
//! holds that permutation in both directions, computed once at startup.
//!
//! ```text
//! 4x2 panel, column-major serpentine:
//!
//!   grid order:        wire order:
//!     0  1  2  3         0  3  4  7
//!     4  5  6  7         1  2  5  6
//! ```

use crate::{PanelGeometry, Rotation};
use thiserror::Error;

/// Geometry that cannot describe a fully connected panel.
///
/// Every variant is fatal: frame data produced with a broken map would be
/// silently scrambled on the device.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MappingError {
    #[error("panel has no pixels ({columns}x{rows})")]
    EmptyPanel { columns: usize, rows: usize },
    #[error("grid pixel ({x}, {y}) has no hardware index")]
    UnmappedGrid { x: usize, y: usize },
    #[error("grid pixel ({x}, {y}) maps to hardware index {index}, outside 0..{len}")]
    OutOfRange {
        x: usize,
        y: usize,
        index: usize,
        len: usize,
    },
    #[error("hardware index {index} is wired to both grid {first} and grid {second}")]
    Duplicate {
        index: usize,
        first: usize,
        second: usize,
    },
    #[error("hardware index {index} is not wired to any grid pixel")]
    UnmappedHardware { index: usize },
}

/// Map a grid coordinate to its position on the LED strand.
///
/// Returns `None` for coordinates outside the panel; callers skip those
/// pixels.
pub fn map_coordinate_to_hardware(geometry: &PanelGeometry, x: usize, y: usize) -> Option<usize> {
    let (columns, rows) = (geometry.columns, geometry.rows);
    if x >= columns || y >= rows {
        return None;
    }

    let (x, y) = match geometry.rotation {
        Rotation::Deg0 => (x, y),
        Rotation::Deg180 => (columns - 1 - x, rows - 1 - y),
    };

    // Each strand is one column (column-major) or one row (row-major).
    let (strand, position, strand_len) = if geometry.column_major {
        (x, y, rows)
    } else {
        (y, x, columns)
    };

    let position = if geometry.serpentine && strand % 2 == 1 {
        strand_len - 1 - position
    } else {
        position
    };

    Some(strand * strand_len + position)
}

/// The grid/hardware permutation, in both directions.
///
/// Both tables are complete permutations of `0..pixel_count`; `build`
/// refuses to return anything else. Share one instance (behind an `Arc`)
/// for the life of the process.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexMaps {
    geometry: PanelGeometry,
    grid_to_hardware: Vec<usize>,
    hardware_to_grid: Vec<usize>,
}

impl IndexMaps {
    /// Build the maps for a panel using the standard strand wiring.
    pub fn build(geometry: PanelGeometry) -> Result<Self, MappingError> {
        Self::from_wiring(geometry, |x, y| {
            map_coordinate_to_hardware(&geometry, x, y)
        })
    }

    /// Build the maps from an arbitrary wiring function.
    ///
    /// `wiring(x, y)` gives the hardware index of each grid pixel. The
    /// result must be a bijection onto `0..pixel_count`.
    pub fn from_wiring<F>(geometry: PanelGeometry, wiring: F) -> Result<Self, MappingError>
    where
        F: Fn(usize, usize) -> Option<usize>,
    {
        let len = geometry.pixel_count();
        if len == 0 {
            return Err(MappingError::EmptyPanel {
                columns: geometry.columns,
                rows: geometry.rows,
            });
        }

        let mut grid_to_hardware = vec![0; len];
        let mut hardware_to_grid: Vec<Option<usize>> = vec![None; len];

        for y in 0..geometry.rows {
            for x in 0..geometry.columns {
                let grid = y * geometry.columns + x;
                let index = wiring(x, y).ok_or(MappingError::UnmappedGrid { x, y })?;
                if index >= len {
                    return Err(MappingError::OutOfRange { x, y, index, len });
                }

                let slot = &mut hardware_to_grid[index];
                if let Some(first) = *slot {
                    return Err(MappingError::Duplicate {
                        index,
                        first,
                        second: grid,
                    });
                }
                *slot = Some(grid);
                grid_to_hardware[grid] = index;
            }
        }

        // Every hardware slot must be claimed for the maps to be a permutation.
        let hardware_to_grid = hardware_to_grid
            .into_iter()
            .enumerate()
            .map(|(index, grid)| grid.ok_or(MappingError::UnmappedHardware { index }))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            geometry,
            grid_to_hardware,
            hardware_to_grid,
        })
    }

    pub fn geometry(&self) -> &PanelGeometry {
        &self.geometry
    }

    pub fn len(&self) -> usize {
        self.grid_to_hardware.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grid_to_hardware.is_empty()
    }

    /// Hardware index for a grid index, `None` if out of range.
    pub fn grid_to_hardware(&self, grid: usize) -> Option<usize> {
        self.grid_to_hardware.get(grid).copied()
    }

    /// Grid index for a hardware index, `None` if out of range.
    pub fn hardware_to_grid(&self, hardware: usize) -> Option<usize> {
        self.hardware_to_grid.get(hardware).copied()
    }

    /// Hardware index for an `(x, y)` coordinate via the prebuilt table.
    pub fn hardware_index(&self, x: usize, y: usize) -> Option<usize> {
        self.geometry
            .grid_index(x, y)
            .and_then(|grid| self.grid_to_hardware(grid))
    }

    pub fn grid_to_hardware_table(&self) -> &[usize] {
        &self.grid_to_hardware
    }

    pub fn hardware_to_grid_table(&self) -> &[usize] {
        &self.hardware_to_grid
    }
}
