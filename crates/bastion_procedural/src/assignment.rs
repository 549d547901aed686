//! # Final Assignment
//!
//! The result of a finished run: exactly one prototype per cell.
//!
//! ## Storage
//!
//! Assignments are saved as LZ4-compressed binary files:
//!
//! ```text
//! [magic u32][version u32][size x u32][size y u32][size z u32][cells u16 * n]
//! ```
//!
//! Cells are stored in grid order (X fastest), one `u16` prototype index each.

use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::path::Path;

use bytemuck::{Pod, Zeroable};
use lz4_flex::{compress_prepend_size, decompress_size_prepended};
use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::error::AssignmentError;
use crate::grid::{GridCoord, GridSize};
use crate::prototype_set::PrototypeId;

/// File magic, `BSTA` in little-endian.
const MAGIC: u32 = u32::from_le_bytes(*b"BSTA");

/// Current on-disk format version.
const VERSION: u32 = 1;

#[derive(Clone, Copy, Debug, Pod, Zeroable)]
#[repr(C)]
struct AssignmentHeader {
    magic: u32,
    version: u32,
    x: u32,
    y: u32,
    z: u32,
}

const HEADER_SIZE: usize = std::mem::size_of::<AssignmentHeader>();

/// Coordinate to prototype mapping of a collapsed grid.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    size: GridSize,
    cells: Vec<PrototypeId>,
}

impl Assignment {
    pub(crate) fn new(size: GridSize, cells: Vec<PrototypeId>) -> Self {
        debug_assert_eq!(size.cell_count(), cells.len());
        Self { size, cells }
    }

    /// Grid dimensions.
    #[inline]
    #[must_use]
    pub const fn size(&self) -> GridSize {
        self.size
    }

    /// Cells in grid order.
    #[inline]
    #[must_use]
    pub fn cells(&self) -> &[PrototypeId] {
        &self.cells
    }

    /// Prototype at `coord`, or `None` outside the grid.
    #[must_use]
    pub fn get(&self, coord: GridCoord) -> Option<PrototypeId> {
        self.size
            .contains(coord)
            .then(|| self.cells[self.size.index(coord)])
    }

    /// Iterates `(coord, prototype)` pairs in grid order.
    pub fn iter(&self) -> impl Iterator<Item = (GridCoord, PrototypeId)> + '_ {
        self.cells
            .iter()
            .enumerate()
            .map(|(index, &id)| (self.size.coord(index), id))
    }

    /// Number of cells holding `id`.
    #[must_use]
    pub fn count_of(&self, id: PrototypeId) -> usize {
        self.cells.iter().filter(|&&cell| cell == id).count()
    }

    /// Resolves every cell to its prototype name for the materializer.
    ///
    /// # Errors
    ///
    /// Returns [`AssignmentError::Corrupt`] if a cell references an index the
    /// catalog does not have.
    pub fn to_named(&self, catalog: &Catalog) -> Result<BTreeMap<GridCoord, String>, AssignmentError> {
        self.iter()
            .map(|(coord, id)| {
                if id.index() >= catalog.len() {
                    return Err(AssignmentError::Corrupt(format!(
                        "prototype {id} at {coord} is not in the catalog"
                    )));
                }
                Ok((coord, catalog.name(id).to_string()))
            })
            .collect()
    }

    /// Encodes the assignment into its compressed binary form.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let header = AssignmentHeader {
            magic: MAGIC,
            version: VERSION,
            x: self.size.x,
            y: self.size.y,
            z: self.size.z,
        };
        let mut raw = Vec::with_capacity(HEADER_SIZE + self.cells.len() * 2);
        raw.extend_from_slice(bytemuck::bytes_of(&header));
        raw.extend_from_slice(bytemuck::cast_slice::<PrototypeId, u8>(&self.cells));
        compress_prepend_size(&raw)
    }

    /// Decodes an assignment produced by [`Assignment::to_bytes`].
    ///
    /// # Errors
    ///
    /// Returns [`AssignmentError::Corrupt`] if decompression fails or the
    /// payload does not describe a valid assignment.
    pub fn from_bytes(compressed: &[u8]) -> Result<Self, AssignmentError> {
        let raw = decompress_size_prepended(compressed)
            .map_err(|e| AssignmentError::Corrupt(e.to_string()))?;
        if raw.len() < HEADER_SIZE {
            return Err(AssignmentError::Corrupt("truncated header".into()));
        }

        let header: AssignmentHeader = bytemuck::pod_read_unaligned(&raw[..HEADER_SIZE]);
        if header.magic != MAGIC {
            return Err(AssignmentError::Corrupt("bad magic".into()));
        }
        if header.version != VERSION {
            return Err(AssignmentError::Corrupt(format!(
                "unsupported version {}",
                header.version
            )));
        }

        let size = GridSize::new(header.x, header.y, header.z);
        if !size.is_valid() {
            return Err(AssignmentError::Corrupt(format!("invalid size {size}")));
        }

        let body = &raw[HEADER_SIZE..];
        let expected = size.cell_count().checked_mul(2);
        if expected != Some(body.len()) {
            return Err(AssignmentError::Corrupt(format!(
                "expected {} cells for {size}, found {} bytes",
                size.cell_count(),
                body.len()
            )));
        }

        let cells: Vec<PrototypeId> = bytemuck::pod_collect_to_vec(body);
        Ok(Self { size, cells })
    }

    /// Saves the assignment to a compressed binary file.
    ///
    /// # Errors
    ///
    /// Returns error if file operations fail.
    pub fn save_compressed(&self, path: &Path) -> Result<(), AssignmentError> {
        let mut file = std::fs::File::create(path)?;
        file.write_all(&self.to_bytes())?;
        Ok(())
    }

    /// Loads an assignment from a compressed binary file.
    ///
    /// # Errors
    ///
    /// Returns error if file operations or decoding fail.
    pub fn load_compressed(path: &Path) -> Result<Self, AssignmentError> {
        let mut file = std::fs::File::open(path)?;
        let mut compressed = Vec::new();
        file.read_to_end(&mut compressed)?;
        Self::from_bytes(&compressed)
    }
}
