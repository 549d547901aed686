//! # Grid Geometry
//!
//! Dense 3D grid coordinates and the six canonical directions.
//!
//! ## Direction Indices
//!
//! Every prototype's adjacency lists are keyed by these indices, so the
//! mapping is part of the catalog format and must never change:
//!
//! | Index | Direction |
//! |-------|-----------|
//! | 0     | +X        |
//! | 1     | -X        |
//! | 2     | +Y (up)   |
//! | 3     | -Y (down) |
//! | 4     | +Z        |
//! | 5     | -Z        |
//!
//! Cells are stored X-fastest: `index = x + sx * (y + sy * z)`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A cell coordinate inside one grid.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridCoord {
    /// X coordinate.
    pub x: u32,
    /// Y coordinate (layer, 0 is the bottom).
    pub y: u32,
    /// Z coordinate.
    pub z: u32,
}

impl GridCoord {
    /// Creates a new grid coordinate.
    #[inline]
    #[must_use]
    pub const fn new(x: u32, y: u32, z: u32) -> Self {
        Self { x, y, z }
    }
}

impl fmt::Display for GridCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Dimensions of a grid in cells.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridSize {
    /// Width along X.
    pub x: u32,
    /// Height along Y.
    pub y: u32,
    /// Depth along Z.
    pub z: u32,
}

impl GridSize {
    /// Creates a new grid size.
    #[inline]
    #[must_use]
    pub const fn new(x: u32, y: u32, z: u32) -> Self {
        Self { x, y, z }
    }

    /// Total number of cells, or `None` if it does not fit in `usize`.
    #[must_use]
    pub fn checked_cell_count(self) -> Option<usize> {
        let x = usize::try_from(self.x).ok()?;
        let y = usize::try_from(self.y).ok()?;
        let z = usize::try_from(self.z).ok()?;
        x.checked_mul(y)?.checked_mul(z)
    }

    /// Total number of cells.
    #[inline]
    #[must_use]
    pub fn cell_count(self) -> usize {
        self.x as usize * self.y as usize * self.z as usize
    }

    /// Returns true if no dimension is zero and the cell count is addressable.
    #[must_use]
    pub fn is_valid(self) -> bool {
        self.x > 0 && self.y > 0 && self.z > 0 && self.checked_cell_count().is_some()
    }

    /// Returns true if `coord` lies inside the grid.
    #[inline]
    #[must_use]
    pub const fn contains(self, coord: GridCoord) -> bool {
        coord.x < self.x && coord.y < self.y && coord.z < self.z
    }

    /// Flat index of an in-bounds coordinate.
    #[inline]
    #[must_use]
    pub fn index(self, coord: GridCoord) -> usize {
        debug_assert!(self.contains(coord), "{coord} outside {self}");
        coord.x as usize + self.x as usize * (coord.y as usize + self.y as usize * coord.z as usize)
    }

    /// Coordinate of a flat index.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn coord(self, index: usize) -> GridCoord {
        let sx = self.x as usize;
        let sy = self.y as usize;
        // Each component is below its u32 dimension, so the casts are lossless.
        GridCoord::new(
            (index % sx) as u32,
            ((index / sx) % sy) as u32,
            (index / (sx * sy)) as u32,
        )
    }

    /// The neighbouring coordinate in `dir`, or `None` when it leaves the grid.
    #[inline]
    #[must_use]
    pub fn step(self, coord: GridCoord, dir: Direction) -> Option<GridCoord> {
        let next = match dir {
            Direction::PosX => GridCoord::new(coord.x.checked_add(1)?, coord.y, coord.z),
            Direction::NegX => GridCoord::new(coord.x.checked_sub(1)?, coord.y, coord.z),
            Direction::PosY => GridCoord::new(coord.x, coord.y.checked_add(1)?, coord.z),
            Direction::NegY => GridCoord::new(coord.x, coord.y.checked_sub(1)?, coord.z),
            Direction::PosZ => GridCoord::new(coord.x, coord.y, coord.z.checked_add(1)?),
            Direction::NegZ => GridCoord::new(coord.x, coord.y, coord.z.checked_sub(1)?),
        };
        self.contains(next).then_some(next)
    }

    /// Returns true if `coord` sits on the outer face that `dir` points through.
    #[inline]
    #[must_use]
    pub fn on_face(self, coord: GridCoord, dir: Direction) -> bool {
        match dir {
            Direction::PosX => coord.x + 1 == self.x,
            Direction::NegX => coord.x == 0,
            Direction::PosY => coord.y + 1 == self.y,
            Direction::NegY => coord.y == 0,
            Direction::PosZ => coord.z + 1 == self.z,
            Direction::NegZ => coord.z == 0,
        }
    }

    /// Iterates all coordinates in storage order.
    pub fn coords(self) -> impl Iterator<Item = GridCoord> {
        (0..self.cell_count()).map(move |index| self.coord(index))
    }
}

impl fmt::Display for GridSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.x, self.y, self.z)
    }
}

/// One of the six canonical unit directions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Direction {
    /// +X
    PosX = 0,
    /// -X
    NegX = 1,
    /// +Y (up)
    PosY = 2,
    /// -Y (down)
    NegY = 3,
    /// +Z
    PosZ = 4,
    /// -Z
    NegZ = 5,
}

impl Direction {
    /// All directions in index order.
    pub const ALL: [Self; 6] = [
        Self::PosX,
        Self::NegX,
        Self::PosY,
        Self::NegY,
        Self::PosZ,
        Self::NegZ,
    ];

    /// The fixed adjacency-list index of this direction.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// The direction pointing the other way.
    #[inline]
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::PosX => Self::NegX,
            Self::NegX => Self::PosX,
            Self::PosY => Self::NegY,
            Self::NegY => Self::PosY,
            Self::PosZ => Self::NegZ,
            Self::NegZ => Self::PosZ,
        }
    }

    /// Unit offset of this direction.
    #[inline]
    #[must_use]
    pub const fn offset(self) -> [i32; 3] {
        match self {
            Self::PosX => [1, 0, 0],
            Self::NegX => [-1, 0, 0],
            Self::PosY => [0, 1, 0],
            Self::NegY => [0, -1, 0],
            Self::PosZ => [0, 0, 1],
            Self::NegZ => [0, 0, -1],
        }
    }

    /// Catalog field name of the face tag for this direction.
    #[must_use]
    pub const fn face_name(self) -> &'static str {
        match self {
            Self::PosX => "posX",
            Self::NegX => "negX",
            Self::PosY => "posY",
            Self::NegY => "negY",
            Self::PosZ => "posZ",
            Self::NegZ => "negZ",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_round_trip() {
        let size = GridSize::new(3, 4, 5);
        for (i, coord) in size.coords().enumerate() {
            assert_eq!(size.index(coord), i);
            assert_eq!(size.coord(i), coord);
        }
        assert_eq!(size.cell_count(), 60);
    }

    #[test]
    fn test_step_stays_in_bounds() {
        let size = GridSize::new(2, 1, 1);
        let origin = GridCoord::new(0, 0, 0);
        assert_eq!(size.step(origin, Direction::PosX), Some(GridCoord::new(1, 0, 0)));
        assert_eq!(size.step(origin, Direction::NegX), None);
        assert_eq!(size.step(origin, Direction::PosY), None);
        assert_eq!(size.step(GridCoord::new(1, 0, 0), Direction::PosX), None);
    }

    #[test]
    fn test_direction_indices_are_fixed() {
        for (i, dir) in Direction::ALL.iter().enumerate() {
            assert_eq!(dir.index(), i);
            assert_eq!(dir.opposite().opposite(), *dir);
            let [x, y, z] = dir.offset();
            let [ox, oy, oz] = dir.opposite().offset();
            assert_eq!((x + ox, y + oy, z + oz), (0, 0, 0));
        }
        assert_eq!(Direction::PosY.face_name(), "posY");
    }

    #[test]
    fn test_faces() {
        let size = GridSize::new(3, 3, 3);
        let corner = GridCoord::new(2, 0, 1);
        assert!(size.on_face(corner, Direction::PosX));
        assert!(size.on_face(corner, Direction::NegY));
        assert!(!size.on_face(corner, Direction::NegX));
        assert!(!size.on_face(corner, Direction::PosZ));
    }

    #[test]
    fn test_invalid_sizes() {
        assert!(!GridSize::new(0, 1, 1).is_valid());
        assert!(GridSize::new(1, 1, 1).is_valid());
    }
}
