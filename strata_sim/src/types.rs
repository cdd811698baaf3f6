// Core types shared across the crate.
//
// Defines voxel and chunk coordinates, block types, and the request priority
// enum. All types derive `Serialize`/`Deserialize` so they can appear in
// config files and log output.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Spatial types
// ---------------------------------------------------------------------------

/// A position in the 3D voxel grid, in voxel units.
///
/// - X: east  (positive) / west  (negative)
/// - Y: up    (positive) / down  (negative), bounded by the world height
/// - Z: south (positive) / north (negative)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VoxelCoord {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl VoxelCoord {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    pub const fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }

    /// Like `offset`, but `None` when any axis leaves the `i32` range.
    pub fn checked_offset(self, dx: i32, dy: i32, dz: i32) -> Option<Self> {
        Some(Self::new(
            self.x.checked_add(dx)?,
            self.y.checked_add(dy)?,
            self.z.checked_add(dz)?,
        ))
    }

    /// Manhattan distance between two coordinates. Saturates at `u32::MAX`.
    pub fn manhattan_distance(self, other: Self) -> u32 {
        self.x
            .abs_diff(other.x)
            .saturating_add(self.y.abs_diff(other.y))
            .saturating_add(self.z.abs_diff(other.z))
    }

    /// Chebyshev (king-move) distance between two coordinates.
    pub fn chebyshev_distance(self, other: Self) -> u32 {
        self.x
            .abs_diff(other.x)
            .max(self.y.abs_diff(other.y))
            .max(self.z.abs_diff(other.z))
    }

    /// True when `other` differs by at most one on every axis and is not
    /// `self`. This is adjacency under the widest movement model.
    pub fn is_adjacent_26(self, other: Self) -> bool {
        self != other && self.chebyshev_distance(other) == 1
    }
}

impl fmt::Display for VoxelCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// A vertical column of voxels, `chunk_size` wide on x and z and spanning the
/// full world height. The unit of generation and streaming.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(Serialize, Deserialize)]
pub struct ChunkCoord {
    pub x: i32,
    pub z: i32,
}

impl ChunkCoord {
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// The chunk containing a voxel. Floor division, so voxel x = -1 lands
    /// in chunk x = -1 rather than 0.
    pub fn containing(voxel: VoxelCoord, chunk_size: i32) -> Self {
        Self {
            x: voxel.x.div_euclid(chunk_size),
            z: voxel.z.div_euclid(chunk_size),
        }
    }

    /// Squared Euclidean distance in chunk units. Widened to `i64` so far
    /// coordinates cannot overflow.
    pub fn distance_sq(self, other: Self) -> i64 {
        let dx = i64::from(self.x) - i64::from(other.x);
        let dz = i64::from(self.z) - i64::from(other.z);
        (dx * dx).saturating_add(dz * dz)
    }

    /// First voxel x/z covered by this chunk, or `None` on overflow.
    pub fn voxel_origin(self, chunk_size: i32) -> Option<(i32, i32)> {
        Some((
            self.x.checked_mul(chunk_size)?,
            self.z.checked_mul(chunk_size)?,
        ))
    }
}

impl fmt::Display for ChunkCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.x, self.z)
    }
}

// ---------------------------------------------------------------------------
// Blocks
// ---------------------------------------------------------------------------

/// The material of a single voxel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlockType {
    #[default]
    Air,
    Stone,
    Dirt,
    Grass,
    Sand,
    Water,
    Bedrock,
}

impl BlockType {
    /// Solid blocks stop movement and can be stood on. Water is not solid:
    /// agents can wade through it but not stand on it.
    pub fn is_solid(self) -> bool {
        !matches!(self, BlockType::Air | BlockType::Water)
    }
}

// ---------------------------------------------------------------------------
// Scheduling
// ---------------------------------------------------------------------------

/// Priority hint for chunk requests. Higher variants are served first; within
/// a priority level the nearest chunk wins.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(Serialize, Deserialize)]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}
