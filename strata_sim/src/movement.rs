// Movement model: which voxels neighbor each other and which can be entered.
//
// The neighborhood is always explicit configuration, never an implied
// default inside the search:
// - `Orthogonal`: the 6 face neighbors.
// - `PlanarDiagonal`: faces plus the 12 edge diagonals (two axes change).
// - `FullDiagonal`: all 26 surrounding voxels.
//
// `requires_support` distinguishes walking agents (must stand on a solid
// block) from flying or swimming ones.
//
// Neighbor offsets are precomputed in a fixed order so that search results
// are identical run to run.

use crate::types::{BlockType, VoxelCoord};
use crate::world::VoxelGrid;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Neighbor buffer; 26 fits the widest neighborhood without allocating.
pub type Neighbors = SmallVec<[VoxelCoord; 26]>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Neighborhood {
    Orthogonal,
    PlanarDiagonal,
    FullDiagonal,
}

impl Neighborhood {
    /// Number of axes allowed to change in a single step.
    fn max_axes(self) -> u8 {
        match self {
            Neighborhood::Orthogonal => 1,
            Neighborhood::PlanarDiagonal => 2,
            Neighborhood::FullDiagonal => 3,
        }
    }

    /// Offsets in deterministic order: faces first, then edge diagonals, then
    /// corners; within a group, lexicographic by (dx, dy, dz).
    pub fn offsets(self) -> SmallVec<[(i32, i32, i32); 26]> {
        let max_axes = self.max_axes();
        let mut out: SmallVec<[(i32, i32, i32); 26]> = SmallVec::new();
        for axes in 1..=max_axes {
            for dx in -1..=1 {
                for dy in -1..=1 {
                    for dz in -1..=1 {
                        let changed = u8::from(dx != 0) + u8::from(dy != 0) + u8::from(dz != 0);
                        if changed == axes {
                            out.push((dx, dy, dz));
                        }
                    }
                }
            }
        }
        out
    }

    /// True when `a` and `b` are neighbors under this model.
    pub fn are_adjacent(self, a: VoxelCoord, b: VoxelCoord) -> bool {
        if !a.is_adjacent_26(b) {
            return false;
        }
        let changed = u8::from(a.x != b.x) + u8::from(a.y != b.y) + u8::from(a.z != b.z);
        changed <= self.max_axes()
    }
}

/// How an agent moves through the grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementModel {
    pub neighborhood: Neighborhood,
    /// If true, a voxel can only be entered when the voxel below it is solid.
    pub requires_support: bool,
}

impl MovementModel {
    pub fn new(neighborhood: Neighborhood, requires_support: bool) -> Self {
        Self {
            neighborhood,
            requires_support,
        }
    }

    /// Candidate neighbors of `coord`, before any passability check.
    /// Offsets that would leave the `i32` range are skipped.
    pub fn neighbors(&self, coord: VoxelCoord) -> Neighbors {
        self.neighborhood
            .offsets()
            .into_iter()
            .filter_map(|(dx, dy, dz)| coord.checked_offset(dx, dy, dz))
            .collect()
    }

    /// Whether an agent can occupy `coord` in `grid`. Voxels in ungenerated
    /// chunks or outside the height band are never passable.
    pub fn is_passable<G: VoxelGrid + ?Sized>(&self, grid: &G, coord: VoxelCoord) -> bool {
        match grid.block_at(coord) {
            Some(block) if !block.is_solid() => {
                !self.requires_support
                    || coord
                        .checked_offset(0, -1, 0)
                        .and_then(|below| grid.block_at(below))
                        .is_some_and(BlockType::is_solid)
            }
            _ => false,
        }
    }
}
