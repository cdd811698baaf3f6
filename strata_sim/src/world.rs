// World access capabilities and the in-memory chunked voxel store.
//
// Three traits describe how the rest of the crate touches the world:
// - `WorldModifier`: the only sanctioned write channel for terrain
//   generators. Methods take `&self` and the trait requires `Send + Sync`, so
//   one modifier can be shared by every worker thread at once.
// - `VoxelGrid`: read-only block lookup used by the pathfinder. Returns `None`
//   for voxels that are outside the height band or whose chunk has not
//   finished generating, so callers treat them as impassable.
// - `ChunkedWorld`: a grid + modifier that also tracks per-chunk generation
//   state. The scheduler drives it.
//
// `VoxelWorld` implements all three. Storage is sparse: a map from
// `ChunkCoord` to a `ChunkColumn`, each holding a flat
// `Vec<BlockType>` indexed by `lx + lz * chunk_size + y * chunk_size²` (the
// same x-fastest, y-slowest layout as a dense grid, just per column).
//
// Locking: the column index sits behind one `RwLock`; each column has its
// own `RwLock` over its blocks and an `AtomicBool` generated flag. Writers to
// different chunks never contend past the brief index lookup, and readers of
// a generated chunk never wait on a writer elsewhere. A poisoned lock is
// recovered rather than propagated: the block data stays valid even if a
// generator panicked mid-write, and the scheduler re-runs that chunk anyway.
//
// See also: `generator.rs` for the code that writes through
// `WorldModifier`, `pathfinding.rs` for the reader, `scheduler.rs` for the
// generated/pending transitions.

use crate::types::{BlockType, ChunkCoord, VoxelCoord};
use rustc_hash::FxHashMap;
use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

// ---------------------------------------------------------------------------
// Capabilities
// ---------------------------------------------------------------------------

/// Write capability handed to terrain generators.
///
/// Implementations must tolerate repeated writes to the same voxel (last
/// write wins) and concurrent writes to disjoint coordinate ranges.
pub trait WorldModifier: Send + Sync {
    /// Exclusive upper bound of valid y coordinates.
    fn height(&self) -> i32;

    /// Set one block. Writes outside `[0, height)` are ignored.
    fn set_block(&self, coord: VoxelCoord, block: BlockType);

    /// Set every voxel of one column over a y range.
    fn fill_column(&self, x: i32, z: i32, ys: Range<i32>, block: BlockType) {
        for y in ys {
            self.set_block(VoxelCoord::new(x, y, z), block);
        }
    }
}

/// Read-only view used by the pathfinder.
pub trait VoxelGrid: Sync {
    /// The block at `coord`, or `None` when it is outside the height band or
    /// its chunk is not fully generated.
    fn block_at(&self, coord: VoxelCoord) -> Option<BlockType>;
}

/// A world that tracks which chunks have finished generating.
pub trait ChunkedWorld: WorldModifier + VoxelGrid {
    fn chunk_size(&self) -> i32;

    /// Mark a chunk as being (re)generated; its contents read as `None`
    /// until `mark_generated`.
    fn mark_pending(&self, coord: ChunkCoord);

    fn mark_generated(&self, coord: ChunkCoord);

    /// This world as a plain modifier, for handing to a generator.
    fn as_modifier(&self) -> &dyn WorldModifier;
}

// ---------------------------------------------------------------------------
// VoxelWorld
// ---------------------------------------------------------------------------

struct ChunkColumn {
    blocks: RwLock<Vec<BlockType>>,
    generated: AtomicBool,
}

impl ChunkColumn {
    fn new(volume: usize) -> Self {
        Self {
            blocks: RwLock::new(vec![BlockType::Air; volume]),
            generated: AtomicBool::new(false),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<BlockType>> {
        self.blocks.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<BlockType>> {
        self.blocks.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Sparse chunked voxel store, unbounded in x/z and bounded in y.
pub struct VoxelWorld {
    chunk_size: i32,
    height: i32,
    columns: RwLock<FxHashMap<ChunkCoord, Arc<ChunkColumn>>>,
}

impl VoxelWorld {
    /// Create an empty world. Panics if `chunk_size` or `height` is not
    /// positive; config validation rejects those values first.
    pub fn new(chunk_size: i32, height: i32) -> Self {
        assert!(chunk_size > 0, "chunk_size must be positive");
        assert!(height > 0, "height must be positive");
        Self {
            chunk_size,
            height,
            columns: RwLock::new(FxHashMap::default()),
        }
    }

    fn column_volume(&self) -> usize {
        let cs = self.chunk_size as usize;
        cs * cs * self.height as usize
    }

    /// Flat index of a voxel inside its column, or `None` outside the height
    /// band.
    fn local_index(&self, coord: VoxelCoord) -> Option<usize> {
        if coord.y < 0 || coord.y >= self.height {
            return None;
        }
        let cs = self.chunk_size as usize;
        let lx = coord.x.rem_euclid(self.chunk_size) as usize;
        let lz = coord.z.rem_euclid(self.chunk_size) as usize;
        Some(lx + lz * cs + coord.y as usize * cs * cs)
    }

    fn column(&self, coord: ChunkCoord) -> Option<Arc<ChunkColumn>> {
        self.columns
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&coord)
            .cloned()
    }

    fn column_or_insert(&self, coord: ChunkCoord) -> Arc<ChunkColumn> {
        if let Some(column) = self.column(coord) {
            return column;
        }
        let volume = self.column_volume();
        self.columns
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(coord)
            .or_insert_with(|| Arc::new(ChunkColumn::new(volume)))
            .clone()
    }

    /// Read a block regardless of generation state. Voxels never written read
    /// as `Air`.
    pub fn get(&self, coord: VoxelCoord) -> BlockType {
        let Some(index) = self.local_index(coord) else {
            return BlockType::Air;
        };
        self.column(ChunkCoord::containing(coord, self.chunk_size))
            .map_or(BlockType::Air, |column| {
                let blocks = column.read();
                blocks[index]
            })
    }

    pub fn is_generated(&self, coord: ChunkCoord) -> bool {
        self.column(coord)
            .is_some_and(|column| column.generated.load(Ordering::Acquire))
    }

    /// Number of chunks currently marked generated.
    pub fn generated_count(&self) -> usize {
        self.columns
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|column| column.generated.load(Ordering::Acquire))
            .count()
    }

    /// Copy of a column's blocks, or `None` if nothing was ever written there.
    pub fn column_snapshot(&self, coord: ChunkCoord) -> Option<Vec<BlockType>> {
        let column = self.column(coord)?;
        let blocks = column.read().clone();
        Some(blocks)
    }

    /// Every allocated column's blocks, ordered by chunk coordinate. Used to
    /// compare whole-world states.
    pub fn snapshot(&self) -> Vec<(ChunkCoord, Vec<BlockType>)> {
        let columns = self.columns.read().unwrap_or_else(PoisonError::into_inner);
        let mut out: Vec<_> = columns
            .iter()
            .map(|(coord, column)| (*coord, column.read().clone()))
            .collect();
        out.sort_by_key(|(coord, _)| *coord);
        out
    }
}

impl WorldModifier for VoxelWorld {
    fn height(&self) -> i32 {
        self.height
    }

    fn set_block(&self, coord: VoxelCoord, block: BlockType) {
        let Some(index) = self.local_index(coord) else {
            return;
        };
        let column = self.column_or_insert(ChunkCoord::containing(coord, self.chunk_size));
        column.write()[index] = block;
    }

    fn fill_column(&self, x: i32, z: i32, ys: Range<i32>, block: BlockType) {
        // One lock acquisition for the whole run instead of one per voxel.
        let ys = ys.start.max(0)..ys.end.min(self.height);
        if ys.is_empty() {
            return;
        }
        let base = VoxelCoord::new(x, 0, z);
        let column = self.column_or_insert(ChunkCoord::containing(base, self.chunk_size));
        let mut blocks = column.write();
        for y in ys {
            if let Some(index) = self.local_index(VoxelCoord::new(x, y, z)) {
                blocks[index] = block;
            }
        }
    }
}

impl VoxelGrid for VoxelWorld {
    fn block_at(&self, coord: VoxelCoord) -> Option<BlockType> {
        let index = self.local_index(coord)?;
        let column = self.column(ChunkCoord::containing(coord, self.chunk_size))?;
        if !column.generated.load(Ordering::Acquire) {
            return None;
        }
        let block = column.read()[index];
        Some(block)
    }
}

impl ChunkedWorld for VoxelWorld {
    fn chunk_size(&self) -> i32 {
        self.chunk_size
    }

    fn mark_pending(&self, coord: ChunkCoord) {
        self.column_or_insert(coord)
            .generated
            .store(false, Ordering::Release);
    }

    fn mark_generated(&self, coord: ChunkCoord) {
        self.column_or_insert(coord)
            .generated
            .store(true, Ordering::Release);
    }

    fn as_modifier(&self) -> &dyn WorldModifier {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_world_reads_air_and_ungenerated() {
        let world = VoxelWorld::new(8, 4);
        assert_eq!(world.get(VoxelCoord::new(3, 1, 3)), BlockType::Air);
        assert_eq!(world.block_at(VoxelCoord::new(3, 1, 3)), None);
        assert!(!world.is_generated(ChunkCoord::new(0, 0)));
        assert_eq!(world.generated_count(), 0);
    }

    #[test]
    fn set_and_get_across_negative_chunks() {
        let world = VoxelWorld::new(8, 4);
        let coord = VoxelCoord::new(-1, 2, -9);
        world.set_block(coord, BlockType::Stone);
        assert_eq!(world.get(coord), BlockType::Stone);
        // Same local index in a different chunk is untouched.
        assert_eq!(world.get(VoxelCoord::new(7, 2, 7)), BlockType::Air);
        assert!(world.column_snapshot(ChunkCoord::new(-1, -2)).is_some());
        assert!(world.column_snapshot(ChunkCoord::new(0, 0)).is_none());
    }

    #[test]
    fn out_of_band_writes_are_ignored() {
        let world = VoxelWorld::new(8, 4);
        world.set_block(VoxelCoord::new(0, -1, 0), BlockType::Stone);
        world.set_block(VoxelCoord::new(0, 4, 0), BlockType::Stone);
        assert!(world.snapshot().is_empty());
    }

    #[test]
    fn block_at_hides_ungenerated_chunks() {
        let world = VoxelWorld::new(8, 4);
        let coord = VoxelCoord::new(1, 0, 1);
        world.set_block(coord, BlockType::Grass);
        assert_eq!(world.block_at(coord), None);

        world.mark_generated(ChunkCoord::new(0, 0));
        assert_eq!(world.block_at(coord), Some(BlockType::Grass));
        assert_eq!(world.block_at(VoxelCoord::new(1, 4, 1)), None);

        world.mark_pending(ChunkCoord::new(0, 0));
        assert_eq!(world.block_at(coord), None);
    }

    #[test]
    fn fill_column_clamps_to_height() {
        let world = VoxelWorld::new(4, 3);
        world.fill_column(2, 2, -5..10, BlockType::Dirt);
        for y in 0..3 {
            assert_eq!(world.get(VoxelCoord::new(2, y, 2)), BlockType::Dirt);
        }
        assert_eq!(world.get(VoxelCoord::new(1, 0, 2)), BlockType::Air);
    }

    #[test]
    fn last_write_wins() {
        let world = VoxelWorld::new(4, 3);
        let coord = VoxelCoord::new(0, 0, 0);
        world.set_block(coord, BlockType::Stone);
        world.set_block(coord, BlockType::Sand);
        assert_eq!(world.get(coord), BlockType::Sand);
    }

    #[test]
    fn concurrent_writes_to_disjoint_chunks() {
        let world = VoxelWorld::new(4, 2);
        std::thread::scope(|s| {
            for cx in 0..4 {
                let world = &world;
                s.spawn(move || {
                    for x in 0..4 {
                        for z in 0..4 {
                            world.set_block(VoxelCoord::new(cx * 4 + x, 0, z), BlockType::Stone);
                        }
                    }
                });
            }
        });
        for x in 0..16 {
            for z in 0..4 {
                assert_eq!(world.get(VoxelCoord::new(x, 0, z)), BlockType::Stone);
            }
        }
        assert_eq!(world.snapshot().len(), 4);
    }
}
