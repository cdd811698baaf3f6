// Distance-based ordering of chunk coordinates.
//
// Chunks nearer a point of interest (usually the player's chunk) should be
// generated first. Rather than a comparator, the order is expressed as a key
// function: `priority_key` maps a coordinate to `(distance², x, z)`, and keys
// compare lexicographically. Ties in distance fall back to x then z, which
// makes the relation a deterministic total preorder for a fixed reference.
//
// Keys depend on the reference point, so any structure built from them goes
// stale when the reference moves. The scheduler re-keys its queue in batches
// (see `scheduler.rs`); this module only provides the key.

use crate::types::ChunkCoord;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Sort key for a chunk relative to the reference. Smaller is nearer.
pub type ChunkKey = (i64, i32, i32);

/// Nearest-first ordering relative to a reference chunk.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkDistanceOrder {
    pub reference: ChunkCoord,
}

impl ChunkDistanceOrder {
    pub fn new(reference: ChunkCoord) -> Self {
        Self { reference }
    }

    pub fn set_reference(&mut self, reference: ChunkCoord) {
        self.reference = reference;
    }

    /// Squared Euclidean distance to the reference, in chunk units.
    pub fn distance_sq(&self, coord: ChunkCoord) -> i64 {
        coord.distance_sq(self.reference)
    }

    pub fn priority_key(&self, coord: ChunkCoord) -> ChunkKey {
        (self.distance_sq(coord), coord.x, coord.z)
    }

    /// `Less` when `a` should be served before `b`.
    pub fn compare(&self, a: ChunkCoord, b: ChunkCoord) -> Ordering {
        self.priority_key(a).cmp(&self.priority_key(b))
    }

    pub fn sort_nearest_first(&self, coords: &mut [ChunkCoord]) {
        coords.sort_by_cached_key(|&c| self.priority_key(c));
    }
}
