// Deterministic, portable randomness for terrain generation and tests.
//
// Two tools live here:
// - `GameRng`: a sequential xoshiro256++ generator (Blackman & Vigna, 2019)
//   seeded through SplitMix64. Used wherever a stream of values is consumed in
//   order, e.g. deriving per-octave offsets for a generator or building random
//   obstacle grids in tests.
// - `lattice_hash` / `lattice_unit`: a stateless hash of `(seed, x, z)`.
//   Terrain generators are invoked concurrently on arbitrary regions in
//   arbitrary order, so the value at a lattice point must not depend on which
//   region asked first. A stateless hash gives exactly that.
//
// Both are integer-only in their core, so output is identical across
// platforms and optimization levels.
//
// See also: `strata_sim::generator` for the heightmap generator that samples
// `lattice_unit` every `spacing` voxels.

use serde::{Deserialize, Serialize};

/// Xoshiro256++ PRNG.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GameRng {
    s: [u64; 4],
}

impl GameRng {
    /// Create a generator seeded from a `u64`. The same seed always yields the
    /// same sequence.
    pub fn new(seed: u64) -> Self {
        let mut sm = seed;
        Self {
            s: [
                splitmix64(&mut sm),
                splitmix64(&mut sm),
                splitmix64(&mut sm),
                splitmix64(&mut sm),
            ],
        }
    }

    pub fn next_u64(&mut self) -> u64 {
        let result = (self.s[0].wrapping_add(self.s[3]))
            .rotate_left(23)
            .wrapping_add(self.s[0]);

        let t = self.s[1] << 17;

        self.s[2] ^= self.s[0];
        self.s[3] ^= self.s[1];
        self.s[1] ^= self.s[2];
        self.s[0] ^= self.s[3];

        self.s[2] ^= t;
        self.s[3] = self.s[3].rotate_left(45);

        result
    }

    /// Uniform `f32` in [0, 1), built from the top 24 bits.
    pub fn next_f32(&mut self) -> f32 {
        (self.next_u64() >> 40) as f32 / (1u64 << 24) as f32
    }

    /// Uniform integer in `[low, high)`, rejection-sampled to avoid modulo
    /// bias. Panics if `low >= high`.
    pub fn range_i32(&mut self, low: i32, high: i32) -> i32 {
        assert!(low < high, "range_i32: low must be less than high");
        let range = (i64::from(high) - i64::from(low)) as u64;
        let threshold = range.wrapping_neg() % range;
        loop {
            let r = self.next_u64();
            if r >= threshold {
                return (i64::from(low) + (r % range) as i64) as i32;
            }
        }
    }

    /// `true` with probability `p`.
    pub fn random_bool(&mut self, p: f32) -> bool {
        self.next_f32() < p
    }
}

/// Hash a 2D lattice point under a seed. Stateless: the same inputs give the
/// same output no matter which thread asks or in what order.
pub fn lattice_hash(seed: u64, x: i32, z: i32) -> u64 {
    // Pack both coordinates into one word, then run two SplitMix64 rounds so
    // neighbouring points decorrelate.
    let packed = (u64::from(x as u32) << 32) | u64::from(z as u32);
    let mut state = seed ^ packed.wrapping_mul(0x9e37_79b9_7f4a_7c15);
    splitmix64(&mut state);
    splitmix64(&mut state)
}

/// `lattice_hash` mapped to a uniform `f32` in [0, 1).
pub fn lattice_unit(seed: u64, x: i32, z: i32) -> f32 {
    (lattice_hash(seed, x, z) >> 40) as f32 / (1u64 << 24) as f32
}

fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}
