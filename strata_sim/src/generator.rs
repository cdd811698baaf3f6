// Terrain generator contract, region descriptor, and reference generators.
//
// A `TerrainGenerator` fills a `GenerationRegion` (a half-open x/z rectangle
// spanning `[0, height)` in y) by writing through a `WorldModifier`. The
// scheduler calls generators from several worker threads at once on disjoint
// regions, so the trait requires `Send + Sync` and `generate` takes `&self`:
// a generator cannot keep mutable per-call state without its own
// synchronization.
//
// Contract every implementation must honor:
// - Write only through the supplied modifier, and only inside the region's
//   columns and `[0, height)`.
// - Be idempotent: running twice on the same region leaves the same blocks as
//   running once.
// - Sample the terrain field every `spacing` voxels and fill the
//   full-resolution region by interpolation or repetition. Samples sit on
//   the global `spacing` lattice, so neighboring regions agree at their
//   shared border.
//
// Two reference generators live here: `FlatGenerator` (superflat layers) and
// `HeightmapGenerator` (value noise from `strata_prng::lattice_unit`,
// bilinearly interpolated between samples).
//
// See also: `scheduler.rs` which builds regions with
// `GenerationRegion::for_chunk` and runs them through `run_generator`,
// `world.rs` for the `WorldModifier` capability.

use crate::config::TerrainProfile;
use crate::error::{GenerationError, ScheduleError};
use crate::prng::lattice_unit;
use crate::types::{BlockType, ChunkCoord};
use crate::world::{ChunkedWorld, WorldModifier};
use log::debug;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

// ---------------------------------------------------------------------------
// Region
// ---------------------------------------------------------------------------

/// A rectangular slab of the world to generate: `[x_start, x_end) ×
/// [0, height) × [z_start, z_end)`, sampled every `spacing` voxels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GenerationRegion {
    pub x_start: i32,
    pub z_start: i32,
    pub x_end: i32,
    pub z_end: i32,
    pub spacing: u32,
    pub height: i32,
}

impl GenerationRegion {
    /// Reject empty or inverted ranges, zero spacing, and non-positive
    /// heights.
    pub fn validate(&self) -> Result<(), ScheduleError> {
        if self.x_end <= self.x_start {
            return Err(invalid(format!(
                "x range [{}, {}) is empty",
                self.x_start, self.x_end
            )));
        }
        if self.z_end <= self.z_start {
            return Err(invalid(format!(
                "z range [{}, {}) is empty",
                self.z_start, self.z_end
            )));
        }
        if self.spacing == 0 || i32::try_from(self.spacing).is_err() {
            return Err(invalid(format!("spacing {} out of range", self.spacing)));
        }
        if self.height <= 0 {
            return Err(invalid(format!("height {} is not positive", self.height)));
        }
        Ok(())
    }

    /// The region covering exactly one chunk column.
    pub fn for_chunk(
        coord: ChunkCoord,
        chunk_size: i32,
        height: i32,
        spacing: u32,
    ) -> Result<Self, ScheduleError> {
        if chunk_size <= 0 {
            return Err(invalid(format!("chunk size {chunk_size} is not positive")));
        }
        let overflow = || invalid(format!("chunk {coord} lies outside the addressable world"));
        let (x_start, z_start) = coord.voxel_origin(chunk_size).ok_or_else(overflow)?;
        let x_end = x_start.checked_add(chunk_size).ok_or_else(overflow)?;
        let z_end = z_start.checked_add(chunk_size).ok_or_else(overflow)?;
        let region = Self {
            x_start,
            z_start,
            x_end,
            z_end,
            spacing,
            height,
        };
        region.validate()?;
        Ok(region)
    }

    pub fn width(&self) -> i32 {
        self.x_end - self.x_start
    }

    pub fn depth(&self) -> i32 {
        self.z_end - self.z_start
    }

    /// Every (x, z) column in the region, x fastest.
    pub fn columns(&self) -> impl Iterator<Item = (i32, i32)> + '_ {
        let xs = self.x_start..self.x_end;
        (self.z_start..self.z_end).flat_map(move |z| xs.clone().map(move |x| (x, z)))
    }
}

impl fmt::Display for GenerationRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "x[{}, {}) z[{}, {}) h{} s{}",
            self.x_start, self.x_end, self.z_start, self.z_end, self.height, self.spacing
        )
    }
}

fn invalid(reason: String) -> ScheduleError {
    ScheduleError::InvalidRegion { reason }
}

// ---------------------------------------------------------------------------
// Contract
// ---------------------------------------------------------------------------

/// Fills a region with terrain.
pub trait TerrainGenerator: Send + Sync {
    fn generate(
        &self,
        region: &GenerationRegion,
        world: &dyn WorldModifier,
    ) -> Result<(), GenerationError>;
}

/// Run a generator, converting a panic into `GenerationError::Panicked`.
pub fn run_generator(
    generator: &dyn TerrainGenerator,
    region: &GenerationRegion,
    world: &dyn WorldModifier,
) -> Result<(), GenerationError> {
    match panic::catch_unwind(AssertUnwindSafe(|| generator.generate(region, world))) {
        Ok(result) => result,
        Err(payload) => Err(GenerationError::Panicked {
            reason: panic_message(payload.as_ref()),
        }),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Validate and generate a region directly, outside any scheduler. Used for
/// map overviews and tests.
pub fn generate_region(
    generator: &dyn TerrainGenerator,
    region: &GenerationRegion,
    world: &dyn WorldModifier,
) -> Result<(), ScheduleError> {
    region.validate()?;
    run_generator(generator, region, world)?;
    Ok(())
}

/// Generate one chunk of a `ChunkedWorld` on the calling thread. The chunk
/// reads as ungenerated until the generator succeeds.
pub fn generate_chunk(
    world: &dyn ChunkedWorld,
    generator: &dyn TerrainGenerator,
    coord: ChunkCoord,
    spacing: u32,
) -> Result<(), ScheduleError> {
    let region = GenerationRegion::for_chunk(coord, world.chunk_size(), world.height(), spacing)?;
    world.mark_pending(coord);
    run_generator(generator, &region, world.as_modifier())?;
    world.mark_generated(coord);
    debug!("chunk {coord} generated synchronously");
    Ok(())
}

// ---------------------------------------------------------------------------
// FlatGenerator
// ---------------------------------------------------------------------------

/// Superflat terrain: the same stack of layers in every column, from y = 0
/// upward. Voxels above the stack are left untouched. The field is uniform,
/// so `spacing` has no effect.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlatGenerator {
    /// `(block, thickness)` pairs, bottom first.
    pub layers: Vec<(BlockType, i32)>,
}

impl FlatGenerator {
    pub fn new(layers: Vec<(BlockType, i32)>) -> Self {
        Self { layers }
    }

    /// Total thickness of the layer stack.
    pub fn surface_height(&self) -> i32 {
        self.layers.iter().map(|&(_, t)| t.max(0)).sum()
    }
}

impl Default for FlatGenerator {
    fn default() -> Self {
        Self::new(vec![
            (BlockType::Bedrock, 1),
            (BlockType::Stone, 2),
            (BlockType::Dirt, 1),
            (BlockType::Grass, 1),
        ])
    }
}

impl TerrainGenerator for FlatGenerator {
    fn generate(
        &self,
        region: &GenerationRegion,
        world: &dyn WorldModifier,
    ) -> Result<(), GenerationError> {
        let top = region.height.min(world.height());
        for (x, z) in region.columns() {
            let mut y = 0;
            for &(block, thickness) in &self.layers {
                if y >= top {
                    break;
                }
                let end = y.saturating_add(thickness.max(0)).min(top);
                world.fill_column(x, z, y..end, block);
                y = end;
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// HeightmapGenerator
// ---------------------------------------------------------------------------

/// Rolling terrain from 2D value noise.
///
/// The surface height at a sample point is
/// `base_height + (noise * 2 - 1) * amplitude`, where `noise` is smoothed
/// lattice noise with cells `wavelength` voxels wide. Samples are taken every
/// `spacing` voxels and bilinearly interpolated in between. Each column is
/// written in full: bedrock, stone, a few dirt, then grass at or above sea
/// level or sand below it, water up to `sea_level`, and air to the top.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct HeightmapGenerator {
    pub seed: u64,
    pub base_height: i32,
    pub amplitude: f32,
    pub wavelength: f32,
    pub sea_level: i32,
}

impl HeightmapGenerator {
    pub fn from_profile(profile: &TerrainProfile, sea_level: i32) -> Self {
        Self {
            seed: profile.seed,
            base_height: profile.base_height,
            amplitude: profile.amplitude,
            wavelength: profile.wavelength,
            sea_level,
        }
    }

    /// Smoothed value noise in [0, 1) at a voxel column.
    fn noise(&self, x: i64, z: i64) -> f32 {
        let wavelength = f64::from(self.wavelength.max(1.0));
        let fx = x as f64 / wavelength;
        let fz = z as f64 / wavelength;
        let (cx, cz) = (fx.floor(), fz.floor());
        let tx = smoothstep((fx - cx) as f32);
        let tz = smoothstep((fz - cz) as f32);
        // Saturating float-to-int casts; the lattice repeats far past any
        // reachable coordinate.
        let (ix, iz) = (cx as i32, cz as i32);
        let c00 = lattice_unit(self.seed, ix, iz);
        let c10 = lattice_unit(self.seed, ix.wrapping_add(1), iz);
        let c01 = lattice_unit(self.seed, ix, iz.wrapping_add(1));
        let c11 = lattice_unit(self.seed, ix.wrapping_add(1), iz.wrapping_add(1));
        lerp(lerp(c00, c10, tx), lerp(c01, c11, tx), tz)
    }

    /// Surface height at a sample point, before interpolation.
    fn sample_height(&self, x: i64, z: i64) -> f32 {
        self.base_height as f32 + (self.noise(x, z) * 2.0 - 1.0) * self.amplitude
    }

    /// Interpolated surface height for every column of the region, x fastest.
    pub fn surface_heights(&self, region: &GenerationRegion) -> Vec<i32> {
        let s = i64::from(region.spacing.max(1));
        let sx0 = i64::from(region.x_start).div_euclid(s) * s;
        let sz0 = i64::from(region.z_start).div_euclid(s) * s;
        let nx = ((i64::from(region.x_end) - 1 - sx0) / s + 2) as usize;
        let nz = ((i64::from(region.z_end) - 1 - sz0) / s + 2) as usize;

        let mut samples = Vec::with_capacity(nx * nz);
        for j in 0..nz {
            for i in 0..nx {
                samples.push(self.sample_height(sx0 + i as i64 * s, sz0 + j as i64 * s));
            }
        }

        region
            .columns()
            .map(|(x, z)| {
                let dx = i64::from(x) - sx0;
                let dz = i64::from(z) - sz0;
                let (i, j) = ((dx / s) as usize, (dz / s) as usize);
                let tx = (dx % s) as f32 / s as f32;
                let tz = (dz % s) as f32 / s as f32;
                let at = |i: usize, j: usize| samples[i + j * nx];
                let h = lerp(
                    lerp(at(i, j), at(i + 1, j), tx),
                    lerp(at(i, j + 1), at(i + 1, j + 1), tx),
                    tz,
                );
                h.round() as i32
            })
            .collect()
    }
}

impl TerrainGenerator for HeightmapGenerator {
    fn generate(
        &self,
        region: &GenerationRegion,
        world: &dyn WorldModifier,
    ) -> Result<(), GenerationError> {
        let height = region.height.min(world.height());
        if height <= 0 {
            return Err(GenerationError::failed(region, "world has no height"));
        }
        let heights = self.surface_heights(region);
        for ((x, z), surface) in region.columns().zip(heights) {
            let top = surface.clamp(0, height - 1);
            let dirt_start = (top - 2).max(1);
            world.fill_column(x, z, 0..1, BlockType::Bedrock);
            world.fill_column(x, z, 1..dirt_start, BlockType::Stone);
            world.fill_column(x, z, dirt_start..top, BlockType::Dirt);
            if top > 0 {
                let cap = if top >= self.sea_level {
                    BlockType::Grass
                } else {
                    BlockType::Sand
                };
                world.fill_column(x, z, top..top + 1, cap);
            }
            let water_end = self.sea_level.saturating_add(1).clamp(top + 1, height);
            world.fill_column(x, z, top + 1..water_end, BlockType::Water);
            world.fill_column(x, z, water_end..height, BlockType::Air);
        }
        Ok(())
    }
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

fn smoothstep(t: f32) -> f32 {
    t * t * (3.0 - 2.0 * t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::VoxelCoord;
    use crate::world::{VoxelGrid, VoxelWorld};
    use std::sync::Mutex;

    /// Records every `set_block` call instead of storing anything.
    struct RecordingModifier {
        height: i32,
        calls: Mutex<Vec<(VoxelCoord, BlockType)>>,
    }

    impl RecordingModifier {
        fn new(height: i32) -> Self {
            Self {
                height,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<(VoxelCoord, BlockType)> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl WorldModifier for RecordingModifier {
        fn height(&self) -> i32 {
            self.height
        }

        fn set_block(&self, coord: VoxelCoord, block: BlockType) {
            self.calls.lock().unwrap().push((coord, block));
        }
    }

    fn region(
        x_start: i32,
        z_start: i32,
        x_end: i32,
        z_end: i32,
        spacing: u32,
        height: i32,
    ) -> GenerationRegion {
        GenerationRegion {
            x_start,
            z_start,
            x_end,
            z_end,
            spacing,
            height,
        }
    }

    fn heightmap() -> HeightmapGenerator {
        HeightmapGenerator {
            seed: 7,
            base_height: 10,
            amplitude: 6.0,
            wavelength: 12.0,
            sea_level: 8,
        }
    }

    #[test]
    fn validate_rejects_bad_regions() {
        assert!(region(0, 0, 16, 16, 1, 1).validate().is_ok());
        for bad in [
            region(16, 0, 16, 16, 1, 1),
            region(0, 5, 16, 4, 1, 1),
            region(0, 0, 16, 16, 0, 1),
            region(0, 0, 16, 16, 1, 0),
        ] {
            assert!(matches!(
                bad.validate(),
                Err(ScheduleError::InvalidRegion { .. })
            ));
        }
    }

    #[test]
    fn region_for_chunk() {
        let r = GenerationRegion::for_chunk(ChunkCoord::new(-1, 2), 16, 32, 4).unwrap();
        assert_eq!(r, region(-16, 32, 0, 48, 4, 32));
        assert_eq!((r.width(), r.depth()), (16, 16));
        assert!(GenerationRegion::for_chunk(ChunkCoord::new(i32::MAX, 0), 16, 32, 1).is_err());
        assert!(GenerationRegion::for_chunk(ChunkCoord::new(0, 0), 16, 32, 0).is_err());
    }

    #[test]
    fn flat_single_layer_writes_each_column_once() {
        let recorder = RecordingModifier::new(1);
        let r = region(0, 0, 16, 16, 1, 1);
        FlatGenerator::new(vec![(BlockType::Stone, 1)])
            .generate(&r, &recorder)
            .unwrap();

        let calls = recorder.calls();
        assert_eq!(calls.len(), 256);
        for (coord, block) in &calls {
            assert!((0..16).contains(&coord.x));
            assert!((0..16).contains(&coord.z));
            assert_eq!(coord.y, 0);
            assert_eq!(*block, BlockType::Stone);
        }
    }

    #[test]
    fn flat_layers_are_clipped_to_region_height() {
        let recorder = RecordingModifier::new(64);
        let r = region(3, -2, 5, 0, 1, 3);
        FlatGenerator::default().generate(&r, &recorder).unwrap();
        // 2 × 2 columns, stack of 5 clipped to 3.
        assert_eq!(recorder.calls().len(), 12);
        assert!(recorder.calls().iter().all(|(c, _)| c.y < 3));
    }

    #[test]
    fn flat_generation_is_idempotent() {
        let r = region(-4, -4, 12, 12, 1, 8);
        let once = VoxelWorld::new(8, 8);
        let twice = VoxelWorld::new(8, 8);
        let generator = FlatGenerator::default();
        generator.generate(&r, &once).unwrap();
        generator.generate(&r, &twice).unwrap();
        generator.generate(&r, &twice).unwrap();
        assert_eq!(once.snapshot(), twice.snapshot());

        let top = generator.surface_height();
        assert_eq!(top, 5);
        assert_eq!(once.get(VoxelCoord::new(-4, top - 1, 11)), BlockType::Grass);
        assert_eq!(once.get(VoxelCoord::new(0, top, 0)), BlockType::Air);
    }

    #[test]
    fn heightmap_writes_every_voxel_of_the_region() {
        let recorder = RecordingModifier::new(16);
        let r = region(0, 0, 4, 3, 2, 16);
        heightmap().generate(&r, &recorder).unwrap();

        let mut coords: Vec<_> = recorder.calls().into_iter().map(|(c, _)| c).collect();
        assert_eq!(coords.len(), 4 * 3 * 16);
        coords.sort();
        coords.dedup();
        assert_eq!(coords.len(), 4 * 3 * 16);
    }

    #[test]
    fn heightmap_generation_is_idempotent() {
        let r = region(0, 0, 16, 16, 4, 24);
        let once = VoxelWorld::new(16, 24);
        let twice = VoxelWorld::new(16, 24);
        let generator = heightmap();
        generator.generate(&r, &once).unwrap();
        generator.generate(&r, &twice).unwrap();
        generator.generate(&r, &twice).unwrap();
        assert_eq!(once.snapshot(), twice.snapshot());
    }

    #[test]
    fn heightmap_columns_are_layered() {
        let world = VoxelWorld::new(16, 24);
        let generator = heightmap();
        let r = region(0, 0, 16, 16, 1, 24);
        generator.generate(&r, &world).unwrap();
        for (x, z) in r.columns() {
            assert_eq!(world.get(VoxelCoord::new(x, 0, z)), BlockType::Bedrock);
            assert_eq!(world.get(VoxelCoord::new(x, 23, z)), BlockType::Air);
            // Nothing solid floats above non-solid.
            let mut seen_open = false;
            for y in 0..24 {
                let solid = world.get(VoxelCoord::new(x, y, z)).is_solid();
                assert!(!(seen_open && solid), "floating block at ({x}, {y}, {z})");
                seen_open |= !solid;
            }
        }
    }

    #[test]
    fn coarse_spacing_agrees_at_sample_points() {
        let generator = heightmap();
        let fine = generator.surface_heights(&region(0, 0, 9, 9, 1, 32));
        let coarse = generator.surface_heights(&region(0, 0, 9, 9, 4, 32));
        for z in [0usize, 4, 8] {
            for x in [0usize, 4, 8] {
                assert_eq!(fine[x + z * 9], coarse[x + z * 9], "sample ({x}, {z})");
            }
        }
    }

    #[test]
    fn adjacent_regions_share_samples() {
        let generator = heightmap();
        let whole = generator.surface_heights(&region(0, 0, 16, 1, 4, 32));
        let left = generator.surface_heights(&region(0, 0, 8, 1, 4, 32));
        let right = generator.surface_heights(&region(8, 0, 16, 1, 4, 32));
        let joined: Vec<_> = left.into_iter().chain(right).collect();
        assert_eq!(whole, joined);
    }

    #[test]
    fn concurrent_disjoint_regions_match_sequential() {
        let generator = heightmap();
        let a = region(0, 0, 16, 16, 2, 24);
        let b = region(16, 0, 32, 16, 2, 24);

        let a_then_b = VoxelWorld::new(16, 24);
        generator.generate(&a, &a_then_b).unwrap();
        generator.generate(&b, &a_then_b).unwrap();

        let b_then_a = VoxelWorld::new(16, 24);
        generator.generate(&b, &b_then_a).unwrap();
        generator.generate(&a, &b_then_a).unwrap();

        let concurrent = VoxelWorld::new(16, 24);
        std::thread::scope(|s| {
            for r in [&a, &b] {
                let (generator, world) = (&generator, &concurrent);
                s.spawn(move || generator.generate(r, world).unwrap());
            }
        });

        assert_eq!(a_then_b.snapshot(), b_then_a.snapshot());
        assert_eq!(a_then_b.snapshot(), concurrent.snapshot());
    }

    struct Panicky;

    impl TerrainGenerator for Panicky {
        fn generate(
            &self,
            _: &GenerationRegion,
            _: &dyn WorldModifier,
        ) -> Result<(), GenerationError> {
            panic!("boom");
        }
    }

    #[test]
    fn panics_become_errors() {
        let recorder = RecordingModifier::new(4);
        let result = run_generator(&Panicky, &region(0, 0, 1, 1, 1, 4), &recorder);
        assert_eq!(
            result,
            Err(GenerationError::Panicked {
                reason: "boom".to_string()
            })
        );
    }

    #[test]
    fn generate_region_rejects_invalid_input() {
        let recorder = RecordingModifier::new(4);
        let empty = region(0, 0, 0, 1, 1, 4);
        let result = generate_region(&FlatGenerator::default(), &empty, &recorder);
        assert!(matches!(result, Err(ScheduleError::InvalidRegion { .. })));
        assert!(recorder.calls().is_empty());

        let result = generate_region(&Panicky, &region(0, 0, 1, 1, 1, 4), &recorder);
        assert!(matches!(
            result,
            Err(ScheduleError::Generation(GenerationError::Panicked { .. }))
        ));
    }

    #[test]
    fn generate_chunk_marks_generated() {
        let world = VoxelWorld::new(8, 8);
        let coord = ChunkCoord::new(1, -1);
        generate_chunk(&world, &FlatGenerator::default(), coord, 1).unwrap();
        assert!(world.is_generated(coord));
        let grass = world.block_at(VoxelCoord::new(8, 4, -8));
        assert_eq!(grass, Some(BlockType::Grass));
        assert!(!world.is_generated(ChunkCoord::new(0, 0)));

        assert!(generate_chunk(&world, &Panicky, ChunkCoord::new(0, 0), 1).is_err());
        assert!(!world.is_generated(ChunkCoord::new(0, 0)));
    }
}
