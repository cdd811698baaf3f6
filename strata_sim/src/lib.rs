// strata_sim: voxel navigation and terrain streaming core.
//
// This crate finds routes for agents through a 3D block world and streams
// terrain into that world on demand, nearest chunks first, from a pool of
// worker threads. It has no rendering or windowing dependencies and can be
// tested, benchmarked, and run headless.
//
// Module overview:
// - `types.rs`:       VoxelCoord, ChunkCoord, BlockType, Priority.
// - `world.rs`:       WorldModifier / VoxelGrid / ChunkedWorld capabilities and the
//                      sparse `VoxelWorld` store.
// - `heuristic.rs`:   Cost-to-goal estimators (Manhattan, Chebyshev, squared
//                      Euclidean, zero, closures).
// - `cost.rs`:        Per-edge traversal cost models.
// - `movement.rs`:    Neighborhoods and passability rules.
// - `pathfinding.rs`: A* search over the voxel grid, plus a rayon batch helper.
// - `ordering.rs`:    Nearest-first key for chunk coordinates.
// - `generator.rs`:   TerrainGenerator contract, GenerationRegion, flat and heightmap generators.
// - `scheduler.rs`:   ChunkScheduler: deduplicated, prioritized generation on a worker pool.
// - `config.rs`:      StrataConfig, every tunable, loaded from JSON.
// - `error.rs`:       GenerationError, ScheduleError, ConfigError.
// - `prng`:           Re-exported from `strata_prng`: xoshiro256++ PRNG and lattice hash.
//
// The pathfinder only reads the world and never triggers generation; chunks
// that are not generated yet read as impassable. The scheduler is the only
// component that marks chunks generated.

pub mod config;
pub mod cost;
pub mod error;
pub mod generator;
pub mod heuristic;
pub mod movement;
pub mod ordering;
pub mod pathfinding;
pub use strata_prng as prng;
pub mod scheduler;
pub mod types;
pub mod world;
