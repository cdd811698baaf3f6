// Data-driven configuration.
//
// Every tunable lives in `StrataConfig`, loaded from JSON at startup. Library
// code reads these values instead of hard-coding them, so world dimensions,
// movement rules, and scheduler sizing can be changed without recompiling.
//
// Groups:
// - `WorldConfig`: chunk footprint, world height, sea level.
// - `MovementConfig`: neighborhood, support requirement, search budget.
// - `cost` / `heuristic`: which `CostModel` and `Heuristic` the pathfinder
//   uses (see `cost.rs`, `heuristic.rs`).
// - `SchedulerConfig`: worker pool size, retry budget, re-ranking threshold,
//   sample spacing.
// - `TerrainProfile`: parameters for `HeightmapGenerator`, with named
//   presets (`TerrainProfile::rolling()`, `::plains()`, `::highlands()`).
//
// Every struct implements `Default` and uses `#[serde(default)]`, so a config
// file only needs the fields it overrides. `validate()` catches values that
// parse but cannot work (zero chunk size, zero workers, and so on) before
// they reach `VoxelWorld::new` or `ChunkScheduler::new`.
//
// See also: `bin/stream_demo.rs` which loads a config from disk,
// `scheduler.rs` for the consumer of `SchedulerConfig`.

use crate::cost::CostModelKind;
use crate::error::ConfigError;
use crate::heuristic::HeuristicKind;
use crate::movement::{MovementModel, Neighborhood};
use serde::{Deserialize, Serialize};
use std::path::Path;

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Chunk footprint in voxels along x and z.
    pub chunk_size: i32,
    /// Exclusive upper bound on y.
    pub height: i32,
    /// Highest y filled with water by the heightmap generator.
    pub sea_level: i32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            chunk_size: 16,
            height: 64,
            sea_level: 20,
        }
    }
}

/// How agents move. `Pathfinder` and `MovementModel` have no defaults of
/// their own; the only default movement is this one, a walking agent on the
/// planar-diagonal neighborhood.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MovementConfig {
    pub neighborhood: Neighborhood,
    /// Walking agents need a solid block underfoot.
    pub requires_support: bool,
    /// Give up with `BudgetExceeded` after this many node expansions.
    /// `None` means unbounded.
    pub max_nodes_expanded: Option<usize>,
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            neighborhood: Neighborhood::PlanarDiagonal,
            requires_support: true,
            max_nodes_expanded: None,
        }
    }
}

impl MovementConfig {
    pub fn model(&self) -> MovementModel {
        MovementModel::new(self.neighborhood, self.requires_support)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Number of generation worker threads.
    pub worker_count: usize,
    /// Attempts per chunk before it is marked permanently failed.
    pub max_attempts: u32,
    /// How far (in chunks) the reference point must move before the queue is
    /// re-ranked.
    pub reprioritize_distance: u32,
    /// Terrain sample spacing passed to generators.
    pub spacing: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            worker_count: 4,
            max_attempts: 3,
            reprioritize_distance: 2,
            spacing: 4,
        }
    }
}

/// Heightmap terrain parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainProfile {
    pub seed: u64,
    /// Mean surface height.
    pub base_height: i32,
    /// Maximum deviation from `base_height`, in voxels.
    pub amplitude: f32,
    /// Width of one noise cell, in voxels. Larger is smoother.
    pub wavelength: f32,
}

impl TerrainProfile {
    /// Gentle hills around sea level.
    pub fn rolling() -> Self {
        Self {
            seed: 0x5EED,
            base_height: 24,
            amplitude: 8.0,
            wavelength: 32.0,
        }
    }

    /// Nearly level ground just above sea level.
    pub fn plains() -> Self {
        Self {
            seed: 0x5EED,
            base_height: 22,
            amplitude: 2.0,
            wavelength: 64.0,
        }
    }

    /// Tall, steep terrain.
    pub fn highlands() -> Self {
        Self {
            seed: 0x5EED,
            base_height: 36,
            amplitude: 20.0,
            wavelength: 24.0,
        }
    }
}

impl Default for TerrainProfile {
    fn default() -> Self {
        Self::rolling()
    }
}

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level configuration. Loaded from JSON, never mutated at runtime.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrataConfig {
    pub world: WorldConfig,
    pub movement: MovementConfig,
    pub cost: CostModelKind,
    pub heuristic: HeuristicKind,
    pub scheduler: SchedulerConfig,
    pub terrain: TerrainProfile,
}

impl StrataConfig {
    /// Parse and validate a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse, and validate a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let world = &self.world;
        if world.chunk_size <= 0 {
            return Err(invalid(format!(
                "world.chunk_size must be positive, got {}",
                world.chunk_size
            )));
        }
        if world.height <= 0 {
            return Err(invalid(format!(
                "world.height must be positive, got {}",
                world.height
            )));
        }
        if !(0..world.height).contains(&world.sea_level) {
            return Err(invalid(format!(
                "world.sea_level {} outside [0, {})",
                world.sea_level, world.height
            )));
        }

        let scheduler = &self.scheduler;
        if scheduler.worker_count == 0 {
            return Err(invalid("scheduler.worker_count must be at least 1".into()));
        }
        if scheduler.max_attempts == 0 {
            return Err(invalid("scheduler.max_attempts must be at least 1".into()));
        }
        if scheduler.spacing == 0 || i32::try_from(scheduler.spacing).is_err() {
            return Err(invalid(format!(
                "scheduler.spacing {} out of range",
                scheduler.spacing
            )));
        }

        if self.movement.max_nodes_expanded == Some(0) {
            return Err(invalid("movement.max_nodes_expanded must be at least 1".into()));
        }

        let costs = match &self.cost {
            CostModelKind::Uniform(c) => vec![c.0],
            CostModelKind::Weighted(c) => vec![
                c.straight,
                c.planar_diagonal,
                c.corner_diagonal,
                c.ascend_penalty,
            ],
        };
        if costs.iter().any(|c| !c.is_finite() || *c < 0.0) {
            return Err(invalid("step costs must be finite and non-negative".into()));
        }

        let terrain = &self.terrain;
        if !(terrain.wavelength.is_finite() && terrain.wavelength >= 1.0) {
            return Err(invalid(format!(
                "terrain.wavelength {} must be >= 1",
                terrain.wavelength
            )));
        }
        if !(terrain.amplitude.is_finite() && terrain.amplitude >= 0.0) {
            return Err(invalid(format!(
                "terrain.amplitude {} must be >= 0",
                terrain.amplitude
            )));
        }
        Ok(())
    }
}

fn invalid(message: String) -> ConfigError {
    ConfigError::Invalid(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost::{UniformCost, WeightedCost};

    #[test]
    fn default_config_is_valid_and_roundtrips() {
        let config = StrataConfig::default();
        config.validate().unwrap();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let restored = StrataConfig::from_json_str(&json).unwrap();
        assert_eq!(config, restored);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let json = r#"{
            "world": { "chunk_size": 8 },
            "movement": { "neighborhood": "FullDiagonal", "requires_support": true },
            "cost": { "Weighted": { "straight": 1.0, "planar_diagonal": 1.5,
                                    "corner_diagonal": 2.0, "ascend_penalty": 0.0 } },
            "heuristic": "ChebyshevWeighted",
            "scheduler": { "worker_count": 1 }
        }"#;
        let config = StrataConfig::from_json_str(json).unwrap();
        assert_eq!(config.world.chunk_size, 8);
        assert_eq!(config.world.height, WorldConfig::default().height);
        assert_eq!(config.movement.neighborhood, Neighborhood::FullDiagonal);
        assert!(config.movement.requires_support);
        assert_eq!(config.movement.max_nodes_expanded, None);
        assert_eq!(
            config.cost,
            CostModelKind::Weighted(WeightedCost {
                straight: 1.0,
                planar_diagonal: 1.5,
                corner_diagonal: 2.0,
                ascend_penalty: 0.0,
            })
        );
        assert_eq!(config.heuristic, HeuristicKind::ChebyshevWeighted);
        assert_eq!(config.scheduler.worker_count, 1);
        assert_eq!(config.scheduler.max_attempts, 3);
        assert_eq!(config.terrain, TerrainProfile::rolling());
    }

    #[test]
    fn default_movement_is_a_walker() {
        let movement = StrataConfig::default().movement;
        assert_eq!(
            movement.model(),
            MovementModel::new(Neighborhood::PlanarDiagonal, true)
        );
        assert_eq!(movement.max_nodes_expanded, None);
    }

    #[test]
    fn empty_object_is_default() {
        let config = StrataConfig::from_json_str("{}").unwrap();
        assert_eq!(config, StrataConfig::default());
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        assert!(matches!(
            StrataConfig::from_json_str("{ \"world\": 3 }"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn validation_rejects_unusable_values() {
        let cases: [fn(&mut StrataConfig); 10] = [
            |c| c.world.chunk_size = 0,
            |c| c.world.height = -1,
            |c| c.world.sea_level = c.world.height,
            |c| c.scheduler.worker_count = 0,
            |c| c.scheduler.max_attempts = 0,
            |c| c.scheduler.spacing = 0,
            |c| c.movement.max_nodes_expanded = Some(0),
            |c| c.cost = CostModelKind::Uniform(UniformCost(-1.0)),
            |c| c.terrain.wavelength = 0.5,
            |c| c.terrain.amplitude = f32::NAN,
        ];
        for (i, mutate) in cases.iter().enumerate() {
            let mut config = StrataConfig::default();
            mutate(&mut config);
            assert!(
                matches!(config.validate(), Err(ConfigError::Invalid(_))),
                "case {i} should be rejected"
            );
        }
    }

    #[test]
    fn load_reports_missing_file() {
        assert!(matches!(
            StrataConfig::load("/nonexistent/strata.json"),
            Err(ConfigError::Io(_))
        ));
    }

    #[test]
    fn load_reads_file() {
        let path = std::env::temp_dir().join(format!("strata_config_{}.json", std::process::id()));
        std::fs::write(&path, r#"{ "scheduler": { "worker_count": 2 } }"#).unwrap();
        let config = StrataConfig::load(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(config.scheduler.worker_count, 2);
    }

    #[test]
    fn presets_differ() {
        assert!(TerrainProfile::highlands().amplitude > TerrainProfile::rolling().amplitude);
        assert!(TerrainProfile::plains().amplitude < TerrainProfile::rolling().amplitude);
    }
}
