// Per-edge traversal cost for the A* search.
//
// The pathfinder calls `step_cost(from, to)` for every neighbor it relaxes;
// `from` and `to` are always adjacent under the configured movement model.
// `minimum_step_cost()` is the floor the weighted heuristics scale by, so a
// cost model must never return a step cheaper than it.

use crate::types::VoxelCoord;
use serde::{Deserialize, Serialize};

pub trait CostModel: Send + Sync {
    /// Cost of moving from `from` to the adjacent voxel `to`.
    fn step_cost(&self, from: VoxelCoord, to: VoxelCoord) -> f32;

    /// The cheapest value `step_cost` can return.
    fn minimum_step_cost(&self) -> f32;
}

/// Every move costs the same.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct UniformCost(pub f32);

impl Default for UniformCost {
    fn default() -> Self {
        Self(1.0)
    }
}

impl CostModel for UniformCost {
    fn step_cost(&self, _from: VoxelCoord, _to: VoxelCoord) -> f32 {
        self.0
    }

    fn minimum_step_cost(&self) -> f32 {
        self.0
    }
}

/// Cost by move shape: how many axes change, plus a flat penalty for
/// climbing.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct WeightedCost {
    /// One axis changes.
    pub straight: f32,
    /// Two axes change (edge diagonal).
    pub planar_diagonal: f32,
    /// All three axes change (corner diagonal).
    pub corner_diagonal: f32,
    /// Added when the move goes up one block.
    pub ascend_penalty: f32,
}

impl Default for WeightedCost {
    fn default() -> Self {
        Self {
            straight: 1.0,
            planar_diagonal: std::f32::consts::SQRT_2,
            corner_diagonal: 1.732_050_8,
            ascend_penalty: 0.5,
        }
    }
}

impl CostModel for WeightedCost {
    fn step_cost(&self, from: VoxelCoord, to: VoxelCoord) -> f32 {
        let axes = u8::from(from.x != to.x) + u8::from(from.y != to.y) + u8::from(from.z != to.z);
        let base = match axes {
            0 | 1 => self.straight,
            2 => self.planar_diagonal,
            _ => self.corner_diagonal,
        };
        if to.y > from.y {
            base + self.ascend_penalty
        } else {
            base
        }
    }

    fn minimum_step_cost(&self) -> f32 {
        self.straight
            .min(self.planar_diagonal)
            .min(self.corner_diagonal)
    }
}

/// Which cost model to use, as named in config files.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum CostModelKind {
    Uniform(UniformCost),
    Weighted(WeightedCost),
}

impl Default for CostModelKind {
    fn default() -> Self {
        CostModelKind::Uniform(UniformCost::default())
    }
}

impl CostModelKind {
    pub fn build(self) -> Box<dyn CostModel> {
        match self {
            CostModelKind::Uniform(cost) => Box::new(cost),
            CostModelKind::Weighted(cost) => Box::new(cost),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORIGIN: VoxelCoord = VoxelCoord::new(0, 0, 0);

    #[test]
    fn uniform_is_constant() {
        let cost = UniformCost(3.0);
        assert_eq!(cost.step_cost(ORIGIN, VoxelCoord::new(1, 0, 0)), 3.0);
        assert_eq!(cost.step_cost(ORIGIN, VoxelCoord::new(1, 1, 1)), 3.0);
        assert_eq!(cost.minimum_step_cost(), 3.0);
    }

    #[test]
    fn weighted_depends_on_move_shape() {
        let cost = WeightedCost {
            straight: 1.0,
            planar_diagonal: 1.5,
            corner_diagonal: 2.0,
            ascend_penalty: 0.25,
        };
        assert_eq!(cost.step_cost(ORIGIN, VoxelCoord::new(0, 0, -1)), 1.0);
        assert_eq!(cost.step_cost(ORIGIN, VoxelCoord::new(1, 0, 1)), 1.5);
        assert_eq!(cost.step_cost(ORIGIN, VoxelCoord::new(1, -1, 1)), 2.0);
        // Climbing adds the penalty, descending does not.
        assert_eq!(cost.step_cost(ORIGIN, VoxelCoord::new(0, 1, 0)), 1.25);
        assert_eq!(cost.step_cost(ORIGIN, VoxelCoord::new(0, -1, 0)), 1.0);
    }

    #[test]
    fn weighted_minimum_is_cheapest_shape() {
        let cost = WeightedCost {
            straight: 2.0,
            planar_diagonal: 1.5,
            corner_diagonal: 3.0,
            ascend_penalty: 0.0,
        };
        assert_eq!(cost.minimum_step_cost(), 1.5);
    }

    #[test]
    fn kind_deserializes_from_json() {
        let kind: CostModelKind = serde_json::from_str(r#"{"Uniform": 2.0}"#).unwrap();
        assert_eq!(kind, CostModelKind::Uniform(UniformCost(2.0)));
        assert_eq!(kind.build().minimum_step_cost(), 2.0);
    }
}
