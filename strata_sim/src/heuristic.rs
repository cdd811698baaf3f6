// Cost-to-goal estimators for the A* search.
//
// A heuristic is a pure function of two coordinates. `Heuristic` is the narrow
// interface the pathfinder consumes; the closed variants below cover the
// common movement models, and any `Fn(VoxelCoord, VoxelCoord) -> f32` closure
// plugs in through the same trait.
//
// Admissibility (never overestimating the true remaining cost) is what makes
// A* return a shortest route. Which variant is admissible depends on the
// movement model and cost model in use:
//
// | heuristic           | admissible when                                  |
// |---------------------|--------------------------------------------------|
// | `Zero`              | always (degrades A* to Dijkstra)                 |
// | `ManhattanWeighted` | orthogonal moves, every step >= `minimum_cost`   |
// | `ChebyshevWeighted` | any neighborhood, every step >= `minimum_cost`   |
// | `EuclideanSquared`  | only if edge costs are themselves squared        |
//
// `EuclideanSquared` is kept for callers that want *a* path quickly: it
// grows much faster than linear edge costs and makes the search greedy.
//
// See also: `cost.rs` for `minimum_step_cost()`, which the weighted variants
// must be built from, `pathfinding.rs` for the consumer.

use crate::cost::CostModel;
use crate::types::VoxelCoord;
use serde::{Deserialize, Serialize};

/// Estimate of the remaining cost from `from` to `to`. Must be non-negative.
pub trait Heuristic: Send + Sync {
    fn cost_estimate(&self, from: VoxelCoord, to: VoxelCoord) -> f32;
}

impl<F> Heuristic for F
where
    F: Fn(VoxelCoord, VoxelCoord) -> f32 + Send + Sync,
{
    fn cost_estimate(&self, from: VoxelCoord, to: VoxelCoord) -> f32 {
        self(from, to)
    }
}

/// Always zero.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Zero;

impl Heuristic for Zero {
    fn cost_estimate(&self, _from: VoxelCoord, _to: VoxelCoord) -> f32 {
        0.0
    }
}

/// `(tx-x)² + (ty-y)² + (tz-z)²`, no square root.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct EuclideanSquared;

impl Heuristic for EuclideanSquared {
    fn cost_estimate(&self, from: VoxelCoord, to: VoxelCoord) -> f32 {
        let dx = to.x.abs_diff(from.x) as f32;
        let dy = to.y.abs_diff(from.y) as f32;
        let dz = to.z.abs_diff(from.z) as f32;
        dx * dx + dy * dy + dz * dz
    }
}

/// `minimum_cost * (|dx| + |dy| + |dz|)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ManhattanWeighted {
    /// Cheapest single-step edge cost in the cost model.
    pub minimum_cost: f32,
}

impl Heuristic for ManhattanWeighted {
    fn cost_estimate(&self, from: VoxelCoord, to: VoxelCoord) -> f32 {
        self.minimum_cost * from.manhattan_distance(to) as f32
    }
}

/// `minimum_cost * max(|dx|, |dy|, |dz|)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ChebyshevWeighted {
    pub minimum_cost: f32,
}

impl Heuristic for ChebyshevWeighted {
    fn cost_estimate(&self, from: VoxelCoord, to: VoxelCoord) -> f32 {
        self.minimum_cost * from.chebyshev_distance(to) as f32
    }
}

// ---------------------------------------------------------------------------
// Config-facing selection
// ---------------------------------------------------------------------------

/// Which closed heuristic variant to use, as named in config files.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum HeuristicKind {
    Zero,
    EuclideanSquared,
    #[default]
    ManhattanWeighted,
    ChebyshevWeighted,
}

impl HeuristicKind {
    /// Build the heuristic, scaling the weighted variants by the cost model's
    /// cheapest step so they stay admissible against it.
    pub fn build(self, cost: &dyn CostModel) -> Box<dyn Heuristic> {
        let minimum_cost = cost.minimum_step_cost();
        match self {
            HeuristicKind::Zero => Box::new(Zero),
            HeuristicKind::EuclideanSquared => Box::new(EuclideanSquared),
            HeuristicKind::ManhattanWeighted => Box::new(ManhattanWeighted { minimum_cost }),
            HeuristicKind::ChebyshevWeighted => Box::new(ChebyshevWeighted { minimum_cost }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost::{UniformCost, WeightedCost};

    const ORIGIN: VoxelCoord = VoxelCoord::new(0, 0, 0);

    #[test]
    fn euclidean_squared_matches_formula() {
        let h = EuclideanSquared;
        assert_eq!(h.cost_estimate(ORIGIN, VoxelCoord::new(1, 2, 3)), 14.0);
        let (west, east) = (VoxelCoord::new(-1, 0, 0), VoxelCoord::new(2, 0, 0));
        assert_eq!(h.cost_estimate(west, east), 9.0);
    }

    #[test]
    fn manhattan_weighted_scales_by_minimum_cost() {
        let h = ManhattanWeighted { minimum_cost: 2.5 };
        assert_eq!(h.cost_estimate(ORIGIN, VoxelCoord::new(1, -2, 3)), 15.0);
        let unit = ManhattanWeighted { minimum_cost: 1.0 };
        assert_eq!(unit.cost_estimate(ORIGIN, VoxelCoord::new(10, 0, 0)), 10.0);
    }

    #[test]
    fn chebyshev_weighted_uses_longest_axis() {
        let h = ChebyshevWeighted { minimum_cost: 1.0 };
        assert_eq!(h.cost_estimate(ORIGIN, VoxelCoord::new(3, -7, 2)), 7.0);
    }

    #[test]
    fn estimates_are_zero_at_goal() {
        let goal = VoxelCoord::new(4, 5, 6);
        let heuristics: [&dyn Heuristic; 4] = [
            &Zero,
            &EuclideanSquared,
            &ManhattanWeighted { minimum_cost: 1.0 },
            &ChebyshevWeighted { minimum_cost: 1.0 },
        ];
        for h in heuristics {
            assert_eq!(h.cost_estimate(goal, goal), 0.0);
        }
    }

    #[test]
    fn closures_are_heuristics() {
        let doubled = |a: VoxelCoord, b: VoxelCoord| 2.0 * a.manhattan_distance(b) as f32;
        assert_eq!(doubled.cost_estimate(ORIGIN, VoxelCoord::new(1, 1, 0)), 4.0);
    }

    #[test]
    fn kind_builds_from_minimum_step_cost() {
        let weighted = WeightedCost {
            straight: 2.0,
            planar_diagonal: 3.0,
            corner_diagonal: 4.0,
            ascend_penalty: 1.0,
        };
        let h = HeuristicKind::ManhattanWeighted.build(&weighted);
        assert_eq!(h.cost_estimate(ORIGIN, VoxelCoord::new(2, 0, 1)), 6.0);

        let h = HeuristicKind::Zero.build(&UniformCost(5.0));
        assert_eq!(h.cost_estimate(ORIGIN, VoxelCoord::new(9, 9, 9)), 0.0);
    }
}
