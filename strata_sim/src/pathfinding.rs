// A* pathfinding over the voxel grid.
//
// The graph is implicit: nodes are voxel coordinates, edges come from the
// movement model's neighborhood, and a neighbor is only relaxed if the
// passability predicate accepts it. Because the world is unbounded in x/z,
// per-node state lives in an arena (`Vec<PathNode>`) keyed through an
// `FxHashMap<VoxelCoord, u32>` instead of dense per-index vectors. The arena
// and the open set belong to one call and are dropped when it returns.
//
// The open set is a `BinaryHeap` with reversed ordering (min-heap on f).
// Improved nodes are pushed again rather than decreased in place; stale heap
// entries are skipped on pop by comparing against the arena's current g.
//
// Tie-breaking among equal f: larger g first, then the smaller coordinate in
// (x, y, z) order. The search is a pure function of its inputs.
//
// Outcomes are plain values (`SearchOutcome`): not finding a path and running
// out of expansion budget are normal results, not errors. The budget is the
// cooperative cancellation mechanism, checked before every expansion.
//
// Closed nodes are never reopened. That is exact for consistent heuristics
// (`Zero`, and the weighted variants built from `minimum_step_cost`); an
// inconsistent heuristic such as `EuclideanSquared` still returns a valid
// route, just not necessarily the cheapest.
//
// The pathfinder only reads the grid and never asks for terrain to be
// generated. Voxels in chunks that are not yet generated read as impassable.
//
// See also: `movement.rs` for neighbors and passability, `heuristic.rs` and
// `cost.rs` for the pluggable scoring, `world.rs` for `VoxelGrid`.

use crate::config::MovementConfig;
use crate::cost::CostModel;
use crate::heuristic::Heuristic;
use crate::movement::MovementModel;
use crate::types::VoxelCoord;
use crate::world::VoxelGrid;
use log::debug;
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// A successful search result.
#[derive(Clone, Debug, PartialEq)]
pub struct Route {
    /// Coordinates from start to goal, inclusive. Consecutive entries are
    /// adjacent under the movement model used for the search.
    pub coords: Vec<VoxelCoord>,
    /// Sum of step costs along the route.
    pub total_cost: f32,
    /// Nodes expanded to find it.
    pub nodes_expanded: usize,
}

impl Route {
    pub fn len(&self) -> usize {
        self.coords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }

    pub fn start(&self) -> Option<VoxelCoord> {
        self.coords.first().copied()
    }

    pub fn goal(&self) -> Option<VoxelCoord> {
        self.coords.last().copied()
    }
}

/// Result of one search.
#[derive(Clone, Debug, PartialEq)]
pub enum SearchOutcome {
    Found(Route),
    /// The open set emptied before reaching the goal, or the goal itself is
    /// impassable.
    NotFound {
        nodes_expanded: usize,
    },
    /// The expansion budget ran out first. Retrying with a larger budget may
    /// succeed.
    BudgetExceeded {
        nodes_expanded: usize,
    },
}

impl SearchOutcome {
    pub fn is_found(&self) -> bool {
        matches!(self, SearchOutcome::Found(_))
    }

    pub fn route(&self) -> Option<&Route> {
        match self {
            SearchOutcome::Found(route) => Some(route),
            _ => None,
        }
    }

    pub fn into_route(self) -> Option<Route> {
        match self {
            SearchOutcome::Found(route) => Some(route),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Search internals
// ---------------------------------------------------------------------------

/// Arena entry for one visited coordinate.
struct PathNode {
    coord: VoxelCoord,
    g: f32,
    h: f32,
    parent: Option<u32>,
    closed: bool,
}

/// Entry in the open set (min-heap via reversed ordering).
#[derive(Clone, Copy, Debug)]
struct OpenEntry {
    f: f32,
    g: f32,
    coord: VoxelCoord,
    node: u32,
}

impl PartialEq for OpenEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for OpenEntry {}

impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpenEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Greatest pops first: smallest f, then largest g, then smallest coord.
        other
            .f
            .total_cmp(&self.f)
            .then_with(|| self.g.total_cmp(&other.g))
            .then_with(|| other.coord.cmp(&self.coord))
    }
}

/// A* search configured with a movement model and an optional expansion
/// budget. Holds no per-search state, so one instance can serve many
/// concurrent searches.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pathfinder {
    pub movement: MovementModel,
    /// Stop with `BudgetExceeded` after this many expansions.
    pub max_nodes_expanded: Option<usize>,
}

impl Pathfinder {
    pub fn new(movement: MovementModel) -> Self {
        Self {
            movement,
            max_nodes_expanded: None,
        }
    }

    pub fn from_config(config: &MovementConfig) -> Self {
        Self {
            movement: config.model(),
            max_nodes_expanded: config.max_nodes_expanded,
        }
    }

    pub fn with_budget(mut self, max_nodes_expanded: usize) -> Self {
        self.max_nodes_expanded = Some(max_nodes_expanded);
        self
    }

    /// Find a route through `grid`, using the movement model's passability
    /// rules.
    pub fn find_path<G: VoxelGrid + ?Sized>(
        &self,
        grid: &G,
        start: VoxelCoord,
        goal: VoxelCoord,
        heuristic: &dyn Heuristic,
        cost: &dyn CostModel,
    ) -> SearchOutcome {
        let movement = self.movement;
        self.find_path_with(
            |coord| movement.is_passable(grid, coord),
            start,
            goal,
            heuristic,
            cost,
        )
    }

    /// Find a route using an arbitrary passability predicate.
    ///
    /// `start == goal` always yields a one-node route. The start voxel is not
    /// tested for passability (the agent already occupies it); an impassable
    /// goal yields `NotFound` without expanding anything.
    pub fn find_path_with<P>(
        &self,
        passable: P,
        start: VoxelCoord,
        goal: VoxelCoord,
        heuristic: &dyn Heuristic,
        cost: &dyn CostModel,
    ) -> SearchOutcome
    where
        P: Fn(VoxelCoord) -> bool,
    {
        if start == goal {
            return SearchOutcome::Found(Route {
                coords: vec![start],
                total_cost: 0.0,
                nodes_expanded: 0,
            });
        }
        if !passable(goal) {
            debug!("path {start} -> {goal}: goal impassable");
            return SearchOutcome::NotFound { nodes_expanded: 0 };
        }

        let mut nodes: Vec<PathNode> = Vec::new();
        let mut index: FxHashMap<VoxelCoord, u32> = FxHashMap::default();
        let mut open = BinaryHeap::new();

        let h_start = heuristic.cost_estimate(start, goal);
        nodes.push(PathNode {
            coord: start,
            g: 0.0,
            h: h_start,
            parent: None,
            closed: false,
        });
        index.insert(start, 0);
        open.push(OpenEntry {
            f: h_start,
            g: 0.0,
            coord: start,
            node: 0,
        });

        let mut expanded = 0usize;

        while let Some(current) = open.pop() {
            let ci = current.node as usize;
            if nodes[ci].closed || current.g > nodes[ci].g {
                continue;
            }

            if current.coord == goal {
                let route = reconstruct_route(&nodes, current.node, expanded);
                debug!(
                    "path {start} -> {goal}: {} steps, cost {}, {expanded} expanded",
                    route.len() - 1,
                    route.total_cost
                );
                return SearchOutcome::Found(route);
            }

            if self.max_nodes_expanded.is_some_and(|budget| expanded >= budget) {
                debug!("path {start} -> {goal}: budget spent, {expanded} expanded");
                return SearchOutcome::BudgetExceeded {
                    nodes_expanded: expanded,
                };
            }

            nodes[ci].closed = true;
            expanded += 1;

            for neighbor in self.movement.neighbors(current.coord) {
                if !passable(neighbor) {
                    continue;
                }
                let tentative_g = current.g + cost.step_cost(current.coord, neighbor);

                let ni = match index.get(&neighbor).copied() {
                    Some(ni) => {
                        let node = &mut nodes[ni as usize];
                        if node.closed || tentative_g >= node.g {
                            continue;
                        }
                        node.g = tentative_g;
                        node.parent = Some(current.node);
                        ni
                    }
                    None => {
                        let ni = nodes.len() as u32;
                        nodes.push(PathNode {
                            coord: neighbor,
                            g: tentative_g,
                            h: heuristic.cost_estimate(neighbor, goal),
                            parent: Some(current.node),
                            closed: false,
                        });
                        index.insert(neighbor, ni);
                        ni
                    }
                };

                let node = &nodes[ni as usize];
                open.push(OpenEntry {
                    f: node.g + node.h,
                    g: node.g,
                    coord: neighbor,
                    node: ni,
                });
            }
        }

        debug!("path {start} -> {goal}: no route, {expanded} expanded");
        SearchOutcome::NotFound {
            nodes_expanded: expanded,
        }
    }

    /// Run independent searches concurrently on rayon's pool. Results are in
    /// request order.
    pub fn find_paths_parallel<G: VoxelGrid + ?Sized>(
        &self,
        grid: &G,
        requests: &[(VoxelCoord, VoxelCoord)],
        heuristic: &dyn Heuristic,
        cost: &dyn CostModel,
    ) -> Vec<SearchOutcome> {
        requests
            .par_iter()
            .map(|&(start, goal)| self.find_path(grid, start, goal, heuristic, cost))
            .collect()
    }
}

/// Walk parent links from the goal back to the start.
fn reconstruct_route(nodes: &[PathNode], goal_node: u32, nodes_expanded: usize) -> Route {
    let total_cost = nodes[goal_node as usize].g;
    let mut coords = Vec::new();
    let mut current = Some(goal_node);
    while let Some(i) = current {
        let node = &nodes[i as usize];
        coords.push(node.coord);
        current = node.parent;
    }
    coords.reverse();
    Route {
        coords,
        total_cost,
        nodes_expanded,
    }
}
