// Headless streaming demo.
//
// Simulates a player walking east across the world: at each stop the
// scheduler streams in every chunk within `--radius` of the player, nearest
// first, and the demo waits for them. At the end it walks a route from the
// first stop to the last over the generated terrain and prints the result
// along with scheduler statistics.
//
// Usage:
//   stream_demo [OPTIONS]
//     --config <PATH>       JSON config file (default: built-in defaults)
//     --generator <NAME>    "flat" or "heightmap" (default: heightmap)
//     --seed <N>            Override the terrain seed
//     --radius <N>          Streaming radius in chunks (default: 2)
//     --moves <N>           Number of times the player moves (default: 3)
//
// Set RUST_LOG=debug to see per-chunk and per-search detail.

use clap::Parser;
use log::{info, warn};
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use strata_sim::config::StrataConfig;
use strata_sim::generator::{FlatGenerator, HeightmapGenerator, TerrainGenerator};
use strata_sim::pathfinding::{Pathfinder, SearchOutcome};
use strata_sim::scheduler::ChunkScheduler;
use strata_sim::types::{BlockType, ChunkCoord, VoxelCoord};
use strata_sim::world::{VoxelGrid, VoxelWorld, WorldModifier};

/// Stream voxel terrain around a moving player and pathfind across it.
#[derive(Parser)]
#[command(name = "stream_demo")]
struct Args {
    /// JSON config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// World generator: "flat" or "heightmap"
    #[arg(short, long, default_value = "heightmap")]
    generator: String,

    /// Terrain seed (overrides the config file)
    #[arg(short, long)]
    seed: Option<u64>,

    /// Streaming radius in chunks
    #[arg(short, long, default_value_t = 2)]
    radius: u32,

    /// Number of times the player moves east by one radius
    #[arg(short, long, default_value_t = 3)]
    moves: u32,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("stream_demo: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<(), Box<dyn Error>> {
    let mut config = match &args.config {
        Some(path) => StrataConfig::load(path)?,
        None => StrataConfig::default(),
    };
    if let Some(seed) = args.seed {
        config.terrain.seed = seed;
    }
    config.validate()?;

    let world = Arc::new(VoxelWorld::new(config.world.chunk_size, config.world.height));
    let generator: Arc<dyn TerrainGenerator> = match args.generator.as_str() {
        "flat" => Arc::new(FlatGenerator::default()),
        "heightmap" => Arc::new(HeightmapGenerator::from_profile(
            &config.terrain,
            config.world.sea_level,
        )),
        other => return Err(format!("unknown generator {other:?}").into()),
    };
    let mut scheduler = ChunkScheduler::new(world.clone(), generator, &config.scheduler)?;

    let step = i32::try_from(args.radius.max(1))?;
    let mut stops = Vec::new();
    for m in 0..=args.moves {
        let center = ChunkCoord::new(i32::try_from(m)?.saturating_mul(step), 0);
        stops.push(center);
        scheduler.set_reference(center);
        let tickets = scheduler.request_radius(center, args.radius, None)?;
        let requested = tickets.len();
        let mut failed = 0;
        for ticket in tickets {
            let coord = ticket.coord();
            if let Err(e) = ticket.wait() {
                warn!("chunk {coord}: {e}");
                failed += 1;
            }
        }
        info!(
            "player at {center}: {requested} requested, {failed} failed, {} generated",
            world.generated_count()
        );
    }

    let (first, last) = match (stops.first(), stops.last()) {
        (Some(first), Some(last)) => (*first, *last),
        _ => return Err("no stops".into()),
    };
    let start = chunk_center_surface(&world, first, config.world.chunk_size);
    let goal = chunk_center_surface(&world, last, config.world.chunk_size);
    match (start, goal) {
        (Some(start), Some(goal)) => {
            let pathfinder = Pathfinder::from_config(&config.movement);
            let cost = config.cost.build();
            let heuristic = config.heuristic.build(cost.as_ref());
            match pathfinder.find_path(&*world, start, goal, heuristic.as_ref(), cost.as_ref()) {
                SearchOutcome::Found(route) => println!(
                    "route {start} -> {goal}: {} voxels, cost {:.2}, {} nodes expanded",
                    route.len(),
                    route.total_cost,
                    route.nodes_expanded
                ),
                SearchOutcome::NotFound { nodes_expanded } => {
                    println!("no route {start} -> {goal} ({nodes_expanded} nodes expanded)")
                }
                SearchOutcome::BudgetExceeded { nodes_expanded } => {
                    println!("search budget exhausted after {nodes_expanded} nodes")
                }
            }
        }
        _ => println!("no open surface at the route endpoints"),
    }

    let stats = scheduler.stats();
    println!(
        "scheduler: {} requests, {} deduped, {} generated, {} retries, {} failed, {} rekeys",
        stats.requests,
        stats.deduplicated,
        stats.generated,
        stats.retries,
        stats.permanent_failures,
        stats.rekeys
    );
    scheduler.shutdown();
    Ok(())
}

/// The open voxel resting on the highest solid block at the chunk's center
/// column.
fn chunk_center_surface(
    world: &VoxelWorld,
    chunk: ChunkCoord,
    chunk_size: i32,
) -> Option<VoxelCoord> {
    let (x0, z0) = chunk.voxel_origin(chunk_size)?;
    let (x, z) = (x0 + chunk_size / 2, z0 + chunk_size / 2);
    (1..world.height())
        .rev()
        .map(|y| VoxelCoord::new(x, y, z))
        .find(|c| {
            let below = c.offset(0, -1, 0);
            world.block_at(*c).is_some_and(|b| !b.is_solid())
                && world.block_at(below).is_some_and(BlockType::is_solid)
        })
}
