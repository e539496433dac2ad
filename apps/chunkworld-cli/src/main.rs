use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::{Args, Parser, Subcommand};
use glam::Vec3;
use tracing_subscriber::EnvFilter;

use chunkworld_kernel::{Camera, Tree};
use chunkworld_render::{ChunkFilter, DebugPainter, LodRenderer};
use chunkworld_storage::TerrainGenerator;
use chunkworld_stream::{StreamConfig, World};

#[derive(Parser)]
#[command(name = "chunkworld-cli", about = "Headless driver for the chunk world")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version and the effective stream config
    Info {
        #[command(flatten)]
        stream: StreamArgs,
    },
    /// Run a single visibility query from the origin and summarize it
    Query {
        #[command(flatten)]
        stream: StreamArgs,
        /// Far plane distance in chunks
        #[arg(long, default_value = "30")]
        far: f32,
    },
    /// Walk the camera forward while streaming and rendering headlessly
    Run {
        #[command(flatten)]
        stream: StreamArgs,
        /// Number of frames to render
        #[arg(short, long, default_value = "120")]
        frames: u32,
        /// Camera speed in chunks per frame
        #[arg(long, default_value = "0.1")]
        speed: f32,
        /// Target frame time in milliseconds
        #[arg(long, default_value = "16")]
        frame_ms: u64,
        /// Terrain seed
        #[arg(short, long, default_value = "42")]
        seed: u64,
        /// Only draw chunks spanning this render-local Y layer
        #[arg(long, allow_hyphen_values = true)]
        layer: Option<i32>,
    },
}

/// Stream config sources: an optional JSON file, then flag overrides.
#[derive(Args)]
struct StreamArgs {
    /// JSON stream config file
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Octree depth
    #[arg(long)]
    root_level: Option<u32>,
    /// Streaming radius in chunks
    #[arg(long)]
    radius: Option<f32>,
    /// Keep distant nodes coarse once distance >= factor * size
    #[arg(long)]
    lod_factor: Option<f32>,
}

impl StreamArgs {
    fn resolve(&self) -> anyhow::Result<StreamConfig> {
        let mut config = match &self.config {
            Some(path) => StreamConfig::load(path)?,
            None => StreamConfig::default(),
        };
        if let Some(level) = self.root_level {
            config.root_level = level;
        }
        if let Some(radius) = self.radius {
            config.max_radius = radius;
        }
        if self.lod_factor.is_some() {
            config.lod_factor = self.lod_factor;
        }
        config.validate()?;
        Ok(config)
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::Info { stream } => {
            let config = stream.resolve()?;
            println!("chunkworld-cli v{}", env!("CARGO_PKG_VERSION"));
            for info in [
                chunkworld_kernel::crate_info(),
                chunkworld_storage::crate_info(),
                chunkworld_render::crate_info(),
                chunkworld_stream::crate_info(),
            ] {
                println!("  {info}");
            }
            println!(
                "tree: root_level={} (root spans {} chunks)",
                config.root_level,
                1u64 << config.root_level
            );
            println!(
                "stream: max_radius={} lod_factor={:?} poll={:?}",
                config.max_radius,
                config.lod_factor,
                config.poll_interval()
            );
        }
        Commands::Query { stream, far } => {
            let config = stream.resolve()?;
            let tree = Tree::new(config.root_level)?;
            let camera = Camera::default().with_far(far);

            let start = Instant::now();
            let nodes = tree.query(camera.position, &camera.frustum(), &config.node_query());
            let elapsed = start.elapsed();

            let mut per_level: BTreeMap<u32, usize> = BTreeMap::new();
            for node in &nodes {
                *per_level.entry(node.level).or_default() += 1;
            }
            println!("Query: {} nodes in {elapsed:?}", nodes.len());
            for (level, count) in per_level {
                println!("  level {level}: {count}");
            }
        }
        Commands::Run {
            stream,
            frames,
            speed,
            frame_ms,
            seed,
            layer,
        } => {
            let config = stream.resolve()?;
            run_session(config, frames, speed, Duration::from_millis(frame_ms), seed, layer)?;
        }
    }

    Ok(())
}

fn run_session(
    config: StreamConfig,
    frames: u32,
    speed: f32,
    frame_time: Duration,
    seed: u64,
    layer: Option<i32>,
) -> anyhow::Result<()> {
    let filter = layer.map_or(ChunkFilter::All, ChunkFilter::Layer);
    let renderer = Arc::new(LodRenderer::with_filter(filter));
    let far = config.max_radius;
    let mut world = World::new(config, TerrainGenerator::with_seed(seed), Arc::clone(&renderer))?;

    let mut camera = Camera::looking_at(Vec3::new(0.5, 0.5, 0.5), Vec3::new(0.5, 0.0, -10.0))
        .with_far(far);
    world.start(camera, camera.referential())?;

    let mut painter = DebugPainter::new();
    for frame in 0..frames {
        let frame_start = Instant::now();
        camera.position += camera.front * speed;
        world.update(camera, camera.referential());

        painter.clear();
        let stats = renderer.render(camera.referential(), &mut painter);
        if frame % 30 == 0 {
            tracing::info!(
                frame,
                draws = stats.draw_calls,
                binds = stats.material_binds,
                retained = renderer.chunk_count(),
                "frame rendered"
            );
        }

        if let Some(rest) = frame_time.checked_sub(frame_start.elapsed()) {
            std::thread::sleep(rest);
        }
    }
    world.stop();

    let stats = world.stats();
    println!(
        "Session: frames={frames}, iterations={}, added={}, removed={}, failures={}",
        stats.iterations, stats.chunks_added, stats.chunks_removed, stats.failures
    );
    println!(
        "Cache: chunks={}, hits={}, misses={}, last query {:?}",
        stats.cached_chunks, stats.cache.hits, stats.cache.misses, stats.last_query_time
    );
    println!("Retained per LOD: {:?}", renderer.lod_counts());
    print!("Last frame: {}", painter.summary());
    Ok(())
}
