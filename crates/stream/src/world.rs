use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chunkworld_common::WorldCoordinate;
use chunkworld_kernel::{Camera, NodeQuery, Tree};
use chunkworld_render::ChunkSink;
use chunkworld_storage::{ChunkCache, Generator, StorageStats};

use crate::config::{ConfigError, StreamConfig};
use crate::diff::{VisibleSet, diff_nodes};

/// Errors from the streaming world.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("invalid stream config: {0}")]
    Config(#[from] ConfigError),
    #[error("streaming worker already running")]
    AlreadyRunning,
    #[error("failed to spawn streaming worker: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Lifecycle of the background worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Stopped,
    Running,
}

/// Streaming statistics, refreshed after every worker iteration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamStats {
    pub iterations: u64,
    pub chunks_added: u64,
    pub chunks_removed: u64,
    /// Iterations that panicked or failed to resolve a chunk.
    pub failures: u64,
    pub visible_nodes: usize,
    pub cached_chunks: usize,
    pub cache: StorageStats,
    pub last_query_time: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct ViewSnapshot {
    camera: Camera,
    referential: WorldCoordinate,
}

/// Main-thread to worker handoff.
struct Control {
    view: ViewSnapshot,
    /// Bumped whenever `view` changes so a sleeping worker can tell.
    revision: u64,
    stop: bool,
}

struct Shared {
    control: Mutex<Control>,
    wake: Condvar,
    stats: Mutex<StreamStats>,
}

impl Shared {
    fn control(&self) -> MutexGuard<'_, Control> {
        self.control.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish_stats(&self, stats: &StreamStats) {
        *self.stats.lock().unwrap_or_else(PoisonError::into_inner) = stats.clone();
    }
}

/// Worker-owned state. Moves into the worker thread on start and comes back
/// on join, so a restarted world keeps its cache and visible set.
struct Streamer<G, R> {
    tree: Tree,
    query: NodeQuery,
    poll_interval: Duration,
    cache: ChunkCache,
    generator: Arc<G>,
    renderer: Arc<R>,
    visible: VisibleSet,
    stats: StreamStats,
}

impl<G: Generator, R: ChunkSink> Streamer<G, R> {
    /// One query/diff/publish pass. Returns whether the renderer changed.
    fn step(&mut self, view: &ViewSnapshot) -> bool {
        let _span = tracing::debug_span!("stream_iteration").entered();
        let started = Instant::now();

        let frustum = view.camera.frustum();
        let nodes = self.tree.query(view.camera.position, &frustum, &self.query);
        self.stats.iterations += 1;
        self.stats.last_query_time = started.elapsed();

        let diff = diff_nodes(&self.visible, &nodes);
        if diff.is_empty() {
            return false;
        }

        let mut published = nodes;
        let mut added = Vec::with_capacity(diff.to_add.len());
        for node in &diff.to_add {
            let resolved = catch_unwind(AssertUnwindSafe(|| {
                self.cache.get_or_generate(&*self.generator, *node)
            }));
            match resolved {
                Ok(Ok(chunk)) => added.push(chunk),
                Ok(Err(err)) => {
                    self.stats.failures += 1;
                    tracing::error!(?node, %err, "failed to resolve chunk");
                    published.remove(node);
                }
                Err(payload) => {
                    self.stats.failures += 1;
                    tracing::error!(
                        ?node,
                        panic = panic_message(payload.as_ref()),
                        "chunk generation panicked"
                    );
                    published.remove(node);
                }
            }
        }
        let removed: Vec<_> = diff
            .to_remove
            .iter()
            .filter_map(|node| self.cache.get(*node))
            .collect();

        let changed = !added.is_empty() || !removed.is_empty();
        self.stats.chunks_added += added.len() as u64;
        self.stats.chunks_removed += removed.len() as u64;
        tracing::debug!(
            added = added.len(),
            removed = removed.len(),
            visible = published.len(),
            "publishing visible set"
        );

        self.visible = published;
        self.renderer.remove_chunks(removed);
        self.renderer.add_chunks(added);

        self.stats.visible_nodes = self.visible.len();
        self.stats.cached_chunks = self.cache.len();
        self.stats.cache = self.cache.stats();
        changed
    }

    /// [`Streamer::step`] with panics outside chunk generation caught and logged.
    fn guarded_step(&mut self, view: &ViewSnapshot) -> bool {
        match catch_unwind(AssertUnwindSafe(|| self.step(view))) {
            Ok(changed) => changed,
            Err(payload) => {
                self.stats.failures += 1;
                tracing::error!(
                    panic = panic_message(payload.as_ref()),
                    "streaming iteration panicked"
                );
                false
            }
        }
    }

    fn run(mut self, shared: Arc<Shared>) -> Self {
        tracing::info!("streaming worker started");
        loop {
            let (view, revision) = {
                let control = shared.control();
                if control.stop {
                    break;
                }
                (control.view, control.revision)
            };

            let changed = self.guarded_step(&view);
            shared.publish_stats(&self.stats);
            if changed {
                continue;
            }

            let control = shared.control();
            let (control, _timeout) = shared
                .wake
                .wait_timeout_while(control, self.poll_interval, |c| {
                    !c.stop && c.revision == revision
                })
                .unwrap_or_else(PoisonError::into_inner);
            if control.stop {
                break;
            }
        }
        tracing::info!(iterations = self.stats.iterations, "streaming worker stopped");
        self
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

/// Streaming chunk world.
///
/// Owns the tree, the chunk cache and one background worker that keeps the
/// renderer's chunk set in sync with the camera. The render thread calls
/// [`World::update`] every frame; the worker picks up the latest snapshot,
/// re-queries the tree and publishes only the difference.
pub struct World<G: Generator + 'static, R: ChunkSink + 'static> {
    config: StreamConfig,
    generator: Arc<G>,
    renderer: Arc<R>,
    shared: Arc<Shared>,
    /// Present while stopped.
    idle: Option<Streamer<G, R>>,
    /// Present while running.
    worker: Option<JoinHandle<Streamer<G, R>>>,
}

impl<G: Generator + 'static, R: ChunkSink + 'static> World<G, R> {
    pub fn new(config: StreamConfig, generator: G, renderer: Arc<R>) -> Result<Self, StreamError> {
        config.validate()?;
        let mut world = Self {
            config,
            generator: Arc::new(generator),
            renderer,
            shared: Arc::new(Shared {
                control: Mutex::new(Control {
                    view: ViewSnapshot {
                        camera: Camera::default(),
                        referential: WorldCoordinate::ZERO,
                    },
                    revision: 0,
                    stop: false,
                }),
                wake: Condvar::new(),
                stats: Mutex::new(StreamStats::default()),
            }),
            idle: None,
            worker: None,
        };
        world.idle = Some(world.fresh_streamer()?);
        Ok(world)
    }

    fn fresh_streamer(&self) -> Result<Streamer<G, R>, StreamError> {
        let tree = Tree::new(self.config.root_level).map_err(ConfigError::from)?;
        Ok(Streamer {
            tree,
            query: self.config.node_query(),
            poll_interval: self.config.poll_interval(),
            cache: ChunkCache::new(tree.root_level()),
            generator: Arc::clone(&self.generator),
            renderer: Arc::clone(&self.renderer),
            visible: VisibleSet::new(),
            stats: StreamStats::default(),
        })
    }

    /// Publish the initial visible set synchronously, then hand streaming
    /// over to the background worker.
    pub fn start(&mut self, camera: Camera, referential: WorldCoordinate) -> Result<(), StreamError> {
        if self.worker.is_some() {
            return Err(StreamError::AlreadyRunning);
        }

        let mut streamer = match self.idle.take() {
            Some(streamer) => streamer,
            None => {
                tracing::warn!("worker state was lost; clearing renderer and cache");
                self.renderer.clear();
                self.fresh_streamer()?
            }
        };

        let view = ViewSnapshot {
            camera,
            referential,
        };
        {
            let mut control = self.shared.control();
            control.view = view;
            control.revision += 1;
            control.stop = false;
        }

        streamer.guarded_step(&view);
        self.shared.publish_stats(&streamer.stats);
        tracing::info!(
            visible = streamer.visible.len(),
            ?referential,
            "initial visible set published"
        );

        let shared = Arc::clone(&self.shared);
        let handle = thread::Builder::new()
            .name("chunk-streamer".into())
            .spawn(move || streamer.run(shared))
            .map_err(StreamError::Spawn)?;
        self.worker = Some(handle);
        Ok(())
    }

    /// Store the latest camera snapshot. Cheap; safe to call every frame.
    pub fn update(&self, camera: Camera, referential: WorldCoordinate) {
        let view = ViewSnapshot {
            camera,
            referential,
        };
        let mut control = self.shared.control();
        if control.view != view {
            control.view = view;
            control.revision += 1;
            self.shared.wake.notify_one();
        }
    }

    /// Signal the worker and wait for it to finish its current iteration.
    /// Does nothing when already stopped.
    pub fn stop(&mut self) {
        let Some(handle) = self.worker.take() else {
            return;
        };

        self.shared.control().stop = true;
        self.shared.wake.notify_all();

        match handle.join() {
            Ok(streamer) => self.idle = Some(streamer),
            Err(payload) => tracing::error!(
                panic = panic_message(payload.as_ref()),
                "streaming worker died; cache discarded"
            ),
        }
        tracing::info!("world stopped");
    }

    pub fn state(&self) -> StreamState {
        if self.worker.is_some() {
            StreamState::Running
        } else {
            StreamState::Stopped
        }
    }

    pub fn stats(&self) -> StreamStats {
        self.shared
            .stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The referential of the latest snapshot.
    pub fn referential(&self) -> WorldCoordinate {
        self.shared.control().view.referential
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    pub fn renderer(&self) -> &Arc<R> {
        &self.renderer
    }
}

impl<G: Generator + 'static, R: ChunkSink + 'static> Drop for World<G, R> {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chunkworld_kernel::SpatialNode;
    use chunkworld_render::LodRenderer;
    use chunkworld_storage::{Chunk, ChunkGeometry};
    use glam::Vec3;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingGenerator {
        calls: AtomicUsize,
        panic_on: Option<SpatialNode>,
    }

    impl Generator for CountingGenerator {
        fn gen_chunk(&self, node: SpatialNode) -> Chunk {
            if self.panic_on == Some(node) {
                panic!("generator exploded at {node:?}");
            }
            self.calls.fetch_add(1, Ordering::SeqCst);
            Chunk::new(node, ChunkGeometry::default())
        }
    }

    fn config() -> StreamConfig {
        StreamConfig {
            root_level: 4,
            max_radius: 6.0,
            lod_factor: None,
            poll_interval_ms: 20,
        }
    }

    fn world(
        generator: Arc<CountingGenerator>,
    ) -> World<Arc<CountingGenerator>, LodRenderer> {
        World::new(config(), generator, Arc::new(LodRenderer::new())).unwrap()
    }

    fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    fn leaf(x: i32, y: i32, z: i32) -> WorldCoordinate {
        WorldCoordinate::new(x, y, z)
    }

    #[test]
    fn start_publishes_initial_set_synchronously() {
        let mut world = world(Arc::default());
        let camera = Camera::default();
        world.start(camera, camera.referential()).unwrap();

        let renderer = world.renderer();
        assert_eq!(world.state(), StreamState::Running);
        assert!(renderer.contains(0, leaf(0, 0, -1)));
        assert!(renderer.contains(0, leaf(0, 0, -3)));
        assert_eq!(world.stats().visible_nodes, renderer.chunk_count());

        world.stop();
        assert_eq!(world.state(), StreamState::Stopped);
    }

    #[test]
    fn update_restreams_in_background() {
        let mut world = world(Arc::default());
        let camera = Camera::default();
        world.start(camera, camera.referential()).unwrap();

        let turned = Camera::looking_at(Vec3::ZERO, Vec3::Z);
        world.update(turned, turned.referential());

        let renderer = Arc::clone(world.renderer());
        assert!(wait_until(|| {
            renderer.contains(0, leaf(0, 0, 2))
                && !renderer.contains(0, leaf(0, 0, -3))
                && world.stats().chunks_removed > 0
        }));
        world.stop();
    }

    #[test]
    fn start_twice_errors_and_stop_is_idempotent() {
        let mut world = world(Arc::default());
        let camera = Camera::default();

        world.stop();
        world.start(camera, camera.referential()).unwrap();
        assert!(matches!(
            world.start(camera, camera.referential()),
            Err(StreamError::AlreadyRunning)
        ));
        world.stop();
        world.stop();
        assert_eq!(world.state(), StreamState::Stopped);
    }

    #[test]
    fn restart_reuses_cache() {
        let generator = Arc::new(CountingGenerator::default());
        let mut world = world(Arc::clone(&generator));
        let camera = Camera::default();

        world.start(camera, camera.referential()).unwrap();
        world.stop();
        let generated = generator.calls.load(Ordering::SeqCst);
        assert!(generated > 0);

        world.start(camera, camera.referential()).unwrap();
        world.stop();
        assert_eq!(generator.calls.load(Ordering::SeqCst), generated);
        assert_eq!(world.stats().cached_chunks, generated);
    }

    #[test]
    fn generator_panic_is_contained() {
        let generator = Arc::new(CountingGenerator {
            panic_on: Some(SpatialNode::leaf(leaf(0, 0, -1))),
            ..CountingGenerator::default()
        });
        let mut world = world(generator);
        let camera = Camera::default();

        world.start(camera, camera.referential()).unwrap();
        assert_eq!(world.state(), StreamState::Running);
        assert!(world.stats().failures >= 1);
        assert!(!world.renderer().contains(0, leaf(0, 0, -1)));
        assert!(world.renderer().contains(0, leaf(0, 0, -3)));

        world.stop();
        assert_eq!(world.state(), StreamState::Stopped);
    }

    struct FlakyGenerator {
        flaky: SpatialNode,
        failed: AtomicBool,
    }

    impl Generator for FlakyGenerator {
        fn gen_chunk(&self, node: SpatialNode) -> Chunk {
            if node == self.flaky && !self.failed.swap(true, Ordering::SeqCst) {
                panic!("transient failure at {node:?}");
            }
            Chunk::new(node, ChunkGeometry::default())
        }
    }

    #[test]
    fn failed_chunk_is_retried() {
        let flaky = SpatialNode::leaf(leaf(0, 0, -1));
        let generator = FlakyGenerator {
            flaky,
            failed: AtomicBool::new(false),
        };
        let renderer = Arc::new(LodRenderer::new());
        let mut world = World::new(config(), generator, Arc::clone(&renderer)).unwrap();
        let camera = Camera::default();

        world.start(camera, camera.referential()).unwrap();
        assert!(wait_until(|| renderer.contains(0, flaky.origin)));

        world.stop();
        assert_eq!(world.stats().failures, 1);
        assert_eq!(world.stats().visible_nodes, renderer.chunk_count());
    }

    #[test]
    fn lost_worker_state_clears_stale_chunks() {
        let renderer = Arc::new(LodRenderer::new());
        let mut world =
            World::new(config(), CountingGenerator::default(), Arc::clone(&renderer)).unwrap();
        let stale = SpatialNode::leaf(leaf(7, 7, 7));
        renderer.add_chunks([Arc::new(Chunk::new(stale, ChunkGeometry::default()))]);
        world.idle = None;

        let camera = Camera::default();
        world.start(camera, camera.referential()).unwrap();
        world.stop();

        assert!(!renderer.contains(0, stale.origin));
        assert!(renderer.contains(0, leaf(0, 0, -1)));
        assert_eq!(world.stats().visible_nodes, renderer.chunk_count());
    }

    #[test]
    fn invalid_config_fails_fast() {
        let bad = StreamConfig {
            root_level: 0,
            ..config()
        };
        let result = World::new(bad, CountingGenerator::default(), Arc::new(LodRenderer::new()));
        assert!(matches!(result, Err(StreamError::Config(_))));
    }

    #[test]
    fn lod_streaming_fills_coarse_buckets() {
        let config = StreamConfig {
            root_level: 6,
            max_radius: 40.0,
            lod_factor: Some(2.0),
            poll_interval_ms: 20,
        };
        let renderer = Arc::new(LodRenderer::new());
        let mut world = World::new(config, CountingGenerator::default(), Arc::clone(&renderer)).unwrap();
        let camera = Camera::default().with_far(40.0);
        world.start(camera, camera.referential()).unwrap();
        world.stop();

        let counts = renderer.lod_counts();
        assert!(counts.contains_key(&0));
        assert!(counts.keys().any(|lod| *lod > 0));
    }
}
