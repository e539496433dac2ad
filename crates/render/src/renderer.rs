use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

use chunkworld_common::{CHUNK_SIZE, WorldCoordinate};
use chunkworld_storage::Chunk;

use crate::painter::Painter;

/// Receiver of the streamed chunk set.
///
/// The streaming loop depends only on this seam. Implementations are shared
/// with the render thread, so every method takes `&self`.
pub trait ChunkSink: Send + Sync {
    fn add_chunks<I: IntoIterator<Item = Arc<Chunk>>>(&self, chunks: I);
    fn remove_chunks<I: IntoIterator<Item = Arc<Chunk>>>(&self, chunks: I);
    /// Drop every chunk, for when the publisher lost track of what it sent.
    fn clear(&self);
}

/// Visibility pre-filter applied to render-local chunk origins.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChunkFilter {
    #[default]
    All,
    /// Only chunks spanning this render-local Y layer.
    Layer(i32),
}

impl ChunkFilter {
    pub fn passes(&self, relative: WorldCoordinate, size: i32) -> bool {
        match *self {
            ChunkFilter::All => true,
            ChunkFilter::Layer(y) => relative.y <= y && y < relative.y + size,
        }
    }
}

/// Per-frame draw statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub material_binds: usize,
    pub draw_calls: usize,
    /// Rejected by the [`ChunkFilter`].
    pub filtered: usize,
    /// Chunks with no triangles.
    pub empty: usize,
    /// Draws the painter refused.
    pub failed: usize,
}

type Buckets = BTreeMap<u32, HashMap<WorldCoordinate, Arc<Chunk>>>;

/// Retained chunk set, bucketed by level of detail.
///
/// The bucket map sits behind one mutex, held for a single add/remove batch
/// or a full render pass. No generation ever happens under it.
#[derive(Debug, Default)]
pub struct LodRenderer {
    filter: ChunkFilter,
    buckets: Mutex<Buckets>,
}

impl LodRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filter(filter: ChunkFilter) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }

    fn lock(&self) -> MutexGuard<'_, Buckets> {
        self.buckets.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn chunk_count(&self) -> usize {
        self.lock().values().map(HashMap::len).sum()
    }

    /// Number of retained chunks per level of detail.
    pub fn lod_counts(&self) -> BTreeMap<u32, usize> {
        self.lock()
            .iter()
            .map(|(lod, chunks)| (*lod, chunks.len()))
            .collect()
    }

    pub fn contains(&self, lod: u32, origin: WorldCoordinate) -> bool {
        self.lock()
            .get(&lod)
            .is_some_and(|chunks| chunks.contains_key(&origin))
    }

    /// Issue draws for the retained set, coarsest level first.
    ///
    /// The material is bound once per level that draws anything. A failed
    /// draw is logged and skipped; the rest of the frame still renders.
    pub fn render<P: Painter + ?Sized>(
        &self,
        referential: WorldCoordinate,
        painter: &mut P,
    ) -> RenderStats {
        let _span = tracing::trace_span!("render_chunks").entered();
        let buckets = self.lock();
        let mut stats = RenderStats::default();

        for (&lod, chunks) in buckets.iter().rev() {
            let mut bound = false;
            for chunk in chunks.values() {
                let relative = chunk.origin() - referential;
                if !self.filter.passes(relative, chunk.size()) {
                    stats.filtered += 1;
                    continue;
                }
                if chunk.geometry().is_empty() {
                    stats.empty += 1;
                    continue;
                }
                if !bound {
                    painter.bind_material(lod);
                    stats.material_binds += 1;
                    bound = true;
                }
                match painter.draw(chunk.geometry(), model_matrix(relative, chunk.size())) {
                    Ok(()) => stats.draw_calls += 1,
                    Err(err) => {
                        stats.failed += 1;
                        tracing::error!(origin = ?chunk.origin(), lod, %err, "skipping chunk draw");
                    }
                }
            }
        }

        stats
    }
}

impl ChunkSink for LodRenderer {
    fn add_chunks<I: IntoIterator<Item = Arc<Chunk>>>(&self, chunks: I) {
        let mut buckets = self.lock();
        for chunk in chunks {
            buckets
                .entry(chunk.lod())
                .or_default()
                .insert(chunk.origin(), chunk);
        }
    }

    fn remove_chunks<I: IntoIterator<Item = Arc<Chunk>>>(&self, chunks: I) {
        let mut buckets = self.lock();
        for chunk in chunks {
            if let Some(bucket) = buckets.get_mut(&chunk.lod()) {
                bucket.remove(&chunk.origin());
                if bucket.is_empty() {
                    buckets.remove(&chunk.lod());
                }
            }
        }
    }

    fn clear(&self) {
        self.lock().clear();
    }
}

/// Render-local transform of a chunk: translate by its offset from the
/// referential, then scale voxel geometry by the node size.
pub fn model_matrix(relative: WorldCoordinate, size: i32) -> Mat4 {
    Mat4::from_translation(relative.as_vec3() * CHUNK_SIZE as f32)
        * Mat4::from_scale(Vec3::splat(size as f32))
}
