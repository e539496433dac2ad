use std::collections::HashMap;
use std::sync::Arc;

use chunkworld_common::WorldCoordinate;
use chunkworld_kernel::SpatialNode;

use crate::chunk::Chunk;
use crate::generator::Generator;

/// Errors from chunk storage operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    #[error("chunk {coord:?} already stored at level {level}")]
    Occupied { coord: WorldCoordinate, level: u32 },
    #[error("chunk for {actual:?} stored under {expected:?}")]
    NodeMismatch {
        expected: SpatialNode,
        actual: SpatialNode,
    },
    #[error("level {level} outside cache range 0..={max}")]
    LevelOutOfRange { level: u32, max: u32 },
}

/// Lookup counters for instrumentation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StorageStats {
    pub hits: u64,
    pub misses: u64,
}

impl std::ops::AddAssign for StorageStats {
    fn add_assign(&mut self, rhs: Self) {
        self.hits += rhs.hits;
        self.misses += rhs.misses;
    }
}

/// Append-only in-memory chunk cache for one level of detail.
///
/// A coordinate is written at most once and never evicted.
#[derive(Debug, Default)]
pub struct Storage {
    level: u32,
    chunks: HashMap<WorldCoordinate, Arc<Chunk>>,
    stats: StorageStats,
}

impl Storage {
    pub fn new(level: u32) -> Self {
        Self {
            level,
            ..Self::default()
        }
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn get_chunk(&self, coord: WorldCoordinate) -> Option<Arc<Chunk>> {
        self.chunks.get(&coord).cloned()
    }

    /// Insert a freshly generated chunk.
    ///
    /// Storing a coordinate twice is a caller bug and is rejected; the first
    /// chunk stays in place.
    pub fn set_chunk(
        &mut self,
        coord: WorldCoordinate,
        chunk: Chunk,
    ) -> Result<Arc<Chunk>, StorageError> {
        let expected = SpatialNode::new(coord, self.level);
        if chunk.node() != expected {
            return Err(StorageError::NodeMismatch {
                expected,
                actual: chunk.node(),
            });
        }
        if self.chunks.contains_key(&coord) {
            return Err(StorageError::Occupied {
                coord,
                level: self.level,
            });
        }
        let chunk = Arc::new(chunk);
        self.chunks.insert(coord, Arc::clone(&chunk));
        Ok(chunk)
    }

    pub fn contains(&self, coord: WorldCoordinate) -> bool {
        self.chunks.contains_key(&coord)
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn stats(&self) -> StorageStats {
        self.stats
    }
}

/// Return the chunk at `coord`, generating and storing it on a miss.
pub fn get_chunk<G: Generator + ?Sized>(
    storage: &mut Storage,
    generator: &G,
    coord: WorldCoordinate,
) -> Result<Arc<Chunk>, StorageError> {
    if let Some(chunk) = storage.get_chunk(coord) {
        storage.stats.hits += 1;
        tracing::trace!(?coord, level = storage.level, "chunk cache hit");
        return Ok(chunk);
    }

    storage.stats.misses += 1;
    let chunk = generator.gen_chunk(SpatialNode::new(coord, storage.level));
    tracing::debug!(?coord, level = storage.level, "chunk generated");
    storage.set_chunk(coord, chunk)
}

/// One [`Storage`] per tree level, so coarse chunks never collide with
/// leaves at the same origin.
#[derive(Debug)]
pub struct ChunkCache {
    levels: Vec<Storage>,
}

impl ChunkCache {
    /// Cache covering levels `0..=max_level`.
    pub fn new(max_level: u32) -> Self {
        Self {
            levels: (0..=max_level).map(Storage::new).collect(),
        }
    }

    pub fn max_level(&self) -> u32 {
        (self.levels.len() - 1) as u32
    }

    pub fn storage(&self, level: u32) -> Option<&Storage> {
        self.levels.get(level as usize)
    }

    pub fn get(&self, node: SpatialNode) -> Option<Arc<Chunk>> {
        self.storage(node.level)?.get_chunk(node.origin)
    }

    pub fn get_or_generate<G: Generator + ?Sized>(
        &mut self,
        generator: &G,
        node: SpatialNode,
    ) -> Result<Arc<Chunk>, StorageError> {
        let max = self.max_level();
        let storage = self
            .levels
            .get_mut(node.level as usize)
            .ok_or(StorageError::LevelOutOfRange {
                level: node.level,
                max,
            })?;
        get_chunk(storage, generator, node.origin)
    }

    /// Total number of cached chunks across all levels.
    pub fn len(&self) -> usize {
        self.levels.iter().map(Storage::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.iter().all(Storage::is_empty)
    }

    pub fn stats(&self) -> StorageStats {
        let mut total = StorageStats::default();
        for storage in &self.levels {
            total += storage.stats();
        }
        total
    }
}
