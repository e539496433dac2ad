//! Chunk storage: chunk data, procedural generation and the chunk cache.
//!
//! # Invariants
//! - Chunks are immutable once generated and shared by `Arc`.
//! - The cache is append-only: a coordinate is generated and stored once,
//!   never overwritten or evicted.
//! - Generators are pure functions of the requested node.

mod chunk;
mod generator;
mod mesh;
mod storage;

pub use chunk::{Chunk, ChunkGeometry, Vertex, VoxelGrid};
pub use generator::{Generator, TerrainGenerator, TerrainSettings};
pub use mesh::mesh_voxels;
pub use storage::{ChunkCache, Storage, StorageError, StorageStats, get_chunk};

pub fn crate_info() -> &'static str {
    concat!("chunkworld-storage v", env!("CARGO_PKG_VERSION"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("storage"));
    }
}
