use bytemuck::{Pod, Zeroable};

use chunkworld_common::{CHUNK_SIZE, WorldCoordinate};
use chunkworld_kernel::SpatialNode;

/// Mesh vertex laid out for direct GPU upload.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

/// Render data of one chunk, in voxel units (`0..=CHUNK_SIZE` per axis).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChunkGeometry {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl ChunkGeometry {
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Raw vertex bytes, ready for a vertex buffer.
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }
}

/// Occupancy of the `CHUNK_SIZE³` voxels of a chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoxelGrid {
    solid: Vec<bool>,
}

impl Default for VoxelGrid {
    fn default() -> Self {
        let n = CHUNK_SIZE as usize;
        Self {
            solid: vec![false; n * n * n],
        }
    }
}

impl VoxelGrid {
    fn index(x: i32, y: i32, z: i32) -> Option<usize> {
        let n = CHUNK_SIZE as i32;
        if (0..n).contains(&x) && (0..n).contains(&y) && (0..n).contains(&z) {
            Some((x + y * n + z * n * n) as usize)
        } else {
            None
        }
    }

    /// Out-of-range positions read as empty.
    pub fn is_solid(&self, x: i32, y: i32, z: i32) -> bool {
        Self::index(x, y, z).is_some_and(|i| self.solid[i])
    }

    /// Writes outside the grid are ignored.
    pub fn set(&mut self, x: i32, y: i32, z: i32, solid: bool) {
        if let Some(i) = Self::index(x, y, z) {
            self.solid[i] = solid;
        }
    }

    pub fn solid_count(&self) -> usize {
        self.solid.iter().filter(|s| **s).count()
    }
}

/// A generated piece of the world. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    node: SpatialNode,
    geometry: ChunkGeometry,
}

impl Chunk {
    pub fn new(node: SpatialNode, geometry: ChunkGeometry) -> Self {
        Self { node, geometry }
    }

    pub fn node(&self) -> SpatialNode {
        self.node
    }

    pub fn origin(&self) -> WorldCoordinate {
        self.node.origin
    }

    /// Level of detail: `log2(size)`.
    pub fn lod(&self) -> u32 {
        self.node.level
    }

    /// Edge length in chunk widths.
    pub fn size(&self) -> i32 {
        self.node.size()
    }

    pub fn geometry(&self) -> &ChunkGeometry {
        &self.geometry
    }
}
