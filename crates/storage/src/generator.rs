use std::sync::Arc;

use noise::{Fbm, MultiFractal, NoiseFn, Perlin};
use serde::{Deserialize, Serialize};

use chunkworld_common::CHUNK_SIZE;
use chunkworld_kernel::SpatialNode;

use crate::chunk::{Chunk, VoxelGrid};
use crate::mesh::mesh_voxels;

/// Procedural content source.
///
/// Must be a pure function of the node: the same node always yields the
/// same chunk, and distinct nodes may be generated from different threads.
pub trait Generator: Send + Sync {
    fn gen_chunk(&self, node: SpatialNode) -> Chunk;
}

impl<G: Generator + ?Sized> Generator for Arc<G> {
    fn gen_chunk(&self, node: SpatialNode) -> Chunk {
        (**self).gen_chunk(node)
    }
}

/// Parameters of [`TerrainGenerator`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainSettings {
    pub seed: u64,
    /// Mean surface height in voxels.
    pub base_height: f32,
    /// Peak deviation from `base_height` in voxels.
    pub amplitude: f32,
    /// Horizontal feature size in voxels.
    pub scale: f32,
}

impl Default for TerrainSettings {
    fn default() -> Self {
        Self {
            seed: 0,
            base_height: -8.0,
            amplitude: 12.0,
            scale: 96.0,
        }
    }
}

/// Seeded heightmap terrain.
///
/// Heights come from three octaves of Perlin fBm over the XZ plane, in
/// voxel units. Coarse nodes sample the same heightmap at `size` times
/// the spacing, so every LOD of a region agrees on its silhouette.
pub struct TerrainGenerator {
    settings: TerrainSettings,
    height: Fbm<Perlin>,
}

impl TerrainGenerator {
    pub fn new(settings: TerrainSettings) -> Self {
        let noise_seed = splitmix64(settings.seed) as u32;
        let height = Fbm::<Perlin>::new(noise_seed)
            .set_octaves(3)
            .set_frequency(1.0 / f64::from(settings.scale));
        Self { settings, height }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self::new(TerrainSettings {
            seed,
            ..TerrainSettings::default()
        })
    }

    pub fn settings(&self) -> &TerrainSettings {
        &self.settings
    }

    /// Surface height at a world voxel position.
    pub fn height_at(&self, x: f32, z: f32) -> f32 {
        let n = self.height.get([f64::from(x), f64::from(z)]).clamp(-1.0, 1.0) as f32;
        self.settings.base_height + self.settings.amplitude * n
    }

    pub fn voxels(&self, node: SpatialNode) -> VoxelGrid {
        let n = CHUNK_SIZE as i32;
        let step = node.size() as f32;
        let base = node.origin.as_vec3() * CHUNK_SIZE as f32;
        let mut grid = VoxelGrid::default();

        for z in 0..n {
            for x in 0..n {
                let wx = base.x + (x as f32 + 0.5) * step;
                let wz = base.z + (z as f32 + 0.5) * step;
                let height = self.height_at(wx, wz);
                for y in 0..n {
                    let wy = base.y + (y as f32 + 0.5) * step;
                    if wy < height {
                        grid.set(x, y, z, true);
                    }
                }
            }
        }
        grid
    }
}

impl Default for TerrainGenerator {
    fn default() -> Self {
        Self::new(TerrainSettings::default())
    }
}

impl std::fmt::Debug for TerrainGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TerrainGenerator")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Generator for TerrainGenerator {
    fn gen_chunk(&self, node: SpatialNode) -> Chunk {
        let voxels = self.voxels(node);
        let geometry = mesh_voxels(&voxels);
        tracing::trace!(
            ?node,
            solid = voxels.solid_count(),
            triangles = geometry.triangle_count(),
            "generated chunk"
        );
        Chunk::new(node, geometry)
    }
}

fn splitmix64(mut state: u64) -> u64 {
    state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
    let mut z = state;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}
