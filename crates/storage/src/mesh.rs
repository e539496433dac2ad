use chunkworld_common::CHUNK_SIZE;

use crate::chunk::{ChunkGeometry, Vertex, VoxelGrid};

/// Build a face-culled mesh: one quad per solid voxel face whose neighbour
/// is empty. Faces on the chunk boundary are always emitted.
///
/// Quads wind counter-clockwise seen from outside the voxel.
pub fn mesh_voxels(voxels: &VoxelGrid) -> ChunkGeometry {
    let n = CHUNK_SIZE as i32;
    let mut geometry = ChunkGeometry::default();

    for z in 0..n {
        for y in 0..n {
            for x in 0..n {
                if !voxels.is_solid(x, y, z) {
                    continue;
                }
                for axis in 0..3 {
                    for positive in [false, true] {
                        let mut neighbor = [x, y, z];
                        neighbor[axis] += if positive { 1 } else { -1 };
                        if voxels.is_solid(neighbor[0], neighbor[1], neighbor[2]) {
                            continue;
                        }
                        push_quad(&mut geometry, [x, y, z], axis, positive);
                    }
                }
            }
        }
    }

    geometry
}

fn push_quad(geometry: &mut ChunkGeometry, voxel: [i32; 3], axis: usize, positive: bool) {
    // Tangents chosen so that u x v points along the face normal.
    let (u, v) = if positive {
        ((axis + 1) % 3, (axis + 2) % 3)
    } else {
        ((axis + 2) % 3, (axis + 1) % 3)
    };

    let mut base = voxel.map(|c| c as f32);
    if positive {
        base[axis] += 1.0;
    }
    let mut normal = [0.0; 3];
    normal[axis] = if positive { 1.0 } else { -1.0 };

    let start = geometry.vertices.len() as u32;
    for (du, dv) in [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)] {
        let mut position = base;
        position[u] += du;
        position[v] += dv;
        geometry.vertices.push(Vertex { position, normal });
    }
    geometry
        .indices
        .extend_from_slice(&[start, start + 1, start + 2, start, start + 2, start + 3]);
}
