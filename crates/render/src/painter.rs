use std::fmt::Write;

use glam::Mat4;

use chunkworld_storage::ChunkGeometry;

/// Errors reported by a painter for a single draw.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PaintError {
    #[error("geometry resource unavailable: {0}")]
    ResourceUnavailable(String),
    #[error("backend error: {0}")]
    Backend(String),
}

/// Draw-call sink supplied by the graphics backend.
///
/// The chunk renderer only submits work; it never configures the painter.
pub trait Painter {
    /// Bind the material used for every chunk of one level of detail.
    fn bind_material(&mut self, lod: u32);

    /// Draw one chunk. `model` maps voxel-space geometry to render-local space.
    fn draw(&mut self, geometry: &ChunkGeometry, model: Mat4) -> Result<(), PaintError>;
}

/// One recorded draw submission.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawCall {
    pub lod: u32,
    pub model: Mat4,
    pub triangles: usize,
}

/// Painter that records submissions instead of drawing.
///
/// Useful for headless runs, logging and tests.
#[derive(Debug, Default)]
pub struct DebugPainter {
    current_lod: Option<u32>,
    binds: Vec<u32>,
    draws: Vec<DrawCall>,
}

impl DebugPainter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn binds(&self) -> &[u32] {
        &self.binds
    }

    pub fn draws(&self) -> &[DrawCall] {
        &self.draws
    }

    /// Forget everything recorded so far, e.g. at the start of a frame.
    pub fn clear(&mut self) {
        self.current_lod = None;
        self.binds.clear();
        self.draws.clear();
    }

    pub fn summary(&self) -> String {
        let triangles: usize = self.draws.iter().map(|d| d.triangles).sum();
        let mut out = format!(
            "binds={} draws={} triangles={}\n",
            self.binds.len(),
            self.draws.len(),
            triangles
        );
        for lod in &self.binds {
            let count = self.draws.iter().filter(|d| d.lod == *lod).count();
            let _ = writeln!(out, "  lod {lod}: {count} chunks");
        }
        out
    }
}

impl Painter for DebugPainter {
    fn bind_material(&mut self, lod: u32) {
        self.current_lod = Some(lod);
        self.binds.push(lod);
    }

    fn draw(&mut self, geometry: &ChunkGeometry, model: Mat4) -> Result<(), PaintError> {
        let lod = self
            .current_lod
            .ok_or_else(|| PaintError::Backend("draw before material bind".into()))?;
        self.draws.push(DrawCall {
            lod,
            model,
            triangles: geometry.triangle_count(),
        });
        Ok(())
    }
}
