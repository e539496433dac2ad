//! Rendering adapter: the retained chunk set and its draw batching.
//!
//! # Invariants
//! - The renderer never generates or mutates chunks; it only retains the
//!   set handed to it by the streaming loop.
//! - Materials are bound per level of detail, not per chunk.
//! - A failed draw never aborts the frame.

mod painter;
mod renderer;

pub use painter::{DebugPainter, DrawCall, PaintError, Painter};
pub use renderer::{ChunkFilter, ChunkSink, LodRenderer, RenderStats, model_matrix};

pub fn crate_info() -> &'static str {
    concat!("chunkworld-render v", env!("CARGO_PKG_VERSION"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("render"));
    }
}
