//! Streaming: keeps the renderer's chunk set in sync with the camera.
//!
//! # Invariants
//! - No frame hitching: queries and generation run on one background worker,
//!   never on the render thread (except the initial synchronous publish).
//! - The visible set is replaced wholesale and owned by the worker.
//! - Removals are published before additions.

mod config;
mod diff;
mod world;

pub use config::{ConfigError, StreamConfig};
pub use diff::{NodeDiff, VisibleSet, diff_nodes};
pub use world::{StreamError, StreamState, StreamStats, World};

pub fn crate_info() -> &'static str {
    concat!("chunkworld-stream v", env!("CARGO_PKG_VERSION"))
}
