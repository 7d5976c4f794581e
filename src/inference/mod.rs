//! Tiled multi-scale inference.
//!
//! - [`engine`] drives the per-scale rescale/tile/resample/sum loop.
//! - [`tiling`] holds the crop grid geometry and the overlap
//!   accumulator.

pub mod engine;
pub mod tiling;

pub use engine::TiledInference;
pub use tiling::{Accumulator, CropGrid, CropRegion};
