//! # tileseg
//!
//! A Rust library for semantic-segmentation inference on large
//! imagery: a manifest-driven dataset adapter plus a sliding-window,
//! multi-scale tiled inference engine and a palette-raster exporter.
//!
//! ## Features
//!
//! - Multi-scale inference: per-scale rescaling, crop tiling with
//!   count-normalized overlap averaging, bilinear resampling back to
//!   the source resolution, cross-scale aggregation
//! - Optional horizontal-flip test-time averaging
//! - Manifest-based sample indexing with pluggable label-path layout
//! - Bidirectional raw/training label remapping with an ignore
//!   sentinel
//! - Deterministic palette-indexed PNG export, written atomically
//! - Backend-agnostic: models plug in behind the
//!   [`SegmentationModel`](core::traits::SegmentationModel) trait
//!
//! ## Modules
//!
//! * [`core`] - Errors, tensor aliases, constants, and consumed
//!   capabilities
//! * [`dataset`] - Manifest index, label mapping, and sample loading
//! * [`inference`] - The tiled multi-scale inference engine
//! * [`processors`] - Normalization, rescaling, and augmentation
//! * [`utils`] - Image loading, palette generation, prediction export
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tileseg::prelude::*;
//!
//! # #[derive(Debug)]
//! # struct MyModel;
//! # impl SegmentationModel for MyModel {
//! #     fn forward(&self, input: &Tensor4D) -> Result<Tensor4D, SegError> {
//! #         Ok(input.clone())
//! #     }
//! # }
//! # fn main() -> Result<(), SegError> {
//! let config = DatasetConfig::new("/data/cicv", "lists/val.txt");
//! let dataset = SegDataset::new(config, IndexMode::Test)?;
//! let model = MyModel;
//!
//! for index in 0..dataset.len() {
//!     let item = dataset.load_test_item(index)?;
//!     let pred = dataset.multi_scale_inference(&model, &item.image, &[1.0, 1.5], false)?;
//!     dataset.save_predictions(&pred, std::path::Path::new("out"), &[item.name])?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod dataset;
pub mod inference;
pub mod processors;
pub mod utils;

pub use crate::core::init_tracing;

/// Commonly used types, re-exported for convenience.
pub mod prelude {
    pub use crate::core::errors::{SegError, SegResult};
    pub use crate::core::tensor::{LabelMap, Tensor2D, Tensor3D, Tensor4D};
    pub use crate::core::traits::SegmentationModel;
    pub use crate::dataset::{
        DatasetConfig, IndexMode, LabelMapping, Sample, SampleIndex, SegDataset,
    };
    pub use crate::inference::TiledInference;
    pub use crate::processors::NormalizeImage;
    pub use crate::utils::{generate_palette, save_predictions};
}
