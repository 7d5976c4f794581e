//! Constants used throughout the segmentation pipeline.
//!
//! This module defines default values shared by the dataset adapter,
//! the transform pipeline, and the tiled inference engine.

/// The default number of training classes.
pub const DEFAULT_NUM_CLASSES: usize = 10;

/// The default base size for the long side of rescaled images.
///
/// Scale factors are applied relative to this size: a scale of `s`
/// resizes the long side of the image to `round(DEFAULT_BASE_SIZE * s)`.
pub const DEFAULT_BASE_SIZE: u32 = 1536;

/// The default crop size (height, width) for tiled inference and
/// random-crop training augmentation.
pub const DEFAULT_CROP_SIZE: (usize, usize) = (512, 1024);

/// The default sentinel class ID for pixels excluded from training.
pub const DEFAULT_IGNORE_LABEL: i32 = -1;

/// The default granularity of random scale selection.
///
/// Training-time scales are drawn from `0.5 + k / 10` for
/// `k in 0..=DEFAULT_SCALE_FACTOR`.
pub const DEFAULT_SCALE_FACTOR: u32 = 16;

/// The default label downsampling rate applied after cropping.
pub const DEFAULT_DOWNSAMPLE_RATE: u32 = 1;

/// The default per-channel mean used for input normalization.
pub const DEFAULT_MEAN: [f32; 3] = [0.485, 0.456, 0.406];

/// The default per-channel standard deviation used for input
/// normalization.
pub const DEFAULT_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// The default threshold for parallel processing.
///
/// Batch operations (such as exporting prediction rasters) switch to
/// parallel execution when the number of items exceeds this value.
pub const DEFAULT_PARALLEL_THRESHOLD: usize = 4;

/// The number of entries in the generated visualization palette.
pub const PALETTE_SIZE: usize = 256;

/// The path segment under the dataset root that holds input images.
pub const IMAGE_DIR_SEGMENT: &str = "images";

/// The path segment under the dataset root that holds label rasters.
pub const LABEL_DIR_SEGMENT: &str = "labels-mask";

/// The file extension of label rasters and exported predictions.
pub const LABEL_EXTENSION: &str = "png";
