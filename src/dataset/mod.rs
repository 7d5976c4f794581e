//! Dataset adapter: manifest index, label mapping, and sample loading.
//!
//! [`SegDataset`] binds a [`SampleIndex`], a [`LabelMapping`], and the
//! transform pipeline under one [`DatasetConfig`], and exposes the
//! test-mode and train-mode item loaders plus convenience entry points
//! for multi-scale inference and prediction export.

pub mod label_map;
pub mod manifest;

use std::path::PathBuf;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::constants::{
    DEFAULT_BASE_SIZE, DEFAULT_CROP_SIZE, DEFAULT_DOWNSAMPLE_RATE, DEFAULT_IGNORE_LABEL,
    DEFAULT_MEAN, DEFAULT_NUM_CLASSES, DEFAULT_SCALE_FACTOR, DEFAULT_STD,
};
use crate::core::errors::SegError;
use crate::core::tensor::{hwc_to_batch, LabelMap, Tensor3D, Tensor4D};
use crate::core::traits::SegmentationModel;
use crate::inference::TiledInference;
use crate::processors::scale::resize_label_nearest;
use crate::processors::{NormalizeImage, ScaleAugment};
use crate::utils::image::{load_image, load_label};

pub use label_map::LabelMapping;
pub use manifest::{default_label_path, IndexMode, Sample, SampleIndex};

/// Configuration of the dataset adapter.
///
/// All fields except `root` and `manifest` carry defaults matching the
/// dataset's conventional training setup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// Dataset root directory.
    pub root: PathBuf,
    /// Manifest file path, relative to `root`.
    pub manifest: PathBuf,
    /// Number of training classes.
    #[serde(default = "DatasetConfig::default_num_classes")]
    pub num_classes: usize,
    /// Whether training samples get the random scale/crop augmentation.
    #[serde(default = "DatasetConfig::default_multi_scale")]
    pub multi_scale: bool,
    /// Whether training samples get a random horizontal flip.
    #[serde(default)]
    pub flip: bool,
    /// Sentinel class ID excluded from loss and metrics.
    #[serde(default = "DatasetConfig::default_ignore_label")]
    pub ignore_label: i32,
    /// Long-side base size for rescaling.
    #[serde(default = "DatasetConfig::default_base_size")]
    pub base_size: u32,
    /// Crop size (height, width) for augmentation and tiled inference.
    #[serde(default = "DatasetConfig::default_crop_size")]
    pub crop_size: (usize, usize),
    /// Label downsampling rate applied after cropping.
    #[serde(default = "DatasetConfig::default_downsample_rate")]
    pub downsample_rate: u32,
    /// Granularity of random scale selection (`0.5 + k / 10`,
    /// `k in 0..=scale_factor`).
    #[serde(default = "DatasetConfig::default_scale_factor")]
    pub scale_factor: u32,
    /// Per-channel normalization mean.
    #[serde(default = "DatasetConfig::default_mean")]
    pub mean: [f32; 3],
    /// Per-channel normalization standard deviation.
    #[serde(default = "DatasetConfig::default_std")]
    pub std: [f32; 3],
    /// Truncate the index to the first N samples; `None` keeps all.
    #[serde(default)]
    pub num_samples: Option<usize>,
    /// Corner-alignment convention for prediction resampling.
    #[serde(default)]
    pub align_corners: bool,
}

impl DatasetConfig {
    /// Creates a configuration with defaults for everything but the
    /// paths.
    pub fn new(root: impl Into<PathBuf>, manifest: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            manifest: manifest.into(),
            num_classes: Self::default_num_classes(),
            multi_scale: Self::default_multi_scale(),
            flip: false,
            ignore_label: Self::default_ignore_label(),
            base_size: Self::default_base_size(),
            crop_size: Self::default_crop_size(),
            downsample_rate: Self::default_downsample_rate(),
            scale_factor: Self::default_scale_factor(),
            mean: Self::default_mean(),
            std: Self::default_std(),
            num_samples: None,
            align_corners: false,
        }
    }

    fn default_num_classes() -> usize {
        DEFAULT_NUM_CLASSES
    }

    fn default_multi_scale() -> bool {
        true
    }

    fn default_ignore_label() -> i32 {
        DEFAULT_IGNORE_LABEL
    }

    fn default_base_size() -> u32 {
        DEFAULT_BASE_SIZE
    }

    fn default_crop_size() -> (usize, usize) {
        DEFAULT_CROP_SIZE
    }

    fn default_downsample_rate() -> u32 {
        DEFAULT_DOWNSAMPLE_RATE
    }

    fn default_scale_factor() -> u32 {
        DEFAULT_SCALE_FACTOR
    }

    fn default_mean() -> [f32; 3] {
        DEFAULT_MEAN
    }

    fn default_std() -> [f32; 3] {
        DEFAULT_STD
    }
}

/// A test-mode item: normalized image batch plus source metadata.
#[derive(Debug)]
pub struct TestItem {
    /// Normalized channel-first batch `(1, 3, h, w)`.
    pub image: Tensor4D,
    /// Original `(height, width)` of the decoded image.
    pub size: (usize, usize),
    /// Sample name.
    pub name: String,
}

/// A train-mode item: augmented image tensor and remapped label map.
#[derive(Debug)]
pub struct TrainItem {
    /// Normalized channel-first image `(3, h, w)`.
    pub image: Tensor3D,
    /// Training-class label map, downsampled per configuration.
    pub label: LabelMap,
    /// Sample name.
    pub name: String,
}

/// The dataset adapter.
#[derive(Debug)]
pub struct SegDataset {
    config: DatasetConfig,
    index: SampleIndex,
    mapping: LabelMapping,
    normalize: NormalizeImage,
    augment: ScaleAugment,
}

impl SegDataset {
    /// Builds the dataset: reads the manifest, validates train-mode
    /// label paths, and prepares the transform pipeline.
    ///
    /// # Errors
    ///
    /// Returns configuration errors for invalid geometry or
    /// normalization parameters and I/O errors from the manifest or
    /// missing label files.
    pub fn new(config: DatasetConfig, mode: IndexMode) -> Result<Self, SegError> {
        if config.num_classes == 0 {
            return Err(SegError::config_error("num_classes must be greater than 0"));
        }
        if config.downsample_rate == 0 {
            return Err(SegError::config_error(
                "downsample_rate must be greater than 0",
            ));
        }
        if config.flip {
            warn!(
                "random horizontal flip enabled: several classes of this dataset are \
                 orientation-sensitive and may degrade under flipping"
            );
        }

        let normalize = NormalizeImage::new(None, Some(config.mean), Some(config.std))?;
        let augment = ScaleAugment::new(
            config.base_size,
            config.crop_size,
            config.scale_factor,
            config.ignore_label,
        )?;
        let manifest_path = config.root.join(&config.manifest);
        let index =
            SampleIndex::from_manifest(&config.root, &manifest_path, mode, config.num_samples)?;
        let mapping = LabelMapping::new(config.ignore_label);

        Ok(Self {
            config,
            index,
            mapping,
            normalize,
            augment,
        })
    }

    /// Replaces the label mapping (the default carries only the ignore
    /// sentinel).
    pub fn with_mapping(mut self, mapping: LabelMapping) -> Self {
        self.mapping = mapping;
        self
    }

    /// The dataset configuration.
    pub fn config(&self) -> &DatasetConfig {
        &self.config
    }

    /// The label mapping.
    pub fn mapping(&self) -> &LabelMapping {
        &self.mapping
    }

    /// The number of indexed samples.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether the index holds no samples.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Positional sample lookup.
    pub fn sample(&self, index: usize) -> Option<&Sample> {
        self.index.get(index)
    }

    /// Rewrites a label map between raw and training domains.
    pub fn convert_label(&self, label: &LabelMap, inverse: bool) -> LabelMap {
        self.mapping.convert(label, inverse)
    }

    /// Loads a test-mode item: decode, normalize, batch.
    ///
    /// # Errors
    ///
    /// Fails on an out-of-range index or an unreadable image.
    pub fn load_test_item(&self, index: usize) -> Result<TestItem, SegError> {
        let sample = self.sample_at(index)?;
        let image = load_image(&sample.image_path)?;
        let (width, height) = image.dimensions();
        let normalized = self.normalize.apply(&image);
        Ok(TestItem {
            image: hwc_to_batch(&normalized),
            size: (height as usize, width as usize),
            name: sample.name.clone(),
        })
    }

    /// Loads a train-mode item: decode, remap, augment, normalize.
    ///
    /// Randomness comes entirely from `rng`, so a seeded generator
    /// reproduces the exact sample.
    ///
    /// # Errors
    ///
    /// Fails on an out-of-range index, a test-mode index, or an
    /// unreadable image or label raster.
    pub fn load_train_item<R: Rng>(&self, index: usize, rng: &mut R) -> Result<TrainItem, SegError> {
        let sample = self.sample_at(index)?;
        let label_path = sample.label_path.as_ref().ok_or_else(|| {
            SegError::invalid_input(format!(
                "sample '{}' has no label path; the index was built in test mode",
                sample.name
            ))
        })?;

        let image = load_image(&sample.image_path)?;
        let raw_label = load_label(label_path)?;
        let label = self.mapping.convert(&raw_label, false);

        let (image, label) = if self.config.multi_scale {
            self.augment.random_scale_crop(&image, &label, rng)
        } else {
            (image, label)
        };

        let normalized = self.normalize.apply(&image);
        let chw = normalized.view().permuted_axes([2, 0, 1]).to_owned();
        let (chw, mut label) = if self.config.flip {
            self.augment.random_flip(chw, label, rng)
        } else {
            (chw, label)
        };

        let rate = self.config.downsample_rate as usize;
        if rate != 1 {
            let (h, w) = label.dim();
            label = resize_label_nearest(&label, (h / rate).max(1), (w / rate).max(1));
        }

        Ok(TrainItem {
            image: chw,
            label,
            name: sample.name.clone(),
        })
    }

    /// Runs tiled multi-scale inference with this dataset's geometry.
    ///
    /// The per-scale results are summed; divide by `scales.len()` for
    /// an average.
    pub fn multi_scale_inference<M: SegmentationModel + ?Sized>(
        &self,
        model: &M,
        image: &Tensor4D,
        scales: &[f64],
        flip: bool,
    ) -> Result<Tensor4D, SegError> {
        let engine = TiledInference::new(
            self.config.num_classes,
            self.config.crop_size,
            self.config.base_size,
        )?
        .with_align_corners(self.config.align_corners)
        .with_flip(flip);
        engine.infer(model, image, scales)
    }

    /// Exports predictions with this dataset's label mapping.
    pub fn save_predictions(
        &self,
        predictions: &Tensor4D,
        out_dir: &std::path::Path,
        names: &[String],
    ) -> Result<(), SegError> {
        crate::utils::visualization::save_predictions(predictions, &self.mapping, out_dir, names)
    }

    fn sample_at(&self, index: usize) -> Result<&Sample, SegError> {
        self.index.get(index).ok_or_else(|| {
            SegError::invalid_input(format!(
                "sample index {index} out of range for dataset of length {}",
                self.index.len()
            ))
        })
    }
}
