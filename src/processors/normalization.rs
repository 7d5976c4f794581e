//! Image normalization for model input.
//!
//! Normalization folds the scale, mean, and standard deviation into a
//! per-channel affine transform: `x * alpha + beta` with
//! `alpha = scale / std` and `beta = -mean / std`.

use image::RgbImage;

use crate::core::constants::{DEFAULT_MEAN, DEFAULT_STD};
use crate::core::errors::SegError;
use crate::core::tensor::Tensor3D;

/// Normalizes images for segmentation inference and training.
///
/// Encapsulates the per-channel affine parameters and converts 8-bit
/// RGB images into `(h, w, 3)` f32 tensors.
#[derive(Debug, Clone)]
pub struct NormalizeImage {
    /// Scaling factors for each channel (alpha = scale / std).
    pub alpha: [f32; 3],
    /// Offset values for each channel (beta = -mean / std).
    pub beta: [f32; 3],
}

impl NormalizeImage {
    /// Creates a new NormalizeImage instance with the specified
    /// parameters.
    ///
    /// # Arguments
    ///
    /// * `scale` - Optional scaling factor (defaults to 1.0/255.0)
    /// * `mean` - Optional per-channel mean (defaults to the ImageNet
    ///   mean)
    /// * `std` - Optional per-channel standard deviation (defaults to
    ///   the ImageNet std)
    ///
    /// # Errors
    ///
    /// Returns a configuration error if scale is not positive or any
    /// standard deviation value is not positive.
    pub fn new(
        scale: Option<f32>,
        mean: Option<[f32; 3]>,
        std: Option<[f32; 3]>,
    ) -> Result<Self, SegError> {
        let scale = scale.unwrap_or(1.0 / 255.0);
        let mean = mean.unwrap_or(DEFAULT_MEAN);
        let std = std.unwrap_or(DEFAULT_STD);

        if scale <= 0.0 {
            return Err(SegError::config_error("Scale must be greater than 0"));
        }
        for (i, &s) in std.iter().enumerate() {
            if s <= 0.0 {
                return Err(SegError::config_error(format!(
                    "Standard deviation at index {i} must be greater than 0, got {s}"
                )));
            }
        }

        let mut alpha = [0.0; 3];
        let mut beta = [0.0; 3];
        for c in 0..3 {
            alpha[c] = scale / std[c];
            beta[c] = -mean[c] / std[c];
        }

        Ok(Self { alpha, beta })
    }

    /// Normalizes an 8-bit RGB image into an `(h, w, 3)` f32 tensor.
    pub fn apply(&self, img: &RgbImage) -> Tensor3D {
        let (width, height) = img.dimensions();
        let mut out = Tensor3D::zeros((height as usize, width as usize, 3));

        for (x, y, pixel) in img.enumerate_pixels() {
            for c in 0..3 {
                out[[y as usize, x as usize, c]] =
                    pixel[c] as f32 * self.alpha[c] + self.beta[c];
            }
        }
        out
    }
}
