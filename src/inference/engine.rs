//! Sliding-window, multi-scale inference.
//!
//! For each requested scale the source image is rescaled relative to
//! the configured base size. Downscales run through the model whole;
//! upscales are covered by a crop grid whose overlapping predictions
//! are count-averaged. Every per-scale result is resampled back to the
//! source resolution and summed into the final prediction.

use ndarray::s;
use tracing::debug;

use crate::core::errors::SegError;
use crate::core::tensor::{batch_to_hwc, flip_horizontal, hwc_to_batch, Tensor4D};
use crate::core::traits::SegmentationModel;
use crate::inference::tiling::{Accumulator, CropGrid};
use crate::processors::interpolate::resize_bilinear;
use crate::processors::scale::rescale_tensor;

/// The tiled multi-scale inference engine.
///
/// Holds the geometry and aggregation settings; the model itself is
/// passed per call, so one engine can serve any number of models with
/// matching class counts.
#[derive(Debug, Clone)]
pub struct TiledInference {
    num_classes: usize,
    crop_size: (usize, usize),
    base_size: u32,
    align_corners: bool,
    flip: bool,
}

impl TiledInference {
    /// Creates an engine for the given class count, crop size, and
    /// base size.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the class count, base size, or
    /// either crop dimension is zero.
    pub fn new(
        num_classes: usize,
        crop_size: (usize, usize),
        base_size: u32,
    ) -> Result<Self, SegError> {
        if num_classes == 0 {
            return Err(SegError::config_error("num_classes must be greater than 0"));
        }
        if crop_size.0 == 0 || crop_size.1 == 0 {
            return Err(SegError::config_error(format!(
                "crop_size dimensions must be greater than 0, got {}x{}",
                crop_size.0, crop_size.1
            )));
        }
        if base_size == 0 {
            return Err(SegError::config_error("base_size must be greater than 0"));
        }
        Ok(Self {
            num_classes,
            crop_size,
            base_size,
            align_corners: false,
            flip: false,
        })
    }

    /// Sets the corner-alignment convention used when resampling
    /// per-scale predictions back to the source resolution.
    pub fn with_align_corners(mut self, align_corners: bool) -> Self {
        self.align_corners = align_corners;
        self
    }

    /// Enables horizontal-flip test-time averaging for every model
    /// call.
    pub fn with_flip(mut self, flip: bool) -> Self {
        self.flip = flip;
        self
    }

    /// Runs multi-scale tiled inference.
    ///
    /// # Arguments
    ///
    /// * `model` - The single-crop inference capability.
    /// * `image` - Normalized channel-first batch `(1, 3, h, w)`; the
    ///   batch size must be exactly 1.
    /// * `scales` - Non-empty sequence of positive scale factors.
    ///   Repeats are meaningful: each entry contributes separately.
    ///
    /// # Returns
    ///
    /// The per-scale predictions resampled to the source resolution and
    /// **summed** over scales, shape `(1, num_classes, h, w)`. Callers
    /// wanting a true multi-scale average divide by `scales.len()`.
    ///
    /// # Errors
    ///
    /// Fails fast on a batch size other than 1, an empty or
    /// non-positive scale list, or a model output that violates the
    /// shape contract. Model errors propagate unchanged; the engine
    /// never retries.
    pub fn infer<M: SegmentationModel + ?Sized>(
        &self,
        model: &M,
        image: &Tensor4D,
        scales: &[f64],
    ) -> Result<Tensor4D, SegError> {
        let (batch, channels, ori_h, ori_w) = image.dim();
        if batch != 1 {
            return Err(SegError::invalid_input(format!(
                "tiled inference supports batch size 1 only, got {batch}"
            )));
        }
        if channels != 3 {
            return Err(SegError::invalid_input(format!(
                "expected a 3-channel image batch, got {channels} channels"
            )));
        }
        if scales.is_empty() {
            return Err(SegError::invalid_input(
                "scale list must not be empty; inference output is undefined",
            ));
        }
        if let Some(&bad) = scales.iter().find(|&&s| !(s > 0.0) || !s.is_finite()) {
            return Err(SegError::invalid_input(format!(
                "scale factors must be positive and finite, got {bad}"
            )));
        }

        let source = batch_to_hwc(image)?;
        let (crop_h, crop_w) = self.crop_size;
        let mut final_pred = Tensor4D::zeros((1, self.num_classes, ori_h, ori_w));

        for &scale in scales {
            let scaled = rescale_tensor(&source, self.base_size, scale)?;
            let (height, width, _) = scaled.dim();

            let pred = if scale <= 1.0 {
                let input = hwc_to_batch(&scaled);
                let output = self.single_crop(model, &input)?;
                let (_, _, out_h, out_w) = output.dim();
                if out_h < height || out_w < width {
                    return Err(SegError::validation_error(
                        "TiledInference",
                        "model output size",
                        &format!("at least {height}x{width}"),
                        &format!("{out_h}x{out_w}"),
                    ));
                }
                // Drop any model-internal padding.
                output.slice(s![.., .., 0..height, 0..width]).to_owned()
            } else {
                let grid = CropGrid::new(height, width, crop_h, crop_w);
                debug!(
                    scale,
                    height,
                    width,
                    rows = grid.rows(),
                    cols = grid.cols(),
                    "tiling rescaled image"
                );
                let mut accumulator = Accumulator::new(self.num_classes, height, width);
                for region in grid.regions() {
                    let crop = scaled
                        .slice(s![region.h0..region.h1, region.w0..region.w1, ..])
                        .to_owned();
                    let input = hwc_to_batch(&crop);
                    let output = self.single_crop(model, &input)?;
                    accumulator.add(&output, &region)?;
                }
                let averaged = accumulator.into_averaged();
                // Clamp to the rescaled dimensions; a no-op unless the
                // grid exceeded them.
                averaged.slice(s![.., .., 0..height, 0..width]).to_owned()
            };

            let resampled = resize_bilinear(&pred, ori_h, ori_w, self.align_corners);
            final_pred += &resampled;
        }

        Ok(final_pred)
    }

    /// The single-crop inference primitive.
    ///
    /// Runs the model on `input`; with flip test-time augmentation
    /// enabled, additionally runs on the horizontally flipped input,
    /// flips that output back, and averages the two. Applied
    /// identically to whole images and to every tile.
    fn single_crop<M: SegmentationModel + ?Sized>(
        &self,
        model: &M,
        input: &Tensor4D,
    ) -> Result<Tensor4D, SegError> {
        let pred = model.forward(input)?;
        if pred.dim().1 != self.num_classes {
            return Err(SegError::validation_error(
                "TiledInference",
                "model class count",
                &self.num_classes.to_string(),
                &pred.dim().1.to_string(),
            ));
        }
        if !self.flip {
            return Ok(pred);
        }

        let flipped_input = flip_horizontal(input);
        let flipped_pred = model.forward(&flipped_input)?;
        let restored = flip_horizontal(&flipped_pred);
        if restored.dim() != pred.dim() {
            return Err(SegError::validation_error(
                "TiledInference",
                "flipped output shape",
                &format!("{:?}", pred.dim()),
                &format!("{:?}", restored.dim()),
            ));
        }
        Ok((pred + restored).mapv(|v| v * 0.5))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::tensor::Tensor3D;

    /// Emits a constant one-hot score map matching the input size.
    #[derive(Debug)]
    struct ConstantModel {
        num_classes: usize,
        hot: usize,
    }

    impl SegmentationModel for ConstantModel {
        fn forward(&self, input: &Tensor4D) -> Result<Tensor4D, SegError> {
            let (n, _, h, w) = input.dim();
            let mut out = Tensor4D::zeros((n, self.num_classes, h, w));
            out.slice_mut(s![.., self.hot, .., ..]).fill(1.0);
            Ok(out)
        }
    }

    /// Echoes its input channels as class scores; output depends on
    /// the crop content, which exposes tiling mistakes.
    #[derive(Debug)]
    struct EchoModel;

    impl SegmentationModel for EchoModel {
        fn forward(&self, input: &Tensor4D) -> Result<Tensor4D, SegError> {
            Ok(input.clone())
        }
    }

    /// Always fails; used to check error propagation.
    #[derive(Debug)]
    struct FailingModel;

    impl SegmentationModel for FailingModel {
        fn forward(&self, _input: &Tensor4D) -> Result<Tensor4D, SegError> {
            Err(SegError::inference_error(std::io::Error::other(
                "model exploded",
            )))
        }
    }

    fn gradient_image(h: usize, w: usize) -> Tensor4D {
        let img = Tensor3D::from_shape_fn((h, w, 3), |(y, x, c)| {
            (y as f32 * 0.01 + x as f32 * 0.001 + c as f32).sin()
        });
        hwc_to_batch(&img)
    }

    #[test]
    fn test_rejects_bad_batch_and_scales() {
        let engine = TiledInference::new(2, (8, 8), 16).unwrap();
        let model = ConstantModel {
            num_classes: 2,
            hot: 0,
        };

        let two_batch = Tensor4D::zeros((2, 3, 16, 16));
        assert!(engine.infer(&model, &two_batch, &[1.0]).is_err());

        let image = gradient_image(16, 16);
        assert!(engine.infer(&model, &image, &[]).is_err());
        assert!(engine.infer(&model, &image, &[1.0, -0.5]).is_err());
        assert!(engine.infer(&model, &image, &[0.0]).is_err());
    }

    #[test]
    fn test_model_errors_propagate_unchanged() {
        let engine = TiledInference::new(2, (8, 8), 16).unwrap();
        let image = gradient_image(16, 16);
        let result = engine.infer(&FailingModel, &image, &[1.0]);
        assert!(matches!(result, Err(SegError::Inference(_))));
    }

    #[test]
    fn test_single_tile_equivalence() {
        // base_size 16 at scale 2.0 rescales the 8x16 source to 16x32,
        // exactly the crop size: the 1x1 tiled path must match a
        // direct single-crop call on the rescaled image.
        let engine = TiledInference::new(3, (16, 32), 16).unwrap();
        let image = gradient_image(8, 16);

        let tiled = engine.infer(&EchoModel, &image, &[2.0]).unwrap();

        let source = batch_to_hwc(&image).unwrap();
        let scaled = rescale_tensor(&source, 16, 2.0).unwrap();
        let direct = engine.single_crop(&EchoModel, &hwc_to_batch(&scaled)).unwrap();
        let direct = resize_bilinear(&direct, 8, 16, false);

        for (a, b) in tiled.iter().zip(direct.iter()) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn test_multi_scale_additivity() {
        let engine = TiledInference::new(3, (8, 8), 16).unwrap();
        let image = gradient_image(12, 16);
        let scales = [0.75, 1.0, 1.25];

        let combined = engine.infer(&EchoModel, &image, &scales).unwrap();
        let mut summed = Tensor4D::zeros(combined.dim());
        for &scale in &scales {
            summed += &engine.infer(&EchoModel, &image, &[scale]).unwrap();
        }

        for (a, b) in combined.iter().zip(summed.iter()) {
            assert!((a - b).abs() < 1e-5);
        }
    }

    #[test]
    fn test_repeated_scales_double_contribution() {
        let engine = TiledInference::new(3, (8, 8), 16).unwrap();
        let image = gradient_image(12, 16);

        let once = engine.infer(&EchoModel, &image, &[1.0]).unwrap();
        let twice = engine.infer(&EchoModel, &image, &[1.0, 1.0]).unwrap();

        for (a, b) in twice.iter().zip(once.iter()) {
            assert!((a - 2.0 * b).abs() < 1e-5);
        }
    }

    #[test]
    fn test_flip_averaging_is_identity_for_constant_model() {
        let plain = TiledInference::new(2, (8, 8), 16).unwrap();
        let flipped = TiledInference::new(2, (8, 8), 16).unwrap().with_flip(true);
        let model = ConstantModel {
            num_classes: 2,
            hot: 1,
        };
        let image = gradient_image(16, 16);

        let a = plain.infer(&model, &image, &[1.0, 1.5]).unwrap();
        let b = flipped.infer(&model, &image, &[1.0, 1.5]).unwrap();
        for (x, y) in a.iter().zip(b.iter()) {
            assert!((x - y).abs() < 1e-6);
        }
    }

    #[test]
    fn test_end_to_end_multi_scale() {
        // Full-size scenario: 1536x2048 source, scales [1.0, 1.5],
        // 512x1024 crops. Scale 1.5 tiles the 1728x2304 rescale into a
        // 4x3 grid with boundary overlap.
        let engine = TiledInference::new(2, (512, 1024), 1536).unwrap();
        let model = ConstantModel {
            num_classes: 2,
            hot: 0,
        };
        let image = gradient_image(1536, 2048);

        let pred = engine.infer(&model, &image, &[1.0, 1.5]).unwrap();
        assert_eq!(pred.dim(), (1, 2, 1536, 2048));
        assert!(pred.iter().all(|v| v.is_finite()));

        // Each scale contributes a constant 1.0 on the hot class, so
        // seams must be invisible: the hot channel is 2.0 everywhere
        // and the cold channel 0.0.
        for &v in pred.slice(s![0, 0, .., ..]).iter() {
            assert!((v - 2.0).abs() < 1e-4);
        }
        for &v in pred.slice(s![0, 1, .., ..]).iter() {
            assert!(v.abs() < 1e-4);
        }
    }
}
