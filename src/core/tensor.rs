//! Tensor aliases and layout utilities.
//!
//! The pipeline keeps images in two layouts: `(height, width, channel)`
//! for image-space operations (rescaling, cropping) and channel-first
//! batched `(batch, channel, height, width)` for model calls. This
//! module provides the aliases and the shape-checked conversions
//! between them, plus the small tensor operations the inference engine
//! and the exporter are built from.

use ndarray::{s, Array2, ArrayView3, Axis};

use crate::core::errors::SegError;

/// A 2-dimensional tensor represented as a 2D array of f32 values.
pub type Tensor2D = ndarray::Array2<f32>;

/// A 3-dimensional tensor represented as a 3D array of f32 values.
pub type Tensor3D = ndarray::Array3<f32>;

/// A 4-dimensional tensor represented as a 4D array of f32 values.
pub type Tensor4D = ndarray::Array4<f32>;

/// A per-pixel label map over the signed class-ID domain.
///
/// Signed so the `-1` ignore sentinel is representable alongside raw
/// raster values.
pub type LabelMap = Array2<i32>;

/// Converts an `(h, w, 3)` image tensor into a `(1, 3, h, w)`
/// channel-first batch.
pub fn hwc_to_batch(img: &Tensor3D) -> Tensor4D {
    let (h, w, c) = img.dim();
    let chw = img.view().permuted_axes([2, 0, 1]);
    let mut out = Tensor4D::zeros((1, c, h, w));
    out.index_axis_mut(Axis(0), 0).assign(&chw);
    out
}

/// Converts a `(1, c, h, w)` channel-first batch into an `(h, w, c)`
/// image tensor.
///
/// # Errors
///
/// Returns `SegError::InvalidInput` if the batch dimension is not 1.
pub fn batch_to_hwc(batch: &Tensor4D) -> Result<Tensor3D, SegError> {
    let (n, c, h, w) = batch.dim();
    if n != 1 {
        return Err(SegError::invalid_input(format!(
            "expected batch size 1 for layout conversion, got {n}"
        )));
    }
    let hwc = batch
        .index_axis(Axis(0), 0)
        .permuted_axes([1, 2, 0])
        .to_owned();
    debug_assert_eq!(hwc.dim(), (h, w, c));
    Ok(hwc)
}

/// Flips a channel-first batch horizontally (reverses the width axis).
pub fn flip_horizontal(batch: &Tensor4D) -> Tensor4D {
    batch.slice(s![.., .., .., ..;-1]).to_owned()
}

/// Computes the per-pixel argmax over the class axis of a `(c, h, w)`
/// score map.
///
/// Ties resolve to the lowest class index, matching the usual
/// first-maximum convention.
pub fn argmax_classes(scores: ArrayView3<'_, f32>) -> LabelMap {
    let (classes, h, w) = scores.dim();
    let mut out = LabelMap::zeros((h, w));
    for y in 0..h {
        for x in 0..w {
            let mut best = 0usize;
            let mut best_score = scores[[0, y, x]];
            for c in 1..classes {
                let score = scores[[c, y, x]];
                if score > best_score {
                    best = c;
                    best_score = score;
                }
            }
            out[[y, x]] = best as i32;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    #[test]
    fn test_hwc_batch_round_trip() {
        let img = Array3::from_shape_fn((4, 6, 3), |(y, x, c)| (y * 100 + x * 10 + c) as f32);
        let batch = hwc_to_batch(&img);
        assert_eq!(batch.dim(), (1, 3, 4, 6));
        assert_eq!(batch[[0, 2, 1, 5]], img[[1, 5, 2]]);

        let back = batch_to_hwc(&batch).unwrap();
        assert_eq!(back, img);
    }

    #[test]
    fn test_batch_to_hwc_rejects_multi_batch() {
        let batch = Tensor4D::zeros((2, 3, 4, 4));
        assert!(batch_to_hwc(&batch).is_err());
    }

    #[test]
    fn test_flip_horizontal_reverses_width() {
        let batch = Tensor4D::from_shape_fn((1, 2, 2, 4), |(_, _, _, x)| x as f32);
        let flipped = flip_horizontal(&batch);
        assert_eq!(flipped[[0, 0, 0, 0]], 3.0);
        assert_eq!(flipped[[0, 1, 1, 3]], 0.0);
        assert_eq!(flip_horizontal(&flipped), batch);
    }

    #[test]
    fn test_argmax_classes_picks_highest() {
        let mut scores = Tensor3D::zeros((3, 2, 2));
        scores[[0, 0, 0]] = 1.0;
        scores[[2, 0, 1]] = 5.0;
        scores[[1, 1, 0]] = 0.5;
        let map = argmax_classes(scores.view());
        assert_eq!(map[[0, 0]], 0);
        assert_eq!(map[[0, 1]], 2);
        assert_eq!(map[[1, 0]], 1);
        // all-zero column ties resolve to class 0
        assert_eq!(map[[1, 1]], 0);
    }
}
