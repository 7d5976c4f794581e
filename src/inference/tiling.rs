//! Crop grid geometry and the overlapping-prediction accumulator.
//!
//! An upscaled image is covered by a grid of fixed-size crops with
//! stride equal to the crop size. The final row and column are clamped
//! to the image boundary and their start pulled back so every crop
//! keeps its nominal size; the resulting overlap is averaged out by a
//! per-pixel count buffer.

use ndarray::{s, Array2};

use crate::core::errors::SegError;
use crate::core::tensor::Tensor4D;

/// A crop rectangle in image coordinates, `[h0, h1) x [w0, w1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRegion {
    /// First row of the crop.
    pub h0: usize,
    /// One past the last row of the crop.
    pub h1: usize,
    /// First column of the crop.
    pub w0: usize,
    /// One past the last column of the crop.
    pub w1: usize,
}

impl CropRegion {
    /// The number of rows covered by the region.
    pub fn height(&self) -> usize {
        self.h1 - self.h0
    }

    /// The number of columns covered by the region.
    pub fn width(&self) -> usize {
        self.w1 - self.w0
    }
}

/// The grid of clamped crop rectangles covering an image.
///
/// `rows = ceil((h - crop_h) / stride_h) + 1` and likewise for
/// columns, with stride equal to crop size. Every pixel of the image
/// is covered by at least one region; regions are smaller than the
/// crop size only when the image itself is.
#[derive(Debug, Clone)]
pub struct CropGrid {
    img_h: usize,
    img_w: usize,
    crop_h: usize,
    crop_w: usize,
    rows: usize,
    cols: usize,
}

impl CropGrid {
    /// Builds the grid for an `img_h x img_w` image and the given crop
    /// size. Stride equals crop size.
    pub fn new(img_h: usize, img_w: usize, crop_h: usize, crop_w: usize) -> Self {
        let stride_h = crop_h;
        let stride_w = crop_w;
        let rows = img_h.saturating_sub(crop_h).div_ceil(stride_h) + 1;
        let cols = img_w.saturating_sub(crop_w).div_ceil(stride_w) + 1;
        Self {
            img_h,
            img_w,
            crop_h,
            crop_w,
            rows,
            cols,
        }
    }

    /// The number of grid rows.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// The number of grid columns.
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// The clamped crop rectangle for grid cell `(row, col)`.
    ///
    /// The end is clamped to the image boundary and the start pulled
    /// back so the crop keeps its nominal size; near the boundary this
    /// overlaps the neighboring cell.
    pub fn region(&self, row: usize, col: usize) -> CropRegion {
        let h1 = (row * self.crop_h + self.crop_h).min(self.img_h);
        let w1 = (col * self.crop_w + self.crop_w).min(self.img_w);
        let h0 = h1.saturating_sub(self.crop_h);
        let w0 = w1.saturating_sub(self.crop_w);
        CropRegion { h0, h1, w0, w1 }
    }

    /// Iterates over all grid regions in row-major order.
    pub fn regions(&self) -> impl Iterator<Item = CropRegion> + '_ {
        (0..self.rows).flat_map(move |r| (0..self.cols).map(move |c| self.region(r, c)))
    }
}

/// Additive buffers collecting overlapping crop predictions before
/// normalization.
///
/// Owned exclusively by the per-scale loop; `add` takes the exclusive
/// borrow and `into_averaged` consumes the accumulator, so partial
/// sums can never leak out.
#[derive(Debug)]
pub struct Accumulator {
    sum: Tensor4D,
    count: Array2<f32>,
}

impl Accumulator {
    /// Creates zeroed buffers for a `(1, num_classes, h, w)` sum and
    /// an `(h, w)` count.
    pub fn new(num_classes: usize, h: usize, w: usize) -> Self {
        Self {
            sum: Tensor4D::zeros((1, num_classes, h, w)),
            count: Array2::zeros((h, w)),
        }
    }

    /// Adds a crop prediction over `region` and bumps the count there.
    ///
    /// Only the valid `region.height() x region.width()` extent of the
    /// prediction is consumed, so crops truncated by a small image
    /// accumulate correctly.
    ///
    /// # Errors
    ///
    /// Returns an invalid-input error if the prediction batch is not 1,
    /// its class count differs from the accumulator, or its spatial
    /// extent is smaller than the region.
    pub fn add(&mut self, pred: &Tensor4D, region: &CropRegion) -> Result<(), SegError> {
        let (pn, pc, ph, pw) = pred.dim();
        let classes = self.sum.dim().1;
        if pn != 1 || pc != classes {
            return Err(SegError::validation_error(
                "Accumulator",
                "prediction shape",
                &format!("(1, {classes}, .., ..)"),
                &format!("({pn}, {pc}, {ph}, {pw})"),
            ));
        }
        let (rh, rw) = (region.height(), region.width());
        if ph < rh || pw < rw {
            return Err(SegError::validation_error(
                "Accumulator",
                "prediction extent",
                &format!("at least {rh}x{rw}"),
                &format!("{ph}x{pw}"),
            ));
        }

        let mut sum_region = self
            .sum
            .slice_mut(s![.., .., region.h0..region.h1, region.w0..region.w1]);
        sum_region += &pred.slice(s![.., .., 0..rh, 0..rw]);

        let mut count_region = self
            .count
            .slice_mut(s![region.h0..region.h1, region.w0..region.w1]);
        count_region += 1.0;

        Ok(())
    }

    /// A view of the per-pixel count buffer.
    pub fn count(&self) -> &Array2<f32> {
        &self.count
    }

    /// Divides the sum by the per-pixel count and returns the averaged
    /// prediction.
    ///
    /// A zero count cannot occur when the grid covered the full image;
    /// it is an internal invariant violation, not a recoverable
    /// condition.
    pub fn into_averaged(mut self) -> Tensor4D {
        debug_assert!(
            self.count.iter().all(|&c| c >= 1.0),
            "count accumulator has uncovered pixels"
        );
        let classes = self.sum.dim().1;
        for c in 0..classes {
            let mut plane = self.sum.slice_mut(s![0, c, .., ..]);
            plane /= &self.count;
        }
        self.sum
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Checks that the union of clamped regions covers the image and
    /// that the count buffer ends up >= 1 everywhere.
    fn assert_full_coverage(img_h: usize, img_w: usize, crop_h: usize, crop_w: usize) {
        let grid = CropGrid::new(img_h, img_w, crop_h, crop_w);
        let mut covered = Array2::<f32>::zeros((img_h, img_w));
        for region in grid.regions() {
            assert!(region.h1 <= img_h && region.w1 <= img_w);
            covered
                .slice_mut(s![region.h0..region.h1, region.w0..region.w1])
                .mapv_inplace(|v| v + 1.0);
        }
        assert!(
            covered.iter().all(|&v| v >= 1.0),
            "grid {img_h}x{img_w} crop {crop_h}x{crop_w} left uncovered pixels"
        );
    }

    #[test]
    fn test_grid_full_coverage() {
        assert_full_coverage(100, 100, 30, 30);
        assert_full_coverage(1728, 2304, 512, 1024);
        assert_full_coverage(31, 97, 30, 30);
        assert_full_coverage(512, 1024, 512, 1024);
        assert_full_coverage(513, 1025, 512, 1024);
    }

    #[test]
    fn test_exact_fit_yields_single_cell() {
        let grid = CropGrid::new(512, 1024, 512, 1024);
        assert_eq!((grid.rows(), grid.cols()), (1, 1));
        let region = grid.region(0, 0);
        assert_eq!(
            region,
            CropRegion {
                h0: 0,
                h1: 512,
                w0: 0,
                w1: 1024
            }
        );
    }

    #[test]
    fn test_boundary_cells_pull_back_to_full_size() {
        // 70 rows with 30-row crops: rows at 0, 30, and the last one
        // pulled back to 40 so it stays full size.
        let grid = CropGrid::new(70, 30, 30, 30);
        assert_eq!(grid.rows(), 3);
        assert_eq!(grid.region(2, 0).h0, 40);
        assert_eq!(grid.region(2, 0).height(), 30);
    }

    #[test]
    fn test_image_smaller_than_crop() {
        let grid = CropGrid::new(20, 10, 30, 30);
        assert_eq!((grid.rows(), grid.cols()), (1, 1));
        let region = grid.region(0, 0);
        assert_eq!((region.height(), region.width()), (20, 10));
    }

    #[test]
    fn test_accumulator_averages_overlap() {
        let mut acc = Accumulator::new(1, 4, 4);
        let pred = Tensor4D::from_elem((1, 1, 2, 4), 2.0);

        acc.add(
            &pred,
            &CropRegion {
                h0: 0,
                h1: 2,
                w0: 0,
                w1: 4,
            },
        )
        .unwrap();
        // Overlapping second region covering rows 1..3.
        acc.add(
            &pred,
            &CropRegion {
                h0: 1,
                h1: 3,
                w0: 0,
                w1: 4,
            },
        )
        .unwrap();
        acc.add(
            &pred,
            &CropRegion {
                h0: 2,
                h1: 4,
                w0: 0,
                w1: 4,
            },
        )
        .unwrap();

        assert_eq!(acc.count()[[0, 0]], 1.0);
        assert_eq!(acc.count()[[1, 0]], 2.0);
        let averaged = acc.into_averaged();
        // Uniform inputs average back to the same value everywhere.
        assert!(averaged.iter().all(|&v| (v - 2.0).abs() < 1e-6));
    }

    #[test]
    fn test_accumulator_uses_valid_extent_only() {
        let mut acc = Accumulator::new(2, 3, 3);
        // Prediction larger than the truncated region; only the first
        // 3x3 extent may be consumed.
        let pred = Tensor4D::from_shape_fn((1, 2, 4, 4), |(_, _, y, x)| (y * 4 + x) as f32);
        let region = CropRegion {
            h0: 0,
            h1: 3,
            w0: 0,
            w1: 3,
        };
        acc.add(&pred, &region).unwrap();
        let averaged = acc.into_averaged();
        assert_eq!(averaged[[0, 0, 2, 2]], 10.0);
    }

    #[test]
    fn test_accumulator_rejects_shape_mismatch() {
        let mut acc = Accumulator::new(3, 4, 4);
        let region = CropRegion {
            h0: 0,
            h1: 4,
            w0: 0,
            w1: 4,
        };
        // Wrong class count.
        let pred = Tensor4D::zeros((1, 2, 4, 4));
        assert!(acc.add(&pred, &region).is_err());
        // Batch size != 1.
        let pred = Tensor4D::zeros((2, 3, 4, 4));
        assert!(acc.add(&pred, &region).is_err());
        // Too small spatially.
        let pred = Tensor4D::zeros((1, 3, 2, 4));
        assert!(acc.add(&pred, &region).is_err());
    }
}
