//! Bilinear resampling of class-score tensors.
//!
//! Rasters are resized through the `image` crate; per-class score maps
//! need their own resampler because the corner-alignment convention
//! must match the one the model was trained with.

use crate::core::tensor::Tensor4D;

/// Resamples a `(n, c, h, w)` score tensor to `(out_h, out_w)` with
/// bilinear interpolation.
///
/// With `align_corners` the corner pixels of input and output map onto
/// each other exactly; without it, sample positions follow the
/// half-pixel-center convention. Returns a clone when the size already
/// matches.
pub fn resize_bilinear(
    input: &Tensor4D,
    out_h: usize,
    out_w: usize,
    align_corners: bool,
) -> Tensor4D {
    let (n, c, in_h, in_w) = input.dim();
    if (in_h, in_w) == (out_h, out_w) {
        return input.clone();
    }

    let coords = |out_len: usize, in_len: usize| -> Vec<(usize, usize, f32)> {
        (0..out_len)
            .map(|i| {
                let src = if align_corners {
                    if out_len > 1 {
                        i as f32 * (in_len - 1) as f32 / (out_len - 1) as f32
                    } else {
                        0.0
                    }
                } else {
                    ((i as f32 + 0.5) * in_len as f32 / out_len as f32 - 0.5).max(0.0)
                };
                let src = src.min((in_len - 1) as f32);
                let lo = src.floor() as usize;
                let hi = (lo + 1).min(in_len - 1);
                (lo, hi, src - lo as f32)
            })
            .collect()
    };

    let ys = coords(out_h, in_h);
    let xs = coords(out_w, in_w);

    let mut out = Tensor4D::zeros((n, c, out_h, out_w));
    for b in 0..n {
        for ch in 0..c {
            let plane = input.index_axis(ndarray::Axis(0), b);
            let plane = plane.index_axis(ndarray::Axis(0), ch);
            for (oy, &(y0, y1, fy)) in ys.iter().enumerate() {
                for (ox, &(x0, x1, fx)) in xs.iter().enumerate() {
                    let top = plane[[y0, x0]] * (1.0 - fx) + plane[[y0, x1]] * fx;
                    let bottom = plane[[y1, x0]] * (1.0 - fx) + plane[[y1, x1]] * fx;
                    out[[b, ch, oy, ox]] = top * (1.0 - fy) + bottom * fy;
                }
            }
        }
    }
    out
}
