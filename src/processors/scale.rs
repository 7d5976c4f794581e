//! Image rescaling and the random scale/crop/flip augmentation.
//!
//! All rescaling in the pipeline resizes the *long* side of the image
//! to `round(base_size * scale)`, preserving aspect ratio, with
//! bilinear sampling. The inference engine uses the deterministic
//! rescale; training additionally draws a random scale, pads to crop
//! size, and takes a random window.

use image::{imageops, Rgb32FImage, RgbImage};
use ndarray::s;
use rand::Rng;

use crate::core::errors::SegError;
use crate::core::tensor::{LabelMap, Tensor3D};

/// Computes the rescaled `(height, width)` for a long-side resize.
///
/// The long side becomes `round(base_size * scale)`; the short side is
/// scaled to preserve the aspect ratio. Both dimensions are kept at
/// least 1.
pub fn long_side_dims(height: u32, width: u32, base_size: u32, scale: f64) -> (u32, u32) {
    let long_size = (base_size as f64 * scale + 0.5) as u32;
    let (new_h, new_w) = if height > width {
        let new_w = (width as f64 * long_size as f64 / height as f64 + 0.5) as u32;
        (long_size, new_w)
    } else {
        let new_h = (height as f64 * long_size as f64 / width as f64 + 0.5) as u32;
        (new_h, long_size)
    };
    (new_h.max(1), new_w.max(1))
}

/// Rescales a normalized `(h, w, 3)` f32 tensor by `scale`, long side
/// relative to `base_size`, bilinear.
///
/// # Errors
///
/// Returns a resize error if the tensor cannot be round-tripped
/// through the raster buffer (shape mismatch).
pub fn rescale_tensor(img: &Tensor3D, base_size: u32, scale: f64) -> Result<Tensor3D, SegError> {
    let (h, w, channels) = img.dim();
    if channels != 3 {
        return Err(SegError::invalid_input(format!(
            "expected 3 channels for rescale, got {channels}"
        )));
    }
    let (new_h, new_w) = long_side_dims(h as u32, w as u32, base_size, scale);
    if (new_h as usize, new_w as usize) == (h, w) {
        return Ok(img.clone());
    }

    let data: Vec<f32> = img.iter().copied().collect();
    let buffer = Rgb32FImage::from_raw(w as u32, h as u32, data).ok_or_else(|| {
        SegError::invalid_input("image tensor does not match its stated dimensions")
    })?;
    let resized = imageops::resize(&buffer, new_w, new_h, imageops::FilterType::Triangle);

    Tensor3D::from_shape_vec((new_h as usize, new_w as usize, 3), resized.into_raw())
        .map_err(|e| SegError::resize_error("rescaled tensor reassembly", e))
}

/// Rescales an 8-bit RGB image by `scale`, long side relative to
/// `base_size`, bilinear.
pub fn rescale_image(img: &RgbImage, base_size: u32, scale: f64) -> RgbImage {
    let (w, h) = img.dimensions();
    let (new_h, new_w) = long_side_dims(h, w, base_size, scale);
    if (new_h, new_w) == (h, w) {
        return img.clone();
    }
    imageops::resize(img, new_w, new_h, imageops::FilterType::Triangle)
}

/// Resizes a label map with nearest-neighbor sampling.
pub fn resize_label_nearest(label: &LabelMap, new_h: usize, new_w: usize) -> LabelMap {
    let (h, w) = label.dim();
    LabelMap::from_shape_fn((new_h, new_w), |(y, x)| {
        let sy = (y * h / new_h).min(h - 1);
        let sx = (x * w / new_w).min(w - 1);
        label[[sy, sx]]
    })
}

/// Random scale/crop/flip augmentation for training samples.
///
/// Holds the geometry parameters; randomness always comes from the
/// caller-supplied RNG so seeded runs are reproducible.
#[derive(Debug, Clone)]
pub struct ScaleAugment {
    base_size: u32,
    crop_size: (usize, usize),
    scale_factor: u32,
    ignore_label: i32,
}

impl ScaleAugment {
    /// Creates a new augmentation with the given geometry.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the base size or either crop
    /// dimension is zero.
    pub fn new(
        base_size: u32,
        crop_size: (usize, usize),
        scale_factor: u32,
        ignore_label: i32,
    ) -> Result<Self, SegError> {
        if base_size == 0 {
            return Err(SegError::config_error("base_size must be greater than 0"));
        }
        if crop_size.0 == 0 || crop_size.1 == 0 {
            return Err(SegError::config_error(format!(
                "crop_size dimensions must be greater than 0, got {}x{}",
                crop_size.0, crop_size.1
            )));
        }
        Ok(Self {
            base_size,
            crop_size,
            scale_factor,
            ignore_label,
        })
    }

    /// The crop size (height, width).
    pub fn crop_size(&self) -> (usize, usize) {
        self.crop_size
    }

    /// Draws a training scale from `0.5 + k / 10` for
    /// `k in 0..=scale_factor`.
    pub fn random_scale<R: Rng>(&self, rng: &mut R) -> f64 {
        0.5 + rng.gen_range(0..=self.scale_factor) as f64 / 10.0
    }

    /// Rescales by a random factor, pads to at least crop size, and
    /// takes a random crop window of image and label together.
    ///
    /// The image is padded with zeros and the label with the ignore
    /// code, so padding never contributes to the loss.
    pub fn random_scale_crop<R: Rng>(
        &self,
        image: &RgbImage,
        label: &LabelMap,
        rng: &mut R,
    ) -> (RgbImage, LabelMap) {
        let scale = self.random_scale(rng);
        let scaled_image = rescale_image(image, self.base_size, scale);
        let (new_w, new_h) = scaled_image.dimensions();
        let scaled_label = resize_label_nearest(label, new_h as usize, new_w as usize);

        let (padded_image, padded_label) = self.pad_to_crop(&scaled_image, &scaled_label);
        let (h, w) = padded_label.dim();
        let (crop_h, crop_w) = self.crop_size;

        let y = rng.gen_range(0..=h - crop_h);
        let x = rng.gen_range(0..=w - crop_w);

        let cropped_image = imageops::crop_imm(
            &padded_image,
            x as u32,
            y as u32,
            crop_w as u32,
            crop_h as u32,
        )
        .to_image();
        let cropped_label = padded_label
            .slice(s![y..y + crop_h, x..x + crop_w])
            .to_owned();

        (cropped_image, cropped_label)
    }

    /// Flips a channel-first `(3, h, w)` image tensor and its label
    /// horizontally with probability 1/2.
    pub fn random_flip<R: Rng>(
        &self,
        image: Tensor3D,
        label: LabelMap,
        rng: &mut R,
    ) -> (Tensor3D, LabelMap) {
        if rng.gen_bool(0.5) {
            (
                image.slice(s![.., .., ..;-1]).to_owned(),
                label.slice(s![.., ..;-1]).to_owned(),
            )
        } else {
            (image, label)
        }
    }

    fn pad_to_crop(&self, image: &RgbImage, label: &LabelMap) -> (RgbImage, LabelMap) {
        let (crop_h, crop_w) = self.crop_size;
        let (h, w) = label.dim();
        let pad_h = h.max(crop_h);
        let pad_w = w.max(crop_w);
        if (pad_h, pad_w) == (h, w) {
            return (image.clone(), label.clone());
        }

        let mut padded_image = RgbImage::new(pad_w as u32, pad_h as u32);
        imageops::overlay(&mut padded_image, image, 0, 0);

        let mut padded_label = LabelMap::from_elem((pad_h, pad_w), self.ignore_label);
        padded_label.slice_mut(s![..h, ..w]).assign(label);

        (padded_image, padded_label)
    }
}
