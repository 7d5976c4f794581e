//! Utility functions for loading images and label rasters.

use std::path::Path;

use image::{GrayImage, RgbImage};

use crate::core::errors::SegError;
use crate::core::tensor::LabelMap;

/// Loads an image from a file path and converts it to an RgbImage.
///
/// # Errors
///
/// Returns `SegError::ImageLoad` if the file cannot be opened or
/// decoded.
pub fn load_image(path: &Path) -> Result<RgbImage, SegError> {
    let img = image::open(path).map_err(SegError::ImageLoad)?;
    Ok(img.to_rgb8())
}

/// Loads a single-channel 8-bit label raster into the signed label
/// domain.
///
/// Raster values are raw class IDs; remapping into training classes is
/// the caller's concern.
///
/// # Errors
///
/// Returns `SegError::ImageLoad` if the file cannot be opened or
/// decoded.
pub fn load_label(path: &Path) -> Result<LabelMap, SegError> {
    let img = image::open(path).map_err(SegError::ImageLoad)?;
    Ok(gray_to_label(&img.to_luma8()))
}

/// Converts an 8-bit grayscale raster into a label map.
pub fn gray_to_label(img: &GrayImage) -> LabelMap {
    let (width, height) = img.dimensions();
    LabelMap::from_shape_fn((height as usize, width as usize), |(y, x)| {
        img.get_pixel(x as u32, y as u32)[0] as i32
    })
}
