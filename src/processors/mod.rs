//! Image processing utilities for the segmentation pipeline.
//!
//! - [`normalization`] converts 8-bit RGB images into normalized f32
//!   tensors.
//! - [`scale`] implements long-side rescaling and the random
//!   scale/crop/flip training augmentation.
//! - [`interpolate`] resamples class-score tensors bilinearly.

pub mod interpolate;
pub mod normalization;
pub mod scale;

pub use interpolate::resize_bilinear;
pub use normalization::NormalizeImage;
pub use scale::{
    long_side_dims, rescale_image, rescale_tensor, resize_label_nearest, ScaleAugment,
};
