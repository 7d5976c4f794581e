//! Utility functions for images, palettes, and prediction export.

pub mod image;
pub mod palette;
pub mod visualization;

pub use image::{gray_to_label, load_image, load_label};
pub use palette::generate_palette;
pub use visualization::save_predictions;
