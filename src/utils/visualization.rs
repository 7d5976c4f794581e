//! Prediction export as palette-indexed rasters.
//!
//! Each sample's score map is reduced to a per-pixel class map,
//! remapped back into the raw label domain, and written as an indexed
//! PNG colored by the deterministic palette. Files are written to a
//! temporary path and renamed into place, so a failed export never
//! leaves a partially-written raster behind.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;

use ndarray::Axis;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::core::constants::{DEFAULT_PARALLEL_THRESHOLD, PALETTE_SIZE};
use crate::core::errors::SegError;
use crate::core::tensor::{argmax_classes, Tensor4D};
use crate::dataset::label_map::LabelMapping;
use crate::utils::palette::generate_palette;

/// Exports a batch of predictions as palette-indexed PNG rasters.
///
/// # Arguments
///
/// * `predictions` - Score tensor `(n, num_classes, h, w)`.
/// * `mapping` - Applied in inverse mode to map training classes back
///   to raw label IDs before serialization.
/// * `out_dir` - Target directory, created if missing.
/// * `names` - One file stem per sample; must match the batch size.
///
/// # Errors
///
/// Returns `InvalidInput` on a name/batch length mismatch and
/// propagates I/O or encoding failures. On failure the target file is
/// untouched.
pub fn save_predictions(
    predictions: &Tensor4D,
    mapping: &LabelMapping,
    out_dir: &Path,
    names: &[String],
) -> Result<(), SegError> {
    let batch = predictions.dim().0;
    if names.len() != batch {
        return Err(SegError::validation_error(
            "save_predictions",
            "names",
            &format!("{batch} names"),
            &names.len().to_string(),
        ));
    }

    fs::create_dir_all(out_dir)?;
    let palette = generate_palette(PALETTE_SIZE);

    let save_one = |index: usize| -> Result<(), SegError> {
        let scores = predictions.index_axis(Axis(0), index);
        let class_map = argmax_classes(scores);
        let raw = mapping.convert(&class_map, true);
        // Truncating to u8 sends the -1 sentinel to raster code 255.
        let data: Vec<u8> = raw.iter().map(|&v| v as u8).collect();
        let (h, w) = raw.dim();

        let final_path = out_dir.join(format!("{}.png", names[index]));
        let tmp_path = out_dir.join(format!("{}.png.tmp", names[index]));
        let result = write_indexed_png(&tmp_path, &data, w as u32, h as u32, &palette)
            .and_then(|()| fs::rename(&tmp_path, &final_path).map_err(SegError::Io));
        match &result {
            Ok(()) => debug!(name = %names[index], path = %final_path.display(), "saved prediction"),
            Err(_) => {
                let _ = fs::remove_file(&tmp_path);
            }
        }
        result
    };

    if batch > DEFAULT_PARALLEL_THRESHOLD {
        (0..batch)
            .into_par_iter()
            .try_for_each(save_one)?;
    } else {
        (0..batch).try_for_each(save_one)?;
    }

    info!(count = batch, dir = %out_dir.display(), "exported predictions");
    Ok(())
}

fn write_indexed_png(
    path: &Path,
    data: &[u8],
    width: u32,
    height: u32,
    palette: &[u8],
) -> Result<(), SegError> {
    let file = File::create(path)?;
    let mut encoder = png::Encoder::new(BufWriter::new(file), width, height);
    encoder.set_color(png::ColorType::Indexed);
    encoder.set_depth(png::BitDepth::Eight);
    encoder.set_palette(palette.to_vec());
    let mut writer = encoder.write_header()?;
    writer.write_image_data(data)?;
    writer.finish()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::s;

    fn one_hot_predictions() -> Tensor4D {
        // Class 1 wins on the left half, class 0 on the right.
        let mut preds = Tensor4D::zeros((1, 2, 4, 6));
        preds.slice_mut(s![0, 1, .., 0..3]).fill(5.0);
        preds.slice_mut(s![0, 0, .., 3..6]).fill(5.0);
        preds
    }

    #[test]
    fn test_export_writes_indexed_raster() {
        let tmp = tempfile::tempdir().unwrap();
        let mapping = LabelMapping::with_pairs(255, [(10, 0), (20, 1)]);
        let preds = one_hot_predictions();

        save_predictions(&preds, &mapping, tmp.path(), &["frame".to_string()]).unwrap();

        let path = tmp.path().join("frame.png");
        let decoder = png::Decoder::new(File::open(&path).unwrap());
        let mut reader = decoder.read_info().unwrap();
        let info = reader.info();
        assert_eq!(info.color_type, png::ColorType::Indexed);
        assert_eq!(
            info.palette.as_deref(),
            Some(generate_palette(PALETTE_SIZE).as_slice())
        );

        let mut buf = vec![0u8; reader.output_buffer_size()];
        let frame = reader.next_frame(&mut buf).unwrap();
        let pixels = &buf[..frame.buffer_size()];
        // Inverse mapping restores raw IDs: class 1 -> 20, class 0 -> 10.
        assert_eq!(pixels[0], 20);
        assert_eq!(pixels[5], 10);
    }

    #[test]
    fn test_export_leaves_no_temp_files() {
        let tmp = tempfile::tempdir().unwrap();
        let mapping = LabelMapping::new(255);
        let preds = one_hot_predictions();

        save_predictions(&preds, &mapping, tmp.path(), &["a".to_string()]).unwrap();

        let leftovers: Vec<_> = fs::read_dir(tmp.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_name_count_mismatch_is_error() {
        let tmp = tempfile::tempdir().unwrap();
        let mapping = LabelMapping::new(255);
        let preds = one_hot_predictions();

        let result = save_predictions(&preds, &mapping, tmp.path(), &[]);
        assert!(matches!(result, Err(SegError::InvalidInput { .. })));
    }

    #[test]
    fn test_ignore_label_round_trips_to_255() {
        let tmp = tempfile::tempdir().unwrap();
        // Training class 0 is the ignore class here; inverse maps it to
        // -1, which truncates to raster code 255.
        let mapping = LabelMapping::new(0);
        let mut preds = Tensor4D::zeros((1, 2, 2, 2));
        preds.slice_mut(s![0, 0, .., ..]).fill(1.0);

        save_predictions(&preds, &mapping, tmp.path(), &["sentinel".to_string()]).unwrap();

        let decoder = png::Decoder::new(File::open(tmp.path().join("sentinel.png")).unwrap());
        let mut reader = decoder.read_info().unwrap();
        let mut buf = vec![0u8; reader.output_buffer_size()];
        let frame = reader.next_frame(&mut buf).unwrap();
        assert!(buf[..frame.buffer_size()].iter().all(|&v| v == 255));
    }
}
