//! Sample enumeration from a dataset manifest.
//!
//! A manifest is a plain text file with one sample per line; the first
//! whitespace-delimited token of each line is an image path relative to
//! the dataset root, and any remaining tokens are ignored. The index
//! resolves those paths and, in train mode, derives the matching label
//! raster path.

use std::ffi::OsStr;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Component, Path, PathBuf};

use tracing::debug;

use crate::core::constants::{IMAGE_DIR_SEGMENT, LABEL_DIR_SEGMENT, LABEL_EXTENSION};
use crate::core::errors::SegError;

/// A single dataset entry resolved from a manifest line.
///
/// Immutable after construction. Test-mode samples carry no label
/// path.
#[derive(Debug, Clone)]
pub struct Sample {
    /// Absolute (root-joined) path to the input image.
    pub image_path: PathBuf,
    /// Path to the ground-truth label raster; `None` in test mode.
    pub label_path: Option<PathBuf>,
    /// Image filename without directory or extension.
    pub name: String,
    /// Per-sample weight.
    pub weight: f32,
}

/// Whether an index enumerates train-mode or test-mode samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexMode {
    /// Image + label pairs; label files must exist.
    Train,
    /// Image-only entries.
    Test,
}

/// Derives the default label path for an image path.
///
/// Replaces every `images` path segment with `labels-mask` and forces
/// the label raster extension. This is the conventional layout of the
/// dataset; pass a custom strategy to
/// [`SampleIndex::from_manifest_with`] for other layouts.
pub fn default_label_path(image_path: &Path) -> PathBuf {
    let mapped: PathBuf = image_path
        .components()
        .map(|component| match component {
            Component::Normal(segment) if segment == OsStr::new(IMAGE_DIR_SEGMENT) => {
                Component::Normal(OsStr::new(LABEL_DIR_SEGMENT))
            }
            other => other,
        })
        .collect();
    mapped.with_extension(LABEL_EXTENSION)
}

/// A positional index of dataset samples built from a manifest file.
#[derive(Debug, Clone)]
pub struct SampleIndex {
    samples: Vec<Sample>,
    mode: IndexMode,
}

impl SampleIndex {
    /// Builds an index using the default label path derivation.
    ///
    /// # Arguments
    ///
    /// * `root` - Dataset root directory; manifest paths are joined to
    ///   it.
    /// * `manifest_path` - Path to the manifest file.
    /// * `mode` - Train (image + label) or test (image only).
    /// * `limit` - Truncate to the first N samples; `None` keeps all.
    ///
    /// # Errors
    ///
    /// Returns `SegError::Io` if the manifest cannot be read or, in
    /// train mode, if a derived label file does not exist.
    pub fn from_manifest(
        root: &Path,
        manifest_path: &Path,
        mode: IndexMode,
        limit: Option<usize>,
    ) -> Result<Self, SegError> {
        Self::from_manifest_with(root, manifest_path, mode, limit, default_label_path)
    }

    /// Builds an index with a custom label path derivation strategy.
    ///
    /// The strategy receives the root-joined image path and returns the
    /// corresponding label raster path. See [`default_label_path`] for
    /// the conventional one.
    pub fn from_manifest_with<F>(
        root: &Path,
        manifest_path: &Path,
        mode: IndexMode,
        limit: Option<usize>,
        derive_label: F,
    ) -> Result<Self, SegError>
    where
        F: Fn(&Path) -> PathBuf,
    {
        let file = File::open(manifest_path)?;
        let reader = BufReader::new(file);

        let mut samples = Vec::new();
        for line in reader.lines() {
            if let Some(max) = limit {
                if samples.len() >= max {
                    break;
                }
            }

            let line = line?;
            let Some(relative) = line.split_whitespace().next() else {
                continue;
            };
            let image_path = root.join(relative);

            let sample = match mode {
                IndexMode::Test => {
                    let name = file_stem(&image_path)?;
                    Sample {
                        image_path,
                        label_path: None,
                        name,
                        weight: 1.0,
                    }
                }
                IndexMode::Train => {
                    let label_path = derive_label(&image_path);
                    if !label_path.is_file() {
                        return Err(SegError::Io(io::Error::new(
                            io::ErrorKind::NotFound,
                            format!("label raster not found: {}", label_path.display()),
                        )));
                    }
                    let name = file_stem(&label_path)?;
                    Sample {
                        image_path,
                        label_path: Some(label_path),
                        name,
                        weight: 1.0,
                    }
                }
            };
            samples.push(sample);
        }

        debug!(
            count = samples.len(),
            mode = ?mode,
            manifest = %manifest_path.display(),
            "built sample index"
        );

        Ok(Self { samples, mode })
    }

    /// The number of samples in the index.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the index holds no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// The mode the index was built in.
    pub fn mode(&self) -> IndexMode {
        self.mode
    }

    /// Positional lookup.
    pub fn get(&self, index: usize) -> Option<&Sample> {
        self.samples.get(index)
    }

    /// Iterates over the samples in manifest order.
    pub fn iter(&self) -> impl Iterator<Item = &Sample> {
        self.samples.iter()
    }
}

fn file_stem(path: &Path) -> Result<String, SegError> {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .ok_or_else(|| {
            SegError::invalid_input(format!("path has no file name: {}", path.display()))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_manifest(dir: &Path, lines: &[&str]) -> PathBuf {
        let path = dir.join("list.txt");
        fs::write(&path, lines.join("\n")).unwrap();
        path
    }

    #[test]
    fn test_default_label_path_swaps_segment_and_extension() {
        let derived = default_label_path(Path::new("/data/images/city/0001.jpg"));
        assert_eq!(derived, PathBuf::from("/data/labels-mask/city/0001.png"));
    }

    #[test]
    fn test_test_mode_requires_no_label_file() {
        let tmp = tempfile::tempdir().unwrap();
        let manifest = write_manifest(tmp.path(), &["images/a.jpg", "images/b.jpg extra tokens"]);

        let index =
            SampleIndex::from_manifest(tmp.path(), &manifest, IndexMode::Test, None).unwrap();
        assert_eq!(index.len(), 2);

        let sample = index.get(0).unwrap();
        assert_eq!(sample.name, "a");
        assert!(sample.label_path.is_none());
        assert_eq!(sample.image_path, tmp.path().join("images/a.jpg"));

        // Extra whitespace-delimited tokens are ignored.
        assert_eq!(index.get(1).unwrap().name, "b");
    }

    #[test]
    fn test_train_mode_derives_and_validates_label_path() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("images")).unwrap();
        fs::create_dir_all(tmp.path().join("labels-mask")).unwrap();
        fs::write(tmp.path().join("images/a.jpg"), b"").unwrap();
        fs::write(tmp.path().join("labels-mask/a.png"), b"").unwrap();
        let manifest = write_manifest(tmp.path(), &["images/a.jpg"]);

        let index =
            SampleIndex::from_manifest(tmp.path(), &manifest, IndexMode::Train, None).unwrap();
        let sample = index.get(0).unwrap();
        let label = sample.label_path.as_ref().unwrap();
        assert!(label.to_string_lossy().contains("labels-mask"));
        assert!(label.extension().is_some_and(|ext| ext == "png"));
        assert_eq!(sample.weight, 1.0);
    }

    #[test]
    fn test_train_mode_missing_label_is_hard_error() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("images")).unwrap();
        fs::write(tmp.path().join("images/a.jpg"), b"").unwrap();
        let manifest = write_manifest(tmp.path(), &["images/a.jpg"]);

        let result = SampleIndex::from_manifest(tmp.path(), &manifest, IndexMode::Train, None);
        assert!(matches!(result, Err(SegError::Io(_))));
    }

    #[test]
    fn test_limit_truncates_index() {
        let tmp = tempfile::tempdir().unwrap();
        let manifest = write_manifest(
            tmp.path(),
            &["images/a.jpg", "images/b.jpg", "images/c.jpg"],
        );

        let index =
            SampleIndex::from_manifest(tmp.path(), &manifest, IndexMode::Test, Some(2)).unwrap();
        assert_eq!(index.len(), 2);
        assert!(index.get(2).is_none());

        let unlimited =
            SampleIndex::from_manifest(tmp.path(), &manifest, IndexMode::Test, None).unwrap();
        assert_eq!(unlimited.len(), 3);
    }

    #[test]
    fn test_blank_lines_are_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        let manifest = write_manifest(tmp.path(), &["images/a.jpg", "", "   ", "images/b.jpg"]);

        let index =
            SampleIndex::from_manifest(tmp.path(), &manifest, IndexMode::Test, None).unwrap();
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_custom_label_strategy() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("imgs")).unwrap();
        fs::write(tmp.path().join("imgs/a.jpg"), b"").unwrap();
        fs::write(tmp.path().join("imgs/a_gt.png"), b"").unwrap();
        let manifest = write_manifest(tmp.path(), &["imgs/a.jpg"]);

        let index = SampleIndex::from_manifest_with(
            tmp.path(),
            &manifest,
            IndexMode::Train,
            None,
            |image_path| {
                let stem = image_path.file_stem().unwrap().to_string_lossy();
                image_path.with_file_name(format!("{stem}_gt.png"))
            },
        )
        .unwrap();
        assert_eq!(
            index.get(0).unwrap().label_path.as_deref(),
            Some(tmp.path().join("imgs/a_gt.png").as_path())
        );
    }
}
