//! Bidirectional mapping between raw label IDs and training class IDs.
//!
//! Ground-truth rasters store raw class IDs; models consume a remapped,
//! contiguous training-class space. `LabelMapping` rewrites label maps
//! in either direction and always carries the `-1 -> ignore` sentinel
//! entry.

use ndarray::Zip;

use crate::core::tensor::LabelMap;

/// An ordered mapping from raw label values to training class values.
///
/// Rules are applied against a fixed snapshot of the input, so
/// overlapping domains and codomains never cascade: a pixel is
/// rewritten according to its original value only. When several rules
/// share the same source value, the last one wins, matching insertion
/// order.
#[derive(Debug, Clone)]
pub struct LabelMapping {
    pairs: Vec<(i32, i32)>,
    ignore_label: i32,
}

impl LabelMapping {
    /// Creates a mapping containing only the `-1 -> ignore_label`
    /// sentinel entry.
    pub fn new(ignore_label: i32) -> Self {
        Self {
            pairs: vec![(-1, ignore_label)],
            ignore_label,
        }
    }

    /// Creates a mapping with the sentinel entry plus the given
    /// `(raw, training)` pairs.
    pub fn with_pairs(ignore_label: i32, pairs: impl IntoIterator<Item = (i32, i32)>) -> Self {
        let mut mapping = Self::new(ignore_label);
        mapping.pairs.extend(pairs);
        mapping
    }

    /// Appends a `(raw, training)` rule.
    pub fn insert(&mut self, raw: i32, training: i32) {
        self.pairs.push((raw, training));
    }

    /// The sentinel class ID excluded from loss and metrics.
    pub fn ignore_label(&self) -> i32 {
        self.ignore_label
    }

    /// The `(raw, training)` pairs in application order.
    pub fn pairs(&self) -> &[(i32, i32)] {
        &self.pairs
    }

    /// Rewrites a label map between the raw and training domains.
    ///
    /// Forward (`inverse == false`) rewrites every pixel equal to a
    /// `raw` key to its `training` value; inverse rewrites `training`
    /// values back to their `raw` keys. Pixels without a matching rule
    /// pass through unchanged in either direction.
    ///
    /// The input is never mutated; the rewritten map is returned as a
    /// new array.
    pub fn convert(&self, label: &LabelMap, inverse: bool) -> LabelMap {
        let mut out = label.clone();
        for &(raw, training) in &self.pairs {
            let (from, to) = if inverse { (training, raw) } else { (raw, training) };
            // Match against the untouched input, not the buffer being
            // rewritten.
            Zip::from(&mut out).and(label).for_each(|o, &original| {
                if original == from {
                    *o = to;
                }
            });
        }
        out
    }
}
