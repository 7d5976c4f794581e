//! Traits defining the capabilities the pipeline consumes.

use std::fmt::Debug;

use crate::core::errors::SegError;
use crate::core::tensor::Tensor4D;

/// A trained segmentation model capable of single-crop inference.
///
/// The tiled inference engine is generic over this trait: it never
/// touches a compute backend directly, so device residency and
/// execution-provider concerns live entirely inside implementations.
/// The model is treated as a pure function of its input batch.
///
/// Implementations receive a channel-first batch `(n, 3, h, w)` and
/// return per-class scores `(n, num_classes, h', w')`. The output
/// spatial size may exceed the input size when the model pads
/// internally; the engine crops the excess.
pub trait SegmentationModel: Send + Sync + Debug {
    /// Runs the model on a normalized channel-first batch.
    ///
    /// # Arguments
    ///
    /// * `input` - Batch tensor of shape `(n, 3, h, w)`.
    ///
    /// # Returns
    ///
    /// * `Ok(Tensor4D)` - Score tensor of shape `(n, num_classes, h', w')`
    ///   with `h' >= h` and `w' >= w`.
    /// * `Err(SegError)` - If inference fails; the engine propagates
    ///   this unchanged, without retrying.
    fn forward(&self, input: &Tensor4D) -> Result<Tensor4D, SegError>;
}
