//! The core module of the segmentation pipeline.
//!
//! This module contains the fundamental components shared by the
//! dataset adapter and the inference engine:
//! - Constants used throughout the pipeline
//! - Error handling
//! - Tensor aliases and layout utilities
//! - Traits defining consumed capabilities
//!
//! It also provides re-exports of commonly used types for convenience.

pub mod constants;
pub mod errors;
pub mod tensor;
pub mod traits;

pub use constants::*;
pub use errors::{ProcessingStage, SegError, SegResult};
pub use tensor::{LabelMap, Tensor2D, Tensor3D, Tensor4D};
pub use traits::SegmentationModel;

/// Initializes the tracing subscriber for logging.
///
/// Sets up the tracing subscriber with environment filter and
/// formatting layer. Typically called once at application start.
pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();
}
