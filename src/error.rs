//! Error types for easttext.

use thiserror::Error;

/// Result alias for easttext operations.
pub type Result<T> = std::result::Result<T, EastError>;

/// Errors raised while decoding, suppressing or running the detector.
#[derive(Debug, Error)]
pub enum EastError {
    /// Input grids or model outputs do not have the shape the decoder expects.
    #[error("dimension mismatch in {grid}: expected {expected:?}, found {found:?}")]
    DimensionMismatch {
        grid: &'static str,
        expected: Vec<usize>,
        found: Vec<usize>,
    },
    /// A threshold, stride or input size is out of range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    /// The model did not produce an output with the configured name.
    #[error("model output `{0}` is missing")]
    MissingOutput(String),
    #[error(transparent)]
    Runtime(#[from] ort::Error),
    #[error(transparent)]
    Image(#[from] image::ImageError),
}
