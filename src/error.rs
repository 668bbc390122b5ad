use thiserror::Error;

pub(crate) type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failures inside the overlay engine
///
/// None of these reach the per-frame caller: the handle and engine log them
/// and degrade to "no overlay".
#[derive(Debug, Error)]
pub enum SegmentationError {
    #[error("segmentation backend is not available in this build")]
    BackendUnavailable,

    #[error("failed to load segmentation model {model}")]
    LoadFailed {
        model: String,
        #[source]
        source: BoxError,
    },

    #[error("segmentation inference failed")]
    InferenceFailed(#[source] BoxError),

    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    #[error("mask {index} has shape {actual:?}, expected {expected:?}")]
    MaskShape {
        index: usize,
        expected: (usize, usize),
        actual: (usize, usize),
    },
}

/// Render an error and its chain of sources on one line
pub fn report(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
