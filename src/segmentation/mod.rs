#[cfg(feature = "fastsam")]
mod fastsam;
mod handle;
mod preprocess;
#[cfg(test)]
pub(crate) mod testing;
pub mod types;

#[cfg(feature = "fastsam")]
pub use fastsam::FastSam;
pub use handle::{BackendState, DisableReason, SegmentationHandle};
pub use preprocess::{frame_to_rgb8, overlay_to_rgb8, rgb8_to_frame, Letterbox, Preprocessor};
pub use types::{Frame, InferenceParams, Mask, NoopBackend, Overlay, SegmentationBackend};

use crate::config::BackendConfig;
use crate::error::SegmentationError;

/// Whether a real segmentation backend was compiled into this build
pub fn backend_available() -> bool {
    cfg!(feature = "fastsam")
}

/// Construct the segmentation backend described by `config`
///
/// Runs once per handle; callers fall back to [`NoopBackend`] on error.
pub fn load_backend(
    config: &BackendConfig,
) -> Result<Box<dyn SegmentationBackend>, SegmentationError> {
    #[cfg(feature = "fastsam")]
    {
        let model = FastSam::new(&config.model, config.target).map_err(|e| {
            SegmentationError::LoadFailed {
                model: config.model.display().to_string(),
                source: e.into(),
            }
        })?;
        Ok(Box::new(model))
    }

    #[cfg(not(feature = "fastsam"))]
    {
        let _ = config;
        Err(SegmentationError::BackendUnavailable)
    }
}
