use crate::config::BackendConfig;
use crate::error::report;
use crate::overlay::composite;
use crate::segmentation::{BackendState, Overlay, SegmentationHandle};
use ndarray::ArrayView3;

/// Per-frame instance segmentation overlay
///
/// Wraps a [`SegmentationHandle`] and turns its masks into a colored overlay
/// the size of the input frame. Every call is synchronous; pacing is up to
/// the caller.
pub struct OverlayEngine {
    handle: SegmentationHandle,
}

impl OverlayEngine {
    pub fn new(config: BackendConfig) -> Self {
        Self::from_handle(SegmentationHandle::new(config))
    }

    pub fn from_handle(handle: SegmentationHandle) -> Self {
        Self { handle }
    }

    pub fn is_enabled(&self) -> bool {
        self.handle.is_enabled()
    }

    pub fn state(&self) -> BackendState {
        self.handle.state()
    }

    pub fn handle(&self) -> &SegmentationHandle {
        &self.handle
    }

    /// Segment a normalized (H, W, 3) RGB frame and color each instance
    ///
    /// Returns `None` when there is nothing to show for this frame.
    pub fn segment_image(&mut self, frame: ArrayView3<'_, f32>) -> Option<Overlay> {
        let masks = self.handle.infer(frame)?;
        let (height, width, _) = frame.dim();

        match composite(&masks, height, width) {
            Ok(overlay) => Some(overlay),
            Err(e) => {
                tracing::warn!("Discarding segmentation result: {}", report(&e));
                None
            }
        }
    }
}
