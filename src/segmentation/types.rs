use anyhow::Result;
use image::RgbImage;
use ndarray::{Array2, Array3};

/// Normalized RGB frame: shape (H, W, 3), values 0.0-1.0
pub type Frame = Array3<f32>;

/// Instance mask: shape (H, W), true where the pixel belongs to the instance
pub type Mask = Array2<bool>;

/// Colored overlay: shape (H, W, 3), values 0.0-1.0
pub type Overlay = Array3<f32>;

/// Parameters handed to the backend on every call
#[derive(Clone, Debug, PartialEq)]
pub struct InferenceParams {
    /// Produce masks at the original frame resolution
    pub retina_masks: bool,
    /// Square network input size in pixels
    pub image_size: u32,
    /// Minimum detection confidence
    pub conf_threshold: f32,
    /// IoU above which overlapping detections are suppressed
    pub iou_threshold: f32,
    /// Upper bound on masks returned per frame
    pub max_detections: usize,
    /// Return every instance instead of prompting with boxes or points
    pub everything: bool,
}

impl Default for InferenceParams {
    fn default() -> Self {
        Self {
            retina_masks: true,
            image_size: 512,
            conf_threshold: 0.4,
            iou_threshold: 0.9,
            max_detections: 300,
            everything: true,
        }
    }
}

/// Trait for instance segmentation backends
/// Allows swapping the real network for a no-op or a test double
pub trait SegmentationBackend: Send {
    /// Segment an 8-bit RGB image
    ///
    /// # Returns
    /// * One mask per detected instance, each with the image's (height, width),
    ///   ordered by the backend's detection priority
    fn segment(&mut self, image: &RgbImage, params: &InferenceParams) -> Result<Vec<Mask>>;

    /// Short name used in log messages
    fn name(&self) -> &'static str;
}

/// Backend installed when the real one cannot be constructed
#[derive(Debug, Default)]
pub struct NoopBackend;

impl SegmentationBackend for NoopBackend {
    fn segment(&mut self, _image: &RgbImage, _params: &InferenceParams) -> Result<Vec<Mask>> {
        Ok(Vec::new())
    }

    fn name(&self) -> &'static str {
        "noop"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_params_match_fastsam_everything_mode() {
        let params = InferenceParams::default();
        assert!(params.retina_masks);
        assert_eq!(params.image_size, 512);
        assert_eq!(params.conf_threshold, 0.4);
        assert_eq!(params.iou_threshold, 0.9);
        assert!(params.everything);
    }

    #[test]
    fn test_noop_backend_returns_no_masks() {
        let mut backend = NoopBackend;
        let image = RgbImage::new(4, 4);
        let masks = backend.segment(&image, &InferenceParams::default()).unwrap();
        assert!(masks.is_empty());
        assert_eq!(backend.name(), "noop");
    }
}
