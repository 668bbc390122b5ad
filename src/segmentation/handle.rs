use super::preprocess::frame_to_rgb8;
use super::types::{InferenceParams, Mask, NoopBackend, SegmentationBackend};
use crate::config::BackendConfig;
use crate::error::{report, SegmentationError};
use ndarray::ArrayView3;

/// Why a handle is inert
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DisableReason {
    /// Segmentation was not requested
    NotRequested,
    /// No segmentation backend in this build
    Unavailable,
    /// The model could not be loaded
    LoadFailed,
}

/// Effective enablement, decided once at construction
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendState {
    Enabled,
    Disabled(DisableReason),
}

/// Owns the segmentation backend and its enablement
///
/// Construction never fails: an unavailable backend or a model that does not
/// load leaves the handle permanently disabled. A disabled handle never calls
/// its backend. Per-frame inference failures are logged and skipped without
/// changing state, so the next frame is tried again.
///
/// Not meant to be shared between threads while inferring.
pub struct SegmentationHandle {
    config: BackendConfig,
    params: InferenceParams,
    backend: Box<dyn SegmentationBackend>,
    state: BackendState,
}

impl SegmentationHandle {
    /// Create a handle using the backend compiled into this build
    pub fn new(config: BackendConfig) -> Self {
        Self::with_loader(config, super::load_backend)
    }

    /// Create a handle, resolving the backend with `loader`
    ///
    /// `loader` is only called when `config.enabled` is set.
    pub fn with_loader<F>(config: BackendConfig, loader: F) -> Self
    where
        F: FnOnce(&BackendConfig) -> Result<Box<dyn SegmentationBackend>, SegmentationError>,
    {
        let (backend, state): (Box<dyn SegmentationBackend>, BackendState) = if !config.enabled {
            tracing::info!("Segmentation disabled by configuration");
            (
                Box::new(NoopBackend),
                BackendState::Disabled(DisableReason::NotRequested),
            )
        } else {
            match loader(&config) {
                Ok(backend) => {
                    tracing::info!(
                        "Segmentation enabled: {} backend, model {}, target {}",
                        backend.name(),
                        config.model.display(),
                        config.target
                    );
                    (backend, BackendState::Enabled)
                }
                Err(SegmentationError::BackendUnavailable) => {
                    tracing::warn!("Segmentation backend not available; segmentation disabled");
                    (
                        Box::new(NoopBackend),
                        BackendState::Disabled(DisableReason::Unavailable),
                    )
                }
                Err(e) => {
                    tracing::warn!("{}; segmentation disabled", report(&e));
                    (
                        Box::new(NoopBackend),
                        BackendState::Disabled(DisableReason::LoadFailed),
                    )
                }
            }
        };

        Self {
            config,
            params: InferenceParams::default(),
            backend,
            state,
        }
    }

    pub fn state(&self) -> BackendState {
        self.state
    }

    pub fn is_enabled(&self) -> bool {
        self.state == BackendState::Enabled
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    pub fn params(&self) -> &InferenceParams {
        &self.params
    }

    /// Run instance segmentation on a normalized (H, W, 3) RGB frame
    ///
    /// Returns `None` when disabled, when inference fails for this frame, or
    /// when nothing was detected.
    pub fn infer(&mut self, frame: ArrayView3<'_, f32>) -> Option<Vec<Mask>> {
        if !self.is_enabled() {
            return None;
        }

        match self.segment(frame) {
            Ok(masks) if masks.is_empty() => {
                tracing::debug!("No instances detected");
                None
            }
            Ok(masks) => Some(masks),
            Err(e) => {
                tracing::warn!("Segmentation failed: {}", report(&e));
                None
            }
        }
    }

    fn segment(&mut self, frame: ArrayView3<'_, f32>) -> Result<Vec<Mask>, SegmentationError> {
        let image = frame_to_rgb8(frame)?;
        self.backend
            .segment(&image, &self.params)
            .map_err(|e| SegmentationError::InferenceFailed(e.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segmentation::testing::{FakeBackend, Response};
    use ndarray::Array3;
    use std::cell::Cell;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn enabled_config() -> BackendConfig {
        BackendConfig {
            enabled: true,
            ..BackendConfig::default()
        }
    }

    fn frame(height: usize, width: usize) -> Array3<f32> {
        Array3::zeros((height, width, 3))
    }

    /// Handle around a fake, plus the fake's call counter
    fn handle_with(response: Response) -> (SegmentationHandle, Arc<AtomicUsize>) {
        let fake = FakeBackend::new(response);
        let calls = fake.calls.clone();
        let handle = SegmentationHandle::with_loader(enabled_config(), move |_| {
            Ok(Box::new(fake) as Box<dyn SegmentationBackend>)
        });
        (handle, calls)
    }

    #[test]
    fn test_disabled_by_config_never_loads_or_infers() {
        let loaded = Cell::new(false);
        let fake = FakeBackend::new(Response::FullFrame(1));
        let calls = fake.calls.clone();
        let mut handle = SegmentationHandle::with_loader(BackendConfig::default(), |_| {
            loaded.set(true);
            Ok(Box::new(fake) as Box<dyn SegmentationBackend>)
        });

        assert!(!loaded.get());
        assert_eq!(
            handle.state(),
            BackendState::Disabled(DisableReason::NotRequested)
        );
        for _ in 0..5 {
            assert!(handle.infer(frame(4, 4).view()).is_none());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_load_failure_disables_permanently() {
        let mut handle = SegmentationHandle::with_loader(enabled_config(), |config| {
            Err(SegmentationError::LoadFailed {
                model: config.model.display().to_string(),
                source: "corrupt checkpoint".into(),
            })
        });

        assert!(!handle.is_enabled());
        assert_eq!(
            handle.state(),
            BackendState::Disabled(DisableReason::LoadFailed)
        );
        for _ in 0..3 {
            assert!(handle.infer(frame(2, 2).view()).is_none());
        }
        assert!(!handle.is_enabled());
    }

    #[test]
    fn test_unavailable_backend_disables() {
        let handle = SegmentationHandle::with_loader(enabled_config(), |_| {
            Err(SegmentationError::BackendUnavailable)
        });
        assert_eq!(
            handle.state(),
            BackendState::Disabled(DisableReason::Unavailable)
        );
    }

    #[test]
    fn test_invalid_model_reference_is_fail_soft() {
        let config = BackendConfig {
            model: PathBuf::from("/nonexistent/models/FastSAM-x.onnx"),
            enabled: true,
            ..BackendConfig::default()
        };
        let mut handle = SegmentationHandle::new(config);

        assert!(!handle.is_enabled());
        let expected = if crate::segmentation::backend_available() {
            DisableReason::LoadFailed
        } else {
            DisableReason::Unavailable
        };
        assert_eq!(handle.state(), BackendState::Disabled(expected));
        assert!(handle.infer(frame(4, 4).view()).is_none());
    }

    #[test]
    fn test_enabled_returns_masks() {
        let (mut handle, calls) = handle_with(Response::FullFrame(2));
        assert!(handle.is_enabled());
        assert_eq!(handle.config(), &enabled_config());

        let masks = handle.infer(frame(3, 5).view()).unwrap();
        assert_eq!(masks.len(), 2);
        assert_eq!(masks[0].dim(), (3, 5));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_backend_receives_rounded_rgb8_and_fixed_params() {
        let fake = FakeBackend::new(Response::FullFrame(1));
        let last_image = fake.last_image.clone();
        let last_params = fake.last_params.clone();
        let mut handle = SegmentationHandle::with_loader(enabled_config(), move |_| {
            Ok(Box::new(fake) as Box<dyn SegmentationBackend>)
        });

        let mut input = frame(2, 2);
        input[[0, 0, 0]] = 0.5;
        input[[1, 1, 2]] = 1.0;
        handle.infer(input.view()).unwrap();

        let image = last_image.lock().unwrap().clone().unwrap();
        assert_eq!(image.dimensions(), (2, 2));
        assert_eq!(image.get_pixel(0, 0).0, [128, 0, 0]);
        assert_eq!(image.get_pixel(1, 1).0, [0, 0, 255]);

        let params = last_params.lock().unwrap().clone().unwrap();
        assert_eq!(params, InferenceParams::default());
        assert_eq!(handle.params(), &params);
    }

    #[test]
    fn test_inference_failure_skips_frame_and_retries() {
        let (mut handle, calls) = handle_with(Response::Fail);

        assert!(handle.infer(frame(4, 4).view()).is_none());
        assert!(handle.is_enabled());
        assert!(handle.infer(frame(4, 4).view()).is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_no_detections_is_none() {
        let (mut handle, calls) = handle_with(Response::Masks(Vec::new()));
        assert!(handle.infer(frame(4, 4).view()).is_none());
        assert!(handle.is_enabled());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_malformed_frame_is_skipped_without_backend_call() {
        let (mut handle, calls) = handle_with(Response::FullFrame(1));
        let bad = Array3::<f32>::zeros((4, 4, 1));
        assert!(handle.infer(bad.view()).is_none());
        assert!(handle.is_enabled());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
