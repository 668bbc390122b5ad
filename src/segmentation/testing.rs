use super::types::{InferenceParams, Mask, SegmentationBackend};
use anyhow::anyhow;
use image::RgbImage;
use ndarray::Array2;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// What the fake backend answers with
#[derive(Clone)]
pub(crate) enum Response {
    /// Exactly these masks
    Masks(Vec<Mask>),
    /// `n` masks covering the whole image
    FullFrame(usize),
    Fail,
}

/// Backend double that counts calls and records its inputs
pub(crate) struct FakeBackend {
    pub calls: Arc<AtomicUsize>,
    pub last_image: Arc<Mutex<Option<RgbImage>>>,
    pub last_params: Arc<Mutex<Option<InferenceParams>>>,
    response: Response,
}

impl FakeBackend {
    pub(crate) fn new(response: Response) -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
            last_image: Arc::new(Mutex::new(None)),
            last_params: Arc::new(Mutex::new(None)),
            response,
        }
    }
}

impl SegmentationBackend for FakeBackend {
    fn segment(&mut self, image: &RgbImage, params: &InferenceParams) -> anyhow::Result<Vec<Mask>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_image.lock().unwrap() = Some(image.clone());
        *self.last_params.lock().unwrap() = Some(params.clone());

        let (width, height) = image.dimensions();
        match &self.response {
            Response::Masks(masks) => Ok(masks.clone()),
            Response::FullFrame(n) => Ok(vec![
                Array2::from_elem((height as usize, width as usize), true);
                *n
            ]),
            Response::Fail => Err(anyhow!("device fault")),
        }
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}
