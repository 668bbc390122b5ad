use super::types::{Frame, Overlay};
use crate::error::SegmentationError;
use image::{imageops, Rgb, RgbImage};
use ndarray::{Array3, Array4, ArrayView3};

/// Gray used by YOLO-family letterboxing
const PAD_VALUE: f32 = 114.0 / 255.0;

/// Convert a normalized float frame to 8-bit RGB
///
/// Each channel becomes round(v * 255) clamped to 0-255.
pub fn frame_to_rgb8(frame: ArrayView3<'_, f32>) -> Result<RgbImage, SegmentationError> {
    let (height, width, channels) = frame.dim();
    if channels != 3 {
        return Err(SegmentationError::InvalidFrame(format!(
            "expected 3 channels, got {}",
            channels
        )));
    }
    if height == 0 || width == 0 {
        return Err(SegmentationError::InvalidFrame(format!(
            "empty frame {}x{}",
            width, height
        )));
    }

    Ok(RgbImage::from_fn(width as u32, height as u32, |x, y| {
        let (x, y) = (x as usize, y as usize);
        Rgb([
            to_u8(frame[[y, x, 0]]),
            to_u8(frame[[y, x, 1]]),
            to_u8(frame[[y, x, 2]]),
        ])
    }))
}

fn to_u8(value: f32) -> u8 {
    (value * 255.0).round().clamp(0.0, 255.0) as u8
}

/// Convert an 8-bit RGB image to a normalized float frame
pub fn rgb8_to_frame(image: &RgbImage) -> Frame {
    let (width, height) = image.dimensions();
    Array3::from_shape_fn((height as usize, width as usize, 3), |(y, x, c)| {
        image.get_pixel(x as u32, y as u32)[c] as f32 / 255.0
    })
}

/// Convert a colored overlay to 8-bit RGB for display or saving
pub fn overlay_to_rgb8(overlay: &Overlay) -> RgbImage {
    let (height, width, _) = overlay.dim();
    RgbImage::from_fn(width as u32, height as u32, |x, y| {
        let (x, y) = (x as usize, y as usize);
        Rgb([
            to_u8(overlay[[y, x, 0]]),
            to_u8(overlay[[y, x, 1]]),
            to_u8(overlay[[y, x, 2]]),
        ])
    })
}

/// Where the original image sits inside the square network input
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Letterbox {
    pub scale: f32,
    pub pad_x: f32,
    pub pad_y: f32,
    pub size: u32,
}

impl Letterbox {
    pub fn new(width: u32, height: u32, size: u32) -> Self {
        let scale = (size as f32 / width as f32).min(size as f32 / height as f32);
        let (resized_w, resized_h) = Self::resized(width, height, scale, size);
        Self {
            scale,
            pad_x: ((size - resized_w) / 2) as f32,
            pad_y: ((size - resized_h) / 2) as f32,
            size,
        }
    }

    fn resized(width: u32, height: u32, scale: f32, size: u32) -> (u32, u32) {
        let w = ((width as f32 * scale).round() as u32).clamp(1, size);
        let h = ((height as f32 * scale).round() as u32).clamp(1, size);
        (w, h)
    }

    /// Map an original-image coordinate into network input space
    pub fn to_input(&self, x: f32, y: f32) -> (f32, f32) {
        (x * self.scale + self.pad_x, y * self.scale + self.pad_y)
    }

    /// Map a network input coordinate back to the original image
    pub fn to_original(&self, x: f32, y: f32) -> (f32, f32) {
        ((x - self.pad_x) / self.scale, (y - self.pad_y) / self.scale)
    }
}

/// Preprocessor for converting RGB images to letterboxed model input tensors
pub struct Preprocessor {
    size: u32,
}

impl Preprocessor {
    pub fn new(size: u32) -> Self {
        Self { size }
    }

    /// Preprocess an RGB image into a normalized NCHW tensor
    ///
    /// Steps:
    /// 1. Resize keeping aspect ratio so the longer side equals `size`
    /// 2. Center on a gray square canvas
    /// 3. Normalize to [0, 1] and transpose from HWC to NCHW
    ///
    /// Returns: Array4<f32> with shape [1, 3, size, size] and the letterbox geometry
    pub fn preprocess(&self, image: &RgbImage) -> (Array4<f32>, Letterbox) {
        let _span = tracing::debug_span!("preprocess").entered();

        let (width, height) = image.dimensions();
        let letterbox = Letterbox::new(width, height, self.size);
        let (resized_w, resized_h) =
            Letterbox::resized(width, height, letterbox.scale, self.size);

        let resized = if (resized_w, resized_h) != (width, height) {
            imageops::resize(image, resized_w, resized_h, imageops::FilterType::Triangle)
        } else {
            image.clone()
        };

        let size = self.size as usize;
        let mut tensor = Array4::<f32>::from_elem((1, 3, size, size), PAD_VALUE);
        let (off_x, off_y) = (letterbox.pad_x as usize, letterbox.pad_y as usize);

        for (x, y, pixel) in resized.enumerate_pixels() {
            let (tx, ty) = (x as usize + off_x, y as usize + off_y);
            for c in 0..3 {
                tensor[[0, c, ty, tx]] = pixel[c] as f32 / 255.0;
            }
        }

        (tensor, letterbox)
    }
}
