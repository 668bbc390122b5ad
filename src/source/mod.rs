mod image_sequence;

pub use image_sequence::ImageSequence;

use anyhow::Result;
use image::RgbImage;

/// Trait for frame sources
pub trait FrameSource {
    /// Next frame and a name identifying it, or `None` when exhausted
    fn next_frame(&mut self) -> Result<Option<(String, RgbImage)>>;

    /// Frames left to read, if known
    fn remaining(&self) -> Option<usize> {
        None
    }
}
