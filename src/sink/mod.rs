mod png_directory;

pub use png_directory::PngDirectory;

use anyhow::Result;
use image::RgbImage;

/// Trait for overlay destinations
pub trait OverlaySink {
    /// Write the overlay produced for the frame called `name`
    fn write_overlay(&mut self, name: &str, overlay: &RgbImage) -> Result<()>;
}
