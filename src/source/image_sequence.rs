use super::FrameSource;
use anyhow::{Context, Result};
use image::RgbImage;
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tif", "tiff", "webp"];

/// Reads frames from image files in order
///
/// Directories are expanded to the image files they contain, sorted by name.
pub struct ImageSequence {
    paths: VecDeque<PathBuf>,
}

impl ImageSequence {
    pub fn new<P: AsRef<Path>>(inputs: &[P]) -> Result<Self> {
        let mut paths = VecDeque::new();

        for input in inputs {
            let input = input.as_ref();
            if input.is_dir() {
                let mut files: Vec<PathBuf> = fs::read_dir(input)
                    .with_context(|| format!("Failed to read directory {}", input.display()))?
                    .filter_map(|entry| entry.ok().map(|e| e.path()))
                    .filter(|path| path.is_file() && is_image(path))
                    .collect();
                files.sort();
                tracing::info!("Found {} images in {}", files.len(), input.display());
                paths.extend(files);
            } else {
                paths.push_back(input.to_path_buf());
            }
        }

        Ok(Self { paths })
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

impl FrameSource for ImageSequence {
    fn next_frame(&mut self) -> Result<Option<(String, RgbImage)>> {
        let Some(path) = self.paths.pop_front() else {
            return Ok(None);
        };

        let frame = image::open(&path)
            .with_context(|| format!("Failed to decode {}", path.display()))?
            .to_rgb8();

        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "frame".to_string());

        Ok(Some((name, frame)))
    }

    fn remaining(&self) -> Option<usize> {
        Some(self.paths.len())
    }
}
