use super::OverlaySink;
use anyhow::{Context, Result};
use image::RgbImage;
use std::fs;
use std::path::{Path, PathBuf};

/// Writes each overlay as `<name>_overlay.png` in one directory
pub struct PngDirectory {
    dir: PathBuf,
}

impl PngDirectory {
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create output directory {}", dir.display()))?;

        tracing::info!("Writing overlays to {}", dir.display());

        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}_overlay.png", name))
    }
}

impl OverlaySink for PngDirectory {
    fn write_overlay(&mut self, name: &str, overlay: &RgbImage) -> Result<()> {
        let path = self.path_for(name);
        overlay
            .save(&path)
            .with_context(|| format!("Failed to write overlay to {}", path.display()))?;
        tracing::debug!("Wrote {}", path.display());
        Ok(())
    }
}
