//! Color-coded instance segmentation overlays for live video frames.
//!
//! [`OverlayEngine`] takes a normalized RGB frame, runs an optional
//! segmentation backend and paints each detected instance in its own stable
//! color. A missing or broken backend leaves the engine inert instead of
//! failing the caller.

pub mod config;
pub mod engine;
pub mod error;
pub mod overlay;
pub mod segmentation;

pub use config::{BackendConfig, ComputeTarget};
pub use engine::OverlayEngine;
pub use error::SegmentationError;
