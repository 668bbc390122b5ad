use super::palette::{palette, PALETTE_SEED};
use crate::error::SegmentationError;
use crate::segmentation::{Mask, Overlay};
use ndarray::{Array3, Axis, Zip};

/// Paint instance masks into one colored (height, width, 3) overlay
///
/// Mask `i` gets palette color `i`. Masks are painted in index order, so
/// where masks overlap the highest index wins; colors are never blended.
/// Uncovered pixels stay black. Every mask must be (height, width).
pub fn composite(
    masks: &[Mask],
    height: usize,
    width: usize,
) -> Result<Overlay, SegmentationError> {
    let _span = tracing::debug_span!("composite", masks = masks.len()).entered();

    if let Some((index, mask)) = masks
        .iter()
        .enumerate()
        .find(|(_, mask)| mask.dim() != (height, width))
    {
        return Err(SegmentationError::MaskShape {
            index,
            expected: (height, width),
            actual: mask.dim(),
        });
    }

    let mut overlay = Array3::<f32>::zeros((height, width, 3));
    let colors = palette(PALETTE_SEED, masks.len());

    for (mask, color) in masks.iter().zip(&colors) {
        Zip::from(overlay.lanes_mut(Axis(2)))
            .and(mask)
            .for_each(|mut pixel, &covered| {
                if covered {
                    pixel[0] = color[0];
                    pixel[1] = color[1];
                    pixel[2] = color[2];
                }
            });
    }

    Ok(overlay)
}
