mod compositor;
mod palette;

pub use compositor::composite;
pub use palette::{palette, PALETTE_SEED};
