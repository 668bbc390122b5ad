use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Seed for overlay colors; fixed so a frame with N masks always gets the same N colors
pub const PALETTE_SEED: u64 = 42;

/// Generate `count` RGB colors in [0, 1) from `seed`
///
/// Pure: uses its own generator, never a shared one.
pub fn palette(seed: u64, count: usize) -> Vec<[f32; 3]> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| [rng.gen::<f32>(), rng.gen::<f32>(), rng.gen::<f32>()])
        .collect()
}
