use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::consts::{BRIEF_PATTERN_SEED, DESCRIPTOR_BITS};

/// Number of sampling points, enough for 256 WTA_K=2 pairs or 128 WTA_K=4
/// quadruples.
pub(super) const PATTERN_POINTS: usize = DESCRIPTOR_BITS * 2;

/// Deterministic rBRIEF sampling points `(dx, dy)` inside a square patch of
/// side `patch_size`, centred on the keypoint.
///
/// Each coordinate is the mean of two uniform draws, which concentrates
/// samples towards the centre where rotation moves them the least.
pub(super) fn sampling_pattern(patch_size: usize) -> Vec<[i32; 2]> {
    let half = (patch_size / 2) as i32;
    let mut rng = StdRng::seed_from_u64(BRIEF_PATTERN_SEED);
    let mut coord = move || {
        let a: i32 = rng.random_range(-half..=half);
        let b: i32 = rng.random_range(-half..=half);
        (a + b) / 2
    };

    (0..PATTERN_POINTS).map(|_| [coord(), coord()]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_is_deterministic_and_inside_patch() {
        let a = sampling_pattern(31);
        let b = sampling_pattern(31);
        assert_eq!(a, b);
        assert_eq!(a.len(), PATTERN_POINTS);
        assert!(a.iter().all(|p| p[0].abs() <= 15 && p[1].abs() <= 15));
    }
}
