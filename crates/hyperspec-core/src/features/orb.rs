use ndarray::{Array2, ArrayView2};
use rayon::prelude::*;
use tracing::debug;

use super::fast::fast_corners;
use super::harris::harris_response;
use super::pattern::sampling_pattern;
use super::{Descriptor, Keypoint};
use crate::config::{OrbConfig, ScoreType, WtaK};
use crate::consts::{
    DESCRIPTOR_BITS, DESCRIPTOR_BLUR_SIGMA, DESCRIPTOR_BYTES, HARRIS_BLOCK_SIZE, HARRIS_K,
};
use crate::cube::Preview;
use crate::filters::gaussian_blur::gaussian_blur_view;
use crate::warp::resize_bilinear;

/// Oriented FAST keypoints with rotated BRIEF descriptors over an image
/// pyramid.
#[derive(Clone, Debug)]
pub struct OrbDetector {
    config: OrbConfig,
    pattern: Vec<[i32; 2]>,
}

/// Keypoints and descriptors found on a single pyramid level.
struct LevelFeatures {
    keypoints: Vec<Keypoint>,
    descriptors: Vec<Descriptor>,
}

impl OrbDetector {
    pub fn new(config: OrbConfig) -> Self {
        let pattern = sampling_pattern(config.patch_size);
        Self { config, pattern }
    }

    /// Pixels kept free of keypoints on every side of every level.
    fn border(&self) -> usize {
        self.config
            .edge_threshold
            .max(self.config.patch_size / 2 + 1)
            .max(HARRIS_BLOCK_SIZE / 2 + 2)
    }

    /// Per-level keypoint budget, a geometric series in `1 / scale_factor`
    /// summing to `n_features`.
    fn features_per_level(&self) -> Vec<usize> {
        let n_levels = self.config.n_levels.max(1);
        let factor = 1.0 / self.config.scale_factor;
        let mut n_desired = self.config.n_features as f32 * (1.0 - factor)
            / (1.0 - factor.powi(n_levels as i32));

        let mut budget = vec![0usize; n_levels];
        let mut sum = 0usize;
        for item in budget.iter_mut().take(n_levels - 1) {
            let n = n_desired.round().max(0.0) as usize;
            *item = n;
            sum += n;
            n_desired *= factor;
        }
        budget[n_levels - 1] = self.config.n_features.saturating_sub(sum);
        budget
    }

    /// Successively blurred and downscaled copies of `image`. Stops early
    /// once a level is too small to hold a keypoint.
    fn build_pyramid(&self, image: &Preview) -> Vec<Array2<f32>> {
        let min_side = 2 * self.border() + 1;
        let (h0, w0) = image.dim();
        let mut pyramid = Vec::with_capacity(self.config.n_levels);
        if h0 < min_side || w0 < min_side {
            return pyramid;
        }
        pyramid.push(image.clone());

        let sigma = 2.0 * self.config.scale_factor / 6.0;
        for level in 1..self.config.n_levels {
            let scale = self.config.scale_factor.powi(level as i32);
            let rows = (h0 as f32 / scale).round() as usize;
            let cols = (w0 as f32 / scale).round() as usize;
            if rows < min_side || cols < min_side {
                break;
            }
            let Some(prev) = pyramid.last() else { break };
            let smoothed = gaussian_blur_view(prev.view(), sigma);
            pyramid.push(resize_bilinear(&smoothed.view(), (rows, cols)));
        }
        pyramid
    }

    /// Detect keypoints and compute their descriptors.
    ///
    /// Keypoints are grouped by pyramid level, best response first within a
    /// level. Images too small for a single patch give empty output.
    pub fn detect_and_compute(&self, image: &Preview) -> (Vec<Keypoint>, Vec<Descriptor>) {
        let pyramid = self.build_pyramid(image);
        let budget = self.features_per_level();

        let levels: Vec<LevelFeatures> = pyramid
            .par_iter()
            .enumerate()
            .map(|(octave, level)| self.process_level(level, octave, budget[octave]))
            .collect();

        let mut keypoints = Vec::new();
        let mut descriptors = Vec::new();
        for level in levels {
            keypoints.extend(level.keypoints);
            descriptors.extend(level.descriptors);
        }

        debug!(
            keypoints = keypoints.len(),
            levels = pyramid.len(),
            "ORB detection finished"
        );
        (keypoints, descriptors)
    }

    fn process_level(&self, level: &Array2<f32>, octave: usize, budget: usize) -> LevelFeatures {
        let empty = LevelFeatures {
            keypoints: Vec::new(),
            descriptors: Vec::new(),
        };
        if budget == 0 {
            return empty;
        }

        let mut corners = fast_corners(level, self.config.fast_threshold, self.border());
        if corners.is_empty() {
            return empty;
        }
        corners.sort_by(|a, b| b.score.total_cmp(&a.score));

        let mut scored: Vec<(usize, usize, f32)> = match self.config.score {
            ScoreType::Fast => corners
                .iter()
                .take(budget)
                .map(|c| (c.row, c.col, c.score))
                .collect(),
            ScoreType::Harris => {
                let mut scored: Vec<_> = corners
                    .iter()
                    .take(budget.saturating_mul(2))
                    .map(|c| {
                        let r = harris_response(level, c.row, c.col, HARRIS_BLOCK_SIZE, HARRIS_K);
                        (c.row, c.col, r)
                    })
                    .collect();
                scored.sort_by(|a, b| b.2.total_cmp(&a.2));
                scored
            }
        };
        scored.truncate(budget);

        let blurred = gaussian_blur_view(level.view(), DESCRIPTOR_BLUR_SIGMA);
        let scale = self.config.scale_factor.powi(octave as i32);
        let radius = (self.config.patch_size / 2) as isize;

        let mut keypoints = Vec::with_capacity(scored.len());
        let mut descriptors = Vec::with_capacity(scored.len());
        for (row, col, response) in scored {
            let angle = intensity_centroid_angle(&level.view(), row, col, radius);
            descriptors.push(self.describe(&blurred.view(), row, col, angle));
            keypoints.push(Keypoint {
                x: col as f32 * scale,
                y: row as f32 * scale,
                angle,
                response,
                octave,
                size: self.config.patch_size as f32 * scale,
            });
        }

        LevelFeatures {
            keypoints,
            descriptors,
        }
    }

    /// Rotated BRIEF on a smoothed level. Sample points outside the image
    /// are clamped to the nearest edge pixel.
    fn describe(
        &self,
        image: &ArrayView2<'_, f32>,
        row: usize,
        col: usize,
        angle: f32,
    ) -> Descriptor {
        let (h, w) = image.dim();
        let (sin_a, cos_a) = angle.sin_cos();
        let sample = |p: [i32; 2]| -> f32 {
            let (dx, dy) = (p[0] as f32, p[1] as f32);
            let x = (dx * cos_a - dy * sin_a).round() as isize + col as isize;
            let y = (dx * sin_a + dy * cos_a).round() as isize + row as isize;
            let x = x.clamp(0, w as isize - 1) as usize;
            let y = y.clamp(0, h as isize - 1) as usize;
            image[[y, x]]
        };

        let mut desc = [0u8; DESCRIPTOR_BYTES];
        match self.config.wta_k {
            WtaK::Two => {
                for bit in 0..DESCRIPTOR_BITS {
                    let v0 = sample(self.pattern[2 * bit]);
                    let v1 = sample(self.pattern[2 * bit + 1]);
                    if v0 < v1 {
                        desc[bit / 8] |= 1 << (bit % 8);
                    }
                }
            }
            WtaK::Three | WtaK::Four => {
                let k = self.config.wta_k.points();
                // 2 bits per field, 4 fields per byte.
                for field in 0..DESCRIPTOR_BITS / 2 {
                    let points = &self.pattern[field * k..(field + 1) * k];
                    let mut best = 0usize;
                    let mut best_value = sample(points[0]);
                    for (i, &p) in points.iter().enumerate().skip(1) {
                        let v = sample(p);
                        if v > best_value {
                            best = i;
                            best_value = v;
                        }
                    }
                    desc[field / 4] |= (best as u8) << (2 * (field % 4));
                }
            }
        }
        desc
    }
}

impl Default for OrbDetector {
    fn default() -> Self {
        Self::new(OrbConfig::default())
    }
}

/// Angle (radians) from the keypoint to the intensity centroid of the
/// circular patch of `radius` around it. Pixels outside the image are
/// ignored.
fn intensity_centroid_angle(
    image: &ArrayView2<'_, f32>,
    row: usize,
    col: usize,
    radius: isize,
) -> f32 {
    let (h, w) = image.dim();
    let r2 = radius * radius;
    let (mut m01, mut m10) = (0.0f32, 0.0f32);

    for dy in -radius..=radius {
        let y = row as isize + dy;
        if y < 0 || y >= h as isize {
            continue;
        }
        let mut row_sum = 0.0f32;
        for dx in -radius..=radius {
            if dx * dx + dy * dy > r2 {
                continue;
            }
            let x = col as isize + dx;
            if x < 0 || x >= w as isize {
                continue;
            }
            let v = image[[y as usize, x as usize]];
            m10 += dx as f32 * v;
            row_sum += v;
        }
        m01 += dy as f32 * row_sum;
    }

    m01.atan2(m10)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Blocky pseudo-random texture, deterministic in (r, c).
    fn texture(rows: usize, cols: usize, r0: usize, c0: usize) -> Array2<f32> {
        Array2::from_shape_fn((rows, cols), |(r, c)| {
            let (br, bc) = ((r + r0) / 5, (c + c0) / 5);
            let mut x = (br as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
                ^ (bc as u64).wrapping_mul(0xC2B2_AE3D_27D4_EB4F);
            x ^= x >> 29;
            x = x.wrapping_mul(0xBF58_476D_1CE4_E5B9);
            x ^= x >> 32;
            (x % 1000) as f32 / 1000.0
        })
    }

    #[test]
    fn test_budget_sums_to_n_features() {
        let detector = OrbDetector::default();
        let budget = detector.features_per_level();
        assert_eq!(budget.len(), 8);
        assert_eq!(budget.iter().sum::<usize>(), 10_000);
        assert!(budget.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn test_flat_image_has_no_keypoints() {
        let img = Array2::from_elem((128, 128), 0.4f32);
        let (kps, descs) = OrbDetector::default().detect_and_compute(&img);
        assert!(kps.is_empty());
        assert!(descs.is_empty());
    }

    #[test]
    fn test_tiny_image_has_no_keypoints() {
        let img = texture(40, 40, 0, 0);
        let (kps, _) = OrbDetector::default().detect_and_compute(&img);
        assert!(kps.is_empty());
    }

    #[test]
    fn test_pyramid_stops_when_levels_get_too_small() {
        let detector = OrbDetector::default();
        let pyramid = detector.build_pyramid(&texture(100, 100, 0, 0));
        // min side is 63: 100, 83, 69 fit; 58 does not.
        assert_eq!(pyramid.len(), 3);
        assert_eq!(pyramid[1].dim(), (83, 83));
    }

    #[test]
    fn test_textured_image_yields_bounded_keypoints() {
        let img = texture(160, 200, 0, 0);
        let config = OrbConfig {
            n_features: 300,
            ..Default::default()
        };
        let (kps, descs) = OrbDetector::new(config).detect_and_compute(&img);
        assert!(!kps.is_empty());
        assert!(kps.len() <= 300);
        assert_eq!(kps.len(), descs.len());
        for kp in &kps {
            assert!(kp.x >= 0.0 && kp.x < 200.0);
            assert!(kp.y >= 0.0 && kp.y < 160.0);
            assert!(kp.angle.is_finite());
        }
    }

    #[test]
    fn test_descriptors_follow_translated_content() {
        let a = texture(200, 200, 0, 0);
        let b = texture(200, 200, 5, 7);
        let config = OrbConfig {
            n_features: 200_000,
            ..Default::default()
        };
        let detector = OrbDetector::new(config);
        let (kps_a, desc_a) = detector.detect_and_compute(&a);
        let (kps_b, desc_b) = detector.detect_and_compute(&b);

        let mut compared = 0;
        for (kp, d) in kps_a.iter().zip(&desc_a) {
            if kp.octave != 0 || kp.x < 45.0 || kp.y < 45.0 || kp.x >= 155.0 || kp.y >= 155.0 {
                continue;
            }
            let twin = kps_b
                .iter()
                .position(|k| k.octave == 0 && k.x == kp.x - 7.0 && k.y == kp.y - 5.0);
            let Some(j) = twin else {
                panic!("keypoint ({}, {}) lost after translation", kp.x, kp.y);
            };
            assert_eq!(kps_b[j].angle, kp.angle);
            assert_eq!(&desc_b[j], d);
            compared += 1;
        }
        assert!(compared > 0);
    }

    #[test]
    fn test_wta_k_two_uses_every_bit_position() {
        let img = texture(160, 160, 3, 3);
        let config = OrbConfig {
            wta_k: WtaK::Two,
            ..Default::default()
        };
        let (_, descs) = OrbDetector::new(config).detect_and_compute(&img);
        assert!(!descs.is_empty());
        let any_set = descs.iter().fold([0u8; DESCRIPTOR_BYTES], |mut acc, d| {
            for (a, b) in acc.iter_mut().zip(d) {
                *a |= b;
            }
            acc
        });
        assert!(any_set.iter().filter(|&&b| b != 0).count() > DESCRIPTOR_BYTES / 2);
    }

    #[test]
    fn test_centroid_points_towards_bright_side() {
        let img = Array2::from_shape_fn((41, 41), |(_, c)| if c > 20 { 1.0 } else { 0.0 });
        let angle = intensity_centroid_angle(&img.view(), 20, 20, 15);
        assert!(angle.abs() < 1e-6);
        let img = Array2::from_shape_fn((41, 41), |(r, _)| if r > 20 { 1.0 } else { 0.0 });
        let angle = intensity_centroid_angle(&img.view(), 20, 20, 15);
        assert!((angle - std::f32::consts::FRAC_PI_2).abs() < 1e-6);
    }
}
