use std::fmt;

use nalgebra::{Matrix3, SMatrix, SVector, Vector3};
use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::SeedableRng;
use tracing::debug;

use crate::config::RansacConfig;
use crate::consts::{EPSILON, HOMOGRAPHY_MIN_POINTS};
use crate::error::{HyperspecError, Result};

/// A planar projective transform mapping source pixels to destination pixels.
///
/// Stored normalised so that `h[(2, 2)] == 1` whenever that entry is
/// non-zero.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Homography(Matrix3<f64>);

impl Homography {
    pub fn identity() -> Self {
        Self(Matrix3::identity())
    }

    pub fn from_matrix(m: Matrix3<f64>) -> Self {
        let scale = m[(2, 2)];
        if scale.abs() > EPSILON {
            Self(m / scale)
        } else {
            Self(m)
        }
    }

    pub fn from_rows(rows: [[f64; 3]; 3]) -> Self {
        Self::from_matrix(Matrix3::from_fn(|r, c| rows[r][c]))
    }

    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.0
    }

    pub fn determinant(&self) -> f64 {
        self.0.determinant()
    }

    pub fn try_inverse(&self) -> Option<Homography> {
        if self.determinant().abs() <= EPSILON {
            return None;
        }
        self.0.try_inverse().map(Self::from_matrix)
    }

    /// Map (x, y) through the transform; `None` if it lands at infinity.
    pub fn transform_point(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        let v = self.0 * Vector3::new(x, y, 1.0);
        if v[2].abs() <= EPSILON || !v[0].is_finite() || !v[1].is_finite() {
            return None;
        }
        Some((v[0] / v[2], v[1] / v[2]))
    }

    fn squared_error(&self, src: &[f64; 2], dst: &[f64; 2]) -> f64 {
        match self.transform_point(src[0], src[1]) {
            Some((x, y)) => (x - dst[0]).powi(2) + (y - dst[1]).powi(2),
            None => f64::INFINITY,
        }
    }
}

impl fmt::Display for Homography {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = &self.0;
        write!(f, "[")?;
        for r in 0..3 {
            if r > 0 {
                write!(f, ", ")?;
            }
            write!(f, "[{:.6}, {:.6}, {:.6}]", m[(r, 0)], m[(r, 1)], m[(r, 2)])?;
        }
        write!(f, "]")
    }
}

/// Outcome of a robust homography fit.
#[derive(Clone, Debug)]
pub struct RansacResult {
    pub homography: Homography,
    /// Per-correspondence inlier flags.
    pub inliers: Vec<bool>,
    pub inlier_count: usize,
    pub iterations: usize,
}

/// Similarity transform moving the centroid to the origin with mean distance
/// sqrt(2).
fn normalization(points: &[[f64; 2]]) -> Result<Matrix3<f64>> {
    let n = points.len() as f64;
    let mx = points.iter().map(|p| p[0]).sum::<f64>() / n;
    let my = points.iter().map(|p| p[1]).sum::<f64>() / n;
    let mean_dist = points
        .iter()
        .map(|p| ((p[0] - mx).powi(2) + (p[1] - my).powi(2)).sqrt())
        .sum::<f64>()
        / n;
    if mean_dist <= EPSILON {
        return Err(HyperspecError::Homography(
            "degenerate point set (all points coincide)".into(),
        ));
    }
    let s = std::f64::consts::SQRT_2 / mean_dist;
    Ok(Matrix3::new(s, 0.0, -s * mx, 0.0, s, -s * my, 0.0, 0.0, 1.0))
}

fn apply(t: &Matrix3<f64>, p: &[f64; 2]) -> [f64; 2] {
    let v = t * Vector3::new(p[0], p[1], 1.0);
    [v[0] / v[2], v[1] / v[2]]
}

/// Direct linear transform with Hartley normalisation.
pub fn estimate_dlt(src: &[[f64; 2]], dst: &[[f64; 2]]) -> Result<Homography> {
    if src.len() != dst.len() {
        return Err(HyperspecError::ShapeMismatch(format!(
            "{} source points vs {} destination points",
            src.len(),
            dst.len()
        )));
    }
    if src.len() < HOMOGRAPHY_MIN_POINTS {
        return Err(HyperspecError::Homography(format!(
            "need at least {HOMOGRAPHY_MIN_POINTS} correspondences, got {}",
            src.len()
        )));
    }

    let t_src = normalization(src)?;
    let t_dst = normalization(dst)?;

    // Accumulate A^T A directly; its smallest eigenvector is the null
    // vector of A.
    let mut ata = SMatrix::<f64, 9, 9>::zeros();
    for (p, q) in src.iter().zip(dst) {
        let [x, y] = apply(&t_src, p);
        let [u, v] = apply(&t_dst, q);
        let r1 = SVector::<f64, 9>::from_column_slice(&[
            x, y, 1.0, 0.0, 0.0, 0.0, -u * x, -u * y, -u,
        ]);
        let r2 = SVector::<f64, 9>::from_column_slice(&[
            0.0, 0.0, 0.0, x, y, 1.0, -v * x, -v * y, -v,
        ]);
        ata += r1 * r1.transpose();
        ata += r2 * r2.transpose();
    }

    let eigen = ata.symmetric_eigen();
    let (min_idx, _) = eigen
        .eigenvalues
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.total_cmp(b.1))
        .ok_or_else(|| HyperspecError::Homography("empty eigen decomposition".into()))?;
    let h = eigen.eigenvectors.column(min_idx);
    let hn = Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], h[8]);

    let t_dst_inv = t_dst
        .try_inverse()
        .ok_or_else(|| HyperspecError::Homography("singular normalisation".into()))?;
    let m = t_dst_inv * hn * t_src;
    if !m.iter().all(|v| v.is_finite()) || m[(2, 2)].abs() <= EPSILON {
        return Err(HyperspecError::Homography("degenerate DLT solution".into()));
    }
    Ok(Homography::from_matrix(m))
}

/// Twice the signed area of triangle (a, b, c).
fn orientation(a: &[f64; 2], b: &[f64; 2], c: &[f64; 2]) -> f64 {
    (b[0] - a[0]) * (c[1] - a[1]) - (b[1] - a[1]) * (c[0] - a[0])
}

/// A minimal sample is usable when no three points are collinear and every
/// triangle keeps its winding between the two images.
fn sample_is_valid(src: &[[f64; 2]; 4], dst: &[[f64; 2]; 4]) -> bool {
    const TRIPLES: [[usize; 3]; 4] = [[0, 1, 2], [0, 1, 3], [0, 2, 3], [1, 2, 3]];
    TRIPLES.iter().all(|&[i, j, k]| {
        let a = orientation(&src[i], &src[j], &src[k]);
        let b = orientation(&dst[i], &dst[j], &dst[k]);
        a.abs() > EPSILON && b.abs() > EPSILON && a.signum() == b.signum()
    })
}

fn score(h: &Homography, src: &[[f64; 2]], dst: &[[f64; 2]], thresh2: f64) -> (Vec<bool>, usize) {
    let inliers: Vec<bool> = src
        .iter()
        .zip(dst)
        .map(|(p, q)| h.squared_error(p, q) < thresh2)
        .collect();
    let count = inliers.iter().filter(|&&b| b).count();
    (inliers, count)
}

/// Number of iterations needed to draw one all-inlier sample with
/// probability `confidence` given the current inlier ratio.
fn required_iterations(confidence: f64, inlier_ratio: f64, max_iterations: usize) -> usize {
    let p_good = inlier_ratio.powi(HOMOGRAPHY_MIN_POINTS as i32);
    if p_good >= 1.0 - EPSILON {
        return 1;
    }
    if p_good <= EPSILON {
        return max_iterations;
    }
    let n = (1.0 - confidence).ln() / (1.0 - p_good).ln();
    if n.is_finite() && n >= 0.0 {
        (n.ceil() as usize).min(max_iterations)
    } else {
        max_iterations
    }
}

/// Fit a homography mapping `src` onto `dst` with RANSAC, then refit on
/// all inliers.
///
/// Returns `None` when there are too few correspondences or no model is
/// supported by at least four inliers.
pub fn find_homography_ransac(
    src: &[[f64; 2]],
    dst: &[[f64; 2]],
    config: &RansacConfig,
) -> Option<RansacResult> {
    let n = src.len();
    if n != dst.len() || n < HOMOGRAPHY_MIN_POINTS {
        return None;
    }

    let thresh2 = config.reproj_threshold * config.reproj_threshold;
    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::seed_from_u64(rand::random()),
    };

    let mut best: Option<(Homography, Vec<bool>, usize)> = None;
    let mut needed = config.max_iterations;
    let mut iterations = 0;

    while iterations < needed {
        iterations += 1;

        let idx = sample(&mut rng, n, HOMOGRAPHY_MIN_POINTS);
        let s: [[f64; 2]; 4] = std::array::from_fn(|i| src[idx.index(i)]);
        let d: [[f64; 2]; 4] = std::array::from_fn(|i| dst[idx.index(i)]);
        if !sample_is_valid(&s, &d) {
            continue;
        }

        let Ok(model) = estimate_dlt(&s, &d) else {
            continue;
        };
        let (inliers, count) = score(&model, src, dst, thresh2);
        if best.as_ref().is_none_or(|(_, _, c)| count > *c) {
            needed = needed.min(required_iterations(
                config.confidence,
                count as f64 / n as f64,
                config.max_iterations,
            ));
            best = Some((model, inliers, count));
        }
    }

    let (model, inliers, count) = best?;
    if count < HOMOGRAPHY_MIN_POINTS {
        return None;
    }

    // Refit on every inlier and keep the refit if it explains at least as
    // many correspondences.
    let (in_src, in_dst): (Vec<[f64; 2]>, Vec<[f64; 2]>) = src
        .iter()
        .zip(dst)
        .zip(&inliers)
        .filter(|(_, keep)| **keep)
        .map(|((p, q), _)| (*p, *q))
        .unzip();

    let (homography, inliers, inlier_count) = match estimate_dlt(&in_src, &in_dst) {
        Ok(refit) => {
            let (refit_inliers, refit_count) = score(&refit, src, dst, thresh2);
            if refit_count >= count {
                (refit, refit_inliers, refit_count)
            } else {
                (model, inliers, count)
            }
        }
        Err(_) => (model, inliers, count),
    };

    debug!(
        inliers = inlier_count,
        total = n,
        iterations,
        "RANSAC homography fit"
    );

    Some(RansacResult {
        homography,
        inliers,
        inlier_count,
        iterations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn grid_points() -> Vec<[f64; 2]> {
        let mut pts = Vec::new();
        for i in 0..6 {
            for j in 0..5 {
                pts.push([10.0 + 37.0 * i as f64, 12.0 + 41.0 * j as f64 + 3.0 * i as f64]);
            }
        }
        pts
    }

    fn project(h: &Homography, pts: &[[f64; 2]]) -> Vec<[f64; 2]> {
        pts.iter()
            .map(|p| {
                let (x, y) = h.transform_point(p[0], p[1]).unwrap();
                [x, y]
            })
            .collect()
    }

    fn assert_homography_eq(a: &Homography, b: &Homography, eps: f64) {
        for (x, y) in a.matrix().iter().zip(b.matrix().iter()) {
            assert_relative_eq!(*x, *y, epsilon = eps);
        }
    }

    #[test]
    fn test_dlt_identity() {
        let src = [[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [1.0, 1.0]];
        let h = estimate_dlt(&src, &src).unwrap();
        assert_homography_eq(&h, &Homography::identity(), 1e-9);
    }

    #[test]
    fn test_dlt_recovers_projective_transform() {
        let truth = Homography::from_rows([
            [1.02, 0.03, 4.5],
            [-0.02, 0.99, -2.25],
            [1e-4, -5e-5, 1.0],
        ]);
        let src = grid_points();
        let dst = project(&truth, &src);
        let h = estimate_dlt(&src, &dst).unwrap();
        assert_homography_eq(&h, &truth, 1e-6);
    }

    #[test]
    fn test_dlt_rejects_too_few_points() {
        let pts = [[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]];
        assert!(estimate_dlt(&pts, &pts).is_err());
    }

    #[test]
    fn test_inverse_round_trip() {
        let h = Homography::from_rows([[1.1, 0.1, 3.0], [0.0, 0.9, -1.0], [0.0, 0.0, 1.0]]);
        let inv = h.try_inverse().unwrap();
        let (x, y) = h.transform_point(7.0, 11.0).unwrap();
        let (bx, by) = inv.transform_point(x, y).unwrap();
        assert_relative_eq!(bx, 7.0, epsilon = 1e-9);
        assert_relative_eq!(by, 11.0, epsilon = 1e-9);
    }

    #[test]
    fn test_ransac_ignores_outliers() {
        let truth = Homography::from_rows([[0.99, -0.04, 12.0], [0.04, 0.99, -7.0], [0.0, 0.0, 1.0]]);
        let mut src = grid_points();
        let mut dst = project(&truth, &src);
        // Gross outliers.
        for k in 0..8 {
            src.push([20.0 + 13.0 * k as f64, 200.0 - 9.0 * k as f64]);
            dst.push([180.0 - 17.0 * k as f64, 15.0 + 23.0 * k as f64]);
        }

        let config = RansacConfig {
            seed: Some(7),
            ..Default::default()
        };
        let result = find_homography_ransac(&src, &dst, &config).unwrap();
        assert_eq!(result.inlier_count, 30);
        assert!(result.inliers[..30].iter().all(|&b| b));
        assert!(result.inliers[30..].iter().all(|&b| !b));
        assert_homography_eq(&result.homography, &truth, 1e-6);
    }

    #[test]
    fn test_ransac_needs_four_points() {
        let pts = [[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]];
        assert!(find_homography_ransac(&pts, &pts, &RansacConfig::default()).is_none());
    }

    #[test]
    fn test_ransac_collinear_points_fail() {
        let src: Vec<[f64; 2]> = (0..10).map(|i| [i as f64, 2.0 * i as f64]).collect();
        let config = RansacConfig {
            seed: Some(1),
            max_iterations: 50,
            ..Default::default()
        };
        assert!(find_homography_ransac(&src, &src, &config).is_none());
    }

    #[test]
    fn test_inlier_threshold_is_strict() {
        let src = [[0.0, 0.0], [0.0, 0.0], [0.0, 0.0]];
        let dst = [[5.0, 0.0], [4.9, 0.0], [0.0, 3.0]];
        let (inliers, count) = score(&Homography::identity(), &src, &dst, 25.0);
        assert_eq!(inliers, vec![false, true, true]);
        assert_eq!(count, 2);
    }

    #[test]
    fn test_required_iterations_bounds() {
        assert_eq!(required_iterations(0.995, 1.0, 2000), 1);
        assert_eq!(required_iterations(0.995, 0.0, 2000), 2000);
        let n = required_iterations(0.995, 0.5, 2000);
        assert!(n > 50 && n < 2000, "n={n}");
    }
}
