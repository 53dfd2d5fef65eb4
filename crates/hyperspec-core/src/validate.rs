use thiserror::Error;
use tracing::debug;

use crate::config::ValidationConfig;
use crate::homography::Homography;

/// Why a fitted homography is not accepted as a registration.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HomographyRejection {
    #[error("Homography does not preserve orientation")]
    OrientationFlipped,

    #[error("Homography transform is non-invertible (det = {det:e})")]
    NonInvertible { det: f64 },

    #[error("Homography does not preserve area to within {:.0}% ({area:.4})", tolerance * 100.0)]
    AreaNotPreserved { area: f64, tolerance: f64 },

    #[error("Homography results in large perspective shift ({h31:e}, {h32:e})")]
    PerspectiveShift { h31: f64, h32: f64 },
}

const UNIT_SQUARE: [(f64, f64); 4] = [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)];

/// Absolute shoelace area of the unit square mapped through `h`, or `None`
/// if a corner maps to infinity.
pub fn unit_square_area(h: &Homography) -> Option<f64> {
    let mut corners = [(0.0, 0.0); 4];
    for (out, &(x, y)) in corners.iter_mut().zip(UNIT_SQUARE.iter()) {
        *out = h.transform_point(x, y)?;
    }
    let twice: f64 = (0..4)
        .map(|i| {
            let (x0, y0) = corners[i];
            let (x1, y1) = corners[(i + 1) % 4];
            x0 * y1 - x1 * y0
        })
        .sum();
    Some(twice.abs() / 2.0)
}

/// Check that `h` is plausible for two near-front-on captures of the same
/// scene. Checks run in a fixed order and the first failure is returned.
pub fn validate_homography(
    h: &Homography,
    config: &ValidationConfig,
) -> std::result::Result<(), HomographyRejection> {
    debug!(homography = %h, "Validating homography");
    let m = h.matrix();

    let det2 = m[(0, 0)] * m[(1, 1)] - m[(0, 1)] * m[(1, 0)];
    if det2 < 0.0 {
        return Err(HomographyRejection::OrientationFlipped);
    }

    let det = h.determinant();
    if det.abs() <= config.singular_epsilon {
        return Err(HomographyRejection::NonInvertible { det });
    }

    let tolerance = config.area_tolerance;
    let area = unit_square_area(h).unwrap_or(f64::INFINITY);
    if !(1.0 - tolerance..=1.0 + tolerance).contains(&area) {
        return Err(HomographyRejection::AreaNotPreserved { area, tolerance });
    }

    let (h31, h32) = (m[(2, 0)], m[(2, 1)]);
    if h31.abs() > config.max_perspective || h32.abs() > config.max_perspective {
        return Err(HomographyRejection::PerspectiveShift { h31, h32 });
    }

    Ok(())
}
