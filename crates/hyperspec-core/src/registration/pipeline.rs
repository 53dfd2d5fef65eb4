use std::sync::Arc;

use tracing::{info, warn};

use crate::config::RegistrationConfig;
use crate::consts::HOMOGRAPHY_MIN_POINTS;
use crate::crop::trim_invalid_border;
use crate::cube::{Cube, Preview};
use crate::error::{HyperspecError, Result};
use crate::features::{Keypoint, OrbDetector};
use crate::homography::{find_homography_ransac, Homography};
use crate::matching::{match_descriptors, DMatch};
use crate::validate::validate_homography;
use crate::visualize::{draw_matches, resize_to_width};
use crate::warp::{warp_cube, warp_perspective};

use super::types::{
    NoOpReporter, ProgressReporter, Registered, RegistrationFailure, RegistrationOutput,
    RegistrationStage, RegistrationStats,
};

/// Register `src_cube` onto `dst_cube`.
///
/// Keypoints are detected on the previews, which must share the spatial
/// shape of their cubes.
pub fn register(
    dst_preview: &Preview,
    dst_cube: &Cube,
    src_preview: &Preview,
    src_cube: &Cube,
    config: &RegistrationConfig,
) -> Result<RegistrationOutput> {
    register_reported(
        dst_preview,
        dst_cube,
        src_preview,
        src_cube,
        config,
        Arc::new(NoOpReporter),
    )
}

/// Register with stage-by-stage progress reporting.
///
/// `Err` is reserved for unusable inputs. A pair that cannot be aligned
/// gives `Ok` with `outcome` set to the failure reason.
pub fn register_reported(
    dst_preview: &Preview,
    dst_cube: &Cube,
    src_preview: &Preview,
    src_cube: &Cube,
    config: &RegistrationConfig,
    reporter: Arc<dyn ProgressReporter>,
) -> Result<RegistrationOutput> {
    config.validate()?;
    check_inputs("dst", dst_preview, dst_cube)?;
    check_inputs("src", src_preview, src_cube)?;
    if src_cube.bands() != dst_cube.bands() {
        return Err(HyperspecError::ShapeMismatch(format!(
            "src cube has {} bands, dst cube has {}",
            src_cube.bands(),
            dst_cube.bands()
        )));
    }

    reporter.begin_stage(RegistrationStage::Detecting, Some(2));
    let detector = OrbDetector::new(config.orb.clone());
    let (src_keypoints, src_descriptors) = detector.detect_and_compute(src_preview);
    reporter.advance(1);
    let (dst_keypoints, dst_descriptors) = detector.detect_and_compute(dst_preview);
    reporter.advance(2);
    reporter.finish_stage();
    info!(
        src = src_keypoints.len(),
        dst = dst_keypoints.len(),
        "Detected keypoints"
    );

    reporter.begin_stage(RegistrationStage::Matching, None);
    let matches = match_descriptors(&src_descriptors, &dst_descriptors, &config.matcher);
    reporter.finish_stage();
    info!(matches = matches.len(), "Matched descriptors");

    let matched_visual = resize_to_width(
        &draw_matches(
            src_preview,
            &src_keypoints,
            dst_preview,
            &dst_keypoints,
            &matches,
        ),
        config.visual_width,
    );

    let mut stats = RegistrationStats {
        src_keypoints: src_keypoints.len(),
        dst_keypoints: dst_keypoints.len(),
        matches: matches.len(),
        ..Default::default()
    };

    reporter.begin_stage(RegistrationStage::Estimating, None);
    let estimated = estimate_homography(
        &src_keypoints,
        &dst_keypoints,
        &matches,
        config,
        &mut stats,
    );
    reporter.finish_stage();

    let homography = match estimated {
        Ok(h) => h,
        Err(failure) => return Ok(failed(failure, matched_visual, stats)),
    };
    info!(homography = %homography, inliers = stats.inliers, "Homography accepted");

    reporter.begin_stage(RegistrationStage::Warping, Some(src_cube.bands()));
    let preview = warp_perspective(&src_preview.view(), &homography, src_preview.dim(), 0.0)?;
    let mut cube = warp_cube(
        src_cube,
        &homography,
        dst_cube.spatial_dim(),
        config.border_value,
    )?;
    cube.wavelengths = dst_cube.wavelengths.clone();
    reporter.advance(src_cube.bands());
    reporter.finish_stage();

    let mut border_trim = 0;
    if config.crop_registered {
        reporter.begin_stage(RegistrationStage::Cropping, None);
        let trimmed = trim_invalid_border(&cube);
        reporter.finish_stage();
        match trimmed {
            Ok((trimmed, n)) => {
                cube = trimmed;
                border_trim = n;
            }
            Err(HyperspecError::InvalidCrop(_)) => {
                return Ok(failed(RegistrationFailure::NoOverlap, matched_visual, stats));
            }
            Err(e) => return Err(e),
        }
    }

    Ok(RegistrationOutput {
        outcome: Ok(Registered {
            cube,
            preview,
            homography,
            border_trim,
        }),
        matched_visual,
        stats,
    })
}

fn failed(
    failure: RegistrationFailure,
    matched_visual: image::RgbImage,
    stats: RegistrationStats,
) -> RegistrationOutput {
    warn!(reason = %failure, "Registration failed");
    RegistrationOutput {
        outcome: Err(failure),
        matched_visual,
        stats,
    }
}

fn check_inputs(name: &str, preview: &Preview, cube: &Cube) -> Result<()> {
    let (rows, cols) = preview.dim();
    if rows == 0 || cols == 0 {
        return Err(HyperspecError::InvalidDimensions {
            width: cols,
            height: rows,
        });
    }
    if preview.dim() != cube.spatial_dim() {
        return Err(HyperspecError::ShapeMismatch(format!(
            "{name} preview is {:?} but {name} cube is {:?}",
            preview.dim(),
            cube.spatial_dim()
        )));
    }
    if cube.bands() == 0 {
        return Err(HyperspecError::InvalidCube(format!("{name} cube has no bands")));
    }
    Ok(())
}

/// RANSAC on the matched keypoint positions followed by the geometric
/// checks.
fn estimate_homography(
    src_keypoints: &[Keypoint],
    dst_keypoints: &[Keypoint],
    matches: &[DMatch],
    config: &RegistrationConfig,
    stats: &mut RegistrationStats,
) -> std::result::Result<Homography, RegistrationFailure> {
    if src_keypoints.len() < HOMOGRAPHY_MIN_POINTS
        || dst_keypoints.len() < HOMOGRAPHY_MIN_POINTS
    {
        return Err(RegistrationFailure::TooFewKeypoints {
            src: src_keypoints.len(),
            dst: dst_keypoints.len(),
        });
    }
    if matches.len() < HOMOGRAPHY_MIN_POINTS {
        return Err(RegistrationFailure::TooFewMatches {
            found: matches.len(),
            required: HOMOGRAPHY_MIN_POINTS,
        });
    }

    let (src_points, dst_points): (Vec<[f64; 2]>, Vec<[f64; 2]>) = matches
        .iter()
        .map(|m| {
            let s = &src_keypoints[m.query_idx];
            let d = &dst_keypoints[m.train_idx];
            ([s.x as f64, s.y as f64], [d.x as f64, d.y as f64])
        })
        .unzip();

    let fit = find_homography_ransac(&src_points, &dst_points, &config.ransac)
        .ok_or(RegistrationFailure::HomographyNotFound)?;
    stats.inliers = fit.inlier_count;
    stats.ransac_iterations = fit.iterations;

    validate_homography(&fit.homography, &config.validation)?;
    Ok(fit.homography)
}
