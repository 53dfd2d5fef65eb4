use image::RgbImage;
use thiserror::Error;

use crate::cube::{Cube, Preview};
use crate::homography::Homography;
use crate::validate::HomographyRejection;

/// Registration stages, reported in this order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegistrationStage {
    Detecting,
    Matching,
    Estimating,
    Warping,
    Cropping,
}

impl std::fmt::Display for RegistrationStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Detecting => write!(f, "Detecting keypoints"),
            Self::Matching => write!(f, "Matching descriptors"),
            Self::Estimating => write!(f, "Estimating homography"),
            Self::Warping => write!(f, "Warping bands"),
            Self::Cropping => write!(f, "Cropping borders"),
        }
    }
}

/// Receives progress updates from `register_reported`.
pub trait ProgressReporter: Send + Sync {
    /// A new stage has started. `total_items` is the number of work items in
    /// this stage (e.g. band count), if known.
    fn begin_stage(&self, _stage: RegistrationStage, _total_items: Option<usize>) {}

    /// Work items within the current stage have completed.
    fn advance(&self, _items_done: usize) {}

    /// The current stage is finished.
    fn finish_stage(&self) {}
}

/// Reporter that ignores every update.
pub struct NoOpReporter;
impl ProgressReporter for NoOpReporter {}

/// Why a pair of cubes could not be registered. These are expected outcomes
/// for dissimilar captures, not hard errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistrationFailure {
    #[error("Too few keypoints (src: {src}, dst: {dst})")]
    TooFewKeypoints { src: usize, dst: usize },

    #[error("Too few matches ({found}, need {required})")]
    TooFewMatches { found: usize, required: usize },

    #[error("Homography could not be found")]
    HomographyNotFound,

    #[error(transparent)]
    Rejected(#[from] HomographyRejection),

    #[error("Registered cube has no valid overlap with the destination")]
    NoOverlap,
}

/// A successful registration.
#[derive(Clone, Debug)]
pub struct Registered {
    /// Source cube warped into the destination frame (destination wavelengths).
    pub cube: Cube,
    /// Source preview warped with the same homography, at the source size.
    pub preview: Preview,
    /// Transform mapping source pixels onto destination pixels.
    pub homography: Homography,
    /// Pixels removed from every side by the alignment crop.
    pub border_trim: usize,
}

/// Counters collected while registering.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RegistrationStats {
    pub src_keypoints: usize,
    pub dst_keypoints: usize,
    pub matches: usize,
    pub inliers: usize,
    pub ransac_iterations: usize,
}

/// Everything `register` produces. The match visualisation is rendered
/// whether or not registration succeeds.
#[derive(Clone, Debug)]
pub struct RegistrationOutput {
    pub outcome: std::result::Result<Registered, RegistrationFailure>,
    pub matched_visual: RgbImage,
    pub stats: RegistrationStats,
}
