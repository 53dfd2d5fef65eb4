use std::fmt;

use serde::{Deserialize, Serialize};

use crate::consts::*;
use crate::error::{HyperspecError, Result};

/// Full set of registration parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegistrationConfig {
    #[serde(default)]
    pub orb: OrbConfig,
    #[serde(default)]
    pub matcher: MatcherConfig,
    #[serde(default)]
    pub ransac: RansacConfig,
    #[serde(default)]
    pub validation: ValidationConfig,
    /// Trim warped border pixels that carry `border_value`.
    #[serde(default = "default_true")]
    pub crop_registered: bool,
    /// Fill value for pixels outside the warped source.
    #[serde(default = "default_border_value")]
    pub border_value: f32,
    /// Width of the rendered match visualisation.
    #[serde(default = "default_visual_width")]
    pub visual_width: u32,
}

fn default_true() -> bool {
    true
}

fn default_border_value() -> f32 {
    DEFAULT_BORDER_VALUE
}

fn default_visual_width() -> u32 {
    DEFAULT_VISUAL_WIDTH
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            orb: OrbConfig::default(),
            matcher: MatcherConfig::default(),
            ransac: RansacConfig::default(),
            validation: ValidationConfig::default(),
            crop_registered: true,
            border_value: DEFAULT_BORDER_VALUE,
            visual_width: DEFAULT_VISUAL_WIDTH,
        }
    }
}

impl RegistrationConfig {
    /// Reject parameter combinations the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        let orb = &self.orb;
        if orb.n_features == 0 {
            return Err(invalid("orb.n_features must be > 0"));
        }
        if orb.scale_factor <= 1.0 || !orb.scale_factor.is_finite() {
            return Err(invalid("orb.scale_factor must be > 1.0"));
        }
        if orb.n_levels == 0 {
            return Err(invalid("orb.n_levels must be > 0"));
        }
        if orb.patch_size < 7 || orb.patch_size % 2 == 0 {
            return Err(invalid("orb.patch_size must be odd and >= 7"));
        }
        if orb.fast_threshold.is_nan() || orb.fast_threshold < 0.0 {
            return Err(invalid("orb.fast_threshold must be >= 0"));
        }
        let reproj = self.ransac.reproj_threshold;
        if !reproj.is_finite() || reproj <= 0.0 {
            return Err(invalid("ransac.reproj_threshold must be finite and > 0"));
        }
        if !(0.0..1.0).contains(&self.ransac.confidence) {
            return Err(invalid("ransac.confidence must be in [0, 1)"));
        }
        if self.ransac.max_iterations == 0 {
            return Err(invalid("ransac.max_iterations must be > 0"));
        }
        if !(0.0..1.0).contains(&self.validation.area_tolerance) {
            return Err(invalid("validation.area_tolerance must be in [0, 1)"));
        }
        let max_perspective = self.validation.max_perspective;
        if !max_perspective.is_finite() || max_perspective < 0.0 {
            return Err(invalid("validation.max_perspective must be finite and >= 0"));
        }
        if !self.border_value.is_finite() {
            return Err(invalid("border_value must be finite"));
        }
        if self.crop_registered && self.border_value >= 0.0 {
            return Err(invalid(
                "border_value must be negative when crop_registered is set",
            ));
        }
        if self.visual_width == 0 {
            return Err(invalid("visual_width must be > 0"));
        }
        Ok(())
    }
}

fn invalid(msg: &str) -> HyperspecError {
    HyperspecError::InvalidConfig(msg.to_string())
}

/// Oriented FAST / rotated BRIEF detector parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrbConfig {
    pub n_features: usize,
    pub scale_factor: f32,
    pub n_levels: usize,
    pub edge_threshold: usize,
    pub patch_size: usize,
    /// FAST threshold on [0, 1] intensities.
    pub fast_threshold: f32,
    pub score: ScoreType,
    pub wta_k: WtaK,
}

impl Default for OrbConfig {
    fn default() -> Self {
        Self {
            n_features: DEFAULT_ORB_FEATURES,
            scale_factor: DEFAULT_ORB_SCALE_FACTOR,
            n_levels: DEFAULT_ORB_LEVELS,
            edge_threshold: DEFAULT_ORB_EDGE_THRESHOLD,
            patch_size: DEFAULT_ORB_PATCH_SIZE,
            fast_threshold: DEFAULT_FAST_THRESHOLD,
            score: ScoreType::Harris,
            wta_k: WtaK::Four,
        }
    }
}

/// Corner score used to rank FAST keypoints.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScoreType {
    #[default]
    Harris,
    Fast,
}

impl fmt::Display for ScoreType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Harris => write!(f, "Harris"),
            Self::Fast => write!(f, "FAST"),
        }
    }
}

/// Number of points compared to produce each descriptor element.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum WtaK {
    Two,
    Three,
    #[default]
    Four,
}

impl WtaK {
    pub fn points(self) -> usize {
        match self {
            Self::Two => 2,
            Self::Three => 3,
            Self::Four => 4,
        }
    }

    /// The distance that matches descriptors built with this WTA_K.
    pub fn natural_norm(self) -> NormType {
        match self {
            Self::Two => NormType::Hamming,
            Self::Three | Self::Four => NormType::Hamming2,
        }
    }
}

impl fmt::Display for WtaK {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WTA_K={}", self.points())
    }
}

/// Descriptor distance.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum NormType {
    /// Number of differing bits.
    Hamming,
    /// Number of differing 2-bit fields.
    #[default]
    Hamming2,
}

impl fmt::Display for NormType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hamming => write!(f, "Hamming"),
            Self::Hamming2 => write!(f, "Hamming2"),
        }
    }
}

/// Brute-force matcher parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    pub norm: NormType,
    /// Keep only mutual nearest neighbours.
    pub cross_check: bool,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            norm: NormType::Hamming2,
            cross_check: true,
        }
    }
}

/// Robust homography estimation parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RansacConfig {
    /// Maximum reprojection error (pixels) for an inlier.
    pub reproj_threshold: f64,
    pub max_iterations: usize,
    pub confidence: f64,
    /// Fixed sampling seed for reproducible runs.
    pub seed: Option<u64>,
}

impl Default for RansacConfig {
    fn default() -> Self {
        Self {
            reproj_threshold: DEFAULT_RANSAC_REPROJ_THRESHOLD,
            max_iterations: DEFAULT_RANSAC_MAX_ITERATIONS,
            confidence: DEFAULT_RANSAC_CONFIDENCE,
            seed: None,
        }
    }
}

/// Geometric limits a homography must satisfy for a near-fronto-parallel
/// capture of a fixed scene.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Allowed relative change of the unit square's area.
    pub area_tolerance: f64,
    /// Largest accepted |h31| and |h32|.
    pub max_perspective: f64,
    /// |det(H)| at or below this is treated as singular.
    pub singular_epsilon: f64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            area_tolerance: DEFAULT_AREA_TOLERANCE,
            max_perspective: DEFAULT_MAX_PERSPECTIVE,
            singular_epsilon: DEFAULT_SINGULAR_EPSILON,
        }
    }
}
