/// Minimum pixel count (h*w) to use row-level Rayon parallelism.
pub const PARALLEL_PIXEL_THRESHOLD: usize = 65_536;

/// Minimum band count to warp bands in parallel.
pub const PARALLEL_BAND_THRESHOLD: usize = 4;

/// Minimum query descriptor count to match in parallel.
pub const PARALLEL_MATCH_THRESHOLD: usize = 256;

/// ITU-R BT.601 luminance coefficient for the red channel.
pub const LUMINANCE_R: f32 = 0.299;

/// ITU-R BT.601 luminance coefficient for the green channel.
pub const LUMINANCE_G: f32 = 0.587;

/// ITU-R BT.601 luminance coefficient for the blue channel.
pub const LUMINANCE_B: f32 = 0.114;

/// Maximum number of ORB keypoints retained across all pyramid levels.
pub const DEFAULT_ORB_FEATURES: usize = 10_000;

/// Downscale factor between consecutive ORB pyramid levels.
pub const DEFAULT_ORB_SCALE_FACTOR: f32 = 1.2;

/// Number of ORB pyramid levels.
pub const DEFAULT_ORB_LEVELS: usize = 8;

/// Border (in pixels) where no ORB keypoints are detected.
pub const DEFAULT_ORB_EDGE_THRESHOLD: usize = 31;

/// Side length of the rBRIEF sampling patch.
pub const DEFAULT_ORB_PATCH_SIZE: usize = 31;

/// FAST intensity threshold for images scaled to [0, 1] (20 grey levels of 255).
pub const DEFAULT_FAST_THRESHOLD: f32 = 20.0 / 255.0;

/// Harris corner response free parameter.
pub const HARRIS_K: f32 = 0.04;

/// Harris structure tensor window size.
pub const HARRIS_BLOCK_SIZE: usize = 7;

/// Gaussian sigma applied to each level before sampling descriptors.
pub const DESCRIPTOR_BLUR_SIGMA: f32 = 2.0;

/// Seed of the rBRIEF sampling pattern. Changing it invalidates every
/// stored descriptor.
pub const BRIEF_PATTERN_SEED: u64 = 0x4852_5053_4543_0001;

/// Number of bits in an ORB descriptor.
pub const DESCRIPTOR_BITS: usize = 256;

/// Bytes in a packed ORB descriptor.
pub const DESCRIPTOR_BYTES: usize = DESCRIPTOR_BITS / 8;

/// RANSAC reprojection threshold in pixels.
pub const DEFAULT_RANSAC_REPROJ_THRESHOLD: f64 = 5.0;

/// Upper bound on RANSAC iterations.
pub const DEFAULT_RANSAC_MAX_ITERATIONS: usize = 2_000;

/// Probability that at least one RANSAC sample is outlier-free.
pub const DEFAULT_RANSAC_CONFIDENCE: f64 = 0.995;

/// Minimum number of correspondences for a homography.
pub const HOMOGRAPHY_MIN_POINTS: usize = 4;

/// Allowed relative change of the unit square's area under a homography.
pub const DEFAULT_AREA_TOLERANCE: f64 = 0.1;

/// Largest accepted magnitude of the homography's perspective terms.
pub const DEFAULT_MAX_PERSPECTIVE: f64 = 0.001;

/// Determinant magnitude at or below which a homography is singular.
pub const DEFAULT_SINGULAR_EPSILON: f64 = 1e-8;

/// Fill value for warped pixels with no source data. Must be negative so the
/// alignment crop can find it.
pub const DEFAULT_BORDER_VALUE: f32 = -999.0;

/// Width (in pixels) of the rendered keypoint-match visualisation.
pub const DEFAULT_VISUAL_WIDTH: u32 = 1_000;

/// Small epsilon to avoid division by zero in floating-point comparisons.
pub const EPSILON: f64 = 1e-12;
