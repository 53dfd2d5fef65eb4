mod fast;
mod harris;
mod orb;
mod pattern;

pub use fast::{fast_corners, FastCorner};
pub use harris::harris_response;
pub use orb::OrbDetector;

use crate::consts::DESCRIPTOR_BYTES;

/// Packed 256-bit binary descriptor.
pub type Descriptor = [u8; DESCRIPTOR_BYTES];

/// A detected keypoint in level-0 (full resolution) pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    /// Orientation in radians, measured from +x towards +y.
    pub angle: f32,
    /// Score used to rank the keypoint within its pyramid level.
    pub response: f32,
    /// Pyramid level the keypoint was detected on.
    pub octave: usize,
    /// Diameter of the described patch in level-0 pixels.
    pub size: f32,
}
