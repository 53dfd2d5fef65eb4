use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind};
use std::path::Path;

use ndarray::Axis;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::cube::Cube;
use crate::error::{HyperspecError, Result};

/// A rectangle in image coordinates for cropping.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropRect {
    /// Bounding box of a polygon given as `[x, y]` corners, rounded to whole
    /// pixels. Corners left of or above the image origin are clamped to it.
    pub fn from_corners(corners: &[[f64; 2]]) -> Result<CropRect> {
        if corners.is_empty() {
            return Err(HyperspecError::InvalidCrop("Crop polygon has no corners".into()));
        }

        let (mut x0, mut y0) = (f64::INFINITY, f64::INFINITY);
        let (mut x1, mut y1) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
        for &[x, y] in corners {
            if !x.is_finite() || !y.is_finite() {
                return Err(HyperspecError::InvalidCrop(format!(
                    "Non-finite crop corner ({x}, {y})"
                )));
            }
            let (x, y) = (x.round().max(0.0), y.round().max(0.0));
            x0 = x0.min(x);
            y0 = y0.min(y);
            x1 = x1.max(x);
            y1 = y1.max(y);
        }

        Ok(CropRect {
            x: x0 as u32,
            y: y0 as u32,
            width: (x1 - x0) as u32,
            height: (y1 - y0) as u32,
        })
    }

    /// Validate the crop rect against the source dimensions.
    pub fn validated(&self, src_w: u32, src_h: u32) -> Result<CropRect> {
        if self.width == 0 || self.height == 0 {
            return Err(HyperspecError::InvalidCrop(
                "Crop width and height must be > 0".into(),
            ));
        }

        if self.x + self.width > src_w || self.y + self.height > src_h {
            return Err(HyperspecError::InvalidCrop(format!(
                "Crop region ({},{} {}x{}) exceeds source dimensions ({src_w}x{src_h})",
                self.x, self.y, self.width, self.height
            )));
        }

        Ok(self.clone())
    }
}

/// Strip whole-pixel rings from the cube until no sample is negative.
///
/// Returns the trimmed cube and the number of pixels removed from each side.
pub fn trim_invalid_border(cube: &Cube) -> Result<(Cube, usize)> {
    let (rows, cols) = cube.spatial_dim();

    // A negative pixel at (r, c) survives until the trim exceeds its
    // distance to the nearest edge.
    let mut trim = 0usize;
    for ((r, c), spectrum) in cube
        .data
        .lanes(Axis(2))
        .into_iter()
        .enumerate()
        .map(|(i, lane)| ((i / cols, i % cols), lane))
    {
        if spectrum.iter().any(|&v| v < 0.0) {
            let edge_distance = r.min(c).min(rows - 1 - r).min(cols - 1 - c);
            trim = trim.max(edge_distance + 1);
        }
    }

    let trimmed = if trim == 0 {
        cube.clone()
    } else {
        cube.trim_border(trim)?
    };
    info!(pixels = trim, "Cropped around edges of registered cube");
    Ok((trimmed, trim))
}

/// Region-of-interest polygons keyed by capture ID, stored as JSON
/// (`{"2023-03-09_014": [[x, y], ...], ...}`).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CropDb {
    corners: BTreeMap<String, Vec<[f64; 2]>>,
}

impl CropDb {
    pub fn load(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    /// Load the database, starting empty if the file does not exist yet.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match File::open(path) {
            Ok(file) => Ok(serde_json::from_reader(BufReader::new(file))?),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(path = %path.display(), "Crop database not found, starting a new one");
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(writer, self)?;
        Ok(())
    }

    pub fn get(&self, capture_id: &str) -> Option<&[[f64; 2]]> {
        self.corners.get(capture_id).map(Vec::as_slice)
    }

    /// Store a polygon, keeping at most its first four corners.
    pub fn insert(&mut self, capture_id: impl Into<String>, corners: &[[f64; 2]]) {
        let kept = corners.iter().take(4).copied().collect();
        self.corners.insert(capture_id.into(), kept);
    }

    pub fn capture_ids(&self) -> impl Iterator<Item = &str> {
        self.corners.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.corners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.corners.is_empty()
    }

    /// Bounding box of the first four corners stored for `capture_id`.
    pub fn bounds(&self, capture_id: &str) -> Result<CropRect> {
        let corners = self
            .get(capture_id)
            .ok_or_else(|| HyperspecError::UnknownCapture(capture_id.to_string()))?;
        let n = corners.len().min(4);
        CropRect::from_corners(&corners[..n])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    #[test]
    fn test_from_corners_rounds_to_bounding_box() {
        let rect = CropRect::from_corners(&[
            [49.70, 157.82],
            [472.23, 153.13],
            [471.23, 471.60],
            [50.70, 472.54],
        ])
        .unwrap();
        assert_eq!(
            rect,
            CropRect { x: 50, y: 153, width: 422, height: 320 }
        );
    }

    #[test]
    fn test_from_corners_clamps_negative() {
        let rect = CropRect::from_corners(&[[-3.0, -1.0], [10.0, 8.0]]).unwrap();
        assert_eq!(rect.x, 0);
        assert_eq!(rect.y, 0);
        assert_eq!(rect.width, 10);
    }

    #[test]
    fn test_validated_rejects_overflow() {
        let rect = CropRect { x: 5, y: 0, width: 10, height: 4 };
        assert!(rect.validated(12, 4).is_err());
        assert!(rect.validated(15, 4).is_ok());
    }

    #[test]
    fn test_trim_nothing_when_valid() {
        let cube = Cube::new(Array3::from_elem((5, 5, 2), 0.5), vec![]).unwrap();
        let (trimmed, n) = trim_invalid_border(&cube).unwrap();
        assert_eq!(n, 0);
        assert_eq!(trimmed.spatial_dim(), (5, 5));
    }

    #[test]
    fn test_trim_matches_ring_peeling() {
        let mut data = Array3::from_elem((8, 10, 2), 1.0f32);
        // Invalid column 1 in band 1, and a corner pixel in band 0.
        for r in 0..8 {
            data[[r, 1, 1]] = -999.0;
        }
        data[[7, 9, 0]] = -999.0;
        let cube = Cube::new(data, vec![]).unwrap();

        let (trimmed, n) = trim_invalid_border(&cube).unwrap();
        assert_eq!(n, 2);
        assert_eq!(trimmed.spatial_dim(), (4, 6));
        assert!(trimmed.data.iter().all(|&v| v >= 0.0));
    }

    #[test]
    fn test_trim_fails_when_everything_invalid() {
        let cube = Cube::new(Array3::from_elem((4, 4, 1), -1.0), vec![]).unwrap();
        assert!(trim_invalid_border(&cube).is_err());
    }

    #[test]
    fn test_insert_keeps_four_corners() {
        let mut db = CropDb::default();
        db.insert("a", &[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0], [0.5, 0.5]]);
        assert_eq!(db.get("a").unwrap().len(), 4);
        assert!(matches!(
            db.bounds("missing"),
            Err(HyperspecError::UnknownCapture(_))
        ));
    }
}
