use image::{Rgb, RgbImage};
use ndarray::{s, Array2, Array3, ArrayView2, ArrayViewMut2, Axis};

use crate::consts::{LUMINANCE_B, LUMINANCE_G, LUMINANCE_R};
use crate::crop::CropRect;
use crate::error::{HyperspecError, Result};

/// A single-channel preview image used for feature detection.
/// Pixel values are f32, nominally in [0.0, 1.0], shape = (rows, cols).
pub type Preview = Array2<f32>;

/// A hyperspectral cube.
#[derive(Clone, Debug)]
pub struct Cube {
    /// Samples, shape = (rows, cols, bands)
    pub data: Array3<f32>,
    /// Band centre wavelengths, one per band. Empty when unknown.
    pub wavelengths: Vec<f32>,
}

impl Cube {
    pub fn new(data: Array3<f32>, wavelengths: Vec<f32>) -> Result<Self> {
        let bands = data.dim().2;
        if !wavelengths.is_empty() && wavelengths.len() != bands {
            return Err(HyperspecError::ShapeMismatch(format!(
                "{} wavelengths for {} bands",
                wavelengths.len(),
                bands
            )));
        }
        Ok(Self { data, wavelengths })
    }

    /// Stack equally sized band images into a cube.
    pub fn from_bands(bands: &[Array2<f32>], wavelengths: Vec<f32>) -> Result<Self> {
        let first = bands.first().ok_or_else(|| {
            HyperspecError::ShapeMismatch("cannot build a cube from zero bands".into())
        })?;
        let (rows, cols) = first.dim();

        let mut data = Array3::<f32>::zeros((rows, cols, bands.len()));
        for (i, band) in bands.iter().enumerate() {
            if band.dim() != (rows, cols) {
                return Err(HyperspecError::ShapeMismatch(format!(
                    "band {i} is {:?}, expected {:?}",
                    band.dim(),
                    (rows, cols)
                )));
            }
            data.index_axis_mut(Axis(2), i).assign(band);
        }

        Self::new(data, wavelengths)
    }

    /// A zero-filled cube with the same shape and wavelengths.
    pub fn zeros_like(other: &Cube) -> Self {
        Self {
            data: Array3::zeros(other.data.raw_dim()),
            wavelengths: other.wavelengths.clone(),
        }
    }

    pub fn rows(&self) -> usize {
        self.data.dim().0
    }

    pub fn cols(&self) -> usize {
        self.data.dim().1
    }

    pub fn bands(&self) -> usize {
        self.data.dim().2
    }

    /// Spatial shape as (rows, cols).
    pub fn spatial_dim(&self) -> (usize, usize) {
        (self.rows(), self.cols())
    }

    pub fn band(&self, index: usize) -> ArrayView2<'_, f32> {
        self.data.index_axis(Axis(2), index)
    }

    pub fn band_mut(&mut self, index: usize) -> ArrayViewMut2<'_, f32> {
        self.data.index_axis_mut(Axis(2), index)
    }

    /// Spatially crop every band to `rect`.
    pub fn crop(&self, rect: &CropRect) -> Result<Cube> {
        let rect = rect.validated(self.cols() as u32, self.rows() as u32)?;
        let (x, y) = (rect.x as usize, rect.y as usize);
        let (w, h) = (rect.width as usize, rect.height as usize);
        Ok(Cube {
            data: self.data.slice(s![y..y + h, x..x + w, ..]).to_owned(),
            wavelengths: self.wavelengths.clone(),
        })
    }

    /// Remove `n` pixels from every side.
    pub fn trim_border(&self, n: usize) -> Result<Cube> {
        let (rows, cols) = self.spatial_dim();
        if 2 * n >= rows || 2 * n >= cols {
            return Err(HyperspecError::InvalidCrop(format!(
                "trimming {n} pixels from a {cols}x{rows} cube leaves nothing"
            )));
        }
        Ok(Cube {
            data: self
                .data
                .slice(s![n..rows - n, n..cols - n, ..])
                .to_owned(),
            wavelengths: self.wavelengths.clone(),
        })
    }

    /// Greyscale preview: per-pixel band mean, min-max normalised to [0, 1].
    /// Negative and non-finite samples (fill values) are ignored.
    pub fn preview(&self) -> Preview {
        let (rows, cols) = self.spatial_dim();
        let mut mean = Array2::<f32>::zeros((rows, cols));

        for ((r, c), out) in mean.indexed_iter_mut() {
            let spectrum = self.data.slice(s![r, c, ..]);
            let (sum, count) = spectrum
                .iter()
                .filter(|v| v.is_finite() && **v >= 0.0)
                .fold((0.0f64, 0usize), |(s, n), &v| (s + v as f64, n + 1));
            *out = if count > 0 {
                (sum / count as f64) as f32
            } else {
                0.0
            };
        }

        normalise(&mut mean);
        mean
    }

    /// False-colour preview from three band indices, each channel
    /// stretched independently.
    pub fn rgb_preview(&self, red: usize, green: usize, blue: usize) -> Result<RgbImage> {
        let bands = self.bands();
        for idx in [red, green, blue] {
            if idx >= bands {
                return Err(HyperspecError::ShapeMismatch(format!(
                    "band {idx} out of range (total: {bands})"
                )));
            }
        }

        let channels: Vec<Array2<f32>> = [red, green, blue]
            .iter()
            .map(|&b| {
                let mut ch = self.band(b).mapv(|v| if v.is_finite() { v.max(0.0) } else { 0.0 });
                normalise(&mut ch);
                ch
            })
            .collect();

        let (rows, cols) = self.spatial_dim();
        let mut img = RgbImage::new(cols as u32, rows as u32);
        for row in 0..rows {
            for col in 0..cols {
                let px = [
                    (channels[0][[row, col]] * 255.0) as u8,
                    (channels[1][[row, col]] * 255.0) as u8,
                    (channels[2][[row, col]] * 255.0) as u8,
                ];
                img.put_pixel(col as u32, row as u32, Rgb(px));
            }
        }
        Ok(img)
    }
}

/// Convert an RGB image to a [0, 1] greyscale preview (BT.601 weights).
pub fn to_greyscale(img: &RgbImage) -> Preview {
    let (w, h) = img.dimensions();
    let mut data = Array2::<f32>::zeros((h as usize, w as usize));
    for (x, y, px) in img.enumerate_pixels() {
        let [r, g, b] = px.0;
        data[[y as usize, x as usize]] = (LUMINANCE_R * r as f32
            + LUMINANCE_G * g as f32
            + LUMINANCE_B * b as f32)
            / 255.0;
    }
    data
}

/// Rescale in place so the finite values span [0, 1].
fn normalise(data: &mut Array2<f32>) {
    let (lo, hi) = data
        .iter()
        .filter(|v| v.is_finite())
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let range = hi - lo;
    if !range.is_finite() || range <= f32::EPSILON {
        data.fill(0.0);
        return;
    }
    data.mapv_inplace(|v| if v.is_finite() { ((v - lo) / range).clamp(0.0, 1.0) } else { 0.0 });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp_cube(rows: usize, cols: usize, bands: usize) -> Cube {
        let data = Array3::from_shape_fn((rows, cols, bands), |(r, c, b)| {
            (r * cols + c) as f32 + b as f32 * 0.5
        });
        Cube::new(data, (0..bands).map(|b| 400.0 + b as f32 * 10.0).collect()).unwrap()
    }

    #[test]
    fn test_wavelength_count_must_match_bands() {
        let data = Array3::<f32>::zeros((2, 2, 3));
        assert!(Cube::new(data.clone(), vec![1.0, 2.0]).is_err());
        assert!(Cube::new(data, vec![]).is_ok());
    }

    #[test]
    fn test_from_bands_rejects_mixed_shapes() {
        let a = Array2::<f32>::zeros((4, 4));
        let b = Array2::<f32>::zeros((4, 5));
        assert!(Cube::from_bands(&[a, b], vec![]).is_err());
    }

    #[test]
    fn test_crop_keeps_wavelengths() {
        let cube = ramp_cube(6, 8, 3);
        let cropped = cube
            .crop(&CropRect { x: 2, y: 1, width: 3, height: 2 })
            .unwrap();
        assert_eq!(cropped.spatial_dim(), (2, 3));
        assert_eq!(cropped.wavelengths, cube.wavelengths);
        assert_eq!(cropped.data[[0, 0, 0]], cube.data[[1, 2, 0]]);
    }

    #[test]
    fn test_trim_border() {
        let cube = ramp_cube(6, 6, 2);
        let trimmed = cube.trim_border(1).unwrap();
        assert_eq!(trimmed.spatial_dim(), (4, 4));
        assert_eq!(trimmed.data[[0, 0, 1]], cube.data[[1, 1, 1]]);
        assert!(cube.trim_border(3).is_err());
    }

    #[test]
    fn test_preview_normalised() {
        let cube = ramp_cube(4, 4, 3);
        let preview = cube.preview();
        assert_eq!(preview.dim(), (4, 4));
        assert_eq!(preview[[0, 0]], 0.0);
        assert_eq!(preview[[3, 3]], 1.0);
    }

    #[test]
    fn test_preview_ignores_fill_values() {
        let mut cube = ramp_cube(3, 3, 2);
        cube.data[[1, 1, 0]] = -999.0;
        let preview = cube.preview();
        assert!(preview.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_rgb_preview_stretches_each_channel() {
        // Band 1 spans a range ten times wider than band 0; band 2 is flat.
        let data = Array3::from_shape_fn((2, 3, 3), |(r, c, b)| {
            let v = (r * 3 + c) as f32;
            match b {
                0 => v,
                1 => 100.0 + 10.0 * v,
                _ => 7.0,
            }
        });
        let cube = Cube::new(data, vec![]).unwrap();

        let img = cube.rgb_preview(1, 0, 2).unwrap();
        assert_eq!(img.dimensions(), (3, 2));
        assert_eq!(img.get_pixel(0, 0), &Rgb([0, 0, 0]));
        assert_eq!(img.get_pixel(2, 1), &Rgb([255, 255, 0]));
        // Both ramps stretch to the same scale.
        let mid = img.get_pixel(1, 0);
        assert_eq!(mid[0], mid[1]);
    }

    #[test]
    fn test_rgb_preview_band_out_of_range() {
        let cube = ramp_cube(2, 2, 3);
        assert!(matches!(
            cube.rgb_preview(0, 1, 3),
            Err(HyperspecError::ShapeMismatch(_))
        ));
    }

    #[test]
    fn test_greyscale_weights() {
        let mut img = RgbImage::new(1, 1);
        img.put_pixel(0, 0, Rgb([255, 255, 255]));
        let grey = to_greyscale(&img);
        assert!((grey[[0, 0]] - 1.0).abs() < 1e-5);
    }
}
