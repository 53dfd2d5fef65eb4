use ndarray::{Array2, ArrayView2};
use rayon::prelude::*;

use crate::consts::{PARALLEL_BAND_THRESHOLD, PARALLEL_PIXEL_THRESHOLD};
use crate::cube::Cube;
use crate::error::{HyperspecError, Result};
use crate::homography::Homography;

/// Interpolation weights are quantised to 1/32 pixel so that transforms
/// which are numerically close to integer shifts sample exactly one pixel.
const INTER_TAB_SIZE: f64 = 32.0;

/// Bilinear sample at (y, x). Neighbours outside the image read as
/// `border_value`.
pub fn bilinear_sample(data: &ArrayView2<'_, f32>, y: f64, x: f64, border_value: f32) -> f32 {
    match SampleTap::new(y, x) {
        Some(tap) => tap.sample(data, border_value),
        None => border_value,
    }
}

/// Source location of one output pixel, split into the top-left integer
/// neighbour and quantised fractional weights.
#[derive(Clone, Copy, Debug)]
struct SampleTap {
    y0: i64,
    x0: i64,
    fy: f32,
    fx: f32,
}

impl SampleTap {
    fn new(y: f64, x: f64) -> Option<Self> {
        if !x.is_finite() || !y.is_finite() {
            return None;
        }
        let (y0, fy) = split_coord(y);
        let (x0, fx) = split_coord(x);
        Some(Self { y0, x0, fy, fx })
    }

    fn sample(&self, data: &ArrayView2<'_, f32>, border_value: f32) -> f32 {
        let (h, w) = data.dim();
        let at = |r: i64, c: i64| -> f32 {
            if r >= 0 && r < h as i64 && c >= 0 && c < w as i64 {
                data[[r as usize, c as usize]]
            } else {
                border_value
            }
        };

        let (fx, fy) = (self.fx, self.fy);
        let mut value = at(self.y0, self.x0) * (1.0 - fx) * (1.0 - fy);
        if fx > 0.0 {
            value += at(self.y0, self.x0 + 1) * fx * (1.0 - fy);
        }
        if fy > 0.0 {
            value += at(self.y0 + 1, self.x0) * (1.0 - fx) * fy;
        }
        if fx > 0.0 && fy > 0.0 {
            value += at(self.y0 + 1, self.x0 + 1) * fx * fy;
        }
        value
    }
}

fn split_coord(v: f64) -> (i64, f32) {
    let scaled = (v * INTER_TAB_SIZE).round();
    let base = (scaled / INTER_TAB_SIZE).floor();
    let frac = (scaled - base * INTER_TAB_SIZE) / INTER_TAB_SIZE;
    (base as i64, frac as f32)
}

/// Inverse-map every output pixel through `homography` (src -> dst).
fn build_taps(homography: &Homography, out_dim: (usize, usize)) -> Result<Vec<Option<SampleTap>>> {
    let inverse = homography.try_inverse().ok_or_else(|| {
        HyperspecError::Homography("cannot warp with a singular homography".into())
    })?;

    let (rows, cols) = out_dim;
    let row_taps = |row: usize| -> Vec<Option<SampleTap>> {
        (0..cols)
            .map(|col| {
                inverse
                    .transform_point(col as f64, row as f64)
                    .and_then(|(x, y)| SampleTap::new(y, x))
            })
            .collect()
    };

    let taps = if rows * cols >= PARALLEL_PIXEL_THRESHOLD {
        (0..rows).into_par_iter().flat_map_iter(row_taps).collect()
    } else {
        (0..rows).flat_map(row_taps).collect()
    };
    Ok(taps)
}

fn apply_taps(
    src: &ArrayView2<'_, f32>,
    taps: &[Option<SampleTap>],
    out_dim: (usize, usize),
    border_value: f32,
) -> Result<Array2<f32>> {
    let values: Vec<f32> = taps
        .iter()
        .map(|tap| match tap {
            Some(tap) => tap.sample(src, border_value),
            None => border_value,
        })
        .collect();
    Array2::from_shape_vec(out_dim, values)
        .map_err(|e| HyperspecError::ShapeMismatch(format!("warp output: {e}")))
}

/// Warp a single image with `homography` (src -> dst) into an image of
/// `out_dim = (rows, cols)`, using bilinear interpolation and a constant
/// border.
pub fn warp_perspective(
    src: &ArrayView2<'_, f32>,
    homography: &Homography,
    out_dim: (usize, usize),
    border_value: f32,
) -> Result<Array2<f32>> {
    let taps = build_taps(homography, out_dim)?;
    apply_taps(src, &taps, out_dim, border_value)
}

/// Apply the same perspective warp to every band of `cube`.
pub fn warp_cube(
    cube: &Cube,
    homography: &Homography,
    out_dim: (usize, usize),
    border_value: f32,
) -> Result<Cube> {
    let taps = build_taps(homography, out_dim)?;
    let warp_band = |b: usize| apply_taps(&cube.band(b), &taps, out_dim, border_value);

    let bands: Vec<Array2<f32>> = if cube.bands() >= PARALLEL_BAND_THRESHOLD {
        (0..cube.bands())
            .into_par_iter()
            .map(warp_band)
            .collect::<Result<_>>()?
    } else {
        (0..cube.bands()).map(warp_band).collect::<Result<_>>()?
    };

    Cube::from_bands(&bands, cube.wavelengths.clone())
}

/// Bilinear resize with clamped borders, used to build image pyramids.
pub fn resize_bilinear(src: &ArrayView2<'_, f32>, out_dim: (usize, usize)) -> Array2<f32> {
    let (h, w) = src.dim();
    let (rows, cols) = out_dim;
    if h == 0 || w == 0 {
        return Array2::zeros(out_dim);
    }
    let sy = h as f64 / rows.max(1) as f64;
    let sx = w as f64 / cols.max(1) as f64;

    Array2::from_shape_fn(out_dim, |(r, c)| {
        let y = ((r as f64 + 0.5) * sy - 0.5).clamp(0.0, (h - 1) as f64);
        let x = ((c as f64 + 0.5) * sx - 0.5).clamp(0.0, (w - 1) as f64);
        bilinear_sample(src, y, x, 0.0)
    })
}
