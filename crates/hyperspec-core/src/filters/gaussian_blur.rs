use ndarray::{Array2, ArrayView2, Axis};
use rayon::prelude::*;

use crate::consts::PARALLEL_PIXEL_THRESHOLD;
use crate::cube::Cube;

/// Apply Gaussian blur to a raw array using separable 1D convolution.
/// Borders are clamped. A non-positive sigma returns a copy of the input.
pub fn gaussian_blur_array(data: &Array2<f32>, sigma: f32) -> Array2<f32> {
    gaussian_blur_view(data.view(), sigma)
}

/// Blur every band of the cube with the same sigma.
pub fn smooth_cube(cube: &Cube, sigma: f32) -> Cube {
    if sigma <= 0.0 {
        return cube.clone();
    }

    let mut result = Cube::zeros_like(cube);
    let blurred: Vec<Array2<f32>> = (0..cube.bands())
        .into_par_iter()
        .map(|b| gaussian_blur_view(cube.band(b), sigma))
        .collect();
    for (b, band) in blurred.into_iter().enumerate() {
        result.band_mut(b).assign(&band);
    }
    result
}

pub(crate) fn gaussian_blur_view(data: ArrayView2<'_, f32>, sigma: f32) -> Array2<f32> {
    if sigma <= 0.0 {
        return data.to_owned();
    }
    let kernel = make_gaussian_kernel(sigma);
    let row_pass = convolve(data, &kernel, Axis(1));
    convolve(row_pass.view(), &kernel, Axis(0))
}

fn make_gaussian_kernel(sigma: f32) -> Vec<f32> {
    let radius = (sigma * 3.0).ceil() as usize;
    let size = 2 * radius + 1;
    let mut kernel = vec![0.0f32; size];
    let s2 = 2.0 * sigma * sigma;
    let mut sum = 0.0f32;

    for (i, k) in kernel.iter_mut().enumerate() {
        let x = i as f32 - radius as f32;
        *k = (-x * x / s2).exp();
        sum += *k;
    }

    for v in &mut kernel {
        *v /= sum;
    }

    kernel
}

/// Convolve along `axis` (1 = along each row, 0 = along each column).
fn convolve(data: ArrayView2<'_, f32>, kernel: &[f32], axis: Axis) -> Array2<f32> {
    let (h, w) = data.dim();
    let radius = kernel.len() as isize / 2;
    let along_rows = axis == Axis(1);

    let convolve_row = |row: usize| -> Vec<f32> {
        (0..w)
            .map(|col| {
                let mut sum = 0.0f32;
                for (ki, &kv) in kernel.iter().enumerate() {
                    let offset = ki as isize - radius;
                    let v = if along_rows {
                        let c = (col as isize + offset).clamp(0, w as isize - 1) as usize;
                        data[[row, c]]
                    } else {
                        let r = (row as isize + offset).clamp(0, h as isize - 1) as usize;
                        data[[r, col]]
                    };
                    sum += v * kv;
                }
                sum
            })
            .collect()
    };

    let rows: Vec<Vec<f32>> = if h * w >= PARALLEL_PIXEL_THRESHOLD {
        (0..h).into_par_iter().map(convolve_row).collect()
    } else {
        (0..h).map(convolve_row).collect()
    };

    let mut result = Array2::<f32>::zeros((h, w));
    for (row, row_data) in rows.into_iter().enumerate() {
        for (col, val) in row_data.into_iter().enumerate() {
            result[[row, col]] = val;
        }
    }
    result
}
