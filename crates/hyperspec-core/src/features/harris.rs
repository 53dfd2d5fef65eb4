use ndarray::Array2;

/// Harris corner response `det(M) - k * trace(M)^2` at (row, col), where M is
/// the Sobel structure tensor summed over a `block_size` window.
///
/// The caller must keep the point at least `block_size / 2 + 1` pixels away
/// from the image edge.
pub fn harris_response(
    image: &Array2<f32>,
    row: usize,
    col: usize,
    block_size: usize,
    k: f32,
) -> f32 {
    let half = (block_size / 2) as isize;
    let (mut sxx, mut syy, mut sxy) = (0.0f32, 0.0f32, 0.0f32);

    for dy in -half..=half {
        for dx in -half..=half {
            let r = (row as isize + dy) as usize;
            let c = (col as isize + dx) as usize;
            let (gx, gy) = sobel(image, r, c);
            sxx += gx * gx;
            syy += gy * gy;
            sxy += gx * gy;
        }
    }

    let det = sxx * syy - sxy * sxy;
    let trace = sxx + syy;
    det - k * trace * trace
}

fn sobel(image: &Array2<f32>, r: usize, c: usize) -> (f32, f32) {
    let p = |dr: isize, dc: isize| image[[(r as isize + dr) as usize, (c as isize + dc) as usize]];
    let gx = (p(-1, 1) + 2.0 * p(0, 1) + p(1, 1)) - (p(-1, -1) + 2.0 * p(0, -1) + p(1, -1));
    let gy = (p(1, -1) + 2.0 * p(1, 0) + p(1, 1)) - (p(-1, -1) + 2.0 * p(-1, 0) + p(-1, 1));
    (gx, gy)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corner_beats_edge_and_flat() {
        let img = Array2::from_shape_fn((32, 32), |(r, c)| {
            if r >= 16 && c >= 16 {
                1.0
            } else {
                0.0
            }
        });
        let corner = harris_response(&img, 16, 16, 7, 0.04);
        let edge = harris_response(&img, 24, 16, 7, 0.04);
        let flat = harris_response(&img, 6, 6, 7, 0.04);
        assert!(corner > 0.0);
        assert!(edge < 0.0);
        assert_eq!(flat, 0.0);
    }
}
