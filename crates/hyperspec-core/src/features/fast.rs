use ndarray::Array2;
use rayon::prelude::*;

use crate::consts::PARALLEL_PIXEL_THRESHOLD;

/// Bresenham circle of radius 3 as (dx, dy), clockwise from 12 o'clock.
const CIRCLE: [(isize, isize); 16] = [
    (0, -3),
    (1, -3),
    (2, -2),
    (3, -1),
    (3, 0),
    (3, 1),
    (2, 2),
    (1, 3),
    (0, 3),
    (-1, 3),
    (-2, 2),
    (-3, 1),
    (-3, 0),
    (-3, -1),
    (-2, -2),
    (-1, -3),
];

/// Contiguous arc length of the FAST-9 segment test.
const ARC_LENGTH: usize = 9;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FastCorner {
    pub row: usize,
    pub col: usize,
    /// Sum of absolute differences beyond the threshold over the circle.
    pub score: f32,
}

/// FAST-9 corners at least `border` pixels from every edge, after 3x3
/// non-maximum suppression on the corner score.
pub fn fast_corners(image: &Array2<f32>, threshold: f32, border: usize) -> Vec<FastCorner> {
    let (h, w) = image.dim();
    let border = border.max(3);
    if h <= 2 * border || w <= 2 * border {
        return Vec::new();
    }

    let detect_row = |row: usize| -> Vec<FastCorner> {
        (border..w - border)
            .filter_map(|col| {
                corner_score(image, row, col, threshold).map(|score| FastCorner {
                    row,
                    col,
                    score,
                })
            })
            .collect()
    };

    let candidates: Vec<FastCorner> = if h * w >= PARALLEL_PIXEL_THRESHOLD {
        (border..h - border)
            .into_par_iter()
            .flat_map_iter(detect_row)
            .collect()
    } else {
        (border..h - border).flat_map(detect_row).collect()
    };

    non_max_suppression(candidates, h, w)
}

fn corner_score(image: &Array2<f32>, row: usize, col: usize, threshold: f32) -> Option<f32> {
    let center = image[[row, col]];
    let upper = center + threshold;
    let lower = center - threshold;

    let pixel = |i: usize| {
        let (dx, dy) = CIRCLE[i];
        image[[(row as isize + dy) as usize, (col as isize + dx) as usize]]
    };

    // Any 9-pixel arc covers at least two of the four compass points.
    let compass = [pixel(0), pixel(4), pixel(8), pixel(12)];
    let brighter = compass.iter().filter(|&&p| p > upper).count();
    let darker = compass.iter().filter(|&&p| p < lower).count();
    if brighter < 2 && darker < 2 {
        return None;
    }

    let ring: [f32; 16] = std::array::from_fn(pixel);
    let class = |p: f32| -> i8 {
        if p > upper {
            1
        } else if p < lower {
            -1
        } else {
            0
        }
    };

    let mut run = 0usize;
    let mut run_class = 0i8;
    let mut is_corner = false;
    for i in 0..16 + ARC_LENGTH - 1 {
        let c = class(ring[i % 16]);
        if c != 0 && c == run_class {
            run += 1;
        } else {
            run_class = c;
            run = usize::from(c != 0);
        }
        if run >= ARC_LENGTH {
            is_corner = true;
            break;
        }
    }
    if !is_corner {
        return None;
    }

    let score = ring
        .iter()
        .map(|&p| ((p - center).abs() - threshold).max(0.0))
        .sum();
    Some(score)
}

fn non_max_suppression(candidates: Vec<FastCorner>, h: usize, w: usize) -> Vec<FastCorner> {
    let mut scores = Array2::<f32>::zeros((h, w));
    for c in &candidates {
        scores[[c.row, c.col]] = c.score;
    }

    candidates
        .into_iter()
        .filter(|c| {
            for dy in -1isize..=1 {
                for dx in -1isize..=1 {
                    if dx == 0 && dy == 0 {
                        continue;
                    }
                    let r = (c.row as isize + dy) as usize;
                    let col = (c.col as isize + dx) as usize;
                    let other = scores[[r, col]];
                    // Ties go to the first corner in row-major order.
                    let earlier = dy < 0 || (dy == 0 && dx < 0);
                    if other > c.score || (other == c.score && earlier) {
                        return false;
                    }
                }
            }
            true
        })
        .collect()
}
