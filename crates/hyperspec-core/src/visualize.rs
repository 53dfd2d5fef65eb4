use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};

use crate::cube::Preview;
use crate::features::Keypoint;
use crate::matching::DMatch;

const PALETTE: [[u8; 3]; 8] = [
    [230, 25, 75],
    [60, 180, 75],
    [255, 225, 25],
    [0, 130, 200],
    [245, 130, 48],
    [145, 30, 180],
    [70, 240, 240],
    [240, 50, 230],
];

const MARKER_RADIUS: i64 = 4;

/// Greyscale preview in [0, 1] to an 8-bit RGB image.
pub fn preview_to_rgb(preview: &Preview) -> RgbImage {
    let (rows, cols) = preview.dim();
    RgbImage::from_fn(cols as u32, rows as u32, |x, y| {
        let v = preview[[y as usize, x as usize]];
        let v = if v.is_finite() { v.clamp(0.0, 1.0) } else { 0.0 };
        let g = (v * 255.0).round() as u8;
        Rgb([g, g, g])
    })
}

/// Side-by-side canvas of `src` (left) and `dst` (right) with a circle on
/// each matched keypoint and a line joining every match.
pub fn draw_matches(
    src: &Preview,
    src_keypoints: &[Keypoint],
    dst: &Preview,
    dst_keypoints: &[Keypoint],
    matches: &[DMatch],
) -> RgbImage {
    let left = preview_to_rgb(src);
    let right = preview_to_rgb(dst);
    let width = left.width() + right.width();
    let height = left.height().max(right.height());

    let mut canvas = RgbImage::new(width, height);
    imageops::replace(&mut canvas, &left, 0, 0);
    imageops::replace(&mut canvas, &right, i64::from(left.width()), 0);

    let offset = i64::from(left.width());
    for (i, m) in matches.iter().enumerate() {
        let (Some(a), Some(b)) = (
            src_keypoints.get(m.query_idx),
            dst_keypoints.get(m.train_idx),
        ) else {
            continue;
        };
        let colour = Rgb(PALETTE[i % PALETTE.len()]);
        let p0 = (a.x.round() as i64, a.y.round() as i64);
        let p1 = (b.x.round() as i64 + offset, b.y.round() as i64);
        draw_circle(&mut canvas, p0, MARKER_RADIUS, colour);
        draw_circle(&mut canvas, p1, MARKER_RADIUS, colour);
        draw_line(&mut canvas, p0, p1, colour);
    }
    canvas
}

/// Aspect-preserving resize to `width` pixels.
pub fn resize_to_width(img: &RgbImage, width: u32) -> RgbImage {
    if img.width() == 0 || img.width() == width {
        return img.clone();
    }
    let height = (f64::from(img.height()) * f64::from(width) / f64::from(img.width()))
        .round()
        .max(1.0) as u32;
    imageops::resize(img, width, height, FilterType::Triangle)
}

fn put(img: &mut RgbImage, x: i64, y: i64, colour: Rgb<u8>) {
    if x >= 0 && y >= 0 && x < i64::from(img.width()) && y < i64::from(img.height()) {
        img.put_pixel(x as u32, y as u32, colour);
    }
}

/// Bresenham line, clipped to the image.
fn draw_line(img: &mut RgbImage, from: (i64, i64), to: (i64, i64), colour: Rgb<u8>) {
    let (mut x, mut y) = from;
    let dx = (to.0 - x).abs();
    let dy = -(to.1 - y).abs();
    let sx = if x < to.0 { 1 } else { -1 };
    let sy = if y < to.1 { 1 } else { -1 };
    let mut err = dx + dy;
    loop {
        put(img, x, y, colour);
        if x == to.0 && y == to.1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
}

/// Midpoint circle outline.
fn draw_circle(img: &mut RgbImage, centre: (i64, i64), radius: i64, colour: Rgb<u8>) {
    let (cx, cy) = centre;
    let (mut x, mut y) = (radius, 0);
    let mut err = 1 - radius;
    while x >= y {
        for (px, py) in [
            (x, y),
            (y, x),
            (-y, x),
            (-x, y),
            (-x, -y),
            (-y, -x),
            (y, -x),
            (x, -y),
        ] {
            put(img, cx + px, cy + py, colour);
        }
        y += 1;
        if err < 0 {
            err += 2 * y + 1;
        } else {
            x -= 1;
            err += 2 * (y - x) + 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn kp(x: f32, y: f32) -> Keypoint {
        Keypoint {
            x,
            y,
            angle: 0.0,
            response: 1.0,
            octave: 0,
            size: 31.0,
        }
    }

    #[test]
    fn test_canvas_is_side_by_side() {
        let src = Array2::from_elem((20, 30), 1.0f32);
        let dst = Array2::from_elem((25, 10), 0.0f32);
        let canvas = draw_matches(&src, &[], &dst, &[], &[]);
        assert_eq!(canvas.dimensions(), (40, 25));
        assert_eq!(canvas.get_pixel(5, 5), &Rgb([255, 255, 255]));
        assert_eq!(canvas.get_pixel(35, 5), &Rgb([0, 0, 0]));
        // Below the shorter image stays black.
        assert_eq!(canvas.get_pixel(5, 22), &Rgb([0, 0, 0]));
    }

    #[test]
    fn test_match_line_is_drawn() {
        let src = Array2::from_elem((20, 20), 0.0f32);
        let dst = Array2::from_elem((20, 20), 0.0f32);
        let matches = [DMatch {
            query_idx: 0,
            train_idx: 0,
            distance: 0,
        }];
        let canvas = draw_matches(&src, &[kp(10.0, 10.0)], &dst, &[kp(10.0, 10.0)], &matches);
        let colour = Rgb(PALETTE[0]);
        // Horizontal line from (10, 10) to (30, 10).
        for x in 10..=30 {
            assert_eq!(canvas.get_pixel(x, 10), &colour);
        }
        assert_eq!(canvas.get_pixel(10, 14), &colour);
    }

    #[test]
    fn test_out_of_range_match_is_skipped() {
        let src = Array2::from_elem((8, 8), 0.0f32);
        let matches = [DMatch {
            query_idx: 3,
            train_idx: 0,
            distance: 0,
        }];
        let canvas = draw_matches(&src, &[kp(1.0, 1.0)], &src, &[kp(1.0, 1.0)], &matches);
        assert!(canvas.pixels().all(|p| p == &Rgb([0, 0, 0])));
    }

    #[test]
    fn test_resize_keeps_aspect() {
        let img = RgbImage::new(2000, 500);
        let out = resize_to_width(&img, 1000);
        assert_eq!(out.dimensions(), (1000, 250));
    }
}
