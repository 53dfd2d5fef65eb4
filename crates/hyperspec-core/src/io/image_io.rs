use std::path::Path;

use image::{GrayImage, ImageFormat, Luma, RgbImage};

use crate::cube::{to_greyscale, Preview};
use crate::error::Result;

/// Save a preview as 8-bit greyscale PNG. Values are clamped to [0, 1].
pub fn save_preview_png(preview: &Preview, path: &Path) -> Result<()> {
    let (h, w) = preview.dim();
    let mut img = GrayImage::new(w as u32, h as u32);
    for ((row, col), &v) in preview.indexed_iter() {
        let v = if v.is_finite() { v.clamp(0.0, 1.0) } else { 0.0 };
        img.put_pixel(col as u32, row as u32, Luma([(v * 255.0).round() as u8]));
    }
    img.save_with_format(path, ImageFormat::Png)?;
    Ok(())
}

pub fn save_rgb_png(img: &RgbImage, path: &Path) -> Result<()> {
    img.save_with_format(path, ImageFormat::Png)?;
    Ok(())
}

/// Load any image the `image` crate decodes as a [0, 1] greyscale preview.
pub fn load_preview(path: &Path) -> Result<Preview> {
    let img = image::open(path)?;
    Ok(to_greyscale(&img.to_rgb8()))
}
