use super::theme::Rgb;
use anyhow::{Context, Result};
use image::{DynamicImage, ImageFormat, RgbImage};
use std::io::Cursor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub base: Rgb,
    pub dot: Rgb,
}

/// Halftone page texture: a solid fill with a tiled dot grid, every other row
/// shifted by half a spacing. A zero spacing or radius gives the plain fill.
pub fn generate_background(
    width: u32,
    height: u32,
    palette: Palette,
    dot_spacing: u32,
    dot_radius: u32,
) -> RgbImage {
    let mut img = RgbImage::from_pixel(width, height, image::Rgb(palette.base));
    if dot_spacing == 0 || dot_radius == 0 {
        return img;
    }

    let half = dot_spacing / 2;
    let r2 = (dot_radius * dot_radius) as i64;

    for (x, y, px) in img.enumerate_pixels_mut() {
        let row = y / dot_spacing;
        let shift = if row % 2 == 1 { half } else { 0 };
        let dx = ((x + shift) % dot_spacing) as i64 - half as i64;
        let dy = (y % dot_spacing) as i64 - half as i64;
        if dx * dx + dy * dy <= r2 {
            *px = image::Rgb(palette.dot);
        }
    }
    img
}

pub fn encode_png(img: &RgbImage) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(img.clone())
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .context("encode png")?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PALETTE: Palette = Palette {
        base: [10, 20, 30],
        dot: [200, 200, 200],
    };

    #[test]
    fn test_dots_on_grid_and_offset_rows() {
        let img = generate_background(40, 40, PALETTE, 10, 2);

        // first row: dot centers at x = 5, 15, ...
        assert_eq!(img.get_pixel(5, 5).0, PALETTE.dot);
        assert_eq!(img.get_pixel(15, 5).0, PALETTE.dot);
        assert_eq!(img.get_pixel(0, 0).0, PALETTE.base);
        assert_eq!(img.get_pixel(10, 5).0, PALETTE.base);

        // second row shifted by half a spacing: centers at x = 0, 10, ...
        assert_eq!(img.get_pixel(10, 15).0, PALETTE.dot);
        assert_eq!(img.get_pixel(5, 15).0, PALETTE.base);
    }

    #[test]
    fn test_plain_fill_without_dots() {
        let img = generate_background(8, 8, PALETTE, 0, 2);
        assert!(img.pixels().all(|p| p.0 == PALETTE.base));
    }

    #[test]
    fn test_deterministic_and_png_decodes() {
        let a = generate_background(32, 48, PALETTE, 12, 3);
        let b = generate_background(32, 48, PALETTE, 12, 3);
        assert_eq!(a, b);

        let png = encode_png(&a).unwrap();
        let decoded = image::load_from_memory(&png).unwrap().to_rgb8();
        assert_eq!(decoded, a);
    }
}
