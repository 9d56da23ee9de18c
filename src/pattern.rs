//! Built-in images for driving the stick without an image editor.

use crate::error::{AppError, Result};
use crate::stick::Image;

const OPAQUE: u32 = 0xFF00_0000;

/// Parse a `RRGGBB` (optionally `#`-prefixed) color into opaque ARGB.
pub fn parse_color(hex: &str) -> Result<u32> {
    let digits = hex.strip_prefix('#').unwrap_or(hex);
    if digits.len() != 6 {
        return Err(AppError::validation(format!("color must be RRGGBB, got {hex:?}")));
    }
    u32::from_str_radix(digits, 16)
        .map(|rgb| OPAQUE | rgb)
        .map_err(|_| AppError::validation(format!("invalid hex color {hex:?}")))
}

/// Every pixel the same color.
pub fn solid(width: usize, height: usize, argb: u32) -> Result<Image> {
    Ok(Image::new(width, height, vec![argb; width * height])?)
}

/// Hue sweeping once across the image width.
pub fn rainbow(width: usize, height: usize) -> Result<Image> {
    let columns: Vec<u32> = (0..width)
        .map(|x| hue_to_argb(x as f32 * 360.0 / width.max(1) as f32))
        .collect();
    let pixels = (0..height).flat_map(|_| columns.iter().copied()).collect();
    Ok(Image::new(width, height, pixels)?)
}

/// Row-major image from raw little-endian ARGB words.
pub fn from_raw_argb(bytes: &[u8], width: usize) -> Result<Image> {
    if width == 0 || bytes.len() % 4 != 0 || (bytes.len() / 4) % width != 0 {
        return Err(AppError::validation(format!(
            "{} bytes do not form rows of {width} ARGB pixels",
            bytes.len()
        )));
    }
    let pixels: Vec<u32> = bytes
        .chunks_exact(4)
        .map(|px| u32::from_le_bytes([px[0], px[1], px[2], px[3]]))
        .collect();
    let height = pixels.len() / width;
    Ok(Image::new(width, height, pixels)?)
}

/// Fully saturated, full value HSV color.
fn hue_to_argb(hue: f32) -> u32 {
    let sector = (hue / 60.0).floor();
    let fraction = hue / 60.0 - sector;
    let rising = (fraction * 255.0).round() as u32;
    let falling = 255 - rising;

    let (r, g, b) = match sector as u32 % 6 {
        0 => (255, rising, 0),
        1 => (falling, 255, 0),
        2 => (0, 255, rising),
        3 => (0, falling, 255),
        4 => (rising, 0, 255),
        _ => (255, 0, falling),
    };
    OPAQUE | (r << 16) | (g << 8) | b
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_color() {
        assert_eq!(parse_color("ff8000").unwrap(), 0xFFFF_8000);
        assert_eq!(parse_color("#00FF00").unwrap(), 0xFF00_FF00);
        assert!(parse_color("fff").is_err());
        assert!(parse_color("zzzzzz").is_err());
    }

    #[test]
    fn test_solid() {
        let image = solid(3, 2, 0xFF11_2233).unwrap();
        assert_eq!(image.pixels(), &[0xFF11_2233; 6]);
        assert!(solid(0, 2, 0).is_err());
    }

    #[test]
    fn test_rainbow_columns_are_uniform() {
        let image = rainbow(6, 3).unwrap();
        assert_eq!(image.pixels()[0], 0xFFFF_0000);
        assert_eq!(image.pixels()[2], 0xFF00_FF00);
        assert_eq!(image.pixels()[4], 0xFF00_00FF);
        assert_eq!(&image.pixels()[..6], &image.pixels()[6..12]);
    }

    #[test]
    fn test_from_raw_argb() {
        let bytes = [0x33, 0x22, 0x11, 0xFF, 0x00, 0x00, 0x00, 0x80];
        let image = from_raw_argb(&bytes, 1).unwrap();
        assert_eq!(image.height(), 2);
        assert_eq!(image.pixels(), &[0xFF11_2233, 0x8000_0000]);

        assert!(from_raw_argb(&bytes, 3).is_err());
        assert!(from_raw_argb(&bytes[..7], 1).is_err());
    }
}
