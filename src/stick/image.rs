//! Pixel buffers and playback parameters handed to the stick.

use super::error::{Result, StickError};
use super::pixel::check_brightness;

/// Rectangular ARGB image, row-major, as produced by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    width: usize,
    height: usize,
    pixels: Vec<u32>,
}

impl Image {
    /// Wrap a row-major ARGB buffer.
    ///
    /// # Errors
    /// Returns `StickError::InvalidArgument` if a dimension is zero or the
    /// buffer length is not `width * height`.
    pub fn new(width: usize, height: usize, pixels: Vec<u32>) -> Result<Self> {
        check_dimensions(width, height, pixels.len())?;
        Ok(Self { width, height, pixels })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }
}

/// How an image is played on the stick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Playback {
    /// Scales every channel, in `[0, 1]`.
    pub brightness: f32,
    /// Pause the stick makes between two columns.
    pub delay_ms: u8,
    /// Repeat the image until cancelled.
    pub looping: bool,
}

impl Playback {
    pub fn validate(&self) -> Result<()> {
        check_brightness(self.brightness)
    }
}

impl Default for Playback {
    fn default() -> Self {
        Self {
            brightness: 1.0,
            delay_ms: 0,
            looping: false,
        }
    }
}

pub(crate) fn check_dimensions(width: usize, height: usize, len: usize) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(StickError::invalid_argument(format!(
            "image must not be empty, got {width}x{height}"
        )));
    }
    if width.checked_mul(height) != Some(len) {
        return Err(StickError::invalid_argument(format!(
            "number of pixels ({len}) doesn't match the image size {width}x{height}"
        )));
    }
    Ok(())
}
