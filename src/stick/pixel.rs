//! Brightness-scaled pixel colors.

use super::error::{Result, StickError};

/// RGB color of a single LED, with alpha and brightness already applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct PixelColor {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl PixelColor {
    /// Build the LED color for a non pre-multiplied ARGB pixel.
    ///
    /// Every channel becomes `round(brightness * alpha / 255 * channel)`, so
    /// the stick never has to know about transparency.
    ///
    /// # Errors
    /// Returns `StickError::InvalidArgument` if `brightness` is not in `[0, 1]`.
    pub fn from_argb(argb: u32, brightness: f32) -> Result<Self> {
        check_brightness(brightness)?;
        Ok(Self::scaled(argb, brightness))
    }

    /// Same as [`PixelColor::from_argb`] for an already validated brightness.
    pub(crate) fn scaled(argb: u32, brightness: f32) -> Self {
        let alpha = (argb >> 24) & 0xFF;
        let factor = f64::from(brightness) * f64::from(alpha) / 255.0;
        let channel = |shift: u32| (factor * f64::from((argb >> shift) & 0xFF)).round() as u8;

        Self {
            red: channel(16),
            green: channel(8),
            blue: channel(0),
        }
    }

    /// Wire representation, in the order the stick expects.
    pub fn to_bytes(self) -> [u8; 3] {
        [self.red, self.green, self.blue]
    }
}

/// Reject brightness values outside `[0, 1]` (NaN included).
pub(crate) fn check_brightness(brightness: f32) -> Result<()> {
    if (0.0..=1.0).contains(&brightness) {
        Ok(())
    } else {
        Err(StickError::invalid_argument(format!(
            "brightness must be in [0, 1], got {brightness}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_opaque_full_brightness_is_identity() {
        let c = PixelColor::from_argb(0xFF12_3456, 1.0).unwrap();
        assert_eq!(c.to_bytes(), [0x12, 0x34, 0x56]);
    }

    #[test]
    fn test_half_brightness_rounds_half_up() {
        let c = PixelColor::from_argb(0xFFFF_0000, 0.5).unwrap();
        assert_eq!(c.to_bytes(), [128, 0, 0]);
    }

    #[test]
    fn test_alpha_is_premultiplied() {
        let transparent = PixelColor::from_argb(0x00FF_FFFF, 1.0).unwrap();
        assert_eq!(transparent, PixelColor::default());

        let half = PixelColor::from_argb(0x80FF_FFFF, 1.0).unwrap();
        assert_eq!(half.to_bytes(), [128, 128, 128]);
    }

    #[test]
    fn test_brightness_out_of_range() {
        assert!(matches!(
            PixelColor::from_argb(0xFFFF_FFFF, 1.01),
            Err(StickError::InvalidArgument(_))
        ));
        assert!(matches!(
            PixelColor::from_argb(0xFFFF_FFFF, -0.1),
            Err(StickError::InvalidArgument(_))
        ));
        assert!(matches!(
            PixelColor::from_argb(0xFFFF_FFFF, f32::NAN),
            Err(StickError::InvalidArgument(_))
        ));
    }

    proptest! {
        #[test]
        fn prop_channels_follow_formula(argb in any::<u32>(), brightness in 0.0f32..=1.0) {
            let c = PixelColor::from_argb(argb, brightness).unwrap();
            let alpha = f64::from(argb >> 24);
            let expect = |shift: u32| {
                (f64::from(brightness) * alpha / 255.0 * f64::from((argb >> shift) & 0xFF)).round()
            };
            prop_assert_eq!(f64::from(c.red), expect(16));
            prop_assert_eq!(f64::from(c.green), expect(8));
            prop_assert_eq!(f64::from(c.blue), expect(0));
        }

        #[test]
        fn prop_never_brighter_than_source(argb in any::<u32>(), brightness in 0.0f32..=1.0) {
            let c = PixelColor::from_argb(argb, brightness).unwrap();
            prop_assert!(u32::from(c.red) <= (argb >> 16) & 0xFF);
            prop_assert!(u32::from(c.green) <= (argb >> 8) & 0xFF);
            prop_assert!(u32::from(c.blue) <= argb & 0xFF);
        }
    }
}
