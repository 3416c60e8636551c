// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License in the LICENSE-APACHE file or at:
//     https://www.apache.org/licenses/LICENSE-2.0

//! Simple configuration value types

use crate::error::UsageError;

/// An 8-bit RGBA color with straight (non-premultiplied) alpha
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const BLACK: Color = Color::rgb(0, 0, 0);

    /// Construct an opaque color
    #[inline]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Color { r, g, b, a: 255 }
    }

    /// Construct with explicit alpha
    #[inline]
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Color { r, g, b, a }
    }

    /// Pack as `0xRRGGBBAA`
    #[inline]
    pub const fn to_bits(self) -> u32 {
        (self.r as u32) << 24 | (self.g as u32) << 16 | (self.b as u32) << 8 | self.a as u32
    }

    /// Unpack from `0xRRGGBBAA`
    #[inline]
    pub const fn from_bits(bits: u32) -> Self {
        Color {
            r: (bits >> 24) as u8,
            g: (bits >> 16) as u8,
            b: (bits >> 8) as u8,
            a: bits as u8,
        }
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::WHITE
    }
}

/// Horizontal alignment of text relative to the drawing origin
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum HorzAlign {
    /// The line's left edge sits at the origin
    #[default]
    Left,
    /// The line is centered on the origin
    HorzCenter,
    /// The line's right edge sits at the origin
    Right,
}

/// Vertical alignment of text relative to the drawing origin
///
/// Each variant names the feature of the text box anchored at the origin's
/// `y` coordinate; the first line's baseline is derived from it.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum VertAlign {
    /// Top of the first line's ascent box
    Top,
    /// Top of capital letters on the first line
    CapLine,
    /// Top of lowercase letters (x-height) on the first line
    Midline,
    /// Vertical center of the full text box
    VertCenter,
    /// The first line's baseline
    #[default]
    Baseline,
    /// The last line's baseline
    LastBaseline,
    /// Bottom of the full text box
    Bottom,
}

/// Reading/drawing direction
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Direction {
    /// Glyphs are emitted left to right
    #[default]
    LeftToRight,
    /// Glyphs are emitted right to left
    RightToLeft,
}

impl Direction {
    /// True for [`Direction::RightToLeft`]
    #[inline]
    pub fn is_rtl(self) -> bool {
        self == Direction::RightToLeft
    }
}

/// Blend mode used when compositing glyph masks onto a target
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Blend {
    /// Standard source-over alpha blending
    #[default]
    Over,
    /// Source replaces the destination; output alpha is the mask alpha
    Replace,
    /// Additive: destination components never decrease
    Add,
    /// Subtractive on color components; destination alpha is preserved
    Sub,
    /// Multiplies destination by source color, weighted by coverage
    Multiply,
    /// Erases: destination alpha is scaled down by coverage
    Cut,
    /// Replaces destination hue with source hue, weighted by coverage
    Hue,
}

/// A positional quantization step
///
/// Pen positions are rounded to a multiple of this step before a glyph is
/// rasterized. The step is expressed in 64ths of a pixel and must be a
/// power-of-two divisor of 64; [`QuantStep::new`] rejects anything else.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct QuantStep(i32);

impl QuantStep {
    /// No quantization: positions keep full 64th-pixel precision
    pub const NONE: QuantStep = QuantStep(1);
    /// Half-pixel quantization
    pub const HALF: QuantStep = QuantStep(32);
    /// Whole-pixel quantization (the renderer default)
    pub const FULL: QuantStep = QuantStep(64);

    /// Construct from a step in 64ths of a pixel
    ///
    /// `step` must be one of 1, 2, 4, 8, 16, 32 or 64.
    pub fn new(step: i32) -> Result<Self, UsageError> {
        match step {
            1 | 2 | 4 | 8 | 16 | 32 | 64 => Ok(QuantStep(step)),
            _ => Err(UsageError::InvalidQuantStep(step)),
        }
    }

    /// The step in 64ths of a pixel
    #[inline]
    pub const fn bits(self) -> i32 {
        self.0
    }
}

impl Default for QuantStep {
    fn default() -> Self {
        QuantStep::FULL
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn color_bits_round_trip() {
        let c = Color::rgba(0x12, 0x34, 0x56, 0x78);
        assert_eq!(c.to_bits(), 0x1234_5678);
        assert_eq!(Color::from_bits(c.to_bits()), c);
    }

    #[test]
    fn quant_step_validation() {
        for step in [1, 2, 4, 8, 16, 32, 64] {
            assert!(QuantStep::new(step).is_ok());
        }
        for step in [0, 3, 5, 7, 63, 65, 128, -1] {
            assert!(QuantStep::new(step).is_err());
        }
    }
}
