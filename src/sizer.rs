// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License in the LICENSE-APACHE file or at:
//     https://www.apache.org/licenses/LICENSE-2.0

//! Sizers: per-font measurement providers
//!
//! A [`Sizer`] answers every metric question the positioning engine asks:
//! vertical line geometry, per-glyph advances, kerning and line advances.
//! The renderer owns exactly one sizer; sizers are not safe for concurrent
//! use and may memoize internally (queries take `&mut self`).

use crate::conv::Fpu;
use crate::font::{Font, GlyphId};
use crate::fract::Fract;

/// Metric and advance queries for a (font, scaled size) pair
///
/// All sizes passed in are *scaled* sizes (logical size × scale) in 26.6
/// pixels per em. Implementations convert from font units however they see
/// fit; [`DefaultSizer`] reads sfnt-style tables through the font contract.
pub trait Sizer {
    /// Distance from baseline up to the top of the nominal glyph box
    fn ascent(&mut self, font: &dyn Font, size: Fract) -> Fract;

    /// Distance from baseline down to the bottom of the nominal glyph box
    ///
    /// Positive; the descender dips this far *below* the baseline.
    fn descent(&mut self, font: &dyn Font, size: Fract) -> Fract;

    /// Distance between consecutive baselines
    fn line_height(&mut self, font: &dyn Font, size: Fract) -> Fract;

    /// Height of capital letters above the baseline
    fn cap_height(&mut self, font: &dyn Font, size: Fract) -> Fract;

    /// Height of lowercase letters above the baseline
    fn x_height(&mut self, font: &dyn Font, size: Fract) -> Fract;

    /// Horizontal advance of a glyph
    fn advance(&mut self, font: &dyn Font, size: Fract, glyph: GlyphId) -> Fract;

    /// Signed kerning adjustment between two adjacent glyphs
    fn kern(&mut self, font: &dyn Font, size: Fract, prev: GlyphId, curr: GlyphId) -> Fract;

    /// Baseline advance for the `nth` consecutive line break
    ///
    /// `nth` is 0 for the first break after a non-break, 1 for the break
    /// immediately following it, and so on. The default implementation
    /// ignores `nth` and reuses the line height unchanged.
    fn line_advance(&mut self, font: &dyn Font, size: Fract, nth: u32) -> Fract {
        let _ = nth;
        self.line_height(font, size)
    }

    /// Invalidate any internal memo
    ///
    /// Called by the renderer whenever the active font or scaled size
    /// changes, before any further queries.
    fn notify_change(&mut self, font: Option<&dyn Font>, size: Fract) {
        let _ = (font, size);
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct MetricsBlock {
    ascent: Fract,
    descent: Fract,
    line_height: Fract,
    cap_height: Fract,
    x_height: Fract,
}

/// The default sizer, reading sfnt-style metric tables
///
/// Vertical metrics for the current (font, size) are computed once and
/// memoized until [`Sizer::notify_change`]. Missing optional tables degrade:
/// a font without a declared cap height uses the ascender, one without an
/// x-height uses half the ascender.
#[derive(Default)]
pub struct DefaultSizer {
    memo_key: Option<(usize, i32)>,
    memo: MetricsBlock,
}

impl DefaultSizer {
    pub fn new() -> Self {
        Self::default()
    }

    fn metrics(&mut self, font: &dyn Font, size: Fract) -> MetricsBlock {
        let key = (font as *const dyn Font as *const u8 as usize, size.to_bits());
        if self.memo_key == Some(key) {
            return self.memo;
        }

        let fpu = Fpu::new(size, font.units_per_em());
        let ascender = font.ascender();
        let ascent = fpu.i16_to_px(ascender);
        let block = MetricsBlock {
            ascent,
            descent: -fpu.i16_to_px(font.descender()),
            line_height: fpu.i16_to_px(
                ascender
                    .saturating_sub(font.descender())
                    .saturating_add(font.line_gap()),
            ),
            cap_height: fpu.i16_to_px(font.cap_height().unwrap_or(ascender)),
            x_height: fpu.i16_to_px(font.x_height().unwrap_or(ascender / 2)),
        };
        self.memo_key = Some(key);
        self.memo = block;
        block
    }
}

impl Sizer for DefaultSizer {
    fn ascent(&mut self, font: &dyn Font, size: Fract) -> Fract {
        self.metrics(font, size).ascent
    }

    fn descent(&mut self, font: &dyn Font, size: Fract) -> Fract {
        self.metrics(font, size).descent
    }

    fn line_height(&mut self, font: &dyn Font, size: Fract) -> Fract {
        self.metrics(font, size).line_height
    }

    fn cap_height(&mut self, font: &dyn Font, size: Fract) -> Fract {
        self.metrics(font, size).cap_height
    }

    fn x_height(&mut self, font: &dyn Font, size: Fract) -> Fract {
        self.metrics(font, size).x_height
    }

    fn advance(&mut self, font: &dyn Font, size: Fract, glyph: GlyphId) -> Fract {
        Fpu::new(size, font.units_per_em()).u16_to_px(font.advance(glyph))
    }

    fn kern(&mut self, font: &dyn Font, size: Fract, prev: GlyphId, curr: GlyphId) -> Fract {
        Fpu::new(size, font.units_per_em()).i16_to_px(font.kern(prev, curr))
    }

    fn notify_change(&mut self, _font: Option<&dyn Font>, _size: Fract) {
        self.memo_key = None;
    }
}

/// A sizer adding uniform horizontal padding to every advance
///
/// Wraps any inner sizer; only [`Sizer::advance`] is altered. Useful for
/// letter-spacing adjustments without touching the font.
pub struct PadSizer<S: Sizer = DefaultSizer> {
    inner: S,
    pad: Fract,
}

impl<S: Sizer> PadSizer<S> {
    /// Wrap `inner`, adding `pad` to each glyph advance
    pub fn new(inner: S, pad: Fract) -> Self {
        PadSizer { inner, pad }
    }

    /// The configured horizontal padding
    pub fn pad(&self) -> Fract {
        self.pad
    }

    /// Adjust the horizontal padding
    pub fn set_pad(&mut self, pad: Fract) {
        self.pad = pad;
    }
}

impl<S: Sizer> Sizer for PadSizer<S> {
    fn ascent(&mut self, font: &dyn Font, size: Fract) -> Fract {
        self.inner.ascent(font, size)
    }

    fn descent(&mut self, font: &dyn Font, size: Fract) -> Fract {
        self.inner.descent(font, size)
    }

    fn line_height(&mut self, font: &dyn Font, size: Fract) -> Fract {
        self.inner.line_height(font, size)
    }

    fn cap_height(&mut self, font: &dyn Font, size: Fract) -> Fract {
        self.inner.cap_height(font, size)
    }

    fn x_height(&mut self, font: &dyn Font, size: Fract) -> Fract {
        self.inner.x_height(font, size)
    }

    fn advance(&mut self, font: &dyn Font, size: Fract, glyph: GlyphId) -> Fract {
        self.inner.advance(font, size, glyph) + self.pad
    }

    fn kern(&mut self, font: &dyn Font, size: Fract, prev: GlyphId, curr: GlyphId) -> Fract {
        self.inner.kern(font, size, prev, curr)
    }

    fn line_advance(&mut self, font: &dyn Font, size: Fract, nth: u32) -> Fract {
        self.inner.line_advance(font, size, nth)
    }

    fn notify_change(&mut self, font: Option<&dyn Font>, size: Fract) {
        self.inner.notify_change(font, size);
    }
}
