// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License in the LICENSE-APACHE file or at:
//     https://www.apache.org/licenses/LICENSE-2.0

//! The font contract
//!
//! The renderer never parses font files itself; it issues three groups of
//! queries against a [`Font`]: code-point → glyph-index resolution (used by
//! the positioning engine), metric-table reads (used by sizers) and outline
//! extraction (used by rasterizers). [`crate::sfnt::SfntFont`] implements
//! the contract over `ttf-parser`; tests implement it synthetically.

use std::rc::Rc;

/// A type-safe wrapper for glyph ID.
///
/// Glyph 0 is, per the TrueType specification, the "notdef" glyph drawn for
/// code points the font does not cover.
#[repr(transparent)]
#[derive(Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Default, Debug, Hash)]
pub struct GlyphId(pub u16);

impl GlyphId {
    /// The missing-character glyph
    pub const NOTDEF: GlyphId = GlyphId(0);
}

impl From<GlyphId> for ttf_parser::GlyphId {
    fn from(id: GlyphId) -> Self {
        ttf_parser::GlyphId(id.0)
    }
}

/// Queries the rendering core issues against a font
///
/// Metric values are in integer *font units*; [`Font::units_per_em`] defines
/// the scale. Sizers convert to pixels for a given text size.
pub trait Font {
    /// Map a code point to a glyph index
    ///
    /// Returns [`GlyphId::NOTDEF`] for code points the font does not cover.
    fn glyph_index(&self, c: char) -> GlyphId;

    /// Number of glyphs in the font
    fn num_glyphs(&self) -> u16;

    /// Font units per em
    fn units_per_em(&self) -> u16;

    /// Ascender, in font units (positive, above the baseline)
    fn ascender(&self) -> i16;

    /// Descender, in font units (negative, below the baseline)
    fn descender(&self) -> i16;

    /// Additional gap between lines, in font units
    fn line_gap(&self) -> i16;

    /// Height of capital letters, if the font declares it
    fn cap_height(&self) -> Option<i16>;

    /// Height of lowercase letters, if the font declares it
    fn x_height(&self) -> Option<i16>;

    /// Horizontal advance of a glyph, in font units
    fn advance(&self, glyph: GlyphId) -> u16;

    /// Kerning adjustment between two glyphs, in font units
    ///
    /// The default implementation reports no kerning.
    fn kern(&self, _left: GlyphId, _right: GlyphId) -> i16 {
        0
    }

    /// Strike-through rule position and thickness, in font units
    fn strikeout_metrics(&self) -> Option<ttf_parser::LineMetrics> {
        None
    }

    /// Underline rule position and thickness, in font units
    fn underline_metrics(&self) -> Option<ttf_parser::LineMetrics> {
        None
    }

    /// Stream a glyph's outline segments into `builder`
    ///
    /// Coordinates are in font units. Returns the tight bounding box, or
    /// `None` when the glyph has no outline (e.g. a space).
    fn outline_glyph(
        &self,
        glyph: GlyphId,
        builder: &mut dyn ttf_parser::OutlineBuilder,
    ) -> Option<ttf_parser::Rect>;
}

/// Stable identity of a font reference
///
/// Cache fingerprints and sizer memos key on this value; it is unique per
/// loaded font for the lifetime of the process (reference identity).
#[inline]
pub(crate) fn font_identity(font: &Rc<dyn Font>) -> u64 {
    Rc::as_ptr(font) as *const u8 as usize as u64
}
