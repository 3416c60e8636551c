// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License in the LICENSE-APACHE file or at:
//     https://www.apache.org/licenses/LICENSE-2.0

//! [`Font`] implementation over sfnt (TrueType/OpenType) data

use crate::font::{Font, GlyphId};
use ttf_parser::Face;

/// A font backed by parsed sfnt tables
///
/// Owns its font data. Parsing is the only fallible step; all subsequent
/// queries are infallible (missing tables degrade to zero/`None`).
pub struct SfntFont {
    data: Box<[u8]>,
    index: u32,
}

impl SfntFont {
    /// Parse face `index` out of `data`
    ///
    /// `index` selects a face within a font collection; use 0 for plain
    /// `.ttf`/`.otf` files.
    pub fn parse(data: Box<[u8]>, index: u32) -> Result<Self, ttf_parser::FaceParsingError> {
        // Validate now so queries can re-parse infallibly later.
        Face::parse(&data, index)?;
        Ok(SfntFont { data, index })
    }

    // Face borrows from self.data; re-creating it per query group keeps the
    // struct self-contained without self-referential storage. Table lookups
    // in ttf-parser are cheap offset math.
    fn face(&self) -> Face<'_> {
        Face::parse(&self.data, self.index).unwrap()
    }
}

impl Font for SfntFont {
    fn glyph_index(&self, c: char) -> GlyphId {
        GlyphId(self.face().glyph_index(c).map(|id| id.0).unwrap_or(0))
    }

    fn num_glyphs(&self) -> u16 {
        self.face().number_of_glyphs()
    }

    fn units_per_em(&self) -> u16 {
        self.face().units_per_em()
    }

    fn ascender(&self) -> i16 {
        self.face().ascender()
    }

    fn descender(&self) -> i16 {
        self.face().descender()
    }

    fn line_gap(&self) -> i16 {
        self.face().line_gap()
    }

    fn cap_height(&self) -> Option<i16> {
        self.face().capital_height()
    }

    fn x_height(&self) -> Option<i16> {
        self.face().x_height()
    }

    fn advance(&self, glyph: GlyphId) -> u16 {
        self.face().glyph_hor_advance(glyph.into()).unwrap_or(0)
    }

    fn kern(&self, left: GlyphId, right: GlyphId) -> i16 {
        let face = self.face();
        let Some(kern) = face.tables().kern else {
            return 0;
        };
        kern.subtables
            .into_iter()
            .filter(|st| st.horizontal && !st.variable)
            .find_map(|st| st.glyphs_kerning(left.into(), right.into()))
            .unwrap_or(0)
    }

    fn strikeout_metrics(&self) -> Option<ttf_parser::LineMetrics> {
        self.face().strikeout_metrics()
    }

    fn underline_metrics(&self) -> Option<ttf_parser::LineMetrics> {
        self.face().underline_metrics()
    }

    fn outline_glyph(
        &self,
        glyph: GlyphId,
        builder: &mut dyn ttf_parser::OutlineBuilder,
    ) -> Option<ttf_parser::Rect> {
        self.face().outline_glyph(glyph.into(), builder)
    }
}
