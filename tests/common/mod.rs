// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License in the LICENSE-APACHE file or at:
//     https://www.apache.org/licenses/LICENSE-2.0

//! Synthetic collaborators for deterministic tests
//!
//! No font files, no system fonts: a monospace grid font and a box-mask
//! rasterizer whose output depends on every fingerprint component, so any
//! wrong cache hit shows up as a pixel difference.

#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;
use twine_text::{
    ChangeObserver, FauxRasterizer, Font, Fract, GlyphId, GlyphMask, Rasterizer, Renderer,
};

/// Monospace test font: 1000 units/em, every printable ASCII glyph advances
/// half an em. Optional uniform kerning between equal glyphs.
pub struct GridFont {
    pub kern_equal_pairs: i16,
}

impl GridFont {
    pub fn new() -> Self {
        GridFont { kern_equal_pairs: 0 }
    }

    pub fn with_kerning(kern: i16) -> Self {
        GridFont {
            kern_equal_pairs: kern,
        }
    }
}

impl Font for GridFont {
    fn glyph_index(&self, c: char) -> GlyphId {
        match c {
            ' '..='~' => GlyphId(c as u16 - ' ' as u16 + 1),
            _ => GlyphId::NOTDEF,
        }
    }

    fn num_glyphs(&self) -> u16 {
        96
    }

    fn units_per_em(&self) -> u16 {
        1000
    }

    fn ascender(&self) -> i16 {
        800
    }

    fn descender(&self) -> i16 {
        -200
    }

    fn line_gap(&self) -> i16 {
        0
    }

    fn cap_height(&self) -> Option<i16> {
        Some(700)
    }

    fn x_height(&self) -> Option<i16> {
        Some(500)
    }

    fn advance(&self, _glyph: GlyphId) -> u16 {
        500
    }

    fn kern(&self, left: GlyphId, right: GlyphId) -> i16 {
        if left == right {
            self.kern_equal_pairs
        } else {
            0
        }
    }

    fn strikeout_metrics(&self) -> Option<ttf_parser::LineMetrics> {
        Some(ttf_parser::LineMetrics {
            position: 250,
            thickness: 50,
        })
    }

    fn underline_metrics(&self) -> Option<ttf_parser::LineMetrics> {
        Some(ttf_parser::LineMetrics {
            position: -100,
            thickness: 50,
        })
    }

    fn outline_glyph(
        &self,
        _glyph: GlyphId,
        builder: &mut dyn ttf_parser::OutlineBuilder,
    ) -> Option<ttf_parser::Rect> {
        builder.move_to(50.0, 0.0);
        builder.line_to(450.0, 0.0);
        builder.line_to(450.0, 700.0);
        builder.line_to(50.0, 700.0);
        builder.close();
        Some(ttf_parser::Rect {
            x_min: 50,
            y_min: 0,
            x_max: 450,
            y_max: 700,
        })
    }
}

/// Deterministic rasterizer: a filled box whose coverage value folds in
/// every input the fingerprint must cover
#[derive(Default)]
pub struct BoxRasterizer {
    skew: Fract,
    extra: Fract,
    observer: Option<ChangeObserver>,
}

impl BoxRasterizer {
    pub fn new() -> Self {
        Self::default()
    }

    fn notify(&self) {
        if let Some(observer) = &self.observer {
            observer.set(true);
        }
    }
}

impl Rasterizer for BoxRasterizer {
    fn rasterize(
        &mut self,
        _font: &dyn Font,
        size: Fract,
        glyph: GlyphId,
        fract: (u8, u8),
    ) -> Option<GlyphMask> {
        let px = size.floor_to_i32().max(1);
        let width = (px / 2).max(1) as u32;
        let height = (px * 7 / 10).max(1) as u32;
        let value = (u32::from(glyph.0)
            .wrapping_mul(31)
            .wrapping_add(u32::from(fract.0).wrapping_mul(7))
            .wrapping_add(u32::from(fract.1).wrapping_mul(3))
            .wrapping_add(size.to_bits() as u32)
            .wrapping_add(self.skew.to_bits() as u32)
            .wrapping_add(self.extra.to_bits() as u32))
            % 200
            + 55;
        Some(GlyphMask {
            size: (width, height),
            offset: (0, -(height as i32)),
            data: vec![value as u8; (width * height) as usize],
        })
    }

    fn signature(&self) -> u64 {
        use std::hash::{Hash, Hasher};
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        "box".hash(&mut hasher);
        self.skew.to_bits().hash(&mut hasher);
        self.extra.to_bits().hash(&mut hasher);
        hasher.finish()
    }

    fn set_change_observer(&mut self, observer: Option<ChangeObserver>) {
        self.observer = observer;
    }

    fn as_faux_mut(&mut self) -> Option<&mut dyn FauxRasterizer> {
        Some(self)
    }
}

impl FauxRasterizer for BoxRasterizer {
    fn set_skew(&mut self, skew: Fract) {
        if self.skew != skew {
            self.skew = skew;
            self.notify();
        }
    }

    fn skew(&self) -> Fract {
        self.skew
    }

    fn set_extra_width(&mut self, extra: Fract) {
        if self.extra != extra {
            self.extra = extra;
            self.notify();
        }
    }

    fn extra_width(&self) -> Fract {
        self.extra
    }
}

/// A renderer over the grid font and box rasterizer at 16 px, no cache
pub fn test_renderer() -> Renderer {
    renderer_with_font(Rc::new(GridFont::new()))
}

pub fn renderer_with_font(font: Rc<dyn Font>) -> Renderer {
    let mut r = Renderer::new();
    r.set_font(Some(font));
    r.set_rasterizer(Some(Rc::new(RefCell::new(BoxRasterizer::new()))));
    r.set_size(Fract::from(16)).unwrap();
    r
}
