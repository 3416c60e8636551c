// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License in the LICENSE-APACHE file or at:
//     https://www.apache.org/licenses/LICENSE-2.0

//! Draw and measure entry points
//!
//! Ties the positioning engine to the cache/rasterizer/target triple. Per
//! positioned glyph: ask the cache (keyed by the full fingerprint), fall
//! back to the rasterizer, store, then blit with the active color and blend
//! mode. Drawing with and without a cache is pixel-identical by
//! construction: the fingerprint covers everything rasterization reads.

use super::Renderer;
use crate::cache::CacheHandle;
use crate::data::{Blend, Color};
use crate::error::UsageError;
use crate::font::{Font, GlyphId};
use crate::fract::{Fract, Point, Rect};
use crate::position::{Engine, GlyphUnits, StrUnits, Unit, VMetrics};
use crate::raster::{GlyphMask, Rasterizer};
use crate::target::Target;
use std::sync::Arc;

/// Replacement glyph-drawing primitive
///
/// Receives the target, the glyph, its mask, the integer top-left placement
/// and the active color and blend mode.
pub type GlyphDrawFn = fn(&mut dyn Target, GlyphId, &GlyphMask, (i32, i32), Color, Blend);

/// Gateway: drawing and measuring plain text and glyph sequences
impl Renderer {
    /// Draw `text` with the baseline origin at `(x, y)`
    ///
    /// The origin is interpreted through the configured alignment; see
    /// [`crate::VertAlign`] and [`crate::HorzAlign`]. Returns the final pen
    /// position.
    pub fn draw(
        &mut self,
        target: &mut dyn Target,
        text: &str,
        x: Fract,
        y: Fract,
    ) -> Result<Point, UsageError> {
        self.draw_units(target, StrUnits::new(text), Point::new(x, y))
    }

    /// Draw pre-resolved glyph indices
    ///
    /// Equivalent to [`Renderer::draw`] for text whose code points map 1:1
    /// to these glyphs, including the returned pen position.
    pub fn draw_glyphs(
        &mut self,
        target: &mut dyn Target,
        glyphs: &[GlyphId],
        x: Fract,
        y: Fract,
    ) -> Result<Point, UsageError> {
        self.draw_units(target, GlyphUnits::new(glyphs), Point::new(x, y))
    }

    /// The selection rectangle of `text`
    ///
    /// Origin-relative: `max.x` is the widest line, `max.y` the total
    /// height. Unaffected by alignment and direction.
    pub fn measure(&mut self, text: &str) -> Result<Rect, UsageError> {
        self.measure_units(StrUnits::new(text))
    }

    /// The selection rectangle of a glyph sequence
    pub fn measure_glyphs(&mut self, glyphs: &[GlyphId]) -> Result<Rect, UsageError> {
        self.measure_units(GlyphUnits::new(glyphs))
    }

    /// The total height of `text`; zero when empty
    pub fn measure_height(&mut self, text: &str) -> Result<Fract, UsageError> {
        let font = self.state.font.clone().ok_or(UsageError::NullFont)?;
        let sizer = self.state.sizer.clone();
        let mut sizer = sizer.borrow_mut();
        let mut engine = self.engine(&*font, &mut *sizer);
        Ok(engine.measure_height(StrUnits::new(text)))
    }

    fn measure_units<I>(&mut self, iter: I) -> Result<Rect, UsageError>
    where
        I: Iterator<Item = Unit> + Clone,
    {
        let font = self.state.font.clone().ok_or(UsageError::NullFont)?;
        let sizer = self.state.sizer.clone();
        let mut sizer = sizer.borrow_mut();
        let mut engine = self.engine(&*font, &mut *sizer);
        Ok(engine.measure(iter))
    }

    fn draw_units<I>(
        &mut self,
        target: &mut dyn Target,
        iter: I,
        origin: Point,
    ) -> Result<Point, UsageError>
    where
        I: Iterator<Item = Unit> + Clone,
    {
        let font = self.state.font.clone().ok_or(UsageError::NullFont)?;
        let rast = self
            .state
            .rasterizer
            .clone()
            .ok_or(UsageError::NullRasterizer)?;
        let sizer = self.state.sizer.clone();

        let size = self.state.scaled_size;
        let color = self.state.color;
        let blend = self.state.blend;
        let override_fn = self.glyph_draw_override;
        let bounds = target.bounds();

        let mut sizer = sizer.borrow_mut();
        let mut rast = rast.borrow_mut();
        let mut cache = self.cache.as_mut();

        let mut engine = Engine {
            font: &*font,
            sizer: &mut *sizer,
            size,
            halign: self.state.halign,
            valign: self.state.valign,
            direction: self.state.direction,
            horz_quant: self.state.horz_quant,
            vert_quant: self.state.vert_quant,
        };

        let mut emit = |glyph: GlyphId, pen: Point| -> Result<(), UsageError> {
            draw_glyph_at(
                cache.as_deref_mut(),
                &mut *rast,
                &*font,
                size,
                target,
                override_fn,
                color,
                blend,
                glyph,
                pen,
            );
            Ok(())
        };

        engine.draw(iter, origin, Some(bounds), &mut emit)
    }

    fn engine<'a>(&self, font: &'a dyn Font, sizer: &'a mut dyn crate::Sizer) -> Engine<'a> {
        Engine {
            font,
            sizer,
            size: self.state.scaled_size,
            halign: self.state.halign,
            valign: self.state.valign,
            direction: self.state.direction,
            horz_quant: self.state.horz_quant,
            vert_quant: self.state.vert_quant,
        }
    }
}

/// Internal helpers used by the twine interpreter
impl Renderer {
    /// Current vertical metrics; requires a font
    pub(crate) fn vmetrics_now(&mut self) -> Result<VMetrics, UsageError> {
        let font = self.state.font.clone().ok_or(UsageError::NullFont)?;
        let sizer = self.state.sizer.clone();
        let mut sizer = sizer.borrow_mut();
        let mut engine = self.engine(&*font, &mut *sizer);
        Ok(engine.vmetrics())
    }

    pub(crate) fn resolve_char(&self, c: char) -> Result<GlyphId, UsageError> {
        let font = self.state.font.as_ref().ok_or(UsageError::NullFont)?;
        Ok(font.glyph_index(c))
    }

    pub(crate) fn advance_of(&mut self, glyph: GlyphId) -> Result<Fract, UsageError> {
        let font = self.state.font.clone().ok_or(UsageError::NullFont)?;
        let sizer = self.state.sizer.clone();
        let mut sizer = sizer.borrow_mut();
        Ok(sizer.advance(&*font, self.state.scaled_size, glyph))
    }

    pub(crate) fn kern_of(&mut self, prev: GlyphId, curr: GlyphId) -> Result<Fract, UsageError> {
        let font = self.state.font.clone().ok_or(UsageError::NullFont)?;
        let sizer = self.state.sizer.clone();
        let mut sizer = sizer.borrow_mut();
        Ok(sizer.kern(&*font, self.state.scaled_size, prev, curr))
    }

    /// Composite one glyph at `pen`, through the cache when attached
    pub(crate) fn emit_glyph(
        &mut self,
        target: &mut dyn Target,
        glyph: GlyphId,
        pen: Point,
    ) -> Result<(), UsageError> {
        let font = self.state.font.clone().ok_or(UsageError::NullFont)?;
        let rast = self
            .state
            .rasterizer
            .clone()
            .ok_or(UsageError::NullRasterizer)?;
        let mut rast = rast.borrow_mut();
        draw_glyph_at(
            self.cache.as_mut(),
            &mut *rast,
            &*font,
            self.state.scaled_size,
            target,
            self.glyph_draw_override,
            self.state.color,
            self.state.blend,
            glyph,
            pen,
        );
        Ok(())
    }
}

/// Fetch-or-rasterize one glyph mask and composite it
///
/// The sub-pixel fraction of `pen` is pushed to the cache handle before the
/// fingerprint is formed, so the lookup always reflects the exact position
/// being drawn.
#[allow(clippy::too_many_arguments)]
fn draw_glyph_at(
    cache: Option<&mut CacheHandle>,
    rast: &mut dyn Rasterizer,
    font: &dyn Font,
    size: Fract,
    target: &mut dyn Target,
    override_fn: Option<GlyphDrawFn>,
    color: Color,
    blend: Blend,
    glyph: GlyphId,
    pen: Point,
) {
    let fract = (pen.x.fract(), pen.y.fract());

    let mask = match cache {
        Some(handle) => {
            handle.notify_fract_shift(fract);
            handle.refresh(rast);
            let fingerprint = handle.fingerprint(glyph);
            match handle.get(fingerprint) {
                Some(mask) => Some(mask),
                None => rast.rasterize(font, size, glyph, fract).map(|mask| {
                    let mask = Arc::new(mask);
                    handle.insert(fingerprint, mask.clone());
                    mask
                }),
            }
        }
        None => rast.rasterize(font, size, glyph, fract).map(Arc::new),
    };

    if let Some(mask) = mask {
        let x = pen.x.floor_to_i32() + mask.offset.0;
        let y = pen.y.floor_to_i32() + mask.offset.1;
        match override_fn {
            Some(f) => f(target, glyph, &mask, (x, y), color, blend),
            None => target.blit(&mask, x, y, color, blend),
        }
    }
}
