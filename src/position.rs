// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License in the LICENSE-APACHE file or at:
//     https://www.apache.org/licenses/LICENSE-2.0

//! The positioning engine
//!
//! Turns a stream of text units into positioned glyphs: line iteration,
//! alignment-driven origin computation, kerning, sub-pixel quantization and
//! the per-direction traversal strategies. Drawing itself is delegated to an
//! `emit` callback so that measuring and drawing share one code path.

use crate::data::{Direction, HorzAlign, QuantStep, VertAlign};
use crate::error::UsageError;
use crate::font::{Font, GlyphId};
use crate::fract::{Fract, Point, Rect};
use crate::sizer::Sizer;
use crate::target::PixelRect;

/// One element of a text stream
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Unit {
    /// A code point still to be resolved against the active font
    Char(char),
    /// A pre-resolved glyph index
    Glyph(GlyphId),
    /// An explicit line break (`\n`)
    LineBreak,
}

/// Text units from a `&str`
#[derive(Clone)]
pub(crate) struct StrUnits<'a>(std::str::Chars<'a>);

impl<'a> StrUnits<'a> {
    pub fn new(text: &'a str) -> Self {
        StrUnits(text.chars())
    }
}

impl Iterator for StrUnits<'_> {
    type Item = Unit;

    fn next(&mut self) -> Option<Unit> {
        self.0.next().map(|c| match c {
            '\n' => Unit::LineBreak,
            c => Unit::Char(c),
        })
    }
}

/// Text units from a pre-resolved glyph sequence
#[derive(Clone)]
pub(crate) struct GlyphUnits<'a>(std::slice::Iter<'a, GlyphId>);

impl<'a> GlyphUnits<'a> {
    pub fn new(glyphs: &'a [GlyphId]) -> Self {
        GlyphUnits(glyphs.iter())
    }
}

impl Iterator for GlyphUnits<'_> {
    type Item = Unit;

    fn next(&mut self) -> Option<Unit> {
        self.0.next().map(|id| Unit::Glyph(*id))
    }
}

/// Frozen vertical metrics for one line
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub(crate) struct VMetrics {
    pub ascent: Fract,
    pub descent: Fract,
    pub line_height: Fract,
    pub cap_height: Fract,
    pub x_height: Fract,
}

/// Traversal strategy, picked from (horizontal align, direction)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Traversal {
    /// Emit in reading order, pen moving right from the line origin
    Forward,
    /// Emit in reading order, pen moving left from the line origin
    Backward,
    /// Measure the upcoming line, derive the origin, then emit
    Measured,
}

fn traversal(halign: HorzAlign, direction: Direction) -> Traversal {
    match (halign, direction) {
        (HorzAlign::Left, Direction::LeftToRight) => Traversal::Forward,
        (HorzAlign::Right, Direction::RightToLeft) => Traversal::Backward,
        _ => Traversal::Measured,
    }
}

/// Map vertical alignment to the first line's baseline
///
/// `total_height` is only read for the alignments that need the full text
/// height (`VertCenter`, `LastBaseline`, `Bottom`).
pub(crate) fn resolve_baseline(
    valign: VertAlign,
    y: Fract,
    m: &VMetrics,
    total_height: Fract,
    vq: QuantStep,
) -> Fract {
    match valign {
        VertAlign::Top => (y + m.ascent).quantize_up(vq),
        VertAlign::CapLine => (y + m.cap_height).quantize_up(vq),
        VertAlign::Midline => (y + m.x_height).quantize_up(vq),
        VertAlign::VertCenter => (y + m.ascent - total_height.half()).quantize_up(vq),
        VertAlign::Baseline => y.quantize_up(vq),
        VertAlign::LastBaseline => {
            if total_height >= m.line_height {
                y - (total_height - m.line_height.quantize_up(vq))
            } else {
                y
            }
        }
        VertAlign::Bottom => (y + m.ascent - total_height).quantize_up(vq),
    }
}

/// A positioning pass over one renderer configuration
///
/// Borrows the configuration for the duration of a draw or measure call;
/// holds no state of its own between calls.
pub(crate) struct Engine<'a> {
    pub font: &'a dyn Font,
    pub sizer: &'a mut dyn Sizer,
    pub size: Fract,
    pub halign: HorzAlign,
    pub valign: VertAlign,
    pub direction: Direction,
    pub horz_quant: QuantStep,
    pub vert_quant: QuantStep,
}

pub(crate) type Emit<'e> = dyn FnMut(GlyphId, Point) -> Result<(), UsageError> + 'e;

impl Engine<'_> {
    pub fn vmetrics(&mut self) -> VMetrics {
        VMetrics {
            ascent: self.sizer.ascent(self.font, self.size),
            descent: self.sizer.descent(self.font, self.size),
            line_height: self.sizer.line_height(self.font, self.size),
            cap_height: self.sizer.cap_height(self.font, self.size),
            x_height: self.sizer.x_height(self.font, self.size),
        }
    }

    fn resolve(&self, unit: Unit) -> GlyphId {
        match unit {
            Unit::Char(c) => self.font.glyph_index(c),
            Unit::Glyph(id) => id,
            Unit::LineBreak => unreachable!("line breaks are not glyphs"),
        }
    }

    /// Width of the upcoming line, up to the next break or end of text
    ///
    /// Forward pen math (kern, quantize up, advance) regardless of the
    /// configured direction, measured from a line-relative origin of zero.
    fn line_width<I>(&mut self, iter: I) -> Fract
    where
        I: Iterator<Item = Unit>,
    {
        let mut x = Fract::ZERO;
        let mut prev: Option<GlyphId> = None;
        for unit in iter {
            if unit == Unit::LineBreak {
                break;
            }
            let glyph = self.resolve(unit);
            if let Some(p) = prev {
                x += self.sizer.kern(self.font, self.size, p, glyph);
            }
            x = x.quantize_up(self.horz_quant);
            x += self.sizer.advance(self.font, self.size, glyph);
            prev = Some(glyph);
        }
        x.max(Fract::ZERO)
    }

    /// Total height of the text
    ///
    /// Empty text has zero height. Text consisting only of line breaks
    /// covers one line advance per break; any other text additionally
    /// covers the (quantized) height of its first line.
    pub fn measure_height<I>(&mut self, iter: I) -> Fract
    where
        I: Iterator<Item = Unit>,
    {
        let mut height = Fract::ZERO;
        let mut any_unit = false;
        let mut any_glyph = false;
        let mut nth = 0u32;
        for unit in iter {
            any_unit = true;
            if unit == Unit::LineBreak {
                height += self
                    .sizer
                    .line_advance(self.font, self.size, nth)
                    .quantize_up(self.vert_quant);
                nth += 1;
            } else {
                any_glyph = true;
                nth = 0;
            }
        }
        if !any_unit {
            return Fract::ZERO;
        }
        if any_glyph {
            height += self
                .sizer
                .line_height(self.font, self.size)
                .quantize_up(self.vert_quant);
        }
        height
    }

    /// The selection rectangle of the text
    ///
    /// The rect is origin-relative: `min` is zero, `max.x` the widest line
    /// and `max.y` the total height. Width uses the same forward pen math as
    /// drawing, so measured and drawn extents agree; it never reaches left
    /// of the line origin even under negative kerning.
    pub fn measure<I>(&mut self, iter: I) -> Rect
    where
        I: Iterator<Item = Unit> + Clone,
    {
        let height = self.measure_height(iter.clone());
        let mut width = Fract::ZERO;
        let mut x = Fract::ZERO;
        let mut prev: Option<GlyphId> = None;
        for unit in iter {
            if unit == Unit::LineBreak {
                width = width.max(x);
                x = Fract::ZERO;
                prev = None;
                continue;
            }
            let glyph = self.resolve(unit);
            if let Some(p) = prev {
                x += self.sizer.kern(self.font, self.size, p, glyph);
            }
            x = x.quantize_up(self.horz_quant);
            x += self.sizer.advance(self.font, self.size, glyph);
            prev = Some(glyph);
        }
        width = width.max(x).max(Fract::ZERO);
        Rect::new(Point::ZERO, Point::new(width, height))
    }

    /// The origin x of a line of width `w`
    fn line_start_x(&self, origin_x: Fract, w: Fract) -> Fract {
        let x = match (self.halign, self.direction) {
            (HorzAlign::Left, Direction::LeftToRight) => origin_x,
            (HorzAlign::HorzCenter, Direction::LeftToRight) => origin_x - w.half(),
            (HorzAlign::Right, Direction::LeftToRight) => origin_x - w,
            (HorzAlign::Right, Direction::RightToLeft) => origin_x,
            (HorzAlign::HorzCenter, Direction::RightToLeft) => origin_x + w.half(),
            (HorzAlign::Left, Direction::RightToLeft) => origin_x + w,
        };
        if self.direction.is_rtl() {
            x.quantize_down(self.horz_quant)
        } else {
            x.quantize_up(self.horz_quant)
        }
    }

    /// Position and emit every unit
    ///
    /// Returns the final pen position. `bounds`, when given, enables the
    /// clipping shortcut: lines entirely above the target consume their
    /// units without emitting.
    pub fn draw<I>(
        &mut self,
        mut iter: I,
        origin: Point,
        bounds: Option<PixelRect>,
        emit: &mut Emit<'_>,
    ) -> Result<Point, UsageError>
    where
        I: Iterator<Item = Unit> + Clone,
    {
        let m = self.vmetrics();
        let needs_total = matches!(
            self.valign,
            VertAlign::VertCenter | VertAlign::LastBaseline | VertAlign::Bottom
        );
        let total = if needs_total {
            self.measure_height(iter.clone())
        } else {
            Fract::ZERO
        };

        let strategy = traversal(self.halign, self.direction);
        let rtl = self.direction.is_rtl();
        let mut pen = Point::new(
            origin.x,
            resolve_baseline(self.valign, origin.y, &m, total, self.vert_quant),
        );
        let mut prev: Option<GlyphId> = None;
        let mut nth = 0u32;
        let mut at_line_start = true;

        loop {
            if at_line_start {
                // Clipping shortcut: consume whole lines above the target.
                if let Some(b) = bounds {
                    while pen.y < Fract::from(b.top) - m.ascent {
                        let mut broke = false;
                        for unit in iter.by_ref() {
                            if unit == Unit::LineBreak {
                                broke = true;
                                break;
                            }
                        }
                        if !broke {
                            return Ok(pen);
                        }
                        pen.y += self
                            .sizer
                            .line_advance(self.font, self.size, nth)
                            .quantize_up(self.vert_quant);
                        nth += 1;
                    }
                }
                if strategy == Traversal::Measured {
                    let w = self.line_width(iter.clone());
                    pen.x = self.line_start_x(origin.x, w);
                }
                at_line_start = false;
            }

            let Some(unit) = iter.next() else {
                break;
            };
            match unit {
                Unit::LineBreak => {
                    pen.y += self
                        .sizer
                        .line_advance(self.font, self.size, nth)
                        .quantize_up(self.vert_quant);
                    pen.x = origin.x;
                    nth += 1;
                    prev = None;
                    at_line_start = true;
                }
                unit => {
                    let glyph = self.resolve(unit);
                    if rtl {
                        pen.x -= self.sizer.advance(self.font, self.size, glyph);
                        if let Some(p) = prev {
                            pen.x -= self.sizer.kern(self.font, self.size, p, glyph);
                        }
                        pen.x = pen.x.quantize_down(self.horz_quant);
                        emit(glyph, pen)?;
                    } else {
                        if let Some(p) = prev {
                            pen.x += self.sizer.kern(self.font, self.size, p, glyph);
                        }
                        pen.x = pen.x.quantize_up(self.horz_quant);
                        emit(glyph, pen)?;
                        pen.x += self.sizer.advance(self.font, self.size, glyph);
                    }
                    prev = Some(glyph);
                    nth = 0;
                }
            }
        }

        Ok(pen)
    }
}
