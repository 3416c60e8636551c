// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License in the LICENSE-APACHE file or at:
//     https://www.apache.org/licenses/LICENSE-2.0

//! The rasterizer contract and glyph masks
//!
//! A rasterizer turns a glyph outline into an alpha mask for a given scaled
//! size and sub-pixel origin. It is a pluggable collaborator: the core only
//! relies on the contract below plus the change-notification protocol that
//! keeps cache fingerprints honest. The optional `raster` feature supplies
//! [`CoverageRasterizer`], a default implementation.

use crate::font::{Font, GlyphId};
use crate::fract::Fract;
use std::cell::Cell;
use std::rc::Rc;

/// A rendered glyph: an alpha bitmap plus its placement offset
///
/// `data` holds `size.0 × size.1` coverage bytes in row-major order.
/// `offset` positions the bitmap's top-left corner relative to the
/// whole-pixel part of the pen position at which the glyph was requested;
/// the sub-pixel fraction is baked into the coverage values.
pub struct GlyphMask {
    pub size: (u32, u32),
    pub offset: (i32, i32),
    pub data: Vec<u8>,
}

impl GlyphMask {
    /// Bytes this mask accounts for in a cache budget
    pub fn byte_cost(&self) -> usize {
        // Entry bookkeeping is charged alongside the pixels.
        self.data.len() + 48
    }
}

/// Shared dirty flag connecting a rasterizer to a cache handle
///
/// The rasterizer sets the flag whenever any knob affecting its output
/// changes; the cache handle checks and clears it before fingerprinting the
/// next glyph. A rasterizer holds at most one observer at a time.
pub type ChangeObserver = Rc<Cell<bool>>;

/// Converts glyph outlines to alpha masks
///
/// Implementations are stateful (configuration knobs, scratch buffers) and
/// owned by a single renderer at a time.
pub trait Rasterizer {
    /// Rasterize one glyph
    ///
    /// `fract` is the sub-pixel origin in 64ths of a pixel, `(x, y)` with
    /// `y` growing downward, each in `0..=63`. Returns `None` when the glyph
    /// has no visible outline (e.g. a space).
    fn rasterize(
        &mut self,
        font: &dyn Font,
        size: Fract,
        glyph: GlyphId,
        fract: (u8, u8),
    ) -> Option<GlyphMask>;

    /// A digest of everything that influences this rasterizer's output
    /// besides (font, size, glyph, fract)
    ///
    /// Two configurations with equal signatures must produce identical
    /// masks; the value is mixed into every cache fingerprint.
    fn signature(&self) -> u64;

    /// Install or remove the change observer
    ///
    /// The rasterizer must set the observer whenever a configuration change
    /// would alter [`Rasterizer::signature`]. Installing replaces any
    /// previous observer.
    fn set_change_observer(&mut self, observer: Option<ChangeObserver>);

    /// Access the faux-styling capability, if implemented
    fn as_faux_mut(&mut self) -> Option<&mut dyn FauxRasterizer> {
        None
    }
}

/// Optional rasterizer capability: synthetic styling knobs
///
/// Used by the built-in oblique and faux-bold twine effects. Implementors
/// must notify their change observer from both setters.
pub trait FauxRasterizer: Rasterizer {
    /// Italic-like horizontal shear: the x displacement per pixel of height
    /// above the baseline, in 64ths
    fn set_skew(&mut self, skew: Fract);
    fn skew(&self) -> Fract;

    /// Bold-like horizontal dilation, in fractional pixels
    fn set_extra_width(&mut self, extra: Fract);
    fn extra_width(&self) -> Fract;
}

#[cfg(feature = "ab_glyph_rasterizer")]
pub use coverage::CoverageRasterizer;

#[cfg(feature = "ab_glyph_rasterizer")]
mod coverage {
    use super::*;
    use ab_glyph_rasterizer::{point, Point};
    use easy_cast::*;

    /// The default rasterizer: analytic coverage over streamed outlines
    ///
    /// Streams outline segments from the font contract, scales them to the
    /// requested size and fills them with an analytic-coverage scanline
    /// rasterizer. Implements the faux capability: skew shears points before
    /// filling, extra width smears coverage rows to the right.
    #[derive(Default)]
    pub struct CoverageRasterizer {
        skew: Fract,
        extra_width: Fract,
        observer: Option<ChangeObserver>,
    }

    impl CoverageRasterizer {
        pub fn new() -> Self {
            Self::default()
        }

        fn notify(&self) {
            if let Some(observer) = &self.observer {
                observer.set(true);
            }
        }
    }

    // Outline segments buffered in font units; the bounding box must be
    // known before the fill buffer can be sized.
    enum Seg {
        Move(Point),
        Line(Point),
        Quad(Point, Point),
        Curve(Point, Point, Point),
        Close,
    }

    #[derive(Default)]
    struct SegSink(Vec<Seg>);

    impl ttf_parser::OutlineBuilder for SegSink {
        fn move_to(&mut self, x: f32, y: f32) {
            self.0.push(Seg::Move(point(x, y)));
        }
        fn line_to(&mut self, x: f32, y: f32) {
            self.0.push(Seg::Line(point(x, y)));
        }
        fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
            self.0.push(Seg::Quad(point(x1, y1), point(x, y)));
        }
        fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
            self.0.push(Seg::Curve(point(x1, y1), point(x2, y2), point(x, y)));
        }
        fn close(&mut self) {
            self.0.push(Seg::Close);
        }
    }

    impl Rasterizer for CoverageRasterizer {
        fn rasterize(
            &mut self,
            font: &dyn Font,
            size: Fract,
            glyph: GlyphId,
            fract: (u8, u8),
        ) -> Option<GlyphMask> {
            let mut sink = SegSink::default();
            let bounds = font.outline_glyph(glyph, &mut sink)?;

            let scale = size.to_f64() as f32 / f32::from(font.units_per_em().max(1));
            let skew = self.skew.to_f64() as f32;
            let fx = f32::from(fract.0) / 64.0;
            let fy = f32::from(fract.1) / 64.0;

            // Screen-space transform: y flips (fonts are y-up), skew shears
            // x by the height above the baseline.
            let map = |p: Point| point(p.x * scale + skew * (p.y * scale) + fx, -p.y * scale + fy);

            // Pixel bounds from the corners of the sheared box.
            let corners = [
                map(point(f32::from(bounds.x_min), f32::from(bounds.y_min))),
                map(point(f32::from(bounds.x_max), f32::from(bounds.y_min))),
                map(point(f32::from(bounds.x_min), f32::from(bounds.y_max))),
                map(point(f32::from(bounds.x_max), f32::from(bounds.y_max))),
            ];
            let mut min = corners[0];
            let mut max = corners[0];
            for c in &corners[1..] {
                min = point(min.x.min(c.x), min.y.min(c.y));
                max = point(max.x.max(c.x), max.y.max(c.y));
            }
            let left: i32 = min.x.cast_floor();
            let top: i32 = min.y.cast_floor();
            let width = usize::conv(i32::conv_ceil(max.x) - left);
            let height = usize::conv(i32::conv_ceil(max.y) - top);
            if width == 0 || height == 0 {
                log::warn!("zero-sized glyph: {:?}", glyph);
                return None;
            }

            let (sx, sy) = (left as f32, top as f32);
            let to_mask = |p: Point| {
                let p = map(p);
                point(p.x - sx, p.y - sy)
            };
            let mut ras = ab_glyph_rasterizer::Rasterizer::new(width, height);
            let mut start = point(0.0, 0.0);
            let mut last = start;
            for seg in &sink.0 {
                match *seg {
                    Seg::Move(p) => {
                        start = to_mask(p);
                        last = start;
                    }
                    Seg::Line(p) => {
                        let p = to_mask(p);
                        ras.draw_line(last, p);
                        last = p;
                    }
                    Seg::Quad(c, p) => {
                        let (c, p) = (to_mask(c), to_mask(p));
                        ras.draw_quad(last, c, p);
                        last = p;
                    }
                    Seg::Curve(c1, c2, p) => {
                        let (c1, c2, p) = (to_mask(c1), to_mask(c2), to_mask(p));
                        ras.draw_cubic(last, c1, c2, p);
                        last = p;
                    }
                    Seg::Close => {
                        if last.x != start.x || last.y != start.y {
                            ras.draw_line(last, start);
                            last = start;
                        }
                    }
                }
            }

            let mut data = vec![0u8; width * height];
            ras.for_each_pixel_2d(|x, y, coverage| {
                data[usize::conv(y) * width + usize::conv(x)] = (coverage * 255.0) as u8;
            });

            let mask = GlyphMask {
                size: (width.cast(), height.cast()),
                offset: (left, top),
                data,
            };
            Some(smear_right(mask, self.extra_width))
        }

        fn signature(&self) -> u64 {
            use std::hash::{Hash, Hasher};
            let mut hasher = std::collections::hash_map::DefaultHasher::new();
            "coverage".hash(&mut hasher);
            self.skew.to_bits().hash(&mut hasher);
            self.extra_width.to_bits().hash(&mut hasher);
            hasher.finish()
        }

        fn set_change_observer(&mut self, observer: Option<ChangeObserver>) {
            self.observer = observer;
        }

        fn as_faux_mut(&mut self) -> Option<&mut dyn FauxRasterizer> {
            Some(self)
        }
    }

    impl FauxRasterizer for CoverageRasterizer {
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
            let extra = extra.max(Fract::ZERO);
            if self.extra_width != extra {
                self.extra_width = extra;
                self.notify();
            }
        }

        fn extra_width(&self) -> Fract {
            self.extra_width
        }
    }

    /// Dilate coverage rows rightward by `extra` pixels
    ///
    /// Whole pixels smear at full strength; the fractional remainder smears
    /// at proportional strength, so the weight grows smoothly with `extra`.
    fn smear_right(mask: GlyphMask, extra: Fract) -> GlyphMask {
        if extra <= Fract::ZERO {
            return mask;
        }
        let whole = usize::conv(extra.floor_to_i32());
        let tail = u32::from(extra.fract());
        let extra_cols = whole + usize::from(tail > 0);

        let (w, h) = (usize::conv(mask.size.0), usize::conv(mask.size.1));
        let new_w = w + extra_cols;
        let mut data = vec![0u8; new_w * h];
        for y in 0..h {
            let src = &mask.data[y * w..(y + 1) * w];
            let dst = &mut data[y * new_w..(y + 1) * new_w];
            for x in 0..new_w {
                let mut value = 0u32;
                for back in 0..=whole {
                    if let Some(sx) = x.checked_sub(back).filter(|sx| *sx < w) {
                        value = value.max(u32::from(src[sx]));
                    }
                }
                if tail > 0 {
                    if let Some(sx) = x.checked_sub(whole + 1).filter(|sx| *sx < w) {
                        value = value.max(u32::from(src[sx]) * tail / 64);
                    }
                }
                dst[x] = value as u8;
            }
        }

        GlyphMask {
            size: (new_w.cast(), mask.size.1),
            offset: mask.offset,
            data,
        }
    }
}
