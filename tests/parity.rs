// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License in the LICENSE-APACHE file or at:
//     https://www.apache.org/licenses/LICENSE-2.0

//! Cache/no-cache and glyph/rune parity
//!
//! The primary correctness gate: drawing through the cache must be
//! pixel-identical to drawing without one, across alignment, direction and
//! quantization configurations. The box rasterizer folds every fingerprint
//! component into its coverage values, so a stale or colliding cache entry
//! necessarily changes pixels.

mod common;

use common::test_renderer;
use std::sync::Arc;
use twine_text::{
    CacheHandle, Direction, Fract, GlyphCache, GlyphId, HorzAlign, QuantStep, RasterTarget,
    Renderer, VertAlign,
};

const W: u32 = 160;
const H: u32 = 96;

fn configs() -> Vec<(HorzAlign, Direction, QuantStep, VertAlign)> {
    let mut out = Vec::new();
    for halign in [HorzAlign::Left, HorzAlign::HorzCenter, HorzAlign::Right] {
        for direction in [Direction::LeftToRight, Direction::RightToLeft] {
            for quant in [QuantStep::FULL, QuantStep::new(8).unwrap(), QuantStep::NONE] {
                for valign in [VertAlign::Baseline, VertAlign::Top, VertAlign::VertCenter] {
                    out.push((halign, direction, quant, valign));
                }
            }
        }
    }
    out
}

fn configure(r: &mut Renderer, config: (HorzAlign, Direction, QuantStep, VertAlign)) {
    r.set_align(config.0, config.3);
    r.set_direction(config.1);
    r.set_quantization(config.2, config.2);
}

fn draw_to_fresh_target(r: &mut Renderer, text: &str) -> (Vec<u8>, twine_text::Point) {
    let mut target = RasterTarget::new(W, H);
    let pen = r
        .draw(&mut target, text, Fract::from(80), Fract::from(48))
        .unwrap();
    (target.data().to_vec(), pen)
}

#[test]
fn cache_and_no_cache_draw_identically() {
    let text = "dumb test\nsecond line";
    for config in configs() {
        let mut baseline = test_renderer();
        configure(&mut baseline, config);
        let (want, want_pen) = draw_to_fresh_target(&mut baseline, text);

        let mut cached = test_renderer();
        configure(&mut cached, config);
        cached.set_cache(Some(CacheHandle::new(Arc::new(GlyphCache::new(
            1 << 20,
        )))));
        // Twice: the second draw is served from the cache.
        let (first, first_pen) = draw_to_fresh_target(&mut cached, text);
        let (second, second_pen) = draw_to_fresh_target(&mut cached, text);

        assert_eq!(first, want, "cold cache diverged under {config:?}");
        assert_eq!(second, want, "warm cache diverged under {config:?}");
        assert_eq!(first_pen, want_pen);
        assert_eq!(second_pen, want_pen);
    }
}

#[test]
fn tiny_cache_still_draws_identically() {
    // A budget too small for even one mask: everything misses, nothing
    // breaks, pixels match.
    let mut baseline = test_renderer();
    let (want, _) = draw_to_fresh_target(&mut baseline, "overflow me");

    let mut cached = test_renderer();
    cached.set_cache(Some(CacheHandle::new(Arc::new(GlyphCache::new(16)))));
    let (got, _) = draw_to_fresh_target(&mut cached, "overflow me");
    assert_eq!(got, want);
}

#[test]
fn glyph_and_rune_sequences_draw_identically() {
    let text = "dumb test";
    for config in configs() {
        let mut r = test_renderer();
        configure(&mut r, config);
        let glyphs: Vec<GlyphId> = {
            let font = r.font().unwrap().clone();
            text.chars().map(|c| font.glyph_index(c)).collect()
        };

        let (want, want_pen) = draw_to_fresh_target(&mut r, text);

        let mut target = RasterTarget::new(W, H);
        let pen = r
            .draw_glyphs(&mut target, &glyphs, Fract::from(80), Fract::from(48))
            .unwrap();
        assert_eq!(target.data(), &want[..], "pixels diverged under {config:?}");
        assert_eq!(pen, want_pen, "pen diverged under {config:?}");

        let measured = r.measure(text).unwrap();
        assert_eq!(r.measure_glyphs(&glyphs).unwrap(), measured);
    }
}

#[test]
fn size_change_creates_distinct_fingerprints() {
    let cache = Arc::new(GlyphCache::new(1 << 20));
    let mut r = test_renderer();
    r.set_cache(Some(CacheHandle::new(cache.clone())));

    let text = "dumb test"; // 8 distinct glyphs (d u m b space t e s)
    r.set_size(Fract::from(17)).unwrap();
    draw_to_fresh_target(&mut r, text);
    assert_eq!(cache.len(), 8);
    r.set_size(Fract::from(18)).unwrap();
    draw_to_fresh_target(&mut r, text);
    assert_eq!(cache.len(), 16, "sizes 17 and 18 must not collide");

    // Each size still matches its own no-cache baseline.
    for size in [17, 18] {
        let mut baseline = test_renderer();
        baseline.set_size(Fract::from(size)).unwrap();
        let (want, _) = draw_to_fresh_target(&mut baseline, text);
        r.set_size(Fract::from(size)).unwrap();
        let (got, _) = draw_to_fresh_target(&mut r, text);
        assert_eq!(got, want, "size {size} diverged from baseline");
    }
}

#[test]
fn faux_knob_changes_invalidate_fingerprints() {
    // Changing a rasterizer knob must re-rasterize, not reuse stale masks.
    let cache = Arc::new(GlyphCache::new(1 << 20));
    let mut r = test_renderer();
    r.set_cache(Some(CacheHandle::new(cache.clone())));

    draw_to_fresh_target(&mut r, "aa");
    let before = cache.len();

    {
        let rast = r.rasterizer().unwrap().clone();
        let mut rast = rast.borrow_mut();
        rast.as_faux_mut()
            .unwrap()
            .set_extra_width(Fract::from_bits(32));
    }
    let (got, _) = draw_to_fresh_target(&mut r, "aa");
    assert!(cache.len() > before, "knob change must mint new fingerprints");

    let mut baseline = test_renderer();
    {
        let rast = baseline.rasterizer().unwrap().clone();
        let mut rast = rast.borrow_mut();
        rast.as_faux_mut()
            .unwrap()
            .set_extra_width(Fract::from_bits(32));
    }
    let (want, _) = draw_to_fresh_target(&mut baseline, "aa");
    assert_eq!(got, want);
}

#[test]
fn null_font_and_rasterizer_are_usage_errors() {
    use twine_text::UsageError;

    let mut r = Renderer::new();
    let mut target = RasterTarget::new(8, 8);
    assert_eq!(
        r.draw(&mut target, "x", Fract::ZERO, Fract::ZERO).err(),
        Some(UsageError::NullFont)
    );

    let mut r = test_renderer();
    r.set_rasterizer(None);
    assert_eq!(
        r.draw(&mut target, "x", Fract::ZERO, Fract::ZERO).err(),
        Some(UsageError::NullRasterizer)
    );
    // Measuring needs no rasterizer.
    assert!(r.measure("x").is_ok());
}
