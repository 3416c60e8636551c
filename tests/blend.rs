// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License in the LICENSE-APACHE file or at:
//     https://www.apache.org/licenses/LICENSE-2.0

//! Blend-mode invariants, exercised through full renderer draws

mod common;

use common::{test_renderer, BoxRasterizer, GridFont};
use twine_text::{Blend, Color, Fract, Rasterizer, RasterTarget};

const W: u32 = 64;
const H: u32 = 32;

fn draw_over(base: Color, blend: Blend, color: Color) -> (RasterTarget, RasterTarget) {
    let mut before = RasterTarget::new(W, H);
    before.clear(base);
    let mut after = RasterTarget::new(W, H);
    after.clear(base);

    let mut r = test_renderer();
    r.set_blend(blend);
    r.set_color(color);
    r.draw(&mut after, "Ax9", Fract::from(4), Fract::from(20))
        .unwrap();
    (before, after)
}

fn for_each_pixel(before: &RasterTarget, after: &RasterTarget, mut f: impl FnMut(Color, Color)) {
    for y in 0..H {
        for x in 0..W {
            f(before.pixel(x, y), after.pixel(x, y));
        }
    }
}

#[test]
fn replace_output_alpha_is_mask_alpha() {
    let (_, after) = draw_over(Color::rgba(9, 9, 9, 9), Blend::Replace, Color::WHITE);

    // Expected coverage for glyph 'A' at these coordinates.
    let mut rast = BoxRasterizer::new();
    let font = GridFont::new();
    let glyph = twine_text::Font::glyph_index(&font, 'A');
    let mask = rast
        .rasterize(&font, Fract::from(16), glyph, (0, 0))
        .unwrap();
    let coverage = mask.data[0];

    // Inside the first glyph's box the alpha equals the mask alpha exactly.
    let px = after.pixel(5, 15);
    assert_eq!(px.a, coverage);
}

#[test]
fn add_components_never_decrease() {
    let (before, after) = draw_over(
        Color::rgba(100, 120, 140, 160),
        Blend::Add,
        Color::rgb(50, 60, 70),
    );
    for_each_pixel(&before, &after, |b, a| {
        assert!(a.r >= b.r && a.g >= b.g && a.b >= b.b);
    });
}

#[test]
fn sub_preserves_target_alpha() {
    let (before, after) = draw_over(
        Color::rgba(100, 120, 140, 160),
        Blend::Sub,
        Color::rgb(200, 200, 200),
    );
    for_each_pixel(&before, &after, |b, a| {
        assert_eq!(a.a, b.a);
        assert!(a.r <= b.r && a.g <= b.g && a.b <= b.b);
    });
}

#[test]
fn cut_alpha_is_non_increasing() {
    let (before, after) = draw_over(
        Color::rgba(80, 90, 100, 220),
        Blend::Cut,
        Color::WHITE,
    );
    let mut decreased = false;
    for_each_pixel(&before, &after, |b, a| {
        assert!(a.a <= b.a);
        assert_eq!((a.r, a.g, a.b), (b.r, b.g, b.b));
        decreased |= a.a < b.a;
    });
    assert!(decreased, "cut must erase something under the glyphs");
}

#[test]
fn multiply_and_hue_preserve_alpha() {
    for blend in [Blend::Multiply, Blend::Hue] {
        let (before, after) = draw_over(
            Color::rgba(90, 140, 190, 200),
            blend,
            Color::rgb(255, 40, 40),
        );
        for_each_pixel(&before, &after, |b, a| {
            assert_eq!(a.a, b.a, "{blend:?}");
        });
    }
}

#[test]
fn over_blends_toward_source() {
    let (before, after) = draw_over(Color::rgba(0, 0, 0, 255), Blend::Over, Color::WHITE);
    let mut touched = false;
    for_each_pixel(&before, &after, |b, a| {
        assert!(a.r >= b.r);
        touched |= a.r > b.r;
    });
    assert!(touched);
}
