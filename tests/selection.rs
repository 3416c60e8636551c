// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License in the LICENSE-APACHE file or at:
//     https://www.apache.org/licenses/LICENSE-2.0

//! Selection-rectangle properties
//!
//! The grid font is monospace at 1000 units/em with half-em advances, so at
//! 16 px every glyph advances 8 px and every line is 16 px tall.

mod common;

use common::{renderer_with_font, test_renderer, GridFont};
use std::cell::RefCell;
use std::rc::Rc;
use twine_text::{
    DefaultSizer, Direction, Fract, HorzAlign, PadSizer, QuantStep, Rect, VertAlign,
};

#[test]
fn monospace_metrics_sanity() {
    let mut r = test_renderer();
    let rect = r.measure("hey ho").unwrap();
    assert_eq!(rect.width(), Fract::from(48));
    assert_eq!(rect.height(), Fract::from(16));
    assert!(rect.width() >= Fract::from(32));
    assert!(rect.height() >= Fract::from(8));
}

#[test]
fn empty_text_measures_zero() {
    let mut r = test_renderer();
    assert_eq!(r.measure("").unwrap(), Rect::ZERO);
    assert_eq!(r.measure_height("").unwrap(), Fract::ZERO);
}

#[test]
fn line_break_height_law() {
    let mut r = test_renderer();
    let lh = Fract::from(16);
    assert_eq!(r.measure("\n").unwrap().height(), lh);
    assert_eq!(r.measure("\n\n").unwrap().height(), lh * 2);
    assert_eq!(
        r.measure("A\n").unwrap().height(),
        r.measure("\nA").unwrap().height()
    );
    assert_eq!(r.measure("A\n").unwrap().height(), lh * 2);
}

#[test]
fn height_depends_only_on_line_count() {
    let mut r = test_renderer();
    for (a, b) in [("x", "wider line"), ("a\nb", "aaaa\nbbbb"), ("\nq", "q\nq")] {
        assert_eq!(
            r.measure(a).unwrap().height(),
            r.measure(b).unwrap().height(),
            "{a:?} vs {b:?}"
        );
    }
}

#[test]
fn prefix_rects_are_nested() {
    let mut r = test_renderer();
    let text = "abc def\nghi jkl\nmno";
    let mut prev = Rect::ZERO;
    for end in 0..=text.len() {
        if !text.is_char_boundary(end) {
            continue;
        }
        let rect = r.measure(&text[..end]).unwrap();
        assert!(
            rect.contains(&prev),
            "selection rect shrank at prefix length {end}"
        );
        prev = rect;
    }
}

#[test]
fn width_strictly_increases_with_glyphs() {
    let mut r = test_renderer();
    let mut text = String::new();
    let mut prev = Fract::ZERO;
    for c in "abcdefg".chars() {
        text.push(c);
        let width = r.measure(&text).unwrap().width();
        assert!(width > prev);
        prev = width;
    }
}

#[test]
fn quantization_monotonicity_under_padding() {
    let mut r = test_renderer();
    r.set_quantization(QuantStep::FULL, QuantStep::FULL);
    let mut prev = Fract::ZERO;
    for pad_bits in [0, 8, 16, 32, 48, 64, 96] {
        r.set_sizer(Rc::new(RefCell::new(PadSizer::new(
            DefaultSizer::new(),
            Fract::from_bits(pad_bits),
        ))));
        let width = r.measure("dumb test").unwrap().width();
        assert!(width >= prev, "width decreased at pad {pad_bits}");
        prev = width;
    }
}

#[test]
fn full_and_vertical_quantization_agree_on_height() {
    let mut full = test_renderer();
    full.set_quantization(QuantStep::FULL, QuantStep::FULL);
    let mut vert = test_renderer();
    vert.set_quantization(QuantStep::NONE, QuantStep::FULL);
    for text in ["", "a", "a\nbb", "\n\n", "word\n"] {
        assert_eq!(
            full.measure(text).unwrap().height(),
            vert.measure(text).unwrap().height(),
            "{text:?}"
        );
    }
}

#[test]
fn trailing_break_doubles_height() {
    let mut r = test_renderer();
    r.set_quantization(QuantStep::FULL, QuantStep::FULL);
    let one = r.measure("MMM").unwrap().height();
    assert_eq!(r.measure("MMM\n").unwrap().height(), one * 2);
    assert_eq!(r.measure("\nMMM").unwrap().height(), one * 2);
}

#[test]
fn rtl_measures_as_ltr() {
    let mut r = test_renderer();
    r.set_direction(Direction::RightToLeft);
    r.set_align(HorzAlign::Left, VertAlign::Baseline);
    let rect = r.measure("A\nBB").unwrap();

    let mut ltr = test_renderer();
    let bb = ltr.measure("BB").unwrap();
    assert_eq!(rect.width(), bb.width());
}

#[test]
fn measure_ignores_alignment() {
    let mut r = test_renderer();
    let base = r.measure("two words").unwrap();
    for halign in [HorzAlign::Left, HorzAlign::HorzCenter, HorzAlign::Right] {
        for valign in [VertAlign::Top, VertAlign::VertCenter, VertAlign::Bottom] {
            r.set_align(halign, valign);
            assert_eq!(r.measure("two words").unwrap(), base);
        }
    }
}

#[test]
fn kerning_is_suppressed_across_line_breaks() {
    // Equal adjacent glyphs kern by -100 units (-1.6 px at 16 px).
    let mut r = renderer_with_font(Rc::new(GridFont::with_kerning(-100)));
    r.set_quantization(QuantStep::NONE, QuantStep::NONE);
    let same_line = r.measure("aa").unwrap().width();
    let plain = r.measure("ab").unwrap().width();
    assert!(same_line < plain);

    // Across a break the pair must not kern: both lines measure like
    // isolated glyphs.
    let split = r.measure("a\na").unwrap();
    assert_eq!(split.width(), r.measure("a").unwrap().width());
}
