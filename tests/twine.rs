// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License in the LICENSE-APACHE file or at:
//     https://www.apache.org/licenses/LICENSE-2.0

//! Twine interpretation: effect triggers, double-pass replay, built-ins

mod common;

use common::test_renderer;
use std::cell::RefCell;
use twine_text::{
    Color, EffectCall, EffectMode, EffectTrigger, Error, Fract, RasterTarget, Renderer, Target,
    Twine, TwineError, UsageError, KEY_COLOR,
};

const KEY: u8 = 7;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Call {
    trigger: EffectTrigger,
    measuring: bool,
    width_known: bool,
    payload_len: usize,
}

thread_local! {
    static CALLS: RefCell<Vec<Call>> = const { RefCell::new(Vec::new()) };
}

fn recording_effect(
    _r: &mut Renderer,
    _target: Option<&mut dyn Target>,
    call: &EffectCall,
) -> Result<Fract, UsageError> {
    CALLS.with(|calls| {
        calls.borrow_mut().push(Call {
            trigger: call.trigger,
            measuring: call.measuring(),
            width_known: call.width_known(),
            payload_len: call.payload.len(),
        })
    });
    Ok(Fract::ZERO)
}

fn take_calls() -> Vec<Call> {
    CALLS.with(|calls| std::mem::take(&mut *calls.borrow_mut()))
}

fn recording_renderer() -> Renderer {
    let mut r = test_renderer();
    r.register_effect_fn(KEY, recording_effect).unwrap();
    r
}

fn draw(r: &mut Renderer, twine: &Twine) -> Vec<u8> {
    let mut target = RasterTarget::new(200, 100);
    r.draw_twine(&mut target, twine, Fract::from(8), Fract::from(40))
        .unwrap();
    target.data().to_vec()
}

#[test]
fn single_pass_trigger_sequence_across_lines() {
    let mut r = recording_renderer();
    let mut twine = Twine::new();
    twine.push_effect(KEY, EffectMode::SinglePass, &[]).unwrap();
    twine.add("line1\nline2").pop();
    draw(&mut r, &twine);

    let calls = take_calls();
    let triggers: Vec<_> = calls.iter().map(|c| c.trigger).collect();
    assert_eq!(
        triggers,
        vec![
            EffectTrigger::Push,
            EffectTrigger::LineBreak,
            EffectTrigger::LineStart,
            EffectTrigger::Pop,
        ]
    );
    assert!(calls.iter().all(|c| !c.measuring));
    // Width is known exactly at LineBreak and Pop.
    let widths: Vec<_> = calls.iter().map(|c| c.width_known).collect();
    assert_eq!(widths, vec![false, true, false, true]);
}

#[test]
fn double_pass_runs_the_sequence_once_per_mode() {
    let mut r = recording_renderer();
    let mut twine = Twine::new();
    twine.push_effect(KEY, EffectMode::DoublePass, &[]).unwrap();
    twine.add("line1\nline2").pop();
    draw(&mut r, &twine);

    let calls = take_calls();
    let expected = vec![
        EffectTrigger::Push,
        EffectTrigger::LineBreak,
        EffectTrigger::LineStart,
        EffectTrigger::Pop,
    ];
    let measuring: Vec<_> = calls
        .iter()
        .filter(|c| c.measuring)
        .map(|c| c.trigger)
        .collect();
    let drawing: Vec<_> = calls
        .iter()
        .filter(|c| !c.measuring)
        .map(|c| c.trigger)
        .collect();
    assert_eq!(measuring, expected, "measuring pass");
    assert_eq!(drawing, expected, "drawing pass");

    // Drawing-pass invocations of a double-pass effect know their width.
    assert!(calls
        .iter()
        .filter(|c| !c.measuring)
        .all(|c| c.width_known));
}

#[test]
fn single_pass_push_and_pop_only() {
    let mut r = recording_renderer();
    let mut twine = Twine::new();
    twine.add("one ");
    twine.push_effect(KEY, EffectMode::SinglePass, &[]).unwrap();
    twine.add("two ").pop().add("three");
    draw(&mut r, &twine);

    let calls = take_calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].trigger, EffectTrigger::Push);
    assert_eq!(calls[0].payload_len, 0);
    assert!(!calls[0].width_known);
    assert_eq!(calls[1].trigger, EffectTrigger::Pop);
    assert_eq!(calls[1].payload_len, 0);
    assert!(calls[1].width_known);
}

#[test]
fn end_of_twine_pops_open_effects() {
    let mut r = recording_renderer();
    let mut twine = Twine::new();
    twine.push_effect(KEY, EffectMode::SinglePass, &[]).unwrap();
    twine.add("abc");
    draw(&mut r, &twine);

    let calls = take_calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[1].trigger, EffectTrigger::Pop);
}

#[test]
fn double_pass_replay_draws_identically() {
    // A no-op double-pass bracket must not change pixels or the pen.
    let mut plain = Twine::new();
    plain.add("abc def\nghi");
    let mut bracketed = Twine::new();
    bracketed
        .push_effect(KEY, EffectMode::DoublePass, &[])
        .unwrap();
    bracketed.add("abc def\nghi").pop();

    let mut r = recording_renderer();
    let want = draw(&mut r, &plain);
    let got = draw(&mut r, &bracketed);
    assert_eq!(got, want);
}

#[test]
fn twine_height_matches_plain_selection_rect() {
    let mut r = test_renderer();
    for text in ["", "word", "two\nlines", "\n", "a\n\nb", "trailing\n"] {
        let mut twine = Twine::new();
        twine.add(text);
        assert_eq!(
            r.measure_twine_height(&twine).unwrap(),
            r.measure(text).unwrap().height(),
            "{text:?}"
        );
    }
}

#[test]
fn color_effect_applies_and_restores() {
    let mut r = test_renderer();
    r.set_color(Color::rgb(10, 20, 30));

    let mut twine = Twine::new();
    twine.add("a").push_color(Color::rgb(200, 0, 0)).add("b");
    // No explicit pop: end of twine pops and must restore the color.
    draw(&mut r, &twine);
    assert_eq!(r.color(), Color::rgb(10, 20, 30));
}

#[test]
fn size_effect_applies_and_restores() {
    let mut r = test_renderer();
    let mut twine = Twine::new();
    twine
        .add("a")
        .push_shift_size(Fract::from(4))
        .add("big")
        .pop()
        .add("b");
    draw(&mut r, &twine);
    assert_eq!(r.size(), Fract::from(16));

    // The size change must actually alter output.
    let mut plain = Twine::new();
    plain.add("abigb");
    let mut r2 = test_renderer();
    assert_ne!(draw(&mut r2, &twine), draw(&mut r2, &plain));
}

#[test]
fn faux_bold_effect_roundtrips_the_knob() {
    let mut r = test_renderer();
    let mut twine = Twine::new();
    twine.push_faux_bold(Fract::ONE).add("bold").pop().add("x");
    draw(&mut r, &twine);

    let rast = r.rasterizer().unwrap().clone();
    let mut rast = rast.borrow_mut();
    assert_eq!(rast.as_faux_mut().unwrap().extra_width(), Fract::ZERO);
}

#[test]
fn strikethrough_draws_extra_pixels() {
    let mut r = test_renderer();
    let mut plain = Twine::new();
    plain.add("strike");
    let mut struck = Twine::new();
    struck.push_strikethrough().add("strike").pop();
    assert_ne!(draw(&mut r, &struck), draw(&mut r, &plain));
}

#[test]
fn mode_mismatch_is_a_usage_error() {
    let mut r = test_renderer();
    let mut twine = Twine::new();
    twine
        .push_effect(KEY_COLOR, EffectMode::DoublePass, &[255, 0, 0, 255])
        .unwrap();
    twine.add("x");
    let mut target = RasterTarget::new(64, 32);
    assert_eq!(
        r.draw_twine(&mut target, &twine, Fract::ZERO, Fract::from(16))
            .err(),
        Some(Error::Usage(UsageError::EffectModeMismatch))
    );
}

#[test]
fn unregistered_effect_key_is_a_usage_error() {
    let mut r = test_renderer();
    let mut twine = Twine::new();
    twine.push_effect(42, EffectMode::SinglePass, &[]).unwrap();
    twine.add("x");
    let mut target = RasterTarget::new(64, 32);
    assert_eq!(
        r.draw_twine(&mut target, &twine, Fract::ZERO, Fract::from(16))
            .err(),
        Some(Error::Usage(UsageError::UnregisteredEffect(42)))
    );
}

#[test]
fn unbalanced_pop_is_a_data_error() {
    let mut r = test_renderer();
    let mut twine = Twine::new();
    twine.add("x").pop();
    let mut target = RasterTarget::new(64, 32);
    assert_eq!(
        r.draw_twine(&mut target, &twine, Fract::ZERO, Fract::from(16))
            .err(),
        Some(Error::Twine(TwineError::UnbalancedPop))
    );
}

#[test]
fn glyph_mode_content_draws_like_string_content() {
    let mut r = test_renderer();
    let font = r.font().unwrap().clone();
    let glyphs: Vec<_> = "mixed".chars().map(|c| font.glyph_index(c)).collect();

    let mut by_chars = Twine::new();
    by_chars.add("mixed");
    let mut by_glyphs = Twine::new();
    by_glyphs.add_glyphs(&glyphs);

    assert_eq!(draw(&mut r, &by_chars), draw(&mut r, &by_glyphs));
}

#[test]
fn effects_survive_mode_switches() {
    let mut r = recording_renderer();
    let font = r.font().unwrap().clone();
    let g = font.glyph_index('g');

    let mut twine = Twine::new();
    twine.push_effect(KEY, EffectMode::SinglePass, &[]).unwrap();
    twine.add("a").add_glyph(g).add("b").pop();
    draw(&mut r, &twine);

    let calls = take_calls();
    assert_eq!(calls.len(), 2);
    assert!(calls[1].width_known);
}
