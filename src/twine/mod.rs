// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License in the LICENSE-APACHE file or at:
//     https://www.apache.org/licenses/LICENSE-2.0

//! Twines: binary rich-text streams
//!
//! A twine mixes UTF-8 text, raw glyph indices and bracketed *effect*
//! directives in one byte buffer. [`Twine`] is the builder; the interpreter
//! lives in [`operator`] and is driven through
//! [`Renderer::draw_twine`][crate::Renderer::draw_twine].
//!
//! ## Wire format
//!
//! The buffer is partitioned by a one-bit mode. In *string mode* bytes are
//! plain UTF-8 and a control sequence begins at `0x1F`. In *glyph mode*
//! bytes are little-endian `u16` glyph indices with one escape: when both
//! index bytes are zero, a third byte disambiguates: `0x00` is a real
//! notdef glyph, `0x1F` opens a control sequence, anything else is a data
//! error. Two control codes toggle the mode; the builder emits them
//! transparently so callers never track the current mode.
//!
//! Every *push* directive carries a one-byte effect key (0–192 address
//! user-registered functions, 193–254 built-ins) and a length-prefixed
//! payload of at most 255 bytes.

pub(crate) mod decode;
pub(crate) mod effect_list;
pub(crate) mod effects;
pub(crate) mod operator;

pub(crate) use effects::builtin_effect_fn;

use crate::data::Color;
use crate::error::UsageError;
use crate::font::GlyphId;
use crate::fract::{Fract, Point};
use crate::render::Renderer;
use crate::target::Target;

/// Control-sequence introducer, in both modes
pub(crate) const CTRL: u8 = 0x1F;

// Control codes following the introducer.
pub(crate) const CC_STRING_MODE: u8 = 0x01;
pub(crate) const CC_GLYPH_MODE: u8 = 0x02;
pub(crate) const CC_POP: u8 = 0x03;
pub(crate) const CC_POP_ALL: u8 = 0x04;
pub(crate) const CC_STOP_MOTION: u8 = 0x05;
pub(crate) const CC_REFRESH_LINE_METRICS: u8 = 0x06;
pub(crate) const CC_PUSH_SINGLE: u8 = 0x07;
pub(crate) const CC_PUSH_DOUBLE: u8 = 0x08;
pub(crate) const CC_PUSH_SPACED: u8 = 0x09;
pub(crate) const CC_PUSH_MOTION: u8 = 0x0A;
pub(crate) const CC_PUSH_LINE_RESTART: u8 = 0x0B;
pub(crate) const CC_POP_LINE_RESTART: u8 = 0x0C;

/// Highest key addressing a user-registered effect or motion function
pub const MAX_USER_KEY: u8 = 192;

/// First key addressing a built-in effect
pub const BUILTIN_KEY_BASE: u8 = 193;

/// Built-in effect: set the font color (payload: R, G, B, A)
pub const KEY_COLOR: u8 = 193;
/// Built-in effect: switch the active font-table index (payload: index)
pub const KEY_FONT_INDEX: u8 = 194;
/// Built-in effect: shift the logical size (payload: LE i32 fract delta)
pub const KEY_SHIFT_SIZE: u8 = 195;
/// Built-in effect: set the logical size (payload: LE i32 fract)
pub const KEY_SET_SIZE: u8 = 196;
/// Built-in effect: faux-bold dilation (payload: extra width in 64ths)
pub const KEY_FAUX_BOLD: u8 = 197;
/// Built-in effect: oblique shear (payload: signed skew in 64ths)
pub const KEY_OBLIQUE: u8 = 198;
/// Built-in effect: strike-through rule (payload: optional R, G, B, A)
pub const KEY_STRIKETHROUGH: u8 = 199;
/// Built-in effect: underline rule (payload: optional R, G, B, A)
pub const KEY_UNDERLINE: u8 = 200;

/// Whether an effect needs a pre-measured width at draw time
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EffectMode {
    /// Invoked with the pen as it goes; width known only at Pop/LineBreak
    SinglePass,
    /// The bracketed fragment is measured before it is drawn
    DoublePass,
}

/// Why an effect function is being invoked
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EffectTrigger {
    /// The opening bracket (or its drawing-pass replay)
    Push,
    /// A new line begins while the effect is active
    LineStart,
    /// The current line ends while the effect is active
    LineBreak,
    /// The closing bracket (explicit pop, pop-all or end of twine)
    Pop,
}

bitflags::bitflags! {
    /// Flags carried on every effect invocation
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct EffectFlags: u8 {
        /// This is a measuring pass; nothing may be drawn
        const MEASURING = 1 << 0;
        /// Text direction is right-to-left
        const RTL = 1 << 1;
        /// `known_width` is valid
        const WIDTH_KNOWN = 1 << 2;
    }
}

/// Extra pen spacing around an effect bracket
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Spacing {
    /// Added to the pen at Push, after the effect's own advance
    pub pre: Fract,
    /// Added to the pen at Pop, after the effect's own advance
    pub post: Fract,
}

/// Everything an effect function is told per invocation
#[derive(Clone, Debug)]
pub struct EffectCall<'a> {
    pub key: u8,
    pub mode: EffectMode,
    pub trigger: EffectTrigger,
    pub flags: EffectFlags,
    /// The payload bytes from the push directive
    pub payload: &'a [u8],
    /// Pen position captured at Push (or at the current line's start)
    pub origin: Point,
    /// Frozen ascent of the current line
    pub ascent: Fract,
    /// Frozen descent of the current line
    pub descent: Fract,
    /// Width of the bracketed fragment on this line; valid only when
    /// [`EffectFlags::WIDTH_KNOWN`] is set
    pub known_width: Fract,
    pub pre_pad: Fract,
    pub post_pad: Fract,
}

impl EffectCall<'_> {
    /// True during a measuring pass
    #[inline]
    pub fn measuring(&self) -> bool {
        self.flags.contains(EffectFlags::MEASURING)
    }

    /// True when `known_width` is valid
    #[inline]
    pub fn width_known(&self) -> bool {
        self.flags.contains(EffectFlags::WIDTH_KNOWN)
    }
}

/// An effect implementation
///
/// Receives the renderer, the target (absent during measuring passes) and
/// the invocation record. The returned advance is added to the pen
/// (direction-aware) and, when non-zero, interrupts kerning. The advance is
/// applied unquantized; the next glyph's quantization step re-aligns the
/// pen.
pub type EffectFn =
    fn(&mut Renderer, Option<&mut dyn Target>, &EffectCall<'_>) -> Result<Fract, UsageError>;

/// A motion implementation: a per-tick pen displacement
///
/// Declared for registration and directive encoding; the drawing-time hook
/// is an extension point and is not yet invoked.
pub type MotionFn = fn(&mut Renderer, u32, &[u8]) -> Point;

/// Builder for twine byte streams
///
/// All content methods are fluent and manage mode switches internally:
///
/// ```
/// use twine_text::{Color, Twine};
/// let mut twine = Twine::new();
/// twine
///     .add("plain ")
///     .push_color(Color::rgb(255, 0, 0))
///     .add("red")
///     .pop()
///     .add(" plain again");
/// ```
#[derive(Clone, Debug, Default)]
pub struct Twine {
    buffer: Vec<u8>,
    glyph_mode: bool,
    tick: u32,
}

impl Twine {
    pub fn new() -> Self {
        Self::default()
    }

    /// The encoded bytes
    pub fn data(&self) -> &[u8] {
        &self.buffer
    }

    /// The animation counter
    pub fn tick_count(&self) -> u32 {
        self.tick
    }

    /// Advance the animation counter
    pub fn tick(&mut self) -> &mut Self {
        self.tick = self.tick.wrapping_add(1);
        self
    }

    /// Clear content and mode; the tick counter is kept
    pub fn reset(&mut self) -> &mut Self {
        self.buffer.clear();
        self.glyph_mode = false;
        self
    }

    /// Append text
    ///
    /// The code point U+001F is reserved as the control introducer and is
    /// stripped from the input.
    pub fn add(&mut self, text: &str) -> &mut Self {
        self.ensure_string_mode();
        if text.contains('\u{1F}') {
            for c in text.chars().filter(|c| *c != '\u{1F}') {
                let mut buf = [0u8; 4];
                self.buffer.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            }
        } else {
            self.buffer.extend_from_slice(text.as_bytes());
        }
        self
    }

    /// Append a single code point
    pub fn add_char(&mut self, c: char) -> &mut Self {
        if c == '\u{1F}' {
            return self;
        }
        self.ensure_string_mode();
        let mut buf = [0u8; 4];
        self.buffer.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
        self
    }

    /// Append a raw glyph index
    pub fn add_glyph(&mut self, glyph: GlyphId) -> &mut Self {
        self.ensure_glyph_mode();
        if glyph.0 == 0 {
            // Escape: two zero bytes then the real-notdef marker.
            self.buffer.extend_from_slice(&[0x00, 0x00, 0x00]);
        } else {
            self.buffer.extend_from_slice(&glyph.0.to_le_bytes());
        }
        self
    }

    /// Append raw glyph indices
    pub fn add_glyphs(&mut self, glyphs: &[GlyphId]) -> &mut Self {
        for glyph in glyphs {
            self.add_glyph(*glyph);
        }
        self
    }

    /// Push an effect bracket
    ///
    /// `key` addresses a registered function (0–192) or a built-in
    /// (193–254).
    pub fn push_effect(
        &mut self,
        key: u8,
        mode: EffectMode,
        payload: &[u8],
    ) -> Result<&mut Self, UsageError> {
        if key == u8::MAX {
            return Err(UsageError::EffectKeyRange(key));
        }
        let len = check_payload(payload)?;
        let code = match mode {
            EffectMode::SinglePass => CC_PUSH_SINGLE,
            EffectMode::DoublePass => CC_PUSH_DOUBLE,
        };
        self.emit_ctrl(code);
        self.buffer.push(key);
        self.buffer.push(len);
        self.buffer.extend_from_slice(payload);
        Ok(self)
    }

    /// Push an effect bracket with pre/post pen spacing
    pub fn push_effect_with_spacing(
        &mut self,
        key: u8,
        mode: EffectMode,
        spacing: Spacing,
        payload: &[u8],
    ) -> Result<&mut Self, UsageError> {
        if key == u8::MAX {
            return Err(UsageError::EffectKeyRange(key));
        }
        let len = check_payload(payload)?;
        self.emit_ctrl(CC_PUSH_SPACED);
        self.buffer.push(key);
        self.buffer
            .push(if mode == EffectMode::DoublePass { 1 } else { 0 });
        self.buffer.extend_from_slice(&spacing.pre.to_bits().to_le_bytes());
        self.buffer.extend_from_slice(&spacing.post.to_bits().to_le_bytes());
        self.buffer.push(len);
        self.buffer.extend_from_slice(payload);
        Ok(self)
    }

    /// Push a motion bracket
    ///
    /// Motion keys address user-registered motion functions only (0–192).
    pub fn push_motion(&mut self, key: u8, payload: &[u8]) -> Result<&mut Self, UsageError> {
        if key > MAX_USER_KEY {
            return Err(UsageError::EffectKeyRange(key));
        }
        let len = check_payload(payload)?;
        self.emit_ctrl(CC_PUSH_MOTION);
        self.buffer.push(key);
        self.buffer.push(len);
        self.buffer.extend_from_slice(payload);
        Ok(self)
    }

    /// Close the most recent effect bracket
    pub fn pop(&mut self) -> &mut Self {
        self.emit_ctrl(CC_POP);
        self
    }

    /// Close every open effect bracket
    pub fn pop_all(&mut self) -> &mut Self {
        self.emit_ctrl(CC_POP_ALL);
        self
    }

    /// Stop the most recent motion
    pub fn stop_motion(&mut self) -> &mut Self {
        self.emit_ctrl(CC_STOP_MOTION);
        self
    }

    /// Re-read line metrics from the renderer at the next line break
    pub fn refresh_line_metrics(&mut self) -> &mut Self {
        self.emit_ctrl(CC_REFRESH_LINE_METRICS);
        self
    }

    /// Mark the current pen x as the restart position for new lines
    pub fn push_line_restart(&mut self) -> &mut Self {
        self.emit_ctrl(CC_PUSH_LINE_RESTART);
        self
    }

    /// Drop the most recent line-restart marker
    pub fn pop_line_restart(&mut self) -> &mut Self {
        self.emit_ctrl(CC_POP_LINE_RESTART);
        self
    }

    // --- built-in effect conveniences ---

    /// Bracket: draw in `color`
    pub fn push_color(&mut self, color: Color) -> &mut Self {
        let payload = [color.r, color.g, color.b, color.a];
        self.push_effect(KEY_COLOR, EffectMode::SinglePass, &payload)
            .expect("fixed payload")
    }

    /// Bracket: draw with the font at table `index`
    pub fn push_font_index(&mut self, index: u8) -> &mut Self {
        self.push_effect(KEY_FONT_INDEX, EffectMode::SinglePass, &[index])
            .expect("fixed payload")
    }

    /// Bracket: shift the logical size by `delta`
    pub fn push_shift_size(&mut self, delta: Fract) -> &mut Self {
        self.push_effect(
            KEY_SHIFT_SIZE,
            EffectMode::SinglePass,
            &delta.to_bits().to_le_bytes(),
        )
        .expect("fixed payload")
    }

    /// Bracket: set the logical size to `size`
    pub fn push_set_size(&mut self, size: Fract) -> &mut Self {
        self.push_effect(
            KEY_SET_SIZE,
            EffectMode::SinglePass,
            &size.to_bits().to_le_bytes(),
        )
        .expect("fixed payload")
    }

    /// Bracket: faux-bold by `extra` pixels of dilation (0 to ~4 px)
    pub fn push_faux_bold(&mut self, extra: Fract) -> &mut Self {
        let bits = extra.to_bits().clamp(0, 255) as u8;
        self.push_effect(KEY_FAUX_BOLD, EffectMode::SinglePass, &[bits])
            .expect("fixed payload")
    }

    /// Bracket: oblique shear by `skew` (x per y pixel; ±2 px)
    pub fn push_oblique(&mut self, skew: Fract) -> &mut Self {
        let bits = skew.to_bits().clamp(-128, 127) as i8;
        self.push_effect(KEY_OBLIQUE, EffectMode::SinglePass, &[bits as u8])
            .expect("fixed payload")
    }

    /// Bracket: strike-through in the active color
    pub fn push_strikethrough(&mut self) -> &mut Self {
        self.push_effect(KEY_STRIKETHROUGH, EffectMode::SinglePass, &[])
            .expect("fixed payload")
    }

    /// Bracket: underline in the active color
    pub fn push_underline(&mut self) -> &mut Self {
        self.push_effect(KEY_UNDERLINE, EffectMode::SinglePass, &[])
            .expect("fixed payload")
    }

    // --- framing ---

    fn emit_ctrl(&mut self, code: u8) {
        if self.glyph_mode {
            self.buffer.extend_from_slice(&[0x00, 0x00, CTRL, code]);
        } else {
            self.buffer.extend_from_slice(&[CTRL, code]);
        }
        match code {
            CC_STRING_MODE => self.glyph_mode = false,
            CC_GLYPH_MODE => self.glyph_mode = true,
            _ => (),
        }
    }

    fn ensure_string_mode(&mut self) {
        if self.glyph_mode {
            self.emit_ctrl(CC_STRING_MODE);
        }
    }

    fn ensure_glyph_mode(&mut self) {
        if !self.glyph_mode {
            self.emit_ctrl(CC_GLYPH_MODE);
        }
    }
}

fn check_payload(payload: &[u8]) -> Result<u8, UsageError> {
    if payload.len() > 255 {
        return Err(UsageError::PayloadTooLong);
    }
    Ok(payload.len() as u8)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn plain_text_is_plain_utf8() {
        let mut twine = Twine::new();
        twine.add("héllo");
        assert_eq!(twine.data(), "héllo".as_bytes());
    }

    #[test]
    fn control_introducer_is_stripped_from_text() {
        let mut twine = Twine::new();
        twine.add("a\u{1F}b").add_char('\u{1F}');
        assert_eq!(twine.data(), b"ab");
    }

    #[test]
    fn glyph_mode_switch_is_transparent() {
        let mut twine = Twine::new();
        twine.add("a").add_glyph(GlyphId(0x0102)).add("b");
        assert_eq!(
            twine.data(),
            &[
                b'a',
                CTRL,
                CC_GLYPH_MODE,
                0x02,
                0x01, // LE glyph index
                0x00,
                0x00,
                CTRL,
                CC_STRING_MODE,
                b'b',
            ]
        );
    }

    #[test]
    fn notdef_glyph_uses_triple_zero_escape() {
        let mut twine = Twine::new();
        twine.add_glyph(GlyphId(0));
        assert_eq!(twine.data(), &[CTRL, CC_GLYPH_MODE, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn control_in_glyph_mode_uses_escape() {
        let mut twine = Twine::new();
        twine.add_glyph(GlyphId(7)).pop();
        assert_eq!(
            twine.data(),
            &[CTRL, CC_GLYPH_MODE, 0x07, 0x00, 0x00, 0x00, CTRL, CC_POP]
        );
    }

    #[test]
    fn push_effect_layout() {
        let mut twine = Twine::new();
        twine
            .push_effect(5, EffectMode::DoublePass, &[0xAA, 0xBB])
            .unwrap();
        assert_eq!(twine.data(), &[CTRL, CC_PUSH_DOUBLE, 5, 2, 0xAA, 0xBB]);
    }

    #[test]
    fn payload_length_limit() {
        let mut twine = Twine::new();
        let long = vec![0u8; 256];
        assert_eq!(
            twine
                .push_effect(1, EffectMode::SinglePass, &long)
                .err()
                .unwrap(),
            UsageError::PayloadTooLong
        );
        let ok = vec![0u8; 255];
        assert!(twine.push_effect(1, EffectMode::SinglePass, &ok).is_ok());
    }

    #[test]
    fn motion_key_range() {
        let mut twine = Twine::new();
        assert!(twine.push_motion(192, &[]).is_ok());
        assert_eq!(
            twine.push_motion(193, &[]).err().unwrap(),
            UsageError::EffectKeyRange(193)
        );
    }
}
