// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License in the LICENSE-APACHE file or at:
//     https://www.apache.org/licenses/LICENSE-2.0

//! The twine interpreter
//!
//! A state machine reproducing the positioning engine's behavior while
//! threading effect invocations through the stream. The delicate part is
//! the *double-pass* machinery: when a double-pass effect is pushed (or a
//! line needs its width before drawing can start), the operator snapshots
//! the pen, input position and glyph-mode flag, runs the region in
//! measuring mode, then rewinds and replays it in drawing mode with widths
//! known. Nested double-pass effects widen the same window; only the
//! outermost transition between modes is observable.
//!
//! Stateful effects keep this sound by bracketing: they apply at
//! Push/LineStart and undo at LineBreak/Pop, so every measuring segment
//! (always starting at a Push or LineStart, always ending at a Pop or line
//! end) leaves renderer state exactly as it found it.

use super::decode::{Decoder, RawUnit};
use super::effect_list::{EffectEntry, EffectList};
use super::{
    EffectCall, EffectFlags, EffectMode, EffectTrigger, Twine, CC_GLYPH_MODE, CC_POP, CC_POP_ALL,
    CC_PUSH_DOUBLE, CC_PUSH_LINE_RESTART, CC_PUSH_MOTION, CC_PUSH_SINGLE, CC_PUSH_SPACED,
    CC_POP_LINE_RESTART, CC_REFRESH_LINE_METRICS, CC_STOP_MOTION, CC_STRING_MODE,
};
use crate::data::{Direction, HorzAlign, QuantStep, VertAlign};
use crate::error::{Error, TwineError, UsageError};
use crate::font::GlyphId;
use crate::fract::{Fract, Point};
use crate::position::{resolve_baseline, VMetrics};
use crate::render::Renderer;
use crate::target::Target;
use smallvec::SmallVec;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ResetKind {
    /// Snapshot taken at a double-pass push directive
    AtPush,
    /// Snapshot taken at the start of a line
    AtLineStart,
}

#[derive(Clone, Copy, Debug)]
struct Reset {
    pos: usize,
    glyph_mode: bool,
    pen: Point,
    prev_glyph: Option<GlyphId>,
    nth_break: u32,
    restarts_len: usize,
    double_active: u32,
    /// Entries with `seq >= seq_watermark` were pushed inside the segment
    seq_watermark: u32,
    kind: ResetKind,
    /// The segment measures from a line-relative pen origin of zero
    measure_rel: bool,
}

/// Reusable twine interpreter state
///
/// Acquired from the transient pool by the renderer's twine entry points;
/// `run` fully reinitializes, so pooled reuse is safe.
#[derive(Default)]
pub(crate) struct Operator {
    effects: EffectList,
    motions: SmallVec<[(u8, u32, u8); 2]>,
    restarts: SmallVec<[Fract; 2]>,
    measuring: bool,
    height_only: bool,
    reset: Option<Reset>,
    line: VMetrics,
    first_line_height: Fract,
    refresh_requested: bool,
    pen: Point,
    origin: Point,
    prev_glyph: Option<GlyphId>,
    nth_break: u32,
    double_active: u32,
    next_seq: u32,
    any_glyph: bool,
    height: Fract,
    needs_line_measure: bool,
    stopped: bool,
    rtl: bool,
    halign: HorzAlign,
    hq: QuantStep,
    vq: QuantStep,
}

impl Operator {
    fn clear(&mut self) {
        self.effects.clear();
        self.motions.clear();
        self.restarts.clear();
        self.measuring = false;
        self.height_only = false;
        self.reset = None;
        self.line = VMetrics::default();
        self.first_line_height = Fract::ZERO;
        self.refresh_requested = false;
        self.pen = Point::ZERO;
        self.origin = Point::ZERO;
        self.prev_glyph = None;
        self.nth_break = 0;
        self.double_active = 0;
        self.next_seq = 0;
        self.any_glyph = false;
        self.height = Fract::ZERO;
        self.needs_line_measure = false;
        self.stopped = false;
    }

    /// Interpret `twine`, drawing onto `target` when given
    ///
    /// Without a target the whole run is a measuring pass (used for height
    /// measurement); with one, drawing and measuring interleave as
    /// double-pass regions require.
    pub fn run(
        &mut self,
        r: &mut Renderer,
        mut target: Option<&mut dyn Target>,
        twine: &Twine,
        origin: Point,
    ) -> Result<Point, Error> {
        self.clear();
        self.height_only = target.is_none();
        self.measuring = self.height_only;
        if target.is_some() && r.state.rasterizer.is_none() {
            return Err(UsageError::NullRasterizer.into());
        }

        self.line = r.vmetrics_now()?;
        self.first_line_height = self.line.line_height;
        self.rtl = r.state.direction == Direction::RightToLeft;
        self.halign = r.state.halign;
        self.hq = r.state.horz_quant;
        self.vq = r.state.vert_quant;

        let needs_total = target.is_some()
            && matches!(
                r.state.valign,
                VertAlign::VertCenter | VertAlign::LastBaseline | VertAlign::Bottom
            );
        let total = if needs_total {
            crate::pool::measure_twine_height(r, twine)?
        } else {
            Fract::ZERO
        };
        let baseline = resolve_baseline(r.state.valign, origin.y, &self.line, total, self.vq);
        self.origin = Point::new(origin.x, baseline);
        self.pen = self.origin;
        self.needs_line_measure = target.is_some()
            && !matches!(
                (self.halign, self.rtl),
                (HorzAlign::Left, false) | (HorzAlign::Right, true)
            );

        let buf = twine.data();
        let mut decoder = Decoder::new(buf);
        self.enter_line(r, &mut target, &mut decoder, buf)?;

        loop {
            if self.stopped {
                break;
            }
            let unit_start = decoder.pos();
            let unit_mode = decoder.glyph_mode();
            match decoder.next_unit().map_err(Error::from)? {
                RawUnit::End => {
                    if self.measuring && self.reset.is_some() {
                        // End of text closes the line; unwind and replay.
                        self.line_break_triggers(r, &mut target, buf)?;
                        self.end_segment(r, &mut target, &mut decoder, buf)?;
                        continue;
                    }
                    self.reset = None;
                    self.pop_all(r, &mut target, buf)?;
                    break;
                }
                RawUnit::Char('\n') => {
                    self.on_line_break(r, &mut target, &mut decoder, buf)?;
                }
                RawUnit::Char(c) => {
                    let glyph = r.resolve_char(c)?;
                    self.emit_unit(r, &mut target, glyph)?;
                }
                RawUnit::Glyph(glyph) => {
                    self.emit_unit(r, &mut target, glyph)?;
                }
                RawUnit::ControlOpen => {
                    self.dispatch_control(
                        r, &mut target, &mut decoder, buf, unit_start, unit_mode,
                    )?;
                }
            }
        }
        Ok(self.pen)
    }

    /// Height of `twine`: a pure measuring run
    ///
    /// Line breaks contribute one (quantized) baseline advance each; any
    /// glyph content additionally contributes the first line's height. An
    /// empty twine measures zero.
    pub fn measure_height(&mut self, r: &mut Renderer, twine: &Twine) -> Result<Fract, Error> {
        self.run(r, None, twine, Point::ZERO)?;
        let mut height = self.height;
        if self.any_glyph {
            height += self.first_line_height.quantize_up(self.vq);
        }
        Ok(height)
    }

    // --- unit handling ---

    fn emit_unit(
        &mut self,
        r: &mut Renderer,
        target: &mut Option<&mut dyn Target>,
        glyph: GlyphId,
    ) -> Result<(), Error> {
        self.any_glyph = true;
        if self.rtl {
            self.pen.x -= r.advance_of(glyph)?;
            if let Some(prev) = self.prev_glyph {
                self.pen.x -= r.kern_of(prev, glyph)?;
            }
            self.pen.x = self.pen.x.quantize_down(self.hq);
            if !self.measuring {
                if let Some(t) = target.as_deref_mut() {
                    r.emit_glyph(t, glyph, self.pen)?;
                }
            }
        } else {
            if let Some(prev) = self.prev_glyph {
                self.pen.x += r.kern_of(prev, glyph)?;
            }
            self.pen.x = self.pen.x.quantize_up(self.hq);
            if !self.measuring {
                if let Some(t) = target.as_deref_mut() {
                    r.emit_glyph(t, glyph, self.pen)?;
                }
            }
            self.pen.x += r.advance_of(glyph)?;
        }
        self.prev_glyph = Some(glyph);
        self.nth_break = 0;
        Ok(())
    }

    fn on_line_break(
        &mut self,
        r: &mut Renderer,
        target: &mut Option<&mut dyn Target>,
        decoder: &mut Decoder,
        buf: &[u8],
    ) -> Result<(), Error> {
        self.line_break_triggers(r, target, buf)?;
        if self.measuring && self.reset.is_some() {
            // A break truncates the measuring segment; the replay will
            // re-encounter this `\n` in drawing mode.
            self.end_segment(r, target, decoder, buf)?;
            return Ok(());
        }
        // A drawing replay that reaches its line end is complete.
        self.reset = None;

        if self.refresh_requested {
            self.line = r.vmetrics_now()?;
            self.refresh_requested = false;
        }
        let advance = self.line.line_height.quantize_up(self.vq);
        self.pen.y += advance;
        self.height += advance;
        self.nth_break += 1;
        self.prev_glyph = None;
        self.pen.x = self.restarts.last().copied().unwrap_or(self.origin.x);

        if let Some(t) = target.as_deref() {
            if self.pen.y - self.line.ascent > Fract::from(t.bounds().bottom) {
                self.pop_all(r, target, buf)?;
                self.stopped = true;
                return Ok(());
            }
        }
        self.enter_line(r, target, decoder, buf)
    }

    /// Line-start work: maybe open a measuring segment, then notify effects
    fn enter_line(
        &mut self,
        r: &mut Renderer,
        target: &mut Option<&mut dyn Target>,
        decoder: &mut Decoder,
        buf: &[u8],
    ) -> Result<(), Error> {
        if target.is_some() && !self.measuring && self.reset.is_none() {
            let align_measure = self.needs_line_measure && self.restarts.is_empty();
            if align_measure || self.double_active > 0 {
                self.begin_segment(
                    decoder.pos(),
                    decoder.glyph_mode(),
                    ResetKind::AtLineStart,
                    align_measure,
                );
            }
        }
        for index in self.effects.active_oldest_first() {
            let entry = self.effects.entry_mut(index);
            entry.origin = self.pen;
            if self.measuring {
                // This line's width is not captured yet.
                entry.width_known = false;
            }
            let adv = self.invoke(r, target, buf, index, EffectTrigger::LineStart)?;
            self.apply_advance(adv);
        }
        Ok(())
    }

    // --- control directives ---

    #[allow(clippy::too_many_arguments)]
    fn dispatch_control(
        &mut self,
        r: &mut Renderer,
        target: &mut Option<&mut dyn Target>,
        decoder: &mut Decoder,
        buf: &[u8],
        unit_start: usize,
        unit_mode: bool,
    ) -> Result<(), Error> {
        let code = decoder.read_u8().map_err(Error::from)?;
        match code {
            CC_STRING_MODE => decoder.set_glyph_mode(false),
            CC_GLYPH_MODE => decoder.set_glyph_mode(true),
            CC_POP => {
                if self.on_pop(r, target, buf)? {
                    self.end_segment(r, target, decoder, buf)?;
                }
            }
            CC_POP_ALL => {
                while self.effects.head().is_some() {
                    if self.on_pop(r, target, buf)? {
                        // The restore rewinds before this directive; the
                        // replay re-executes the remaining pops.
                        self.end_segment(r, target, decoder, buf)?;
                        break;
                    }
                }
            }
            CC_STOP_MOTION => {
                self.motions.pop();
            }
            CC_REFRESH_LINE_METRICS => self.refresh_requested = true,
            CC_PUSH_SINGLE => self.on_push(
                r, target, decoder, buf, unit_start, unit_mode,
                EffectMode::SinglePass, false,
            )?,
            CC_PUSH_DOUBLE => self.on_push(
                r, target, decoder, buf, unit_start, unit_mode,
                EffectMode::DoublePass, false,
            )?,
            CC_PUSH_SPACED => self.on_push(
                r, target, decoder, buf, unit_start, unit_mode,
                EffectMode::SinglePass, true,
            )?,
            CC_PUSH_MOTION => {
                let key = decoder.read_u8().map_err(Error::from)?;
                let (start, len) = decoder.read_payload().map_err(Error::from)?;
                self.motions.push((key, start, len));
            }
            CC_PUSH_LINE_RESTART => self.restarts.push(self.pen.x),
            CC_POP_LINE_RESTART => {
                self.restarts
                    .pop()
                    .ok_or(TwineError::UnbalancedLineRestart)?;
            }
            code => return Err(TwineError::UnknownControlCode(code).into()),
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn on_push(
        &mut self,
        r: &mut Renderer,
        target: &mut Option<&mut dyn Target>,
        decoder: &mut Decoder,
        buf: &[u8],
        unit_start: usize,
        unit_mode: bool,
        mode_hint: EffectMode,
        spaced: bool,
    ) -> Result<(), Error> {
        let key = decoder.read_u8().map_err(Error::from)?;
        let (mode, pre_pad, post_pad) = if spaced {
            let flags = decoder.read_u8().map_err(Error::from)?;
            let pre = Fract::from_bits(decoder.read_i32_le().map_err(Error::from)?);
            let post = Fract::from_bits(decoder.read_i32_le().map_err(Error::from)?);
            let mode = if flags & 1 != 0 {
                EffectMode::DoublePass
            } else {
                EffectMode::SinglePass
            };
            (mode, pre, post)
        } else {
            (mode_hint, Fract::ZERO, Fract::ZERO)
        };
        let (payload_start, payload_len) = decoder.read_payload().map_err(Error::from)?;

        // Drawing replay: the measuring pass already pushed this entry.
        if !self.measuring && self.reset.is_some() {
            if let Some(index) = self.effects.try_recall_next() {
                self.effects.entry_mut(index).origin = self.pen;
                if self.effects.entry(index).mode == EffectMode::DoublePass {
                    self.double_active += 1;
                }
                let adv = self.invoke(r, target, buf, index, EffectTrigger::Push)?;
                self.apply_advance(adv + pre_pad);
                return Ok(());
            }
            debug_assert!(false, "replayed push without a recallable entry");
        }

        if mode == EffectMode::DoublePass
            && !self.measuring
            && target.is_some()
            && self.reset.is_none()
        {
            // Switch to measuring the moment the effect is pushed; the
            // snapshot points at this directive so the replay re-pushes.
            self.begin_segment(unit_start, unit_mode, ResetKind::AtPush, false);
        }

        let entry = EffectEntry {
            key,
            mode,
            payload_start,
            payload_len,
            pre_pad,
            post_pad,
            origin: self.pen,
            known_width: Fract::ZERO,
            width_known: false,
            seq: self.next_seq,
        };
        self.next_seq += 1;
        let index = self.effects.push(entry);
        if mode == EffectMode::DoublePass {
            self.double_active += 1;
        }
        let adv = self.invoke(r, target, buf, index, EffectTrigger::Push)?;
        self.apply_advance(adv + pre_pad);
        Ok(())
    }

    /// Pop the active head; true means a measuring segment just closed
    fn on_pop(
        &mut self,
        r: &mut Renderer,
        target: &mut Option<&mut dyn Target>,
        buf: &[u8],
    ) -> Result<bool, Error> {
        let Some(index) = self.effects.head() else {
            return Err(TwineError::UnbalancedPop.into());
        };
        let post_pad = self.effects.entry(index).post_pad;
        let is_double = self.effects.entry(index).mode == EffectMode::DoublePass;
        let adv = self.invoke(r, target, buf, index, EffectTrigger::Pop)?;
        self.apply_advance(adv + post_pad);

        if self.measuring {
            self.effects.soft_pop();
            if is_double {
                self.double_active -= 1;
                if self.double_active == 0
                    && matches!(self.reset, Some(rst) if rst.kind == ResetKind::AtPush)
                {
                    return Ok(true);
                }
            }
        } else {
            self.effects.hard_pop();
            if is_double {
                self.double_active -= 1;
                if self.double_active == 0
                    && matches!(self.reset, Some(rst) if rst.kind == ResetKind::AtPush)
                {
                    // The replay of an at-push region is complete.
                    self.reset = None;
                }
            }
        }
        Ok(false)
    }

    fn pop_all(
        &mut self,
        r: &mut Renderer,
        target: &mut Option<&mut dyn Target>,
        buf: &[u8],
    ) -> Result<(), Error> {
        while let Some(index) = self.effects.head() {
            let post_pad = self.effects.entry(index).post_pad;
            let is_double = self.effects.entry(index).mode == EffectMode::DoublePass;
            let adv = self.invoke(r, target, buf, index, EffectTrigger::Pop)?;
            self.apply_advance(adv + post_pad);
            self.effects.hard_pop();
            if is_double {
                self.double_active -= 1;
            }
        }
        Ok(())
    }

    fn line_break_triggers(
        &mut self,
        r: &mut Renderer,
        target: &mut Option<&mut dyn Target>,
        buf: &[u8],
    ) -> Result<(), Error> {
        for index in self.effects.active_newest_first() {
            let adv = self.invoke(r, target, buf, index, EffectTrigger::LineBreak)?;
            self.apply_advance(adv);
        }
        Ok(())
    }

    // --- double-pass machinery ---

    fn begin_segment(&mut self, pos: usize, glyph_mode: bool, kind: ResetKind, measure_rel: bool) {
        self.reset = Some(Reset {
            pos,
            glyph_mode,
            pen: self.pen,
            prev_glyph: self.prev_glyph,
            nth_break: self.nth_break,
            restarts_len: self.restarts.len(),
            double_active: self.double_active,
            seq_watermark: self.next_seq,
            kind,
            measure_rel,
        });
        self.measuring = true;
        if measure_rel {
            self.pen.x = Fract::ZERO;
        }
    }

    /// Close the measuring segment: rewind and switch to drawing
    fn end_segment(
        &mut self,
        r: &mut Renderer,
        target: &mut Option<&mut dyn Target>,
        decoder: &mut Decoder,
        buf: &[u8],
    ) -> Result<(), Error> {
        let rst = self.reset.expect("end_segment without a segment");
        let line_width = self.pen.x.max(Fract::ZERO);

        // Entries pushed inside the segment await recall by the replayed
        // push directives; entries from before it return to the stack.
        self.effects.soft_pop_from(rst.seq_watermark);
        self.effects.recall_below(rst.seq_watermark);

        decoder.restore(rst.pos, rst.glyph_mode);
        self.pen = rst.pen;
        self.prev_glyph = rst.prev_glyph;
        self.nth_break = rst.nth_break;
        self.restarts.truncate(rst.restarts_len);
        self.double_active = rst.double_active;
        self.measuring = false;

        if rst.measure_rel {
            self.pen.x = self.line_start_x(line_width);
        }
        if rst.kind == ResetKind::AtLineStart {
            for index in self.effects.active_oldest_first() {
                self.effects.entry_mut(index).origin = self.pen;
                let adv = self.invoke(r, target, buf, index, EffectTrigger::LineStart)?;
                self.apply_advance(adv);
            }
        }
        Ok(())
    }

    // --- helpers ---

    fn line_start_x(&self, width: Fract) -> Fract {
        let x = match (self.halign, self.rtl) {
            (HorzAlign::Left, false) => self.origin.x,
            (HorzAlign::HorzCenter, false) => self.origin.x - width.half(),
            (HorzAlign::Right, false) => self.origin.x - width,
            (HorzAlign::Right, true) => self.origin.x,
            (HorzAlign::HorzCenter, true) => self.origin.x + width.half(),
            (HorzAlign::Left, true) => self.origin.x + width,
        };
        if self.rtl {
            x.quantize_down(self.hq)
        } else {
            x.quantize_up(self.hq)
        }
    }

    fn width_from(&self, origin: Point) -> Fract {
        if self.rtl {
            origin.x - self.pen.x
        } else {
            self.pen.x - origin.x
        }
    }

    fn apply_advance(&mut self, adv: Fract) {
        if adv == Fract::ZERO {
            return;
        }
        if self.rtl {
            self.pen.x -= adv;
        } else {
            self.pen.x += adv;
        }
        // A non-zero advance separates the surrounding glyphs.
        self.prev_glyph = None;
    }

    fn invoke(
        &mut self,
        r: &mut Renderer,
        target: &mut Option<&mut dyn Target>,
        buf: &[u8],
        index: u32,
        trigger: EffectTrigger,
    ) -> Result<Fract, Error> {
        let entry = *self.effects.entry(index);
        let mut flags = EffectFlags::empty();
        if self.measuring {
            flags |= EffectFlags::MEASURING;
        }
        if self.rtl {
            flags |= EffectFlags::RTL;
        }
        let mut known_width = Fract::ZERO;
        match trigger {
            EffectTrigger::Pop | EffectTrigger::LineBreak => {
                known_width = self.width_from(entry.origin);
                flags |= EffectFlags::WIDTH_KNOWN;
                let e = self.effects.entry_mut(index);
                e.known_width = known_width;
                e.width_known = true;
            }
            EffectTrigger::Push | EffectTrigger::LineStart => {
                // Only double-pass effects carry a pre-measured width into
                // their drawing-pass Push/LineStart.
                if entry.mode == EffectMode::DoublePass && entry.width_known {
                    known_width = entry.known_width;
                    flags |= EffectFlags::WIDTH_KNOWN;
                }
            }
        }

        let start = entry.payload_start as usize;
        let payload = &buf[start..start + usize::from(entry.payload_len)];
        let call = EffectCall {
            key: entry.key,
            mode: entry.mode,
            trigger,
            flags,
            payload,
            origin: entry.origin,
            ascent: self.line.ascent,
            descent: self.line.descent,
            known_width,
            pre_pad: entry.pre_pad,
            post_pad: entry.post_pad,
        };
        let f = r.effect_fn(entry.key).map_err(Error::from)?;
        let target: Option<&mut dyn Target> = if self.measuring {
            None
        } else {
            match target {
                Some(t) => Some(&mut **t),
                None => None,
            }
        };
        f(r, target, &call).map_err(Error::from)
    }
}
