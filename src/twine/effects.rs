// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License in the LICENSE-APACHE file or at:
//     https://www.apache.org/licenses/LICENSE-2.0

//! Built-in effects (keys 193–254)
//!
//! Stateful built-ins follow the bracketing contract: apply their change at
//! Push and LineStart, undo it at LineBreak and Pop, using the renderer's
//! stash stack for prior values. This symmetry is what keeps measuring
//! passes side-effect free.

use super::{
    EffectCall, EffectFn, EffectMode, EffectTrigger, KEY_COLOR, KEY_FAUX_BOLD, KEY_FONT_INDEX,
    KEY_OBLIQUE, KEY_SET_SIZE, KEY_SHIFT_SIZE, KEY_STRIKETHROUGH, KEY_UNDERLINE,
};
use crate::conv::Fpu;
use crate::data::Color;
use crate::error::UsageError;
use crate::fract::Fract;
use crate::raster::GlyphMask;
use crate::render::Renderer;
use crate::target::Target;

/// Resolve a built-in effect key
pub(crate) fn builtin_effect_fn(key: u8) -> Option<EffectFn> {
    match key {
        KEY_COLOR => Some(color_effect),
        KEY_FONT_INDEX => Some(font_index_effect),
        KEY_SHIFT_SIZE => Some(shift_size_effect),
        KEY_SET_SIZE => Some(set_size_effect),
        KEY_FAUX_BOLD => Some(faux_bold_effect),
        KEY_OBLIQUE => Some(oblique_effect),
        KEY_STRIKETHROUGH => Some(strikethrough_effect),
        KEY_UNDERLINE => Some(underline_effect),
        _ => None,
    }
}

fn check_push_mode(call: &EffectCall) -> Result<(), UsageError> {
    if call.trigger == EffectTrigger::Push && call.mode != EffectMode::SinglePass {
        return Err(UsageError::EffectModeMismatch);
    }
    Ok(())
}

fn color_effect(
    r: &mut Renderer,
    _target: Option<&mut dyn Target>,
    call: &EffectCall,
) -> Result<Fract, UsageError> {
    check_push_mode(call)?;
    match call.trigger {
        EffectTrigger::Push | EffectTrigger::LineStart => {
            r.stash_push(u64::from(r.color().to_bits()));
            if call.payload.len() >= 4 {
                let p = call.payload;
                r.set_color(Color::rgba(p[0], p[1], p[2], p[3]));
            }
        }
        EffectTrigger::LineBreak | EffectTrigger::Pop => {
            let bits = r.stash_pop()?;
            r.set_color(Color::from_bits(bits as u32));
        }
    }
    Ok(Fract::ZERO)
}

fn font_index_effect(
    r: &mut Renderer,
    _target: Option<&mut dyn Target>,
    call: &EffectCall,
) -> Result<Fract, UsageError> {
    check_push_mode(call)?;
    match call.trigger {
        EffectTrigger::Push | EffectTrigger::LineStart => {
            r.stash_push(u64::from(r.font_index()));
            let index = *call
                .payload
                .first()
                .ok_or(UsageError::BadFontIndex(u8::MAX))?;
            r.set_font_index(index)?;
        }
        EffectTrigger::LineBreak | EffectTrigger::Pop => {
            let index = r.stash_pop()? as u8;
            r.set_font_index(index)?;
        }
    }
    Ok(Fract::ZERO)
}

fn shift_size_effect(
    r: &mut Renderer,
    _target: Option<&mut dyn Target>,
    call: &EffectCall,
) -> Result<Fract, UsageError> {
    check_push_mode(call)?;
    match call.trigger {
        EffectTrigger::Push | EffectTrigger::LineStart => {
            r.stash_push(r.size().to_bits() as u32 as u64);
            let delta = Fract::from_bits(read_i32(call.payload));
            r.set_size(r.size() + delta)?;
        }
        EffectTrigger::LineBreak | EffectTrigger::Pop => {
            let bits = r.stash_pop()? as u32 as i32;
            r.set_size(Fract::from_bits(bits))?;
        }
    }
    Ok(Fract::ZERO)
}

fn set_size_effect(
    r: &mut Renderer,
    _target: Option<&mut dyn Target>,
    call: &EffectCall,
) -> Result<Fract, UsageError> {
    check_push_mode(call)?;
    match call.trigger {
        EffectTrigger::Push | EffectTrigger::LineStart => {
            r.stash_push(r.size().to_bits() as u32 as u64);
            r.set_size(Fract::from_bits(read_i32(call.payload)))?;
        }
        EffectTrigger::LineBreak | EffectTrigger::Pop => {
            let bits = r.stash_pop()? as u32 as i32;
            r.set_size(Fract::from_bits(bits))?;
        }
    }
    Ok(Fract::ZERO)
}

fn faux_bold_effect(
    r: &mut Renderer,
    _target: Option<&mut dyn Target>,
    call: &EffectCall,
) -> Result<Fract, UsageError> {
    check_push_mode(call)?;
    let rast = r
        .rasterizer()
        .cloned()
        .ok_or(UsageError::NullRasterizer)?;
    let mut rast = rast.borrow_mut();
    let faux = rast
        .as_faux_mut()
        .ok_or(UsageError::MissingFauxCapability)?;
    match call.trigger {
        EffectTrigger::Push | EffectTrigger::LineStart => {
            r.stash_push(faux.extra_width().to_bits() as u32 as u64);
            let extra = call.payload.first().copied().unwrap_or(0);
            faux.set_extra_width(Fract::from_bits(i32::from(extra)));
        }
        EffectTrigger::LineBreak | EffectTrigger::Pop => {
            let bits = r.stash_pop()? as u32 as i32;
            faux.set_extra_width(Fract::from_bits(bits));
        }
    }
    Ok(Fract::ZERO)
}

fn oblique_effect(
    r: &mut Renderer,
    _target: Option<&mut dyn Target>,
    call: &EffectCall,
) -> Result<Fract, UsageError> {
    check_push_mode(call)?;
    let rast = r
        .rasterizer()
        .cloned()
        .ok_or(UsageError::NullRasterizer)?;
    let mut rast = rast.borrow_mut();
    let faux = rast
        .as_faux_mut()
        .ok_or(UsageError::MissingFauxCapability)?;
    match call.trigger {
        EffectTrigger::Push | EffectTrigger::LineStart => {
            r.stash_push(faux.skew().to_bits() as u32 as u64);
            let skew = call.payload.first().copied().unwrap_or(0) as i8;
            faux.set_skew(Fract::from_bits(i32::from(skew)));
        }
        EffectTrigger::LineBreak | EffectTrigger::Pop => {
            let bits = r.stash_pop()? as u32 as i32;
            faux.set_skew(Fract::from_bits(bits));
        }
    }
    Ok(Fract::ZERO)
}

#[derive(Copy, Clone, PartialEq, Eq)]
enum RuleKind {
    Strike,
    Under,
}

fn strikethrough_effect(
    r: &mut Renderer,
    target: Option<&mut dyn Target>,
    call: &EffectCall,
) -> Result<Fract, UsageError> {
    rule_effect(r, target, call, RuleKind::Strike)
}

fn underline_effect(
    r: &mut Renderer,
    target: Option<&mut dyn Target>,
    call: &EffectCall,
) -> Result<Fract, UsageError> {
    rule_effect(r, target, call, RuleKind::Under)
}

/// Strike-through and underline share everything but the rule position
///
/// The rule is drawn when the bracket closes (Pop) or the line ends
/// (LineBreak), the two moments the fragment width is known, and never
/// during a measuring pass.
fn rule_effect(
    r: &mut Renderer,
    target: Option<&mut dyn Target>,
    call: &EffectCall,
    kind: RuleKind,
) -> Result<Fract, UsageError> {
    check_push_mode(call)?;
    let closing = matches!(
        call.trigger,
        EffectTrigger::Pop | EffectTrigger::LineBreak
    );
    if !closing || call.measuring() || !call.width_known() {
        return Ok(Fract::ZERO);
    }
    let Some(target) = target else {
        return Ok(Fract::ZERO);
    };
    let width = call.known_width;
    if width <= Fract::ZERO {
        return Ok(Fract::ZERO);
    }

    let font = r.font().cloned().ok_or(UsageError::NullFont)?;
    let size = r.scaled_size();
    let fpu = Fpu::new(size, font.units_per_em());
    let metrics = match kind {
        RuleKind::Strike => font.strikeout_metrics(),
        RuleKind::Under => font.underline_metrics(),
    };
    let (position, thickness) = match metrics {
        Some(m) => (fpu.i16_to_px(m.position), fpu.i16_to_px(m.thickness)),
        None => {
            let m = r.vmetrics_now()?;
            let position = match kind {
                RuleKind::Strike => m.x_height.half(),
                RuleKind::Under => -m.descent.half(),
            };
            (position, Fract::from_bits(size.to_bits() / 16))
        }
    };
    let thickness = thickness.max(Fract::ONE);

    let x0 = if call.flags.contains(super::EffectFlags::RTL) {
        call.origin.x - width
    } else {
        call.origin.x
    };
    let top = call.origin.y - position;
    let left = x0.floor_to_i32();
    let w = (x0 + width).ceil_to_i32() - left;
    let h = thickness.ceil_to_i32().max(1);
    if w <= 0 {
        return Ok(Fract::ZERO);
    }

    let color = if call.payload.len() >= 4 {
        let p = call.payload;
        Color::rgba(p[0], p[1], p[2], p[3])
    } else {
        r.color()
    };
    let mask = GlyphMask {
        size: (w as u32, h as u32),
        offset: (0, 0),
        data: vec![255; (w as usize) * (h as usize)],
    };
    target.blit(&mask, left, top.round_to_i32(), color, r.blend());
    Ok(Fract::ZERO)
}

fn read_i32(payload: &[u8]) -> i32 {
    if payload.len() >= 4 {
        i32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]])
    } else {
        0
    }
}
