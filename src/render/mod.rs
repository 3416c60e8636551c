// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License in the LICENSE-APACHE file or at:
//     https://www.apache.org/licenses/LICENSE-2.0

//! The renderer: configuration owner and drawing orchestrator
//!
//! A [`Renderer`] owns the full text-rendering configuration (font, size,
//! alignment, quantization, blend mode, the attached sizer/rasterizer/cache)
//! and orchestrates the positioning engine, the glyph cache and the
//! rasterizer on each draw call. Renderers are single-threaded; several may
//! share one underlying glyph cache through per-renderer handles.
//!
//! Configuration setters notify the attached collaborators synchronously,
//! before returning: the cache handle re-mixes its fingerprint base and the
//! sizer drops its metric memo within the same call, so the next glyph
//! always sees a consistent view.

mod draw;
mod twine_api;

pub use draw::GlyphDrawFn;

use crate::cache::CacheHandle;
use crate::data::{Blend, Color, Direction, HorzAlign, QuantStep, VertAlign};
use crate::error::UsageError;
use crate::font::{font_identity, Font};
use crate::fract::Fract;
use crate::raster::Rasterizer;
use crate::sizer::{DefaultSizer, Sizer};
use crate::twine::{builtin_effect_fn, EffectFn, MotionFn, BUILTIN_KEY_BASE, MAX_USER_KEY};
use smallvec::SmallVec;
use std::cell::RefCell;
use std::rc::Rc;

/// Largest accepted logical text size (pixels per em)
pub const MAX_SIZE: Fract = Fract::from_bits(1024 << 6);

/// Largest accepted scale factor
pub const MAX_SCALE: Fract = Fract::from_bits(256 << 6);

/// Highest valid font-table index
pub const MAX_FONT_INDEX: u8 = 254;

/// The restorable subset of renderer configuration
///
/// Stored by value on the push/pop stack. Collaborator fields hold
/// identities (shared references), not deep copies: restoring a state
/// restores *which* sizer/rasterizer is active.
#[derive(Clone)]
pub(crate) struct State {
    pub font: Option<Rc<dyn Font>>,
    pub color: Color,
    pub size: Fract,
    pub scale: Fract,
    pub scaled_size: Fract,
    pub halign: HorzAlign,
    pub valign: VertAlign,
    pub direction: Direction,
    pub horz_quant: QuantStep,
    pub vert_quant: QuantStep,
    pub blend: Blend,
    pub rasterizer: Option<Rc<RefCell<dyn Rasterizer>>>,
    pub sizer: Rc<RefCell<dyn Sizer>>,
    pub font_index: u8,
}

impl Default for State {
    fn default() -> Self {
        State {
            font: None,
            color: Color::WHITE,
            size: Fract::from(16),
            scale: Fract::ONE,
            scaled_size: Fract::from(16),
            halign: HorzAlign::Left,
            valign: VertAlign::Baseline,
            direction: Direction::LeftToRight,
            horz_quant: QuantStep::FULL,
            vert_quant: QuantStep::FULL,
            blend: Blend::Over,
            rasterizer: None,
            sizer: Rc::new(RefCell::new(DefaultSizer::new())),
            font_index: 0,
        }
    }
}

/// Vector-font text renderer
///
/// Construct with [`Renderer::new`], then configure font, size and (for
/// drawing) a rasterizer and optionally a cache. See the crate docs for an
/// overview of the drawing pipeline.
pub struct Renderer {
    pub(crate) state: State,
    state_stack: SmallVec<[State; 2]>,
    fonts: Vec<Option<Rc<dyn Font>>>,
    pub(crate) cache: Option<CacheHandle>,
    effect_fns: Vec<Option<EffectFn>>,
    motion_fns: Vec<Option<MotionFn>>,
    pub(crate) glyph_draw_override: Option<GlyphDrawFn>,
    stash: Vec<u64>,
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer {
    /// Construct with default configuration
    ///
    /// Defaults: no font, white, 16 px, scale 1, left/baseline alignment,
    /// left-to-right, whole-pixel quantization, `Over` blending, the
    /// [`DefaultSizer`], no rasterizer, no cache.
    pub fn new() -> Self {
        Renderer {
            state: State::default(),
            state_stack: SmallVec::new(),
            fonts: Vec::new(),
            cache: None,
            effect_fns: Vec::new(),
            motion_fns: Vec::new(),
            glyph_draw_override: None,
            stash: Vec::new(),
        }
    }

    // --- fonts ---

    /// Set the active font, storing it at the active font-table index
    pub fn set_font(&mut self, font: Option<Rc<dyn Font>>) {
        let index = usize::from(self.state.font_index);
        if self.fonts.len() <= index {
            self.fonts.resize(index + 1, None);
        }
        self.fonts[index] = font.clone();
        self.state.font = font;
        self.notify_font();
    }

    /// The active font
    pub fn font(&self) -> Option<&Rc<dyn Font>> {
        self.state.font.as_ref()
    }

    /// Store a font in the first free table slot, returning its index
    pub fn add_font(&mut self, font: Rc<dyn Font>) -> Result<u8, UsageError> {
        if let Some(i) = self.fonts.iter().position(|slot| slot.is_none()) {
            self.fonts[i] = Some(font);
            return Ok(i as u8);
        }
        let index = self.fonts.len();
        if index > usize::from(MAX_FONT_INDEX) {
            return Err(UsageError::TooManyFonts);
        }
        self.fonts.push(Some(font));
        Ok(index as u8)
    }

    /// Store or clear a specific font-table slot
    pub fn set_font_slot(&mut self, index: u8, font: Option<Rc<dyn Font>>) {
        let i = usize::from(index);
        if self.fonts.len() <= i {
            self.fonts.resize(i + 1, None);
        }
        self.fonts[i] = font.clone();
        if index == self.state.font_index {
            self.state.font = font;
            self.notify_font();
        }
    }

    /// Read a font-table slot
    pub fn font_slot(&self, index: u8) -> Option<&Rc<dyn Font>> {
        self.fonts.get(usize::from(index)).and_then(|f| f.as_ref())
    }

    /// Switch the active font by table index
    pub fn set_font_index(&mut self, index: u8) -> Result<(), UsageError> {
        let font = self
            .font_slot(index)
            .cloned()
            .ok_or(UsageError::BadFontIndex(index))?;
        self.state.font_index = index;
        self.state.font = Some(font);
        self.notify_font();
        Ok(())
    }

    /// The active font-table index
    pub fn font_index(&self) -> u8 {
        self.state.font_index
    }

    // --- size and scale ---

    /// Set the logical text size, in fractional pixels per em
    pub fn set_size(&mut self, size: Fract) -> Result<(), UsageError> {
        if size <= Fract::ZERO || size > MAX_SIZE {
            return Err(UsageError::SizeOutOfRange);
        }
        self.state.size = size;
        self.refresh_scaled_size();
        Ok(())
    }

    /// The logical text size
    pub fn size(&self) -> Fract {
        self.state.size
    }

    /// Set the scale factor applied to the logical size
    pub fn set_scale(&mut self, scale: Fract) -> Result<(), UsageError> {
        if scale < Fract::ZERO || scale > MAX_SCALE {
            return Err(UsageError::InvalidScale);
        }
        self.state.scale = scale;
        self.refresh_scaled_size();
        Ok(())
    }

    /// The scale factor
    pub fn scale(&self) -> Fract {
        self.state.scale
    }

    /// The effective drawing size: logical size × scale
    pub fn scaled_size(&self) -> Fract {
        self.state.scaled_size
    }

    fn refresh_scaled_size(&mut self) {
        let scaled = self.state.size * self.state.scale;
        if scaled != self.state.scaled_size {
            self.state.scaled_size = scaled;
            self.notify_size();
        }
    }

    // --- simple configuration ---

    pub fn set_color(&mut self, color: Color) {
        self.state.color = color;
    }

    pub fn color(&self) -> Color {
        self.state.color
    }

    pub fn set_align(&mut self, halign: HorzAlign, valign: VertAlign) {
        self.state.halign = halign;
        self.state.valign = valign;
    }

    pub fn align(&self) -> (HorzAlign, VertAlign) {
        (self.state.halign, self.state.valign)
    }

    pub fn set_direction(&mut self, direction: Direction) {
        self.state.direction = direction;
    }

    pub fn direction(&self) -> Direction {
        self.state.direction
    }

    pub fn set_blend(&mut self, blend: Blend) {
        self.state.blend = blend;
    }

    pub fn blend(&self) -> Blend {
        self.state.blend
    }

    /// Set horizontal and vertical quantization steps
    pub fn set_quantization(&mut self, horz: QuantStep, vert: QuantStep) {
        self.state.horz_quant = horz;
        self.state.vert_quant = vert;
    }

    pub fn quantization(&self) -> (QuantStep, QuantStep) {
        (self.state.horz_quant, self.state.vert_quant)
    }

    // --- collaborators ---

    /// Attach a sizer, replacing the current one
    pub fn set_sizer(&mut self, sizer: Rc<RefCell<dyn Sizer>>) {
        self.state.sizer = sizer;
        let sizer = self.state.sizer.clone();
        sizer
            .borrow_mut()
            .notify_change(self.state.font.as_deref(), self.state.scaled_size);
    }

    /// The attached sizer
    pub fn sizer(&self) -> &Rc<RefCell<dyn Sizer>> {
        &self.state.sizer
    }

    /// Attach or detach the rasterizer
    ///
    /// Rewires the change observer: the previous rasterizer (if any) loses
    /// its observer, the new one gains the cache handle's observer, and the
    /// handle re-digests the new configuration, all within this call.
    pub fn set_rasterizer(&mut self, rasterizer: Option<Rc<RefCell<dyn Rasterizer>>>) {
        if let Some(old) = &self.state.rasterizer {
            old.borrow_mut().set_change_observer(None);
        }
        self.state.rasterizer = rasterizer;
        self.install_observer();
        self.notify_rasterizer();
    }

    /// The attached rasterizer
    pub fn rasterizer(&self) -> Option<&Rc<RefCell<dyn Rasterizer>>> {
        self.state.rasterizer.as_ref()
    }

    /// Attach or detach a cache handle
    ///
    /// The handle is seeded with the current font, size and rasterizer
    /// configuration and, if a rasterizer is attached, becomes its change
    /// observer.
    pub fn set_cache(&mut self, cache: Option<CacheHandle>) {
        if cache.is_none() {
            if let Some(rast) = &self.state.rasterizer {
                rast.borrow_mut().set_change_observer(None);
            }
        }
        self.cache = cache;
        if let Some(handle) = &mut self.cache {
            let id = self.state.font.as_ref().map(font_identity).unwrap_or(0);
            handle.notify_font_change(id);
            handle.notify_size_change(self.state.scaled_size);
            let sig = self
                .state
                .rasterizer
                .as_ref()
                .map(|r| r.borrow().signature())
                .unwrap_or(0);
            handle.notify_rasterizer_change(sig);
        }
        self.install_observer();
    }

    /// Attach a handle into the shared process-wide cache
    pub fn use_shared_cache(&mut self) {
        self.set_cache(Some(CacheHandle::shared()));
    }

    /// The attached cache handle
    pub fn cache_handle(&self) -> Option<&CacheHandle> {
        self.cache.as_ref()
    }

    fn install_observer(&mut self) {
        if let (Some(rast), Some(cache)) = (&self.state.rasterizer, &self.cache) {
            rast.borrow_mut().set_change_observer(Some(cache.observer()));
        }
    }

    // --- save/restore ---

    /// Save the restorable configuration
    pub fn push_state(&mut self) {
        self.state_stack.push(self.state.clone());
    }

    /// Restore the most recently saved configuration
    ///
    /// Returns false if the stack was empty. Collaborator notifications are
    /// batched: each observer is told about the net change once, after the
    /// whole state value is back in place.
    pub fn pop_state(&mut self) -> bool {
        let Some(prev) = self.state_stack.pop() else {
            return false;
        };

        let font_changed = !opt_rc_eq(
            self.state.font.as_ref().map(|f| Rc::as_ptr(f) as *const u8),
            prev.font.as_ref().map(|f| Rc::as_ptr(f) as *const u8),
        );
        let size_changed = self.state.scaled_size != prev.scaled_size;
        let rast_changed = !opt_rc_eq(
            self.state
                .rasterizer
                .as_ref()
                .map(|r| Rc::as_ptr(r) as *const u8),
            prev.rasterizer
                .as_ref()
                .map(|r| Rc::as_ptr(r) as *const u8),
        );

        if rast_changed {
            if let Some(old) = &self.state.rasterizer {
                old.borrow_mut().set_change_observer(None);
            }
        }
        self.state = prev;
        if font_changed {
            self.notify_font();
        }
        if size_changed {
            self.notify_size();
        }
        if rast_changed {
            self.install_observer();
            self.notify_rasterizer();
        }
        true
    }

    // --- effect and motion registries ---

    /// Register a user effect function under `key` (0–192)
    pub fn register_effect_fn(&mut self, key: u8, f: EffectFn) -> Result<(), UsageError> {
        if key > MAX_USER_KEY {
            return Err(UsageError::EffectKeyRange(key));
        }
        let i = usize::from(key);
        if self.effect_fns.len() <= i {
            self.effect_fns.resize(i + 1, None);
        }
        self.effect_fns[i] = Some(f);
        Ok(())
    }

    /// Register a user motion function under `key` (0–192)
    ///
    /// Motion directives are decoded and tracked by the twine interpreter
    /// but the drawing-time hook is not yet invoked; registration exists so
    /// twines referencing motions validate.
    pub fn register_motion_fn(&mut self, key: u8, f: MotionFn) -> Result<(), UsageError> {
        if key > MAX_USER_KEY {
            return Err(UsageError::EffectKeyRange(key));
        }
        let i = usize::from(key);
        if self.motion_fns.len() <= i {
            self.motion_fns.resize(i + 1, None);
        }
        self.motion_fns[i] = Some(f);
        Ok(())
    }

    pub(crate) fn effect_fn(&self, key: u8) -> Result<EffectFn, UsageError> {
        if key >= BUILTIN_KEY_BASE {
            return builtin_effect_fn(key).ok_or(UsageError::UnregisteredEffect(key));
        }
        self.effect_fns
            .get(usize::from(key))
            .copied()
            .flatten()
            .ok_or(UsageError::UnregisteredEffect(key))
    }

    /// Replace the glyph-drawing primitive
    ///
    /// When set, the override is called instead of [`crate::Target::blit`]
    /// for every positioned glyph mask.
    pub fn set_glyph_draw_override(&mut self, f: Option<GlyphDrawFn>) {
        self.glyph_draw_override = f;
    }

    // --- stash stack (used by built-in effects) ---

    pub(crate) fn stash_push(&mut self, value: u64) {
        self.stash.push(value);
    }

    pub(crate) fn stash_pop(&mut self) -> Result<u64, UsageError> {
        self.stash.pop().ok_or(UsageError::StashUnderflow)
    }

    // --- internal notification fan-out ---

    fn notify_font(&mut self) {
        let id = self.state.font.as_ref().map(font_identity).unwrap_or(0);
        if let Some(handle) = &mut self.cache {
            handle.notify_font_change(id);
        }
        let sizer = self.state.sizer.clone();
        sizer
            .borrow_mut()
            .notify_change(self.state.font.as_deref(), self.state.scaled_size);
    }

    fn notify_size(&mut self) {
        if let Some(handle) = &mut self.cache {
            handle.notify_size_change(self.state.scaled_size);
        }
        let sizer = self.state.sizer.clone();
        sizer
            .borrow_mut()
            .notify_change(self.state.font.as_deref(), self.state.scaled_size);
    }

    fn notify_rasterizer(&mut self) {
        if let Some(handle) = &mut self.cache {
            let sig = self
                .state
                .rasterizer
                .as_ref()
                .map(|r| r.borrow().signature())
                .unwrap_or(0);
            handle.notify_rasterizer_change(sig);
        }
    }
}

fn opt_rc_eq(a: Option<*const u8>, b: Option<*const u8>) -> bool {
    a == b
}
