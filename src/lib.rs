// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License in the LICENSE-APACHE file or at:
//     https://www.apache.org/licenses/LICENSE-2.0

//! Vector-font text rendering
//!
//! This library is the core of a text rendering engine: it takes a
//! configured font, a text size and a stream of content, and produces
//! positioned glyph masks on a raster target. Three subsystems carry the
//! weight:
//!
//! - the **positioning engine**: fractional pen positions, sub-pixel
//!   quantization, kerning, line advance and alignment-driven origins;
//! - the **glyph-mask cache**: a content-addressed, byte-bounded store of
//!   rendered masks shared between renderers;
//! - the **twine interpreter**: a binary rich-text format mixing code
//!   points, raw glyph indices and bracketed effects, including effects
//!   that need their fragment measured before it is drawn.
//!
//! The actual vector rasterizer, the font parser and the raster target are
//! pluggable collaborators behind small traits ([`Rasterizer`], [`Font`],
//! [`Target`]); default implementations are provided ([`sfnt::SfntFont`],
//! [`RasterTarget`], and, behind the `raster` feature, a coverage-based
//! rasterizer).
//!
//! ```no_run
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use twine_text::{Fract, RasterTarget, Renderer};
//!
//! # fn font() -> Rc<dyn twine_text::Font> { unimplemented!() }
//! # fn rasterizer() -> Rc<RefCell<dyn twine_text::Rasterizer>> { unimplemented!() }
//! let mut renderer = Renderer::new();
//! renderer.set_font(Some(font()));
//! renderer.set_rasterizer(Some(rasterizer()));
//! renderer.set_size(Fract::from(16)).unwrap();
//! renderer.use_shared_cache();
//!
//! let mut target = RasterTarget::new(256, 64);
//! renderer
//!     .draw(&mut target, "hello", Fract::from(8), Fract::from(32))
//!     .unwrap();
//! ```

pub(crate) mod conv;

mod data;
pub use data::*;

mod error;
pub use error::{Error, TwineError, UsageError};

mod fract;
pub use fract::{Fract, Point, Rect};

mod font;
pub use font::{Font, GlyphId};

pub mod sfnt;

mod sizer;
pub use sizer::{DefaultSizer, PadSizer, Sizer};

mod raster;
#[cfg(feature = "ab_glyph_rasterizer")]
pub use raster::CoverageRasterizer;
pub use raster::{ChangeObserver, FauxRasterizer, GlyphMask, Rasterizer};

mod target;
pub use target::{PixelRect, RasterTarget, Target};

mod cache;
pub use cache::{CacheHandle, EvictionPolicy, GlyphCache, LruPolicy, SHARED_CACHE_BYTES};

pub(crate) mod position;

mod render;
pub use render::{GlyphDrawFn, Renderer, MAX_FONT_INDEX, MAX_SCALE, MAX_SIZE};

mod twine;
pub use twine::{
    EffectCall, EffectFlags, EffectFn, EffectMode, EffectTrigger, MotionFn, Spacing, Twine,
    BUILTIN_KEY_BASE, KEY_COLOR, KEY_FAUX_BOLD, KEY_FONT_INDEX, KEY_OBLIQUE, KEY_SET_SIZE,
    KEY_SHIFT_SIZE, KEY_STRIKETHROUGH, KEY_UNDERLINE, MAX_USER_KEY,
};

pub(crate) mod pool;
