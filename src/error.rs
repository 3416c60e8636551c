// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License in the LICENSE-APACHE file or at:
//     https://www.apache.org/licenses/LICENSE-2.0

//! Error types
//!
//! Two kinds of fatal errors exist: [`UsageError`] for caller mistakes
//! (misconfigured renderer, invalid arguments) and [`TwineError`] for
//! malformed twine data. Neither is recoverable: both indicate a bug in the
//! calling program or in whatever produced the twine bytes.
//!
//! Resource errors (font parsing) are the loader's concern and surface as
//! [`ttf_parser::FaceParsingError`] from [`crate::sfnt::SfntFont::parse`].

use thiserror::Error;

/// A fatal caller mistake
///
/// Drawing is pure: none of these indicate a transient condition, so there
/// is no point retrying the call that produced one.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum UsageError {
    #[error("no font is set")]
    NullFont,
    #[error("no sizer is set")]
    NullSizer,
    #[error("no rasterizer is set")]
    NullRasterizer,
    #[error("quantization step {0} is not a power-of-two divisor of 64")]
    InvalidQuantStep(i32),
    #[error("scale must be non-negative")]
    InvalidScale,
    #[error("text size out of range")]
    SizeOutOfRange,
    #[error("fonts table is full (at most 255 slots)")]
    TooManyFonts,
    #[error("font index {0} has no font")]
    BadFontIndex(u8),
    #[error("effect key {0} outside the registrable range 0..=192")]
    EffectKeyRange(u8),
    #[error("effect key {0} is not registered")]
    UnregisteredEffect(u8),
    #[error("effect payload exceeds 255 bytes")]
    PayloadTooLong,
    #[error("effect invoked with the wrong pass mode")]
    EffectModeMismatch,
    #[error("rasterizer lacks the faux (skew/extra-width) capability")]
    MissingFauxCapability,
    #[error("effect stash stack underflow")]
    StashUnderflow,
}

/// Either error kind, returned by operations that consume twines
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    #[error(transparent)]
    Usage(#[from] UsageError),
    #[error(transparent)]
    Twine(#[from] TwineError),
}

/// Malformed twine data
///
/// Raised by the call that consumes the bad bytes; indicates a bug in the
/// producer of the twine, not in the renderer.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum TwineError {
    #[error("twine ends inside a multi-byte sequence")]
    TruncatedStream,
    #[error("unknown control code {0:#04x}")]
    UnknownControlCode(u8),
    #[error("invalid glyph escape byte {0:#04x}")]
    BadGlyphEscape(u8),
    #[error("invalid UTF-8 in string mode")]
    InvalidUtf8,
    #[error("pop directive without a matching push")]
    UnbalancedPop,
    #[error("line-restart pop without a matching push")]
    UnbalancedLineRestart,
}
