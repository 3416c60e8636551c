// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License in the LICENSE-APACHE file or at:
//     https://www.apache.org/licenses/LICENSE-2.0

//! Twine decoding
//!
//! A tagged iterator over twine bytes. Higher layers only ever see
//! [`RawUnit`] values, never raw bytes; in particular the glyph-mode
//! `{0x00, 0x00, escape}` sequence is resolved here.

use super::CTRL;
use crate::error::TwineError;
use crate::font::GlyphId;

/// One decoded element of a twine stream
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum RawUnit {
    /// A code point (string mode); `\n` arrives here too
    Char(char),
    /// A glyph index (glyph mode)
    Glyph(GlyphId),
    /// A control sequence begins; the code byte is read separately
    ControlOpen,
    /// End of the twine
    End,
}

/// Cursor over twine bytes
///
/// Position and mode are exposed so the interpreter can snapshot and rewind
/// for double-pass regions.
#[derive(Clone, Debug)]
pub(crate) struct Decoder<'a> {
    buf: &'a [u8],
    pos: usize,
    glyph_mode: bool,
}

impl<'a> Decoder<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Decoder {
            buf,
            pos: 0,
            glyph_mode: false,
        }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn glyph_mode(&self) -> bool {
        self.glyph_mode
    }

    pub fn set_glyph_mode(&mut self, glyph_mode: bool) {
        self.glyph_mode = glyph_mode;
    }

    /// Rewind to a snapshotted position
    pub fn restore(&mut self, pos: usize, glyph_mode: bool) {
        self.pos = pos;
        self.glyph_mode = glyph_mode;
    }

    /// Decode the next unit
    pub fn next_unit(&mut self) -> Result<RawUnit, TwineError> {
        if self.pos >= self.buf.len() {
            return Ok(RawUnit::End);
        }
        if self.glyph_mode {
            self.next_glyph()
        } else {
            self.next_char()
        }
    }

    fn next_glyph(&mut self) -> Result<RawUnit, TwineError> {
        let lo = self.read_u8()?;
        let hi = self.read_u8()?;
        if lo == 0 && hi == 0 {
            return match self.read_u8()? {
                0x00 => Ok(RawUnit::Glyph(GlyphId::NOTDEF)),
                CTRL => Ok(RawUnit::ControlOpen),
                byte => Err(TwineError::BadGlyphEscape(byte)),
            };
        }
        Ok(RawUnit::Glyph(GlyphId(u16::from_le_bytes([lo, hi]))))
    }

    fn next_char(&mut self) -> Result<RawUnit, TwineError> {
        let first = self.buf[self.pos];
        if first == CTRL {
            self.pos += 1;
            return Ok(RawUnit::ControlOpen);
        }
        let len = match first {
            0x00..=0x7F => 1,
            0xC0..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF7 => 4,
            _ => return Err(TwineError::InvalidUtf8),
        };
        if self.pos + len > self.buf.len() {
            return Err(TwineError::TruncatedStream);
        }
        let slice = &self.buf[self.pos..self.pos + len];
        let c = std::str::from_utf8(slice)
            .map_err(|_| TwineError::InvalidUtf8)?
            .chars()
            .next()
            .ok_or(TwineError::InvalidUtf8)?;
        self.pos += len;
        Ok(RawUnit::Char(c))
    }

    pub fn read_u8(&mut self) -> Result<u8, TwineError> {
        let byte = *self.buf.get(self.pos).ok_or(TwineError::TruncatedStream)?;
        self.pos += 1;
        Ok(byte)
    }

    pub fn read_i32_le(&mut self) -> Result<i32, TwineError> {
        if self.pos + 4 > self.buf.len() {
            return Err(TwineError::TruncatedStream);
        }
        let bytes = [
            self.buf[self.pos],
            self.buf[self.pos + 1],
            self.buf[self.pos + 2],
            self.buf[self.pos + 3],
        ];
        self.pos += 4;
        Ok(i32::from_le_bytes(bytes))
    }

    /// Read a length-prefixed payload, returning its (offset, length)
    pub fn read_payload(&mut self) -> Result<(u32, u8), TwineError> {
        let len = self.read_u8()?;
        let start = self.pos;
        if start + usize::from(len) > self.buf.len() {
            return Err(TwineError::TruncatedStream);
        }
        self.pos += usize::from(len);
        Ok((start as u32, len))
    }
}
