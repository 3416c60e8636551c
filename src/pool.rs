// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License in the LICENSE-APACHE file or at:
//     https://www.apache.org/licenses/LICENSE-2.0

//! Transient scratch pools
//!
//! Two process-global, single-slot pools of reusable interpreter scratch:
//! one for drawing runs, one for height-measuring runs (height measurement
//! may happen in the middle of a drawing run, so the slots are separate).
//! Claiming is a non-blocking attempt; on contention a fresh allocation is
//! used instead. A slot takes an instance back only while it is empty.

use crate::error::Error;
use crate::fract::{Fract, Point};
use crate::render::Renderer;
use crate::target::Target;
use crate::twine::operator::Operator;
use crate::twine::Twine;
use std::sync::Mutex;

static DRAW_SLOT: Mutex<Option<Box<Operator>>> = Mutex::new(None);
static MEASURE_SLOT: Mutex<Option<Box<Operator>>> = Mutex::new(None);

fn acquire(slot: &Mutex<Option<Box<Operator>>>) -> Box<Operator> {
    slot.try_lock()
        .ok()
        .and_then(|mut guard| guard.take())
        .unwrap_or_default()
}

fn release(slot: &Mutex<Option<Box<Operator>>>, op: Box<Operator>) {
    if let Ok(mut guard) = slot.try_lock() {
        if guard.is_none() {
            *guard = Some(op);
        }
    }
}

/// Draw a twine using pooled interpreter scratch
pub(crate) fn draw_twine(
    r: &mut Renderer,
    target: &mut dyn Target,
    twine: &Twine,
    origin: Point,
) -> Result<Point, Error> {
    let mut op = acquire(&DRAW_SLOT);
    let result = op.run(r, Some(target), twine, origin);
    release(&DRAW_SLOT, op);
    result
}

/// Measure a twine's height using pooled interpreter scratch
pub(crate) fn measure_twine_height(r: &mut Renderer, twine: &Twine) -> Result<Fract, Error> {
    let mut op = acquire(&MEASURE_SLOT);
    let result = op.measure_height(r, twine);
    release(&MEASURE_SLOT, op);
    result
}
