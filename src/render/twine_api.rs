// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License in the LICENSE-APACHE file or at:
//     https://www.apache.org/licenses/LICENSE-2.0

//! Twine drawing and measuring entry points

use super::Renderer;
use crate::error::Error;
use crate::fract::{Fract, Point};
use crate::pool;
use crate::target::Target;
use crate::twine::Twine;

/// Gateway: twine rich-text drawing
impl Renderer {
    /// Interpret and draw a twine with the baseline origin at `(x, y)`
    ///
    /// Effects bracketed in the twine are invoked along the way; double-pass
    /// effects trigger an internal measuring pass over their bracketed
    /// region before it is drawn. Returns the final pen position.
    pub fn draw_twine(
        &mut self,
        target: &mut dyn Target,
        twine: &Twine,
        x: Fract,
        y: Fract,
    ) -> Result<Point, Error> {
        pool::draw_twine(self, target, twine, Point::new(x, y))
    }

    /// The total height of a twine; zero when empty
    ///
    /// Runs a full measuring pass: effects that change the text size or
    /// request metric refreshes are honored, nothing is drawn, and renderer
    /// state is left as found.
    pub fn measure_twine_height(&mut self, twine: &Twine) -> Result<Fract, Error> {
        pool::measure_twine_height(self, twine)
    }
}
