// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License in the LICENSE-APACHE file or at:
//     https://www.apache.org/licenses/LICENSE-2.0

//! Font-unit conversion

use crate::fract::Fract;

/// Scale factor: 26.6 pixels per font unit
///
/// Font metric tables store values in integer *font units*; a face declares
/// how many font units make one em. This type scales font units to [`Fract`]
/// pixels for a given scaled text size (pixels per em), rounding each result
/// to the nearest 64th.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Fpu {
    size_bits: i64,
    upem: i64,
}

impl Fpu {
    pub fn new(scaled_size: Fract, units_per_em: u16) -> Self {
        Fpu {
            size_bits: i64::from(scaled_size.to_bits()),
            upem: i64::from(units_per_em.max(1)),
        }
    }

    fn scale(self, units: i64) -> Fract {
        let n = units * self.size_bits;
        // Round to nearest; div_euclid keeps the behavior stable for
        // negative metrics such as descenders.
        Fract::from_bits((2 * n + self.upem).div_euclid(2 * self.upem) as i32)
    }

    #[inline]
    pub fn i16_to_px(self, x: i16) -> Fract {
        self.scale(i64::from(x))
    }

    #[inline]
    pub fn u16_to_px(self, x: u16) -> Fract {
        self.scale(i64::from(x))
    }
}
