// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Some helper mathematics.

#[cfg(test)]
mod tests;

use crate::c64;

/// Complex exponential. The argument is assumed to be purely imaginary.
///
/// This function doesn't actually use complex numbers; it just returns the real
/// and imag components from Euler's formula (i.e. e^{ix} = cos{x} + i sin{x}).
///
/// # Examples
///
/// `assert_abs_diff_eq!(cexp(PI), c64::new(-1.0, 0.0));`
#[inline]
pub(crate) fn cexp(x: f64) -> c64 {
    let (im, re) = x.sin_cos();
    c64::new(re, im)
}

/// Every cross-correlation baseline of `num_antennas` antennas, in the usual
/// order: (0, 1), (0, 2), ..., (1, 2), ...
pub(crate) fn cross_baselines(num_antennas: usize) -> Vec<(usize, usize)> {
    let mut baselines = Vec::with_capacity(num_antennas * num_antennas.saturating_sub(1) / 2);
    for ant1 in 0..num_antennas {
        for ant2 in ant1 + 1..num_antennas {
            baselines.push((ant1, ant2));
        }
    }
    baselines
}
