// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::f64::consts::{FRAC_PI_2, PI};

use approx::assert_abs_diff_eq;

use super::*;

#[test]
fn test_cexp() {
    assert_abs_diff_eq!(cexp(PI), c64::new(-1.0, 0.0), epsilon = 1e-15);
    assert_abs_diff_eq!(cexp(FRAC_PI_2), c64::new(0.0, 1.0), epsilon = 1e-15);
    assert_abs_diff_eq!(cexp(0.0), c64::new(1.0, 0.0));
}

#[test]
fn test_cross_baselines() {
    assert!(cross_baselines(0).is_empty());
    assert!(cross_baselines(1).is_empty());

    let baselines = cross_baselines(4);
    assert_eq!(baselines.len(), 6);
    assert_eq!(baselines[0], (0, 1));
    assert_eq!(baselines[2], (0, 3));
    assert_eq!(baselines[3], (1, 2));
    assert_eq!(baselines[5], (2, 3));
}
