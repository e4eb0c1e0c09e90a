// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Useful constants.
//!
//! All constants *must* be double precision.

/// Each half-step moves a gain this far from its old value towards the new
/// least-squares estimate.
pub const RELAXATION_FACTOR: f64 = 0.5;

/// The default per-element convergence threshold.
pub const DEFAULT_EPSILON: f64 = 1e-6;

/// The default fraction of gain elements that must be below the convergence
/// threshold before a solve counts as converged.
pub const DEFAULT_CONV_QUOTA: f64 = 0.99;

/// The default value added to gains before they are inverted.
pub const DEFAULT_REGULARISATION_FACTOR: f64 = 0.0;

/// The maximum number of times to iterate when solving a single tile.
pub const DEFAULT_MAX_ITERATIONS: u32 = 50;
