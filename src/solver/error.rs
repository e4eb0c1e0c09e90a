// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Error type for all solver-related errors.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SolverError {
    #[error("The {which} correlations of baseline {baseline} have shape {got:?}, but the data shape is {expected:?}")]
    ShapeMismatch {
        which: &'static str,
        baseline: String,
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    #[error("Baseline {baseline} isn't present in the {which} (in either orientation)")]
    MissingBaseline {
        which: &'static str,
        baseline: String,
    },

    #[error(transparent)]
    Tiling(#[from] crate::tiling::TilingError),

    #[error(transparent)]
    GainInit(#[from] crate::gains::GainInitError),

    #[error(transparent)]
    Params(#[from] crate::params::ParamsError),
}
