// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParamsError {
    #[error("The convergence threshold (epsilon) must be a positive number; got {0}")]
    Epsilon(f64),

    #[error("The convergence quota must be in the range (0, 1]; got {0}")]
    ConvQuota(f64),

    #[error("The regularisation factor must be a finite, non-negative number; got {0}")]
    RegularisationFactor(f64),

    #[error("The maximum number of iterations must be at least 1")]
    ZeroIterations,

    #[error(transparent)]
    Tiling(#[from] crate::tiling::TilingError),
}
