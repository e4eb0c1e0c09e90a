// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimulateError {
    #[error("At least 2 antennas are needed to make a baseline; got {0}")]
    TooFewAntennas(usize),

    #[error("At least 1 tile must be simulated")]
    NoTiles,

    #[error(transparent)]
    Params(#[from] crate::params::ParamsError),

    #[error(transparent)]
    Tiling(#[from] crate::tiling::TilingError),

    #[error(transparent)]
    Solver(#[from] crate::solver::SolverError),
}
