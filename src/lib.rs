// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Subtiled diagonal-gain ("StefCal") self-calibration for radio interferometers.

Gains are solved per antenna and per polarisation on a grid that may be
coarser than the data grid ("subtiling"). The solver alternates between
solving for the "p" and "q" sides of every baseline, each time using a
closed-form weighted least-squares update.
 */

pub mod apply;
mod cli;
pub mod constants;
pub mod gains;
pub(crate) mod math;
pub mod params;
pub mod simulate;
pub mod solver;
pub mod tiling;
pub mod vis;

// Re-exports.
pub use cli::{Stefcal, StefcalError};
pub use gains::{GainInitError, GainMap, GainStore, InitValue};
pub use params::{ParamsError, StefCalParams};
pub use solver::{
    calibrate_tiles, DiagGainSolver, IterationStats, SolveResult, SolverError, TileSolution,
};
pub use tiling::{SubtiledTiling, TileShape, Tiling, TilingError, TrivialTiling};
pub use vis::{
    canonicalise, AntennaId, Baseline, BaselineLookup, Correlations, GainKey, Orientation, Pol,
    VisMap,
};

/// Complex double-precision float; the element type of all gains and
/// visibilities.
#[allow(non_camel_case_types)]
pub type c64 = num_complex::Complex<f64>;
