// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Error type for all stefcal-related errors. This should be the *only*
//! error enum that is publicly visible from the CLI.

use thiserror::Error;

use super::simulate::SimulateArgsError;
use crate::{
    params::ParamsError, simulate::SimulateError, solver::SolverError, tiling::TilingError,
};

/// The *only* publicly visible error from the `stefcal` binary.
#[derive(Error, Debug)]
pub enum StefcalError {
    /// An error related to the simulate subcommand.
    #[error("{0}")]
    Simulate(String),

    /// An error related to solver settings.
    #[error("{0}\n\nCheck the datashape, subtiling and convergence settings.")]
    Params(String),

    /// An error raised while solving.
    #[error("{0}")]
    Solver(String),

    /// An error related to argument files.
    #[error("{0}")]
    ArgFile(String),

    /// A generic error that can't be clarified further, e.g. IO errors.
    #[error("{0}")]
    Generic(String),
}

// When changing the error propagation below, ensure `Self::from(e)` uses the
// correct `e`!

impl From<SimulateArgsError> for StefcalError {
    fn from(e: SimulateArgsError) -> Self {
        match e {
            SimulateArgsError::Params(e) => Self::from(e),
            SimulateArgsError::OutputNotJson(_) => Self::Simulate(e.to_string()),
        }
    }
}

impl From<SimulateError> for StefcalError {
    fn from(e: SimulateError) -> Self {
        let s = e.to_string();
        match e {
            SimulateError::TooFewAntennas(_) | SimulateError::NoTiles => Self::Simulate(s),
            SimulateError::Params(e) => Self::from(e),
            SimulateError::Tiling(e) => Self::from(e),
            SimulateError::Solver(e) => Self::from(e),
        }
    }
}

impl From<SolverError> for StefcalError {
    fn from(e: SolverError) -> Self {
        let s = e.to_string();
        match e {
            SolverError::Params(e) => Self::from(e),
            SolverError::Tiling(e) => Self::from(e),
            SolverError::ShapeMismatch { .. }
            | SolverError::MissingBaseline { .. }
            | SolverError::GainInit(_) => Self::Solver(s),
        }
    }
}

impl From<ParamsError> for StefcalError {
    fn from(e: ParamsError) -> Self {
        Self::Params(e.to_string())
    }
}

impl From<TilingError> for StefcalError {
    fn from(e: TilingError) -> Self {
        Self::Params(e.to_string())
    }
}

impl From<std::io::Error> for StefcalError {
    fn from(e: std::io::Error) -> Self {
        Self::Generic(e.to_string())
    }
}

impl From<serde_json::Error> for StefcalError {
    fn from(e: serde_json::Error) -> Self {
        Self::Generic(e.to_string())
    }
}
