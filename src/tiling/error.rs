// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Errors from the mapping between data and gain grids.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TilingError {
    #[error("The data shape is empty; at least one axis is required")]
    EmptyShape,

    #[error("The data shape has {data} axes, but the subtiling has {subtiling} factors")]
    LengthMismatch { data: usize, subtiling: usize },

    #[error("Axis {axis} of the data shape has an extent of 0")]
    ZeroExtent { axis: usize },

    #[error("Axis {axis} has a subtiling factor of 0")]
    ZeroFactor { axis: usize },

    #[error("The subtiling factor {factor} doesn't evenly divide axis {axis} (extent {extent})")]
    NotDivisible {
        axis: usize,
        extent: usize,
        factor: usize,
    },

    #[error("Expected an array with shape {expected:?}, but got {got:?}")]
    DataShape { expected: Vec<usize>, got: Vec<usize> },

    #[error("Couldn't change an array's layout: {0}")]
    Reshape(#[from] ndarray::ShapeError),
}
