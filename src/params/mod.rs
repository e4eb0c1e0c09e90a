// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Parameters controlling a solve.

mod error;

pub use error::ParamsError;

use serde::{Deserialize, Serialize};

use crate::{
    constants::*,
    tiling::{TileShape, TilingError},
};

fn default_epsilon() -> f64 {
    DEFAULT_EPSILON
}

fn default_conv_quota() -> f64 {
    DEFAULT_CONV_QUOTA
}

fn default_regularisation_factor() -> f64 {
    DEFAULT_REGULARISATION_FACTOR
}

fn default_max_iterations() -> u32 {
    DEFAULT_MAX_ITERATIONS
}

/// Everything needed to set up a solver, apart from the baselines to solve
/// with and the initial gains.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StefCalParams {
    /// The shape of every correlation array.
    pub datashape: Vec<usize>,

    /// How many data elements along each axis share a gain. If not given,
    /// every data element has its own gain.
    #[serde(default)]
    pub subtiling: Option<Vec<usize>>,

    /// A gain element has converged when it changes by less than this between
    /// iterations.
    #[serde(default = "default_epsilon")]
    pub epsilon: f64,

    /// The fraction of gain elements that must converge.
    #[serde(default = "default_conv_quota")]
    pub conv_quota: f64,

    /// Added to gains before they are inverted when correcting data.
    #[serde(default = "default_regularisation_factor")]
    pub regularisation_factor: f64,

    /// Give up on a tile after this many iterations.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
}

impl StefCalParams {
    /// Parameters with default settings for data with the given shape.
    pub fn new(datashape: Vec<usize>) -> StefCalParams {
        StefCalParams {
            datashape,
            subtiling: None,
            epsilon: DEFAULT_EPSILON,
            conv_quota: DEFAULT_CONV_QUOTA,
            regularisation_factor: DEFAULT_REGULARISATION_FACTOR,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    pub fn with_subtiling(mut self, subtiling: Vec<usize>) -> Self {
        self.subtiling = Some(subtiling);
        self
    }

    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    pub fn with_conv_quota(mut self, conv_quota: f64) -> Self {
        self.conv_quota = conv_quota;
        self
    }

    pub fn with_regularisation_factor(mut self, regularisation_factor: f64) -> Self {
        self.regularisation_factor = regularisation_factor;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// The subtiling factors, with unset factors being 1.
    pub fn subtiling(&self) -> Vec<usize> {
        match &self.subtiling {
            Some(s) => s.clone(),
            None => vec![1; self.datashape.len()],
        }
    }

    pub fn tile_shape(&self) -> Result<TileShape, TilingError> {
        TileShape::new(&self.datashape, &self.subtiling())
    }

    /// Check that these parameters can be used for solving.
    pub fn validate(&self) -> Result<(), ParamsError> {
        // Also catches NaN.
        if !(self.epsilon > 0.0) {
            return Err(ParamsError::Epsilon(self.epsilon));
        }
        if !(self.conv_quota > 0.0 && self.conv_quota <= 1.0) {
            return Err(ParamsError::ConvQuota(self.conv_quota));
        }
        if !(self.regularisation_factor.is_finite() && self.regularisation_factor >= 0.0) {
            return Err(ParamsError::RegularisationFactor(
                self.regularisation_factor,
            ));
        }
        if self.max_iterations == 0 {
            return Err(ParamsError::ZeroIterations);
        }
        self.tile_shape()?;
        Ok(())
    }
}
