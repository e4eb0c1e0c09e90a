// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Deterministic synthetic observations, for testing and benchmarking the
//! solver.
//!
//! Every antenna pair is a baseline. Models only have parallel-hand (XX and
//! YY) correlations; the cross-hands are null. True gains are smooth functions
//! of antenna, polarisation and position on the gain grid, so they are
//! constant within each subtile and continue smoothly from one tile to the
//! next.

mod error;

pub use error::SimulateError;

use log::debug;
use ndarray::prelude::*;

use crate::{
    c64,
    gains::{GainMap, InitValue},
    math::{cexp, cross_baselines},
    params::StefCalParams,
    solver::DiagGainSolver,
    vis::{corr_index, null_correlations, Baseline, Pol, VisMap},
};

/// The settings of a synthetic observation.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationParams {
    pub num_antennas: usize,

    /// The number of contiguous data tiles.
    pub num_tiles: usize,

    /// The solver settings. `datashape` is the shape of a single tile.
    pub solver: StefCalParams,

    /// The true gain amplitudes vary between 1 - this and 1 + this.
    pub amplitude_scatter: f64,

    /// The true gain phases vary between -this and this [radians].
    pub phase_scatter: f64,
}

impl SimulationParams {
    pub fn new(num_antennas: usize, num_tiles: usize, solver: StefCalParams) -> SimulationParams {
        SimulationParams {
            num_antennas,
            num_tiles,
            solver,
            amplitude_scatter: 0.2,
            phase_scatter: 0.5,
        }
    }
}

/// The data and model of one tile.
#[derive(Debug, Clone)]
pub struct SimulatedTile {
    pub data: VisMap<usize>,
    pub model: VisMap<usize>,
}

#[derive(Debug, Clone)]
pub struct Simulation {
    pub baselines: Vec<Baseline<usize>>,

    /// The gains used to corrupt the model of each tile.
    pub true_gains: Vec<GainMap<usize>>,

    pub tiles: Vec<SimulatedTile>,
}

impl Simulation {
    /// Pairs of (data, model) for each tile, as wanted by
    /// [`crate::calibrate_tiles`].
    pub fn tile_pairs(&self) -> impl Iterator<Item = (&VisMap<usize>, &VisMap<usize>)> {
        self.tiles.iter().map(|t| (&t.data, &t.model))
    }
}

pub fn simulate(params: &SimulationParams) -> Result<Simulation, SimulateError> {
    if params.num_antennas < 2 {
        return Err(SimulateError::TooFewAntennas(params.num_antennas));
    }
    if params.num_tiles == 0 {
        return Err(SimulateError::NoTiles);
    }
    params.solver.validate()?;

    let shape = params.solver.tile_shape()?;
    let baselines = cross_baselines(params.num_antennas);
    debug!(
        "Simulating {} antennas ({} baselines) over {} tiles of shape {:?}",
        params.num_antennas,
        baselines.len(),
        params.num_tiles,
        shape.datashape()
    );

    let mut true_gains = Vec::with_capacity(params.num_tiles);
    let mut tiles = Vec::with_capacity(params.num_tiles);
    for i_tile in 0..params.num_tiles {
        let gains = make_true_gains(params, shape.gainshape(), i_tile);
        let model = make_model(&baselines, shape.datashape(), i_tile);

        // The solver's corruption is exactly what's wanted for the data.
        let mut solver = DiagGainSolver::new(
            &params.solver,
            baselines.iter().copied(),
            InitValue::FromPreviousTile(gains.clone()),
        )?;
        let mut data = VisMap::with_capacity(model.len());
        for pq in &baselines {
            let corrupted = solver.corrupt(&model, pq, false)?.into_owned();
            data.insert(*pq, corrupted);
        }

        true_gains.push(gains);
        tiles.push(SimulatedTile { data, model });
    }

    Ok(Simulation {
        baselines,
        true_gains,
        tiles,
    })
}

/// The true gains of every antenna for a tile. The leading axis of the gain
/// grid is continuous across tiles.
fn make_true_gains(params: &SimulationParams, gainshape: &[usize], i_tile: usize) -> GainMap<usize> {
    let mut gains = GainMap::with_capacity(params.num_antennas * 2);
    for ant in 0..params.num_antennas {
        for pol in Pol::ALL {
            let a = ant as f64;
            let p = pol.index() as f64;
            let g = Array::from_shape_fn(IxDyn(gainshape), |idx| {
                let idx = idx.slice();
                let t = (i_tile * gainshape[0] + idx[0]) as f64;
                let rest: usize = idx[1..].iter().sum();
                let rest = rest as f64;
                let amp = 1.0
                    + params.amplitude_scatter * (1.3 * a + 0.7 * p + 0.11 * t + 0.05 * rest).sin();
                let phase =
                    params.phase_scatter * (0.9 * a + 1.7 * p + 0.07 * t - 0.03 * rest).sin();
                cexp(phase) * amp
            });
            gains.insert((ant, pol), g);
        }
    }
    gains
}

/// A model with parallel hands only. Amplitudes are at least 1, so every gain
/// element has weight.
fn make_model(baselines: &[Baseline<usize>], datashape: &[usize], i_tile: usize) -> VisMap<usize> {
    let num_elements: usize = datashape.iter().product();
    baselines
        .iter()
        .enumerate()
        .map(|(i_bl, &(p, q))| {
            let mut corrs = null_correlations();
            for pol in Pol::ALL {
                let k = corr_index(pol, pol);
                let offset = (i_tile * num_elements) as f64;
                let b = i_bl as f64;
                let kf = k as f64;
                let values = Array::from_shape_fn(num_elements, |n| {
                    let n = n as f64 + offset;
                    let amp = 2.0 + (0.37 * b + 0.5 * kf + 0.013 * n).cos();
                    cexp(0.21 * p as f64 - 0.17 * q as f64 + 0.05 * n + 0.3 * kf) * amp
                });
                // Infallible; the element count matches.
                corrs[k] = values.into_shape_with_order(IxDyn(datashape)).ok();
            }
            ((p, q), corrs)
        })
        .collect()
}

/// The root-mean-square of a set of complex values.
pub fn rms<'a, I>(values: I) -> f64
where
    I: IntoIterator<Item = &'a c64>,
{
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v.norm_sqr(), count + 1));
    if count == 0 {
        0.0
    } else {
        (sum / count as f64).sqrt()
    }
}
