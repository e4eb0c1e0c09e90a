// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Calibrate a synthetic observation, reporting how well the known gains are
//! recovered.

#[cfg(test)]
mod tests;

use std::{
    fs::File,
    io::{BufWriter, Write},
    path::PathBuf,
};

use clap::Parser;
use indexmap::IndexSet;
use itertools::Itertools;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{common::ARG_FILE_HELP, StefcalError};
use crate::{
    c64,
    constants::*,
    gains::{GainMap, InitValue},
    params::{ParamsError, StefCalParams},
    simulate::{simulate, SimulationParams},
    solver::{calibrate_tiles, make_calibration_progress_bar, DiagGainSolver, SolveResult},
    vis::Pol,
};

const DEFAULT_NUM_ANTENNAS: usize = 8;
const DEFAULT_NUM_TILES: usize = 4;
const DEFAULT_DATASHAPE: [usize; 2] = [4, 16];
const DEFAULT_AMPLITUDE_SCATTER: f64 = 0.2;
const DEFAULT_PHASE_SCATTER: f64 = 0.5;

lazy_static::lazy_static! {
    static ref NUM_ANTENNAS_HELP: String =
        format!("The number of antennas in the synthetic array. Default: {DEFAULT_NUM_ANTENNAS}");

    static ref NUM_TILES_HELP: String =
        format!("The number of contiguous data tiles to calibrate. Default: {DEFAULT_NUM_TILES}");

    static ref DATASHAPE_HELP: String =
        format!("The shape of each correlation array in a tile, e.g. (time, freq). Default: {}", DEFAULT_DATASHAPE.iter().join(" "));

    static ref EPSILON_HELP: String =
        format!("A gain element has converged when it changes by less than this between iterations. Default: {DEFAULT_EPSILON:e}");

    static ref CONV_QUOTA_HELP: String =
        format!("The fraction of gain elements that must converge before a tile is considered converged. Default: {DEFAULT_CONV_QUOTA}");

    static ref REGULARISATION_HELP: String =
        format!("Added to gains before they are inverted. Default: {DEFAULT_REGULARISATION_FACTOR}");

    static ref MAX_ITERATIONS_HELP: String =
        format!("The maximum number of iterations per tile. Default: {DEFAULT_MAX_ITERATIONS}");

    static ref AMPLITUDE_SCATTER_HELP: String =
        format!("The true gain amplitudes vary between 1 - this and 1 + this. Default: {DEFAULT_AMPLITUDE_SCATTER}");

    static ref PHASE_SCATTER_HELP: String =
        format!("The true gain phases vary between -this and this [radians]. Default: {DEFAULT_PHASE_SCATTER}");
}

#[derive(Error, Debug)]
pub(super) enum SimulateArgsError {
    #[error("The solutions output file '{0}' must have a .json extension")]
    OutputNotJson(PathBuf),

    #[error(transparent)]
    Params(#[from] ParamsError),
}

/// Arguments controlling the solver.
#[derive(Parser, Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub(super) struct SolverArgs {
    #[clap(long, multiple_values(true), help = DATASHAPE_HELP.as_str(), help_heading = "SOLVER")]
    pub(super) datashape: Option<Vec<usize>>,

    /// How many data elements along each axis share a gain. There must be as
    /// many values as there are datashape axes, and each must evenly divide
    /// its axis. Default: 1 for every axis.
    #[clap(long, multiple_values(true), help_heading = "SOLVER")]
    pub(super) subtiling: Option<Vec<usize>>,

    #[clap(long, help = EPSILON_HELP.as_str(), help_heading = "SOLVER")]
    pub(super) epsilon: Option<f64>,

    #[clap(long, help = CONV_QUOTA_HELP.as_str(), help_heading = "SOLVER")]
    pub(super) conv_quota: Option<f64>,

    #[clap(long, help = REGULARISATION_HELP.as_str(), help_heading = "SOLVER")]
    pub(super) regularisation_factor: Option<f64>,

    #[clap(long, help = MAX_ITERATIONS_HELP.as_str(), help_heading = "SOLVER")]
    pub(super) max_iterations: Option<u32>,
}

impl SolverArgs {
    fn merge(self, other: Self) -> Self {
        Self {
            datashape: self.datashape.or(other.datashape),
            subtiling: self.subtiling.or(other.subtiling),
            epsilon: self.epsilon.or(other.epsilon),
            conv_quota: self.conv_quota.or(other.conv_quota),
            regularisation_factor: self.regularisation_factor.or(other.regularisation_factor),
            max_iterations: self.max_iterations.or(other.max_iterations),
        }
    }

    fn parse(self) -> StefCalParams {
        let SolverArgs {
            datashape,
            subtiling,
            epsilon,
            conv_quota,
            regularisation_factor,
            max_iterations,
        } = self;

        StefCalParams {
            datashape: datashape.unwrap_or_else(|| DEFAULT_DATASHAPE.to_vec()),
            subtiling,
            epsilon: epsilon.unwrap_or(DEFAULT_EPSILON),
            conv_quota: conv_quota.unwrap_or(DEFAULT_CONV_QUOTA),
            regularisation_factor: regularisation_factor.unwrap_or(DEFAULT_REGULARISATION_FACTOR),
            max_iterations: max_iterations.unwrap_or(DEFAULT_MAX_ITERATIONS),
        }
    }
}

/// Arguments describing the synthetic observation.
#[derive(Parser, Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub(super) struct SimulateCliArgs {
    #[clap(short = 'n', long, help = NUM_ANTENNAS_HELP.as_str(), help_heading = "SIMULATION")]
    pub(super) num_antennas: Option<usize>,

    #[clap(short = 't', long, help = NUM_TILES_HELP.as_str(), help_heading = "SIMULATION")]
    pub(super) num_tiles: Option<usize>,

    #[clap(long, help = AMPLITUDE_SCATTER_HELP.as_str(), help_heading = "SIMULATION")]
    pub(super) amplitude_scatter: Option<f64>,

    #[clap(long, help = PHASE_SCATTER_HELP.as_str(), help_heading = "SIMULATION")]
    pub(super) phase_scatter: Option<f64>,

    /// Write the solutions of every tile to this JSON file.
    #[clap(short, long, help_heading = "OUTPUT FILES")]
    pub(super) output_solutions: Option<PathBuf>,
}

impl SimulateCliArgs {
    fn merge(self, other: Self) -> Self {
        Self {
            num_antennas: self.num_antennas.or(other.num_antennas),
            num_tiles: self.num_tiles.or(other.num_tiles),
            amplitude_scatter: self.amplitude_scatter.or(other.amplitude_scatter),
            phase_scatter: self.phase_scatter.or(other.phase_scatter),
            output_solutions: self.output_solutions.or(other.output_solutions),
        }
    }
}

#[derive(Parser, Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub(super) struct SimulateArgs {
    #[clap(name = "ARGUMENTS_FILE", help = ARG_FILE_HELP.as_str(), parse(from_os_str))]
    pub(super) args_file: Option<PathBuf>,

    #[clap(flatten)]
    #[serde(rename = "solver")]
    #[serde(default)]
    pub(super) solver_args: SolverArgs,

    #[clap(flatten)]
    #[serde(rename = "simulate")]
    #[serde(default)]
    pub(super) simulate_args: SimulateCliArgs,
}

impl SimulateArgs {
    /// Both command-line and file arguments overlap in terms of what is
    /// available; this function consolidates everything that was specified into
    /// a single struct. Where applicable, it will prefer CLI parameters over
    /// those in the file.
    ///
    /// This function should only ever merge arguments, and not try to make
    /// sense of them.
    pub(super) fn merge(self) -> Result<SimulateArgs, StefcalError> {
        debug!("Merging command-line arguments with the argument file");

        let cli_args = self;

        if let Some(arg_file) = cli_args.args_file {
            // Read in the file arguments. Ensure all of the file args are
            // accounted for by pattern matching.
            let SimulateArgs {
                args_file: _,
                solver_args,
                simulate_args,
            } = unpack_arg_file!(arg_file);

            // Merge all the arguments, preferring the CLI args when available.
            Ok(SimulateArgs {
                args_file: None,
                solver_args: cli_args.solver_args.merge(solver_args),
                simulate_args: cli_args.simulate_args.merge(simulate_args),
            })
        } else {
            Ok(cli_args)
        }
    }

    fn parse(self) -> Result<(SimulationParams, Option<PathBuf>), SimulateArgsError> {
        debug!("{:#?}", self);

        // Expose all the struct fields to ensure they're all used.
        let SimulateArgs {
            args_file: _,
            solver_args,
            simulate_args:
                SimulateCliArgs {
                    num_antennas,
                    num_tiles,
                    amplitude_scatter,
                    phase_scatter,
                    output_solutions,
                },
        } = self;

        let solver = solver_args.parse();
        solver.validate()?;

        if let Some(output) = &output_solutions {
            let is_json = output
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.eq_ignore_ascii_case("json"))
                .unwrap_or(false);
            if !is_json {
                return Err(SimulateArgsError::OutputNotJson(output.clone()));
            }
        }

        let mut params = SimulationParams::new(
            num_antennas.unwrap_or(DEFAULT_NUM_ANTENNAS),
            num_tiles.unwrap_or(DEFAULT_NUM_TILES),
            solver,
        );
        params.amplitude_scatter = amplitude_scatter.unwrap_or(DEFAULT_AMPLITUDE_SCATTER);
        params.phase_scatter = phase_scatter.unwrap_or(DEFAULT_PHASE_SCATTER);
        Ok((params, output_solutions))
    }

    pub(super) fn run(self, dry_run: bool, draw_progress_bar: bool) -> Result<(), StefcalError> {
        let (params, output_solutions) = self.parse()?;
        let shape = params.solver.tile_shape()?;

        info!("Synthetic observation");
        info!(
            "  {} antennas ({} baselines), {} tiles",
            params.num_antennas,
            params.num_antennas * params.num_antennas.saturating_sub(1) / 2,
            params.num_tiles
        );
        info!(
            "  gain scatter: amplitude {}, phase {} rad",
            params.amplitude_scatter, params.phase_scatter
        );
        info!("Solver");
        info!(
            "  data shape {:?}, subtiling {:?}, gain shape {:?}",
            shape.datashape(),
            shape.subtiling(),
            shape.gainshape()
        );
        info!(
            "  epsilon {:e}, convergence quota {}, max. iterations {}, regularisation {}",
            params.solver.epsilon,
            params.solver.conv_quota,
            params.solver.max_iterations,
            params.solver.regularisation_factor
        );
        if let Some(output) = &output_solutions {
            info!("Writing solutions to {}", output.display());
        }

        if dry_run {
            info!("Dry run -- exiting now.");
            return Ok(());
        }

        let sim = simulate(&params)?;
        let baselines: IndexSet<_> = sim.baselines.iter().copied().collect();
        let progress_bar = make_calibration_progress_bar(
            sim.tiles.len(),
            "Calibrating tiles".to_string(),
            draw_progress_bar,
        );
        let solutions = calibrate_tiles(
            &params.solver,
            &baselines,
            sim.tile_pairs(),
            progress_bar,
            true,
        )?;

        let mut output_tiles = Vec::with_capacity(solutions.len());
        for (i_tile, (solution, tile)) in solutions.into_iter().zip(sim.tiles.iter()).enumerate() {
            // Residuals of the solved gains against this tile's data.
            let mut solver = DiagGainSolver::new(
                &params.solver,
                baselines.iter().copied(),
                InitValue::FromPreviousTile(solution.gains),
            )?;
            let residual_rms = solver.residual_rms(&tile.data, &tile.model)?;
            info!("Tile {i_tile:>3}: residual RMS {residual_rms:.5e}");

            output_tiles.push(TileOutput {
                result: solution.result,
                residual_rms,
                gains: GainOutput::from_gains(&solver.into_gains()),
            });
        }

        if let Some(output) = output_solutions {
            let output_file = SolutionsOutput {
                params: params.solver,
                baselines: sim.baselines,
                tiles: output_tiles,
            };
            let mut f = BufWriter::new(File::create(&output)?);
            serde_json::to_writer_pretty(&mut f, &output_file)?;
            f.flush()?;
            info!("Wrote solutions to {}", output.display());
        }

        Ok(())
    }
}

/// Everything written to a solutions file.
#[derive(Debug, Serialize, Deserialize)]
pub(super) struct SolutionsOutput {
    pub(super) params: StefCalParams,
    pub(super) baselines: Vec<(usize, usize)>,
    pub(super) tiles: Vec<TileOutput>,
}

#[derive(Debug, Serialize, Deserialize)]
pub(super) struct TileOutput {
    #[serde(flatten)]
    pub(super) result: SolveResult,
    pub(super) residual_rms: f64,
    pub(super) gains: Vec<GainOutput>,
}

/// A single gain array, flattened in row-major order.
#[derive(Debug, Serialize, Deserialize)]
pub(super) struct GainOutput {
    pub(super) antenna: usize,
    pub(super) pol: Pol,
    pub(super) shape: Vec<usize>,
    pub(super) values: Vec<c64>,
}

impl GainOutput {
    fn from_gains(gains: &GainMap<usize>) -> Vec<GainOutput> {
        gains
            .iter()
            .map(|(&(antenna, pol), g)| GainOutput {
                antenna,
                pol,
                shape: g.shape().to_vec(),
                values: g.iter().copied().collect(),
            })
            .collect()
    }
}
